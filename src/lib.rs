//! A sandboxed WebAssembly unit loader and a contract-driven plugin registry.
//!
//! Code is organised in **units** named by dotted [`QualifiedName`]s. A unit is
//! a core wasm module (`.wat`, `.wasm` or precompiled `.cwasm`) and/or a TOML
//! declarations file; a directory is a **package** whose entries are its
//! children. Loading a unit yields a [`Namespace`] holding its exports and
//! declared values.
//!
//! # Core Concepts
//!
//! - [`Resolver`]: A policy mapping names to a [`LoadableUnit`] or a ready
//! 	[`Namespace`]. Resolvers compose through [`StackedResolver`],
//! 	[`ExclusiveResolver`] and [`Resolver::with_overrides`].
//!
//! - [`Host`]: Owns the wasmtime [`Engine`], the [`HostResolver`] over the
//! 	search roots, and the process-wide resolution state (hooks, unit cache,
//! 	entrypoint).
//!
//! - [`IsolationContext`]: Exclusive access to that state. Every sandboxed
//! 	load runs in a frame bound to its own resolver; the surrounding state is
//! 	restored when the frame ends, including on error or panic. A module import
//! 	`(import "x.y" "f" ...)` resolves `x.y` through the innermost frame only.
//!
//! - [`Contract`]: The shape a plugin must have. The [`PluginScanner`] adapts
//! 	every value found below a package into [`Candidate`]s, the contract
//! 	verifies them, and the [`Registry`] keeps the verified [`Plugin`]s,
//! 	ordering them through [`graph`] when asked.
//!
//! # Example
//!
//! ```
//! use wasm_isolate::{ Host, Namespace, QualifiedName, Value };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let host = Host::default();
//! let name = "app.settings".parse::<QualifiedName>()?;
//! host.resolver().register( name.clone(), Namespace::new().with( "greeting", "hello" ));
//!
//! let settings = host.import( &name )?;
//! assert_eq!( settings.get( "greeting" ), Some( &Value::from( "hello" )));
//! # Ok(())
//! # }
//! ```
//!
//! # Re-exports
//!
//! `wasm_isolate` re-exports [`Engine`] and [`Val`] from `wasmtime`.

mod name ;
mod value ;
mod cell ;
mod resolver ;
mod unit ;
mod declarations ;
mod isolation ;
mod host ;
mod loader ;
mod handle ;
mod contract ;
mod plugin ;
pub mod graph ;
mod expand ;
mod scanner ;
mod config ;
mod registry ;

#[doc( no_inline )]
pub use wasmtime::{ Engine, Val };

pub use name::{ NameError, QualifiedName };
pub use value::{ HostCallback, HostFunc, Namespace, Record, Value };
pub use cell::{ CallError, ExportKind, ExportRef, UnitCell };
pub use resolver::{
    empty_resolver, CallableResolver, CallbackError, DictResolver, EmptyResolver, ExclusiveResolver,
    NotFound, Overrides, Resolver, StackedResolver, Target,
};
pub use unit::{ CodeKind, LoadableUnit, UnitKind, DECLARATIONS_EXTENSION, PACKAGE_STEM };
pub use isolation::{ IsolationContext, ResolutionSnapshot, ResolutionState };
pub use host::{ Host, HostResolver };
pub use loader::LoadError ;
pub use handle::UnitHandle ;
pub use contract::{
    AdaptError, Attribute, AttributeKind, Candidate, Contract, Invariant, Signature, Violation, WasmType,
    AFTER, BEFORE, NAME, PROVIDES,
};
pub use plugin::Plugin ;
pub use expand::{ expand_names, EXCLUDE_PREFIX, WILDCARD };
pub use scanner::{ PluginScanner, Scan };
pub use config::{ ConfigError, DuplicatePolicy, RegistryConfig };
pub use registry::{ PluginMap, Registry, RegistryError };
