//! Unit cells and references into instantiated wasm exports.
//!
//! A [`UnitCell`] is registered in the resolution cache *before* its unit starts
//! loading, so that a unit which (transitively) imports itself observes the
//! partially initialised cell instead of recursing forever. Function imports
//! taken from such a cell are bound lazily and checked when first called.

use std::fmt ;
use std::sync::{ Arc, Mutex, OnceLock, TryLockError, Weak };
use thiserror::Error ;
use wasmtime::{ ExternType, FuncType, Instance, Store, Val };

use crate::{ Namespace, QualifiedName, Resolver, Value };



/// Errors raised when calling into, or reading from, a loaded unit.
#[derive( Error, Debug )]
pub enum CallError {
    #[error( "Unit '{0}' has not finished loading" )] NotReady( QualifiedName ),
    #[error( "Unit '{0}' has been unloaded" )] Unloaded( QualifiedName ),
    #[error( "Unit '{0}' is already executing; re-entrant calls are not supported" )] Busy( QualifiedName ),
    #[error( "Store lock rejected for unit '{0}'" )] LockRejected( QualifiedName ),
    #[error( "Unit '{unit}' has no export '{export}'" )] MissingExport { unit: QualifiedName, export: String },
    #[error( "'{0}' is not bound" )] Unbound( String ),
    #[error( "'{0}' is not a function" )] NotCallable( String ),
    #[error( "'{0}' has no wasm signature" )] Untyped( String ),
    #[error( "'{0}' is not a global" )] NotAGlobal( String ),
    #[error( "Expected signature {expected}, found {found}" )] SignatureMismatch { expected: String, found: String },
    #[error( "Runtime exception: {0}" )] Trap( wasmtime::Error ),
}

/// The live wasm instance backing a loaded unit.
pub(crate) struct Runtime {
    unit: QualifiedName,
    store: Mutex<Store<()>>,
    instance: Instance,
}

impl Runtime {

    pub(crate) fn new( unit: QualifiedName, store: Store<()>, instance: Instance ) -> Arc<Self> {
        Arc::new( Self { unit, store: Mutex::new( store ), instance })
    }

    fn with_store<R>(
        &self,
        f: impl FnOnce( &mut Store<()>, &Instance ) -> Result<R, CallError>,
    ) -> Result<R, CallError> {
        let mut store = match self.store.try_lock() {
            Ok( store ) => store,
            Err( TryLockError::WouldBlock ) => return Err( CallError::Busy( self.unit.clone() )),
            Err( TryLockError::Poisoned( _ )) => return Err( CallError::LockRejected( self.unit.clone() )),
        };
        f( &mut *store, &self.instance )
    }

}

/// What a populated cell holds.
pub(crate) struct Loaded {
    pub(crate) namespace: Namespace,
    /// The resolver the unit was loaded under, for late imports. `None` for
    /// units loaded ambiently or synthesised from a host namespace.
    pub(crate) context: Option<Weak<dyn Resolver>>,
    pub(crate) sandboxed: bool,
}

/// The cache entry for one unit.
///
/// Empty while the unit loads, then populated exactly once.
pub struct UnitCell {
    name: QualifiedName,
    loaded: OnceLock<Loaded>,
}

impl UnitCell {

    /// Creates an empty cell that a subsequent load can populate.
    pub fn new( name: QualifiedName ) -> Arc<Self> {
        Arc::new( Self { name, loaded: OnceLock::new() })
    }

    #[inline] pub fn name( &self ) -> &QualifiedName { &self.name }
    #[inline] pub fn is_loaded( &self ) -> bool { self.loaded.get().is_some() }

    /// The unit's namespace, once loading has completed.
    #[inline] pub fn namespace( &self ) -> Option<&Namespace> { self.loaded.get().map(| loaded | &loaded.namespace ) }

    #[inline] pub(crate) fn loaded( &self ) -> Option<&Loaded> { self.loaded.get() }

    /// Fills the cell, handing the value back if it was already filled.
    pub(crate) fn populate( &self, loaded: Loaded ) -> Result<(), Loaded> { self.loaded.set( loaded ) }

}

impl fmt::Debug for UnitCell {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "UnitCell" )
            .field( "name", &self.name )
            .field( "loaded", &self.is_loaded() )
            .finish()
    }
}

/// The kind of wasm item an [`ExportRef`] points at.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum ExportKind { Func, Global, Memory, Table, Other }

impl From<&ExternType> for ExportKind {
    fn from( ty: &ExternType ) -> Self {
        match ty {
            ExternType::Func( _ ) => Self::Func,
            ExternType::Global( _ ) => Self::Global,
            ExternType::Memory( _ ) => Self::Memory,
            ExternType::Table( _ ) => Self::Table,
            #[allow( unreachable_patterns )]
            _ => Self::Other,
        }
    }
}

#[derive( Clone )]
enum Source {
    Bound( Arc<Runtime> ),
    /// Resolved through the cell's namespace at use time. Non-owning, so
    /// that circular imports do not keep both units alive.
    Pending( Weak<UnitCell> ),
}

/// A handle on one named export of a unit.
#[derive( Clone )]
pub struct ExportRef {
    unit: QualifiedName,
    name: String,
    kind: ExportKind,
    source: Source,
}

impl ExportRef {

    pub(crate) fn bound( runtime: &Arc<Runtime>, name: String, kind: ExportKind ) -> Self {
        Self { unit: runtime.unit.clone(), name, kind, source: Source::Bound( Arc::clone( runtime )) }
    }

    pub(crate) fn pending( cell: &Arc<UnitCell>, name: String, kind: ExportKind ) -> Self {
        Self { unit: cell.name.clone(), name, kind, source: Source::Pending( Arc::downgrade( cell )) }
    }

    #[inline] pub fn unit( &self ) -> &QualifiedName { &self.unit }
    #[inline] pub fn name( &self ) -> &str { &self.name }
    #[inline] pub fn kind( &self ) -> ExportKind { self.kind }

    /// Calls the exported function, writing into a caller-sized result buffer.
    ///
    /// # Errors
    /// Fails if the target unit is still loading or already executing, if the
    /// export is not a function, or if the call traps.
    pub fn call_into( &self, params: &[Val], results: &mut [Val] ) -> Result<(), CallError> {
        match &self.source {
            Source::Bound( runtime ) => runtime.with_store(| store, instance | {
                let func = instance.get_func( &mut *store, &self.name )
                    .ok_or_else(|| CallError::NotCallable( self.to_string() ))?;
                func.call( &mut *store, params, results ).map_err( CallError::Trap )
            }),
            Source::Pending( cell ) => match self.resolve( cell )? {
                Value::Export( export ) => export.call_into( params, results ),
                Value::Host( func ) => func.call( params, results ).map_err( CallError::Trap ),
                _ => Err( CallError::NotCallable( self.to_string() )),
            },
        }
    }

    /// Calls the exported function, sizing the result buffer from its signature.
    ///
    /// # Errors
    /// See [`ExportRef::call_into`].
    pub fn call( &self, params: &[Val] ) -> Result<Vec<Val>, CallError> {
        let mut results = vec![ Val::I32( 0 ); self.func_type()?.results().len() ];
        self.call_into( params, &mut results )?;
        Ok( results )
    }

    /// The wasm signature of the exported function.
    ///
    /// # Errors
    /// Fails if the target is not ready, not a function, or a host function.
    pub fn func_type( &self ) -> Result<FuncType, CallError> {
        match &self.source {
            Source::Bound( runtime ) => runtime.with_store(| store, instance | instance
                .get_func( &mut *store, &self.name )
                .map(| func | func.ty( &*store ))
                .ok_or_else(|| CallError::NotCallable( self.to_string() ))
            ),
            Source::Pending( cell ) => match self.resolve( cell )? {
                Value::Export( export ) => export.func_type(),
                Value::Host( _ ) => Err( CallError::Untyped( self.to_string() )),
                _ => Err( CallError::NotCallable( self.to_string() )),
            },
        }
    }

    /// Reads the current value of an exported global.
    ///
    /// # Errors
    /// Fails if the target is not ready or not a global.
    pub fn global( &self ) -> Result<Val, CallError> {
        match &self.source {
            Source::Bound( runtime ) => runtime.with_store(| store, instance | instance
                .get_global( &mut *store, &self.name )
                .map(| global | global.get( &mut *store ))
                .ok_or_else(|| CallError::NotAGlobal( self.to_string() ))
            ),
            Source::Pending( cell ) => match self.resolve( cell )? {
                Value::Export( export ) => export.global(),
                _ => Err( CallError::NotAGlobal( self.to_string() )),
            },
        }
    }

    /// Writes a mutable exported global.
    ///
    /// # Errors
    /// Fails if the target is not a global, or wasmtime rejects the write
    /// (immutable global or mismatched type).
    pub fn set_global( &self, value: Val ) -> Result<(), CallError> {
        match &self.source {
            Source::Bound( runtime ) => runtime.with_store(| store, instance | {
                let global = instance.get_global( &mut *store, &self.name )
                    .ok_or_else(|| CallError::NotAGlobal( self.to_string() ))?;
                global.set( &mut *store, value ).map_err( CallError::Trap )
            }),
            Source::Pending( cell ) => match self.resolve( cell )? {
                Value::Export( export ) => export.set_global( value ),
                _ => Err( CallError::NotAGlobal( self.to_string() )),
            },
        }
    }

    fn resolve( &self, cell: &Weak<UnitCell> ) -> Result<Value, CallError> {
        let cell = cell.upgrade().ok_or_else(|| CallError::Unloaded( self.unit.clone() ))?;
        cell.namespace()
            .ok_or_else(|| CallError::NotReady( cell.name.clone() ))?
            .get( &self.name )
            .cloned()
            .ok_or_else(|| CallError::MissingExport { unit: cell.name.clone(), export: self.name.clone() })
    }

}

impl PartialEq for ExportRef {
    fn eq( &self, other: &Self ) -> bool {
        self.unit == other.unit && self.name == other.name && self.kind == other.kind
    }
}

impl fmt::Display for ExportRef {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result { write!( f, "{}.{}", self.unit, self.name )}
}

impl fmt::Debug for ExportRef {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "ExportRef" )
            .field( "unit", &self.unit )
            .field( "name", &self.name )
            .field( "kind", &self.kind )
            .field( "bound", &matches!( self.source, Source::Bound( _ )))
            .finish()
    }
}
