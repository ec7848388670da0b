//! The process-level coordinator owning the engine and the resolution state.

use std::collections::HashMap ;
use std::path::PathBuf ;
use std::sync::{ Arc, Mutex, OnceLock, PoisonError, RwLock };
use tracing::debug ;
use wasmtime::Engine ;

use crate::{
    IsolationContext, LoadError, LoadableUnit, Namespace, NotFound, Overrides, QualifiedName,
    ResolutionSnapshot, ResolutionState, Resolver, StackedResolver, Target, UnitCell, UnitHandle,
};
use crate::isolation::Scope ;
use crate::resolver::stack_overrides ;



/// Resolves names against the host's own search roots and registered namespaces.
///
/// Registered ("native") namespaces take precedence over units on disk. Later
/// search roots are consulted only when earlier ones lack the unit.
#[derive( Debug, Default )]
pub struct HostResolver {
    roots: RwLock<Vec<PathBuf>>,
    native: RwLock<HashMap<QualifiedName, Arc<Namespace>>>,
}

impl HostResolver {

    pub fn new( roots: impl IntoIterator<Item = PathBuf> ) -> Self {
        Self { roots: RwLock::new( roots.into_iter().collect() ), native: RwLock::default() }
    }

    pub fn add_search_path( &self, path: impl Into<PathBuf> ) {
        self.roots.write().unwrap_or_else( PoisonError::into_inner ).push( path.into() );
    }

    pub fn search_paths( &self ) -> Vec<PathBuf> {
        self.roots.read().unwrap_or_else( PoisonError::into_inner ).clone()
    }

    /// Makes `namespace` importable as `name` without loading anything.
    pub fn register( &self, name: QualifiedName, namespace: Namespace ) {
        debug!( unit = %name, "Registering host namespace" );
        self.native.write().unwrap_or_else( PoisonError::into_inner ).insert( name, Arc::new( namespace ));
    }

    /// Finds `name` on the search roots, ignoring registered namespaces.
    ///
    /// # Errors
    /// Returns [`NotFound`] if no root holds the unit.
    pub fn locate( &self, name: &QualifiedName ) -> Result<LoadableUnit, NotFound> {
        self.roots.read().unwrap_or_else( PoisonError::into_inner ).iter()
            .find_map(| root | LoadableUnit::locate( root, name ))
            .ok_or_else(|| NotFound::new( name, "not on the search path" ))
    }

}

impl Resolver for HostResolver {
    fn lookup( &self, name: &QualifiedName ) -> Result<Target, NotFound> {
        if let Some( namespace ) = self.native.read().unwrap_or_else( PoisonError::into_inner ).get( name ) {
            return Ok( Target::Namespace( Arc::clone( namespace )));
        }
        self.locate( name ).map( Target::Unit )
    }
    fn with_overrides( self: Arc<Self>, overrides: Overrides ) -> StackedResolver {
        stack_overrides( self, overrides )
    }
}

/// Owns the wasmtime [`Engine`], the [`HostResolver`] and the ambient
/// [`ResolutionState`].
///
/// All loading is serialised through the state lock. While a closure passed to
/// [`Host::run_isolated`] or [`Host::with_context`] runs, use the
/// [`IsolationContext`] it receives; calling back into the same `Host` from
/// there would wait on the lock forever.
///
/// The same holds for every [`HostFunc`]( crate::HostFunc ) a unit calls while
/// it is being instantiated, such as from its start function: the lock is
/// still held, so a host function that calls [`Host::import`], [`Host::load`]
/// or [`UnitHandle::late_import`] on the loading host deadlocks. Host
/// functions called after the load has returned, outside any context, may
/// call back freely.
pub struct Host {
    engine: Engine,
    resolver: Arc<HostResolver>,
    state: Mutex<ResolutionState>,
}

impl Host {

    pub fn new( engine: Engine ) -> Self {
        Self { engine, resolver: Arc::new( HostResolver::default() ), state: Mutex::default() }
    }

    /// A lazily created process-wide host using the default engine.
    pub fn global() -> Arc<Host> {
        static GLOBAL: OnceLock<Arc<Host>> = OnceLock::new();
        Arc::clone( GLOBAL.get_or_init(|| Arc::new( Host::new( Engine::default() ))))
    }

    pub fn with_search_path( self, path: impl Into<PathBuf> ) -> Self {
        self.resolver.add_search_path( path );
        self
    }

    pub fn with_namespace( self, name: QualifiedName, namespace: Namespace ) -> Self {
        self.resolver.register( name, namespace );
        self
    }

    #[inline] pub fn engine( &self ) -> &Engine { &self.engine }
    #[inline] pub fn resolver( &self ) -> &Arc<HostResolver> { &self.resolver }

    /// Appends an ambient resolution hook, consulted before the host resolver.
    pub fn install_hook( &self, hook: Arc<dyn Resolver> ) {
        self.with_context(| ctx | ctx.state_mut( Scope::Ambient ).hooks.push( hook ));
    }

    /// Removes and returns every ambient hook.
    pub fn take_hooks( &self ) -> Vec<Arc<dyn Resolver>> {
        self.with_context(| ctx | std::mem::take( &mut ctx.state_mut( Scope::Ambient ).hooks ))
    }

    /// Forgets every ambiently loaded unit.
    pub fn clear_cache( &self ) {
        self.with_context(| ctx | ctx.state_mut( Scope::Ambient ).cache.clear() );
    }

    /// Snapshot of the ambient resolution state.
    pub fn snapshot( &self ) -> ResolutionSnapshot {
        self.with_context(| ctx | ctx.snapshot() )
    }

    /// Runs `f` with exclusive access to the resolution state, outside any frame.
    pub fn with_context<R>( &self, f: impl FnOnce( &mut IsolationContext<'_> ) -> R ) -> R {
        let mut state = self.state.lock().unwrap_or_else(| poisoned | {
            self.state.clear_poison();
            poisoned.into_inner()
        });
        f( &mut IsolationContext::new( self, &mut *state ))
    }

    /// Runs `f` inside an isolated frame bound to `resolver`.
    ///
    /// The ambient state is restored when `f` returns or unwinds.
    pub fn run_isolated<R>(
        &self,
        resolver: Arc<dyn Resolver>,
        f: impl FnOnce( &mut IsolationContext<'_> ) -> R,
    ) -> R {
        self.with_context(| ctx | ctx.run_isolated( resolver, f ))
    }

    /// Resolves `name` ambiently: cache, hooks, then the host resolver.
    ///
    /// # Errors
    /// Returns [`LoadError`] if the unit cannot be found or loaded.
    pub fn import( &self, name: &QualifiedName ) -> Result<UnitHandle, LoadError> {
        self.with_context(| ctx | ctx.import_ambient( name ))
    }

    /// Loads `unit` so that its imports resolve through `resolver` only.
    ///
    /// # Errors
    /// Returns [`LoadError`] if the unit or any of its imports fail to load.
    pub fn load( &self, unit: &LoadableUnit, resolver: Arc<dyn Resolver> ) -> Result<UnitHandle, LoadError> {
        self.with_context(| ctx | ctx.load( unit, resolver ))
    }

    /// Like [`Host::load`], populating a caller-provided cell.
    ///
    /// # Errors
    /// Returns [`LoadError::AlreadyLoaded`] if `cell` was already populated.
    pub fn load_into(
        &self,
        unit: &LoadableUnit,
        resolver: Arc<dyn Resolver>,
        cell: Arc<UnitCell>,
    ) -> Result<UnitHandle, LoadError> {
        self.with_context(| ctx | ctx.load_into( unit, resolver, cell ))
    }

    /// Locates `name` on the search roots and loads it under `resolver`.
    ///
    /// # Errors
    /// Returns [`LoadError::NotFound`] if the unit is not on the search path.
    pub fn load_named( &self, name: &QualifiedName, resolver: Arc<dyn Resolver> ) -> Result<UnitHandle, LoadError> {
        let unit = self.resolver.locate( name )?;
        self.load( &unit, resolver )
    }

}

impl std::fmt::Debug for Host {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "Host" ).field( "resolver", &self.resolver ).finish_non_exhaustive()
    }
}

impl Default for Host {
    fn default() -> Self { Self::new( Engine::default() ) }
}
