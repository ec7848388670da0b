//! Save/restore frames around the resolution state.
//!
//! Entering an isolated frame swaps the live [`ResolutionState`] for a fresh one
//! whose only way to resolve names is the frame's resolver. Leaving the frame,
//! by returning, by `Err`, or by unwinding, puts the previous state back
//! exactly as it was.

use std::collections::{ BTreeMap, HashMap };
use std::ops::{ Deref, DerefMut };
use std::sync::Arc ;
use tracing::debug_span ;
use tracing::span::EnteredSpan ;

use crate::{ Host, HostResolver, NotFound, QualifiedName, Resolver, Target, UnitCell };



/// Everything that decides how, and from where, names resolve.
#[derive( Clone, Default, Debug )]
pub struct ResolutionState {
    /// Consulted in order for ambient lookups.
    pub(crate) hooks: Vec<Arc<dyn Resolver>>,
    /// Units loaded (or loading) under this state.
    pub(crate) cache: HashMap<QualifiedName, Arc<UnitCell>>,
    /// When set, the only resolver this state consults.
    pub(crate) entrypoint: Option<Arc<dyn Resolver>>,
}

impl ResolutionState {

    fn isolated( resolver: Arc<dyn Resolver> ) -> Self {
        Self { hooks: Vec::new(), cache: HashMap::new(), entrypoint: Some( resolver ) }
    }

    /// Identity-based summary, comparable across time.
    pub fn snapshot( &self ) -> ResolutionSnapshot {
        ResolutionSnapshot {
            hooks: self.hooks.iter().map( resolver_identity ).collect(),
            cache: self.cache.iter().map(|( name, cell )| ( name.clone(), Arc::as_ptr( cell ).addr() )).collect(),
            entrypoint: self.entrypoint.as_ref().map( resolver_identity ),
        }
    }

    pub(crate) fn lookup( &self, host: &HostResolver, name: &QualifiedName ) -> Result<Target, NotFound> {
        match &self.entrypoint {
            Some( resolver ) => resolver.lookup( name ),
            None => match self.hooks.iter().find_map(| hook | hook.lookup( name ).ok() ) {
                Some( target ) => Ok( target ),
                None => host.lookup( name ),
            },
        }
    }

}

fn resolver_identity( resolver: &Arc<dyn Resolver> ) -> usize {
    Arc::as_ptr( resolver ).cast::<()>().addr()
}

/// A point-in-time view of a [`ResolutionState`].
///
/// Two snapshots are equal when the same hooks, the same cached cells and the
/// same entrypoint (all by identity) are installed.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct ResolutionSnapshot {
    hooks: Vec<usize>,
    cache: BTreeMap<QualifiedName, usize>,
    entrypoint: Option<usize>,
}

impl ResolutionSnapshot {
    #[inline] pub fn hook_count( &self ) -> usize { self.hooks.len() }
    #[inline] pub fn cached( &self ) -> impl Iterator<Item = &QualifiedName> { self.cache.keys() }
    #[inline] pub fn is_cached( &self, name: &QualifiedName ) -> bool { self.cache.contains_key( name ) }
    #[inline] pub fn is_isolated( &self ) -> bool { self.entrypoint.is_some() }
}

/// Which state a resolution goes through.
#[derive( Debug, Clone, Copy, PartialEq, Eq )]
pub(crate) enum Scope {
    /// The innermost frame.
    Frame,
    /// The state outside every frame.
    Ambient,
}

/// Exclusive access to a host's resolution state, with a stack of saved frames.
///
/// Obtained through [`Host::run_isolated`] or [`Host::with_context`]. Everything
/// that resolves or loads units while a context is alive must go through the
/// context rather than the host.
pub struct IsolationContext<'a> {
    host: &'a Host,
    state: &'a mut ResolutionState,
    saved: Vec<ResolutionState>,
}

impl<'a> IsolationContext<'a> {

    pub(crate) fn new( host: &'a Host, state: &'a mut ResolutionState ) -> Self {
        Self { host, state, saved: Vec::new() }
    }

    #[inline] pub fn host( &self ) -> &'a Host { self.host }

    /// Number of isolated frames currently entered.
    #[inline] pub fn depth( &self ) -> usize { self.saved.len() }

    /// The resolver of the innermost frame, or `None` when resolving ambiently.
    #[inline] pub fn resolver( &self ) -> Option<&Arc<dyn Resolver>> { self.state.entrypoint.as_ref() }

    /// Snapshot of the innermost state.
    pub fn snapshot( &self ) -> ResolutionSnapshot { self.state.snapshot() }

    /// Snapshot of the state frames would restore to on full exit.
    pub fn ambient_snapshot( &self ) -> ResolutionSnapshot {
        self.saved.first().unwrap_or( &*self.state ).snapshot()
    }

    /// Runs `f` with `resolver` as the only source of names.
    ///
    /// The nested frame starts with no hooks and an empty cache. Whatever `f`
    /// does to them is discarded on exit.
    pub fn run_isolated<R>(
        &mut self,
        resolver: Arc<dyn Resolver>,
        f: impl FnOnce( &mut IsolationContext<'a> ) -> R,
    ) -> R {
        let mut frame = Frame::enter( self, resolver );
        f( &mut frame )
    }

    /// The state a lookup in `scope` reads and caches into.
    pub(crate) fn state_mut( &mut self, scope: Scope ) -> &mut ResolutionState {
        match ( scope, self.saved.first_mut() ) {
            ( Scope::Ambient, Some( base )) => base,
            _ => &mut *self.state,
        }
    }

    #[inline] pub(crate) fn state( &self ) -> &ResolutionState { &*self.state }

}

struct Frame<'c, 'a> {
    context: &'c mut IsolationContext<'a>,
    _span: EnteredSpan,
}

impl<'c, 'a> Frame<'c, 'a> {
    fn enter( context: &'c mut IsolationContext<'a>, resolver: Arc<dyn Resolver> ) -> Self {
        let previous = std::mem::replace( &mut *context.state, ResolutionState::isolated( resolver ));
        context.saved.push( previous );
        let span = debug_span!( "isolated", depth = context.saved.len() ).entered();
        Self { context, _span: span }
    }
}

impl Drop for Frame<'_, '_> {
    fn drop( &mut self ) {
        if let Some( previous ) = self.context.saved.pop() {
            *self.context.state = previous ;
        }
    }
}

impl<'a> Deref for Frame<'_, 'a> {
    type Target = IsolationContext<'a> ;
    fn deref( &self ) -> &Self::Target { &*self.context }
}

impl DerefMut for Frame<'_, '_> {
    fn deref_mut( &mut self ) -> &mut Self::Target { &mut *self.context }
}
