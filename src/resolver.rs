//! Name-to-unit resolution strategies.
//!
//! A [`Resolver`] answers one question: given a [`QualifiedName`], what should
//! an import of that name produce? Either a [`LoadableUnit`] to load, or a
//! ready-made [`Namespace`]. Resolvers compose: [`StackedResolver`] tries several
//! in order, [`ExclusiveResolver`] hides names from another resolver, and
//! [`Resolver::with_overrides`] layers explicit entries on top of any resolver.

use std::collections::{ HashMap, HashSet };
use std::error::Error as StdError ;
use std::fmt ;
use std::sync::Arc ;
use thiserror::Error ;
use tracing::{ debug, warn };

use crate::{ LoadableUnit, Namespace, QualifiedName };



/// The one failure a resolver may report.
#[derive( Error, Debug, Clone, PartialEq, Eq )]
#[error( "No unit named '{name}': {reason}" )]
pub struct NotFound {
    pub name: QualifiedName,
    pub reason: String,
}

impl NotFound {
    pub fn new( name: &QualifiedName, reason: impl Into<String> ) -> Self {
        Self { name: name.clone(), reason: reason.into() }
    }
}

/// What a successful lookup produces.
#[derive( Clone, Debug )]
pub enum Target {
    /// A unit to load under the requesting context.
    Unit( LoadableUnit ),
    /// A namespace used as-is, without loading anything.
    Namespace( Arc<Namespace> ),
}

impl From<LoadableUnit> for Target {
    fn from( unit: LoadableUnit ) -> Self { Self::Unit( unit ) }
}

impl From<Namespace> for Target {
    fn from( namespace: Namespace ) -> Self { Self::Namespace( Arc::new( namespace )) }
}

/// Explicit name assignments layered over a resolver.
pub type Overrides = HashMap<QualifiedName, Target> ;

/// A strategy mapping a [`QualifiedName`] to a [`Target`].
///
/// Implementations must be pure with respect to the name: looking up the same
/// name twice yields equivalent targets.
pub trait Resolver: Send + Sync + fmt::Debug {

    /// Resolves `name`.
    ///
    /// # Errors
    /// Returns [`NotFound`] if this resolver has no answer for `name`.
    fn lookup( &self, name: &QualifiedName ) -> Result<Target, NotFound> ;

    /// Whether [`Resolver::lookup`] would succeed for `name`.
    fn contains( &self, name: &QualifiedName ) -> bool { self.lookup( name ).is_ok() }

    /// A resolver consulting `overrides` first and `self` second.
    fn with_overrides( self: Arc<Self>, overrides: Overrides ) -> StackedResolver ;

}

pub(crate) fn stack_overrides( base: Arc<dyn Resolver>, overrides: Overrides ) -> StackedResolver {
    StackedResolver::new([ Arc::new( DictResolver::new( overrides )) as Arc<dyn Resolver>, base ])
}

/// Resolves from a fixed table.
#[derive( Debug, Default, Clone )]
pub struct DictResolver {
    entries: HashMap<QualifiedName, Target>,
}

impl DictResolver {
    pub fn new( entries: impl IntoIterator<Item = ( QualifiedName, Target )> ) -> Self {
        Self { entries: entries.into_iter().collect() }
    }
}

impl Resolver for DictResolver {
    fn lookup( &self, name: &QualifiedName ) -> Result<Target, NotFound> {
        self.entries.get( name ).cloned().ok_or_else(|| NotFound::new( name, "not in table" ))
    }
    fn contains( &self, name: &QualifiedName ) -> bool { self.entries.contains_key( name ) }
    fn with_overrides( self: Arc<Self>, overrides: Overrides ) -> StackedResolver { stack_overrides( self, overrides ) }
}

/// The error type a [`CallableResolver`] callback may return.
pub type CallbackError = Box<dyn StdError + Send + Sync> ;

type LookupFn = dyn Fn( &QualifiedName ) -> Result<Target, CallbackError> + Send + Sync ;

/// Resolves by invoking a user callback.
///
/// A callback failure that is a [`NotFound`] passes through unchanged. Any other
/// failure is logged and reported as [`NotFound`], so a faulty callback never
/// aborts a composite lookup.
pub struct CallableResolver {
    label: String,
    callback: Box<LookupFn>,
}

impl CallableResolver {
    pub fn new(
        label: impl Into<String>,
        callback: impl Fn( &QualifiedName ) -> Result<Target, CallbackError> + Send + Sync + 'static,
    ) -> Self {
        Self { label: label.into(), callback: Box::new( callback ) }
    }
}

impl Resolver for CallableResolver {
    fn lookup( &self, name: &QualifiedName ) -> Result<Target, NotFound> {
        ( self.callback )( name ).map_err(| err | match err.downcast::<NotFound>() {
            Ok( not_found ) => *not_found,
            Err( err ) => {
                warn!( resolver = %self.label, unit = %name, error = %err, "Resolver callback failed" );
                NotFound::new( name, format!( "callback '{}' failed: {}", self.label, err ))
            }
        })
    }
    fn with_overrides( self: Arc<Self>, overrides: Overrides ) -> StackedResolver { stack_overrides( self, overrides ) }
}

impl fmt::Debug for CallableResolver {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_tuple( "CallableResolver" ).field( &self.label ).finish()
    }
}

/// Tries each layer in order; the first success wins.
#[derive( Debug, Clone )]
pub struct StackedResolver {
    layers: Vec<Arc<dyn Resolver>>,
}

impl StackedResolver {
    pub fn new( layers: impl IntoIterator<Item = Arc<dyn Resolver>> ) -> Self {
        Self { layers: layers.into_iter().collect() }
    }

    #[inline] pub fn layers( &self ) -> &[Arc<dyn Resolver>] { &self.layers }
}

impl Resolver for StackedResolver {
    fn lookup( &self, name: &QualifiedName ) -> Result<Target, NotFound> {
        let mut last = None ;
        for layer in &self.layers {
            match layer.lookup( name ) {
                Ok( target ) => return Ok( target ),
                Err( err ) => last = Some( err ),
            }
        }
        Err( match last {
            Some( err ) => NotFound::new( name, format!( "no layer of {} resolved it ({})", self.layers.len(), err.reason )),
            None => NotFound::new( name, "no resolvers" ),
        })
    }
    fn contains( &self, name: &QualifiedName ) -> bool { self.layers.iter().any(| layer | layer.contains( name )) }
    fn with_overrides( self: Arc<Self>, overrides: Overrides ) -> StackedResolver { stack_overrides( self, overrides ) }
}

/// Hides an exact set of names from an inner resolver.
///
/// Exclusion matches whole names only: excluding `a.b` leaves `a.b.c` visible.
#[derive( Debug, Clone )]
pub struct ExclusiveResolver {
    inner: Arc<dyn Resolver>,
    excluded: HashSet<QualifiedName>,
}

impl ExclusiveResolver {
    pub fn new( inner: Arc<dyn Resolver>, excluded: impl IntoIterator<Item = QualifiedName> ) -> Self {
        Self { inner, excluded: excluded.into_iter().collect() }
    }

    #[inline] pub fn excluded( &self ) -> &HashSet<QualifiedName> { &self.excluded }
}

impl Resolver for ExclusiveResolver {
    fn lookup( &self, name: &QualifiedName ) -> Result<Target, NotFound> {
        if self.excluded.contains( name ) {
            debug!( unit = %name, "Lookup denied by exclusion list" );
            return Err( NotFound::new( name, "excluded" ));
        }
        self.inner.lookup( name )
    }
    fn contains( &self, name: &QualifiedName ) -> bool {
        !self.excluded.contains( name ) && self.inner.contains( name )
    }
    fn with_overrides( self: Arc<Self>, overrides: Overrides ) -> StackedResolver { stack_overrides( self, overrides ) }
}

/// Resolves nothing.
#[derive( Debug, Default, Clone, Copy )]
pub struct EmptyResolver ;

impl Resolver for EmptyResolver {
    fn lookup( &self, name: &QualifiedName ) -> Result<Target, NotFound> {
        Err( NotFound::new( name, "empty resolver" ))
    }
    fn contains( &self, _name: &QualifiedName ) -> bool { false }
    fn with_overrides( self: Arc<Self>, overrides: Overrides ) -> StackedResolver { stack_overrides( self, overrides ) }
}

/// A shared [`EmptyResolver`], for loading units that may import nothing.
pub fn empty_resolver() -> Arc<dyn Resolver> { Arc::new( EmptyResolver ) }
