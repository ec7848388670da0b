use std::sync::{ Arc, Weak };
use wasmtime::Val ;

use crate::{ CallError, Host, IsolationContext, LoadError, Namespace, QualifiedName, Resolver, UnitCell, Value };



/// A loaded unit as seen by whoever requested it.
///
/// The handle owns a copy of the unit's namespace: rebinding names through
/// [`UnitHandle::set`] affects this handle only, while wasm state behind
/// [`Value::Export`]s is shared with every other holder of the same load.
#[derive( Clone, Debug )]
pub struct UnitHandle {
    cell: Arc<UnitCell>,
    namespace: Namespace,
    context: Option<Weak<dyn Resolver>>,
    sandboxed: bool,
}

impl UnitHandle {

    pub(crate) fn from_cell( cell: Arc<UnitCell> ) -> Result<Self, LoadError> {
        let Some( loaded ) = cell.loaded() else { return Err( LoadError::NotReady( cell.name().clone() )) };
        let namespace = loaded.namespace.clone();
        let context = loaded.context.clone();
        let sandboxed = loaded.sandboxed ;
        Ok( Self { cell, namespace, context, sandboxed })
    }

    #[inline] pub fn name( &self ) -> &QualifiedName { self.cell.name() }
    #[inline] pub fn cell( &self ) -> &Arc<UnitCell> { &self.cell }
    #[inline] pub fn namespace( &self ) -> &Namespace { &self.namespace }
    #[inline] pub fn namespace_mut( &mut self ) -> &mut Namespace { &mut self.namespace }
    #[inline] pub fn into_namespace( self ) -> Namespace { self.namespace }
    #[inline] pub fn get( &self, name: &str ) -> Option<&Value> { self.namespace.get( name ) }

    /// Whether the unit's imports were confined to an isolated frame.
    #[inline] pub fn is_sandboxed( &self ) -> bool { self.sandboxed }

    pub fn set( &mut self, name: impl Into<String>, value: impl Into<Value> ) -> Option<Value> {
        self.namespace.set( name, value )
    }

    /// Calls the exported function `name`.
    ///
    /// # Errors
    /// Returns [`CallError`] if `name` is missing, not a typed function, or traps.
    pub fn call( &self, name: &str, params: &[Val] ) -> Result<Vec<Val>, CallError> {
        match self.namespace.get( name ) {
            Some( Value::Export( export )) => export.call( params ),
            Some( Value::Host( _ )) => Err( CallError::Untyped( format!( "{}.{}", self.name(), name ))),
            Some( _ ) => Err( CallError::NotCallable( format!( "{}.{}", self.name(), name ))),
            None => Err( CallError::MissingExport { unit: self.name().clone(), export: name.to_string() }),
        }
    }

    /// Reads the exported global `name`.
    ///
    /// # Errors
    /// Returns [`CallError`] if `name` is missing or not a global.
    pub fn global( &self, name: &str ) -> Result<Val, CallError> {
        match self.namespace.get( name ) {
            Some( Value::Export( export )) => export.global(),
            Some( _ ) => Err( CallError::NotAGlobal( format!( "{}.{}", self.name(), name ))),
            None => Err( CallError::MissingExport { unit: self.name().clone(), export: name.to_string() }),
        }
    }

    /// The resolver this unit was loaded under, if it was sandboxed and the
    /// resolver is still alive.
    pub fn resolver( &self ) -> Option<Arc<dyn Resolver>> {
        self.context.as_ref().and_then( Weak::upgrade )
    }

    /// Resolves `name` after loading has finished, as if the unit had imported it.
    ///
    /// Sandboxed units resolve through their original resolver in a fresh
    /// frame; other units resolve ambiently.
    ///
    /// # Errors
    /// Returns [`LoadError::ContextDropped`] if the original resolver no longer
    /// exists, or any error the import itself raises.
    pub fn late_import( &self, host: &Host, name: &QualifiedName ) -> Result<UnitHandle, LoadError> {
        match self.late_resolver()? {
            Some( resolver ) => host.run_isolated( resolver, | ctx | ctx.import( name )),
            None => host.import( name ),
        }
    }

    /// Like [`UnitHandle::late_import`], for use inside an active context.
    ///
    /// # Errors
    /// See [`UnitHandle::late_import`].
    pub fn late_import_in( &self, ctx: &mut IsolationContext<'_>, name: &QualifiedName ) -> Result<UnitHandle, LoadError> {
        match self.late_resolver()? {
            Some( resolver ) => ctx.run_isolated( resolver, | ctx | ctx.import( name )),
            None => ctx.import_ambient( name ),
        }
    }

    fn late_resolver( &self ) -> Result<Option<Arc<dyn Resolver>>, LoadError> {
        match &self.context {
            Some( context ) => context.upgrade()
                .map( Some )
                .ok_or_else(|| LoadError::ContextDropped( self.name().clone() )),
            None => Ok( None ),
        }
    }

}

impl PartialEq for UnitHandle {
    fn eq( &self, other: &Self ) -> bool {
        Arc::ptr_eq( &self.cell, &other.cell ) && self.namespace == other.namespace
    }
}
