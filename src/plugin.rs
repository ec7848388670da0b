//! Verified plugins.
//!
//! A plugin is a record that passed a [`Contract`]( crate::Contract )'s
//! verification. Besides its attributes, a plugin carries the ordering sets
//! the [`graph`]( crate::graph ) works on: `before` names plugins this one
//! must run ahead of, `after` names plugins that must run ahead of this one.

use std::collections::BTreeSet ;
use std::sync::Arc ;
use wasmtime::Val ;

use crate::{ CallError, Candidate, Host, IsolationContext, LoadError, QualifiedName, Record, Resolver, UnitHandle, Value };
use crate::contract::{ AFTER, BEFORE, NAME };
use crate::graph::Ordered ;



#[derive( Debug, Clone )]
pub struct Plugin {
    name: String,
    origin: Option<QualifiedName>,
    before: BTreeSet<String>,
    after: BTreeSet<String>,
    record: Record,
    unit: Option<UnitHandle>,
    /// Keeps a resolver built for one retrieval alive for late imports.
    pinned: Option<Arc<dyn Resolver>>,
}

impl Plugin {

    /// A host-defined plugin with no attributes besides its name.
    pub fn new( name: impl Into<String> ) -> Self {
        let name = name.into();
        let record = Record::from([( NAME.to_string(), Value::Str( name.clone() ))]);
        Self { name, origin: None, before: BTreeSet::new(), after: BTreeSet::new(), record, unit: None, pinned: None }
    }

    /// Builds a plugin from a candidate that passed verification.
    ///
    /// Falls back to the candidate's namespace key if the record is unnamed,
    /// which verification rules out for every contract.
    pub fn from_candidate( candidate: &Candidate ) -> Self {
        Self {
            name: candidate.name().unwrap_or( candidate.key() ).to_string(),
            origin: Some( candidate.origin().clone() ),
            before: candidate.str_set( BEFORE ),
            after: candidate.str_set( AFTER ),
            record: candidate.record().clone(),
            unit: candidate.unit().cloned(),
            pinned: None,
        }
    }

    pub(crate) fn pinning( mut self, resolver: Arc<dyn Resolver> ) -> Self {
        self.pinned = Some( resolver );
        self
    }

    pub fn with_before( mut self, names: impl IntoIterator<Item = impl Into<String>> ) -> Self {
        self.before.extend( names.into_iter().map( Into::into ));
        self
    }

    pub fn with_after( mut self, names: impl IntoIterator<Item = impl Into<String>> ) -> Self {
        self.after.extend( names.into_iter().map( Into::into ));
        self
    }

    pub fn with_attribute( mut self, name: impl Into<String>, value: impl Into<Value> ) -> Self {
        self.record.insert( name.into(), value.into() );
        self
    }

    #[inline] pub fn name( &self ) -> &str { &self.name }
    /// The unit the plugin was discovered in; `None` for host-defined plugins.
    #[inline] pub fn origin( &self ) -> Option<&QualifiedName> { self.origin.as_ref() }
    #[inline] pub fn before( &self ) -> &BTreeSet<String> { &self.before }
    #[inline] pub fn after( &self ) -> &BTreeSet<String> { &self.after }
    #[inline] pub fn record( &self ) -> &Record { &self.record }
    #[inline] pub fn get( &self, attribute: &str ) -> Option<&Value> { self.record.get( attribute ) }
    /// The loaded unit the plugin was discovered in.
    #[inline] pub fn unit( &self ) -> Option<&UnitHandle> { self.unit.as_ref() }

    /// Resolves `name` on behalf of the plugin's unit, through the resolver
    /// that unit was loaded under. Host-defined plugins resolve ambiently.
    ///
    /// # Errors
    /// See [`UnitHandle::late_import`].
    pub fn late_import( &self, host: &Host, name: &QualifiedName ) -> Result<UnitHandle, LoadError> {
        match &self.unit {
            Some( unit ) => unit.late_import( host, name ),
            None => host.import( name ),
        }
    }

    /// Like [`Plugin::late_import`], for use inside an active context.
    ///
    /// # Errors
    /// See [`UnitHandle::late_import`].
    pub fn late_import_in( &self, ctx: &mut IsolationContext<'_>, name: &QualifiedName ) -> Result<UnitHandle, LoadError> {
        match &self.unit {
            Some( unit ) => unit.late_import_in( ctx, name ),
            None => ctx.import_ambient( name ),
        }
    }

    /// Calls the method bound to `method`, sizing results from its wasm signature.
    ///
    /// # Errors
    /// Returns [`CallError`] if the attribute is missing, not a typed
    /// function, or the call traps.
    pub fn call( &self, method: &str, params: &[Val] ) -> Result<Vec<Val>, CallError> {
        match self.method( method )? {
            Value::Export( export ) => export.call( params ),
            _ => Err( CallError::Untyped( self.qualify( method ))),
        }
    }

    /// Calls the method bound to `method` with a caller-sized result buffer.
    /// Unlike [`Plugin::call`] this also reaches host functions.
    ///
    /// # Errors
    /// See [`Plugin::call`].
    pub fn call_into( &self, method: &str, params: &[Val], results: &mut [Val] ) -> Result<(), CallError> {
        match self.method( method )? {
            Value::Export( export ) => export.call_into( params, results ),
            Value::Host( func ) => func.call( params, results ).map_err( CallError::Trap ),
            _ => Err( CallError::NotCallable( self.qualify( method ))),
        }
    }

    fn method( &self, method: &str ) -> Result<&Value, CallError> {
        match self.record.get( method ) {
            Some( value @ ( Value::Export( _ ) | Value::Host( _ ))) => Ok( value ),
            Some( _ ) => Err( CallError::NotCallable( self.qualify( method ))),
            None => Err( CallError::Unbound( self.qualify( method ))),
        }
    }

    fn qualify( &self, attribute: &str ) -> String { format!( "{}.{}", self.name, attribute ) }

}

impl PartialEq for Plugin {
    fn eq( &self, other: &Self ) -> bool {
        self.name == other.name
            && self.origin == other.origin
            && self.before == other.before
            && self.after == other.after
            && self.record == other.record
            && self.unit == other.unit
    }
}

impl Ordered for Plugin {
    fn name( &self ) -> &str { &self.name }
    fn before( &self ) -> &BTreeSet<String> { &self.before }
    fn after( &self ) -> &BTreeSet<String> { &self.after }
    fn edges_mut( &mut self ) -> ( &mut BTreeSet<String>, &mut BTreeSet<String> ) { ( &mut self.before, &mut self.after ) }
}
