//! Capability contracts and candidate verification.
//!
//! A [`Contract`] names a capability and describes the shape a plugin for it
//! must have: required attributes (data or callable exports with an optional
//! wasm signature) and invariants over the whole record. Units advertise
//! capabilities by declaring records whose `provides` list names them:
//!
//! ```toml
//! [greeter]
//! provides = ["chat-command"]
//! name = "greet"
//! run = { export = "greet" }
//! ```

use std::collections::BTreeSet ;
use std::fmt ;
use std::sync::Arc ;
use itertools::Itertools ;
use thiserror::Error ;
use wasmtime::{ FuncType, ValType };

use crate::{ CallError, QualifiedName, Record, UnitHandle, Value };



/// Record key listing the capabilities a record provides.
pub const PROVIDES: &str = "provides" ;
/// Record key holding the plugin's identity.
pub const NAME: &str = "name" ;
/// Record key listing plugins that must run after this one.
pub const BEFORE: &str = "before" ;
/// Record key listing plugins that must run before this one.
pub const AFTER: &str = "after" ;

/// Why a candidate does not satisfy a contract.
#[derive( Error, Debug )]
pub enum Violation {
    #[error( "Missing attribute '{0}'" )] MissingAttribute( String ),
    #[error( "Method '{method}' is broken: {error}" )] BrokenMethod { method: String, #[source] error: CallError },
    #[error( "Invariant failed: {0}" )] InvariantFailed( String ),
}

/// Why a value could not be turned into a candidate.
#[derive( Error, Debug )]
pub enum AdaptError {
    #[error( "'provides' of {origin}.{key} must be a list of strings" )] MalformedProvides { origin: QualifiedName, key: String },
    #[error( "Adapter from '{from}' rejected {origin}.{key}: {reason}" )] Adapter { from: String, origin: QualifiedName, key: String, reason: String },
}

/// Numeric wasm value types a [`Signature`] can name.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum WasmType { I32, I64, F32, F64 }

impl WasmType {
    fn of( ty: &ValType ) -> Option<Self> {
        match ty {
            ValType::I32 => Some( Self::I32 ),
            ValType::I64 => Some( Self::I64 ),
            ValType::F32 => Some( Self::F32 ),
            ValType::F64 => Some( Self::F64 ),
            _ => None,
        }
    }
}

impl fmt::Display for WasmType {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.write_str( match self { Self::I32 => "i32", Self::I64 => "i64", Self::F32 => "f32", Self::F64 => "f64" })
    }
}

/// The expected wasm type of a method.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct Signature {
    params: Vec<WasmType>,
    results: Vec<WasmType>,
}

impl Signature {

    pub fn new( params: impl IntoIterator<Item = WasmType>, results: impl IntoIterator<Item = WasmType> ) -> Self {
        Self { params: params.into_iter().collect(), results: results.into_iter().collect() }
    }

    #[inline] pub fn params( &self ) -> &[WasmType] { &self.params }
    #[inline] pub fn results( &self ) -> &[WasmType] { &self.results }

    pub fn matches( &self, ty: &FuncType ) -> bool {
        let params = ty.params().map(| ty | WasmType::of( &ty )).collect::<Option<Vec<_>>>();
        let results = ty.results().map(| ty | WasmType::of( &ty )).collect::<Option<Vec<_>>>();
        params.as_deref() == Some( self.params.as_slice() ) && results.as_deref() == Some( self.results.as_slice() )
    }

    fn describe( ty: &FuncType ) -> String {
        format!(
            "({}) -> ({})",
            ty.params().map(| ty | format!( "{:?}", ty )).join( ", " ),
            ty.results().map(| ty | format!( "{:?}", ty )).join( ", " ),
        )
    }

}

impl fmt::Display for Signature {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        write!( f, "({}) -> ({})", self.params.iter().join( ", " ), self.results.iter().join( ", " ))
    }
}

/// The shape an attribute value must have.
#[derive( Debug, Clone, PartialEq )]
pub enum AttributeKind {
    Any,
    Str,
    Int,
    Float,
    Bool,
    StrList,
    Record,
    /// A callable value; with a signature, only a wasm function of that type.
    Method( Option<Signature> ),
}

impl AttributeKind {
    fn accepts( &self, value: &Value ) -> bool {
        match self {
            Self::Any | Self::Method( _ ) => true,
            Self::Str => matches!( value, Value::Str( _ )),
            Self::Int => matches!( value, Value::Int( _ )),
            Self::Float => matches!( value, Value::Float( _ ) | Value::Int( _ )),
            Self::Bool => matches!( value, Value::Bool( _ )),
            Self::StrList => value.as_str_list().is_some(),
            Self::Record => matches!( value, Value::Record( _ )),
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        match self {
            Self::Any => f.write_str( "value" ),
            Self::Str => f.write_str( "string" ),
            Self::Int => f.write_str( "integer" ),
            Self::Float => f.write_str( "number" ),
            Self::Bool => f.write_str( "boolean" ),
            Self::StrList => f.write_str( "list of strings" ),
            Self::Record => f.write_str( "record" ),
            Self::Method( None ) => f.write_str( "function" ),
            Self::Method( Some( signature )) => write!( f, "function {}", signature ),
        }
    }
}

#[derive( Debug, Clone, PartialEq )]
pub struct Attribute {
    pub name: String,
    pub kind: AttributeKind,
    /// Optional attributes are only checked when present.
    pub required: bool,
}

type InvariantFn = dyn Fn( &Candidate ) -> Result<(), String> + Send + Sync ;
type AdapterFn = dyn Fn( &Record ) -> Result<Record, String> + Send + Sync ;

/// A predicate over a whole candidate.
#[derive( Clone )]
pub struct Invariant {
    description: String,
    check: Arc<InvariantFn>,
}

impl Invariant {
    #[inline] pub fn description( &self ) -> &str { &self.description }
}

impl fmt::Debug for Invariant {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_tuple( "Invariant" ).field( &self.description ).finish()
    }
}

/// A record that advertised a capability, together with where it came from.
#[derive( Debug, Clone, PartialEq )]
pub struct Candidate {
    origin: QualifiedName,
    key: String,
    record: Record,
    unit: Option<UnitHandle>,
}

impl Candidate {

    pub fn new( origin: QualifiedName, key: impl Into<String>, record: Record ) -> Self {
        Self { origin, key: key.into(), record, unit: None }
    }

    /// Attaches the loaded unit the record was found in.
    pub fn with_unit( mut self, unit: UnitHandle ) -> Self {
        self.unit = Some( unit );
        self
    }

    /// The unit whose namespace held the record.
    #[inline] pub fn origin( &self ) -> &QualifiedName { &self.origin }
    /// The name the record was bound to in that namespace.
    #[inline] pub fn key( &self ) -> &str { &self.key }
    #[inline] pub fn record( &self ) -> &Record { &self.record }
    #[inline] pub fn into_record( self ) -> Record { self.record }
    #[inline] pub fn unit( &self ) -> Option<&UnitHandle> { self.unit.as_ref() }
    #[inline] pub fn get( &self, attribute: &str ) -> Option<&Value> { self.record.get( attribute ) }
    #[inline] pub fn name( &self ) -> Option<&str> { self.get( NAME ).and_then( Value::as_str ) }

    /// The strings of a list attribute; empty if absent or malformed.
    pub fn str_set( &self, attribute: &str ) -> BTreeSet<String> {
        self.get( attribute )
            .and_then( Value::as_str_list )
            .map(| items | items.into_iter().map( str::to_string ).collect() )
            .unwrap_or_default()
    }

}

/// A named capability and the shape its plugins must have.
///
/// The contract name is also the registry's cache key. Every contract requires
/// a string `name` attribute.
#[derive( Clone )]
pub struct Contract {
    name: String,
    attributes: Vec<Attribute>,
    invariants: Vec<Invariant>,
    adapters: Vec<( String, Arc<AdapterFn> )>,
    sortable: bool,
}

impl Contract {

    pub fn new( name: impl Into<String> ) -> Self {
        Self {
            name: name.into(),
            attributes: vec![ Attribute { name: NAME.to_string(), kind: AttributeKind::Str, required: true }],
            invariants: Vec::new(),
            adapters: Vec::new(),
            sortable: false,
        }
    }

    /// A contract whose plugins may declare `before` and `after` ordering lists.
    ///
    /// No name may appear in both lists of the same plugin.
    pub fn sortable( name: impl Into<String> ) -> Self {
        let mut contract = Self::new( name )
            .with_optional_attribute( BEFORE, AttributeKind::StrList )
            .with_optional_attribute( AFTER, AttributeKind::StrList )
            .with_invariant( "before and after must not overlap", | candidate | {
                let before = candidate.str_set( BEFORE );
                let overlap = candidate.str_set( AFTER ).intersection( &before ).join( ", " );
                match overlap.is_empty() {
                    true => Ok(()),
                    false => Err( format!(
                        "'{}' must run both before and after [{}]",
                        candidate.name().unwrap_or( candidate.key() ),
                        overlap,
                    )),
                }
            });
        contract.sortable = true ;
        contract
    }

    pub fn with_attribute( mut self, name: impl Into<String>, kind: AttributeKind ) -> Self {
        self.attributes.push( Attribute { name: name.into(), kind, required: true });
        self
    }

    pub fn with_optional_attribute( mut self, name: impl Into<String>, kind: AttributeKind ) -> Self {
        self.attributes.push( Attribute { name: name.into(), kind, required: false });
        self
    }

    pub fn with_method( self, name: impl Into<String>, signature: Signature ) -> Self {
        self.with_attribute( name, AttributeKind::Method( Some( signature )))
    }

    pub fn with_invariant(
        mut self,
        description: impl Into<String>,
        check: impl Fn( &Candidate ) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.invariants.push( Invariant { description: description.into(), check: Arc::new( check ) });
        self
    }

    /// Accepts records providing capability `from`, converted by `adapter`.
    pub fn with_adapter(
        mut self,
        from: impl Into<String>,
        adapter: impl Fn( &Record ) -> Result<Record, String> + Send + Sync + 'static,
    ) -> Self {
        self.adapters.push(( from.into(), Arc::new( adapter )));
        self
    }

    #[inline] pub fn name( &self ) -> &str { &self.name }
    #[inline] pub fn attributes( &self ) -> &[Attribute] { &self.attributes }
    #[inline] pub fn invariants( &self ) -> &[Invariant] { &self.invariants }
    #[inline] pub fn is_sortable( &self ) -> bool { self.sortable }

    /// Offers `value`, bound as `key` in unit `origin`, to this contract.
    ///
    /// Returns `Ok( None )` for values that do not advertise this capability
    /// nor one an adapter accepts.
    ///
    /// # Errors
    /// Returns [`AdaptError`] if `provides` is malformed or an adapter fails.
    pub fn adapt( &self, value: &Value, origin: &QualifiedName, key: &str ) -> Result<Option<Candidate>, AdaptError> {
        let Value::Record( record ) = value else { return Ok( None ) };
        let Some( provides ) = record.get( PROVIDES ) else { return Ok( None ) };
        let provides = provides.as_str_list().ok_or_else(|| AdaptError::MalformedProvides {
            origin: origin.clone(),
            key: key.to_string(),
        })?;

        if provides.contains( &self.name.as_str() ) {
            return Ok( Some( Candidate::new( origin.clone(), key, record.clone() )));
        }
        match self.adapters.iter().find(|( from, _ )| provides.contains( &from.as_str() )) {
            Some(( from, adapter )) => adapter( record )
                .map(| adapted | Some( Candidate::new( origin.clone(), key, adapted )))
                .map_err(| reason | AdaptError::Adapter { from: from.clone(), origin: origin.clone(), key: key.to_string(), reason }),
            None => Ok( None ),
        }
    }

    /// Checks `candidate` against every attribute, then every invariant.
    ///
    /// # Errors
    /// Returns the first [`Violation`] found.
    pub fn verify( &self, candidate: Candidate ) -> Result<Candidate, Violation> {
        for attribute in &self.attributes {
            let value = match ( candidate.get( &attribute.name ), attribute.required ) {
                ( Some( value ), _ ) => value,
                ( None, false ) => continue,
                ( None, true ) => return Err( Violation::MissingAttribute( attribute.name.clone() )),
            };
            match &attribute.kind {
                AttributeKind::Method( signature ) => check_method( &attribute.name, value, signature.as_ref() )?,
                kind if !kind.accepts( value ) => return Err( Violation::InvariantFailed( format!(
                    "attribute '{}' must be a {}, found a {}", attribute.name, kind, value.kind_name(),
                ))),
                _ => {}
            }
        }
        self.invariants.iter()
            .try_for_each(| invariant | ( invariant.check )( &candidate ).map_err( Violation::InvariantFailed ))?;
        Ok( candidate )
    }

}

impl fmt::Debug for Contract {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result {
        f.debug_struct( "Contract" )
            .field( "name", &self.name )
            .field( "attributes", &self.attributes )
            .field( "invariants", &self.invariants )
            .field( "adapters", &self.adapters.iter().map(|( from, _ )| from ).collect::<Vec<_>>() )
            .field( "sortable", &self.sortable )
            .finish()
    }
}

fn check_method( method: &str, value: &Value, signature: Option<&Signature> ) -> Result<(), Violation> {
    let broken = | error: CallError | Violation::BrokenMethod { method: method.to_string(), error };
    match ( value, signature ) {
        ( Value::Host( _ ), None ) => Ok(()),
        ( Value::Host( _ ), Some( _ )) => Err( broken( CallError::Untyped( method.to_string() ))),
        ( Value::Export( export ), _ ) => {
            let ty = export.func_type().map_err( broken )?;
            match signature {
                Some( signature ) if !signature.matches( &ty ) => Err( broken( CallError::SignatureMismatch {
                    expected: signature.to_string(),
                    found: Signature::describe( &ty ),
                })),
                _ => Ok(()),
            }
        }
        ( other, _ ) => Err( broken( CallError::NotCallable( format!( "{} ({})", method, other.kind_name() )))),
    }
}
