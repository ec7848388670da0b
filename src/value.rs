//! Values bound into a unit's namespace.

use std::collections::BTreeMap ;
use std::fmt ;
use std::sync::Arc ;
use wasmtime::Val ;

use crate::cell::ExportRef ;



/// A string-keyed table of values, used for declared records.
pub type Record = BTreeMap<String, Value> ;

/// Signature of a host-provided function.
///
/// Params and results follow the layout wasmtime uses for [`wasmtime::Func::new`];
/// `results` is pre-sized to the caller's expected result count.
pub type HostCallback = dyn Fn( &[Val], &mut [Val] ) -> wasmtime::Result<()> + Send + Sync ;

/// A native function that can be bound to a unit's function import.
#[derive( Clone )]
pub struct HostFunc( Arc<HostCallback> );

impl HostFunc {
    pub fn new( callback: impl Fn( &[Val], &mut [Val] ) -> wasmtime::Result<()> + Send + Sync + 'static ) -> Self {
        Self( Arc::new( callback ))
    }

    /// Invokes the function.
    ///
    /// # Errors
    /// Propagates whatever the callback returns.
    #[inline] pub fn call( &self, params: &[Val], results: &mut [Val] ) -> wasmtime::Result<()> {
        ( self.0 )( params, results )
    }
}

impl fmt::Debug for HostFunc {
    fn fmt( &self, f: &mut fmt::Formatter<'_> ) -> fmt::Result { f.write_str( "HostFunc(..)" )}
}

/// Anything a namespace may hold.
///
/// Units contribute [`Value::Export`]s from their wasm exports and plain data
/// from their declarations file. Hosts may additionally bind [`Value::Host`]
/// functions when synthesising namespaces.
#[derive( Clone, Debug )]
pub enum Value {
    Str( String ),
    Int( i64 ),
    Float( f64 ),
    Bool( bool ),
    List( Vec<Value> ),
    Record( Record ),
    Export( ExportRef ),
    Host( HostFunc ),
}

impl Value {

    /// Human readable name of the variant, used in diagnostics.
    pub fn kind_name( &self ) -> &'static str {
        match self {
            Self::Str( _ ) => "string",
            Self::Int( _ ) => "integer",
            Self::Float( _ ) => "float",
            Self::Bool( _ ) => "boolean",
            Self::List( _ ) => "list",
            Self::Record( _ ) => "record",
            Self::Export( _ ) => "export",
            Self::Host( _ ) => "host function",
        }
    }

    pub fn as_str( &self ) -> Option<&str> { match self { Self::Str( s ) => Some( s ), _ => None }}
    pub fn as_int( &self ) -> Option<i64> { match self { Self::Int( n ) => Some( *n ), _ => None }}
    pub fn as_bool( &self ) -> Option<bool> { match self { Self::Bool( b ) => Some( *b ), _ => None }}
    pub fn as_record( &self ) -> Option<&Record> { match self { Self::Record( r ) => Some( r ), _ => None }}
    pub fn as_export( &self ) -> Option<&ExportRef> { match self { Self::Export( e ) => Some( e ), _ => None }}

    pub fn as_float( &self ) -> Option<f64> {
        match self {
            Self::Float( n ) => Some( *n ),
            #[allow( clippy::cast_precision_loss )]
            Self::Int( n ) => Some( *n as f64 ),
            _ => None,
        }
    }

    /// Returns the strings of a list, or `None` if this is not a list or any
    /// element is not a string.
    pub fn as_str_list( &self ) -> Option<Vec<&str>> {
        match self {
            Self::List( items ) => items.iter().map( Value::as_str ).collect(),
            _ => None,
        }
    }

}

impl PartialEq for Value {
    fn eq( &self, other: &Self ) -> bool {
        match ( self, other ) {
            ( Self::Str( a ), Self::Str( b )) => a == b,
            ( Self::Int( a ), Self::Int( b )) => a == b,
            ( Self::Float( a ), Self::Float( b )) => a == b,
            ( Self::Bool( a ), Self::Bool( b )) => a == b,
            ( Self::List( a ), Self::List( b )) => a == b,
            ( Self::Record( a ), Self::Record( b )) => a == b,
            ( Self::Export( a ), Self::Export( b )) => a == b,
            ( Self::Host( a ), Self::Host( b )) => Arc::ptr_eq( &a.0, &b.0 ),
            _ => false,
        }
    }
}

impl From<&str> for Value { fn from( value: &str ) -> Self { Self::Str( value.to_string() )}}
impl From<String> for Value { fn from( value: String ) -> Self { Self::Str( value )}}
impl From<i64> for Value { fn from( value: i64 ) -> Self { Self::Int( value )}}
impl From<f64> for Value { fn from( value: f64 ) -> Self { Self::Float( value )}}
impl From<bool> for Value { fn from( value: bool ) -> Self { Self::Bool( value )}}
impl From<Vec<Value>> for Value { fn from( value: Vec<Value> ) -> Self { Self::List( value )}}
impl From<Record> for Value { fn from( value: Record ) -> Self { Self::Record( value )}}
impl From<ExportRef> for Value { fn from( value: ExportRef ) -> Self { Self::Export( value )}}
impl From<HostFunc> for Value { fn from( value: HostFunc ) -> Self { Self::Host( value )}}

/// The set of named values a loaded unit exposes.
///
/// Iteration is in name order.
#[derive( Clone, Debug, Default, PartialEq )]
pub struct Namespace {
    entries: BTreeMap<String, Value>,
}

impl Namespace {

    pub fn new() -> Self { Self::default() }

    #[inline] pub fn get( &self, name: &str ) -> Option<&Value> { self.entries.get( name ) }
    #[inline] pub fn contains( &self, name: &str ) -> bool { self.entries.contains_key( name ) }
    #[inline] pub fn len( &self ) -> usize { self.entries.len() }
    #[inline] pub fn is_empty( &self ) -> bool { self.entries.is_empty() }
    #[inline] pub fn names( &self ) -> impl Iterator<Item = &str> { self.entries.keys().map( String::as_str ) }
    #[inline] pub fn iter( &self ) -> impl Iterator<Item = ( &str, &Value )> {
        self.entries.iter().map(|( name, value )| ( name.as_str(), value ))
    }

    /// Binds `value` under `name`, returning the value it replaced.
    pub fn set( &mut self, name: impl Into<String>, value: impl Into<Value> ) -> Option<Value> {
        self.entries.insert( name.into(), value.into() )
    }

    pub fn remove( &mut self, name: &str ) -> Option<Value> { self.entries.remove( name ) }

    /// Builder form of [`Namespace::set`].
    pub fn with( mut self, name: impl Into<String>, value: impl Into<Value> ) -> Self {
        self.set( name, value );
        self
    }

    /// A copy of `self` where each name in `replacements` is rebound; every
    /// other entry passes through unchanged.
    pub fn proxy( &self, replacements: impl IntoIterator<Item = ( String, Value )> ) -> Self {
        let mut proxy = self.clone();
        proxy.extend( replacements );
        proxy
    }

}

impl FromIterator<( String, Value )> for Namespace {
    fn from_iter<I: IntoIterator<Item = ( String, Value )>>( iter: I ) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl Extend<( String, Value )> for Namespace {
    fn extend<I: IntoIterator<Item = ( String, Value )>>( &mut self, iter: I ) {
        self.entries.extend( iter );
    }
}

impl IntoIterator for Namespace {
    type Item = ( String, Value );
    type IntoIter = std::collections::btree_map::IntoIter<String, Value> ;
    fn into_iter( self ) -> Self::IntoIter { self.entries.into_iter() }
}

impl From<Record> for Namespace {
    fn from( entries: Record ) -> Self { Self { entries } }
}
