//! Conversion of TOML declarations into namespace values.
//!
//! Plain TOML data maps onto the matching [`Value`] variant. An inline table of
//! the exact form `{ export = "name" }` is a reference; the caller decides what
//! it resolves to.

use toml::Value as TomlValue ;

use crate::{ Record, Value };



const EXPORT_KEY: &str = "export" ;

/// Converts every top-level entry of `table`.
pub(crate) fn convert_table<E>(
    table: toml::Table,
    export: &mut impl FnMut( &str ) -> Result<Value, E>,
) -> Result<Vec<( String, Value )>, E> {
    table.into_iter()
        .map(|( key, value )| convert( value, export ).map(| value | ( key, value )))
        .collect()
}

pub(crate) fn convert<E>(
    value: TomlValue,
    export: &mut impl FnMut( &str ) -> Result<Value, E>,
) -> Result<Value, E> {
    Ok( match value {
        TomlValue::String( s ) => Value::Str( s ),
        TomlValue::Integer( n ) => Value::Int( n ),
        TomlValue::Float( n ) => Value::Float( n ),
        TomlValue::Boolean( b ) => Value::Bool( b ),
        TomlValue::Datetime( dt ) => Value::Str( dt.to_string() ),
        TomlValue::Array( items ) => items.into_iter()
            .map(| item | convert( item, export ))
            .collect::<Result<Vec<_>, _>>()?
            .into(),
        TomlValue::Table( table ) => match export_reference( &table ) {
            Some( name ) => export( name )?,
            None => table.into_iter()
                .map(|( key, value )| convert( value, export ).map(| value | ( key, value )))
                .collect::<Result<Record, _>>()?
                .into(),
        },
    })
}

fn export_reference( table: &toml::Table ) -> Option<&str> {
    match ( table.len(), table.get( EXPORT_KEY )) {
        ( 1, Some( TomlValue::String( name ))) => Some( name ),
        _ => None,
    }
}
