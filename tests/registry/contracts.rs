use wasm_isolate::{
    empty_resolver, AdaptError, AttributeKind, CallError, Candidate, Contract, HostFunc, Record,
    Signature, Value, Violation, WasmType,
};
use crate::unit_tree::{ qn, UnitTree };

fn record( entries: Vec<( &str, Value )> ) -> Record {
    entries.into_iter().map(|( key, value )| ( key.to_string(), value )).collect()
}

fn provides( capabilities: &[&str] ) -> Value {
    capabilities.iter().copied().map( Value::from ).collect::<Vec<_>>().into()
}

fn candidate( entries: Vec<( &str, Value )> ) -> Candidate {
    Candidate::new( qn( "plugins.test" ), "plugin", record( entries ))
}

#[test]
fn only_records_providing_the_capability_adapt() {

    let contract = Contract::new( "greeter" );
    let origin = qn( "plugins.test" );

    let greeter = Value::Record( record( vec![( "provides", provides( &[ "greeter" ])), ( "name", "hi".into() )]));
    let other = Value::Record( record( vec![( "provides", provides( &[ "logger" ])), ( "name", "log".into() )]));
    let plain = Value::Record( record( vec![( "name", "plain".into() )]));

    let adapted = contract.adapt( &greeter, &origin, "greeting" ).expect( "Adaptation failed" ).expect( "Candidate rejected" );
    assert_eq!( adapted.origin(), &origin );
    assert_eq!( adapted.key(), "greeting" );
    assert_eq!( adapted.name(), Some( "hi" ));
    assert!( contract.adapt( &other, &origin, "other" ).expect( "Adaptation failed" ).is_none() );
    assert!( contract.adapt( &plain, &origin, "plain" ).expect( "Adaptation failed" ).is_none() );
    assert!( contract.adapt( &Value::Int( 3 ), &origin, "number" ).expect( "Adaptation failed" ).is_none() );

}

#[test]
fn malformed_provides_is_an_adaptation_error() {

    let contract = Contract::new( "greeter" );
    let value = Value::Record( record( vec![( "provides", Value::Int( 1 ))]));

    let result = contract.adapt( &value, &qn( "plugins.test" ), "broken" );

    assert!( matches!( result, Err( AdaptError::MalformedProvides { .. })));

}

#[test]
fn adapters_convert_other_capabilities() {

    let contract = Contract::new( "console-command" )
        .with_adapter( "chat-command", | record | {
            let mut adapted = record.clone();
            let name = record.get( "name" ).and_then( Value::as_str ).ok_or( "unnamed chat command" )?;
            adapted.insert( "name".to_string(), format!( "/{}", name ).into() );
            Ok( adapted )
        });
    let origin = qn( "plugins.chat" );
    let chat = Value::Record( record( vec![( "provides", provides( &[ "chat-command" ])), ( "name", "me".into() )]));
    let unnamed = Value::Record( record( vec![( "provides", provides( &[ "chat-command" ]))]));

    let adapted = contract.adapt( &chat, &origin, "me" ).expect( "Adaptation failed" ).expect( "Candidate rejected" );
    assert_eq!( adapted.name(), Some( "/me" ));
    assert!( matches!( contract.adapt( &unnamed, &origin, "unnamed" ), Err( AdaptError::Adapter { .. })));

}

#[test]
fn missing_attributes_are_reported() {

    let contract = Contract::new( "greeter" ).with_attribute( "greeting", AttributeKind::Str );

    let unnamed = contract.verify( candidate( vec![( "greeting", "hello".into() )]));
    let incomplete = contract.verify( candidate( vec![( "name", "hi".into() )]));

    assert!( matches!( unnamed, Err( Violation::MissingAttribute( ref name )) if name == "name" ));
    assert!( matches!( incomplete, Err( Violation::MissingAttribute( ref name )) if name == "greeting" ));

}

#[test]
fn mistyped_attributes_fail_an_invariant() {

    let contract = Contract::new( "greeter" ).with_attribute( "volume", AttributeKind::Int );

    let result = contract.verify( candidate( vec![( "name", "hi".into() ), ( "volume", "loud".into() )]));

    assert!( matches!( result, Err( Violation::InvariantFailed( _ ))));

}

#[test]
fn verified_candidates_are_returned_unchanged() {

    let contract = Contract::new( "greeter" )
        .with_attribute( "volume", AttributeKind::Float )
        .with_optional_attribute( "tags", AttributeKind::StrList );
    let original = candidate( vec![( "name", "hi".into() ), ( "volume", Value::Int( 3 ))]);

    let verified = contract.verify( original.clone() ).expect( "Candidate rejected" );

    assert_eq!( verified, original );

}

#[test]
fn declared_invariants_run_after_attribute_checks() {

    let contract = Contract::new( "greeter" )
        .with_attribute( "volume", AttributeKind::Int )
        .with_invariant( "volume must not exceed 11", | candidate | match candidate.get( "volume" ).and_then( Value::as_int ) {
            Some( volume ) if volume > 11 => Err( format!( "volume {} exceeds 11", volume )),
            _ => Ok(()),
        });

    let quiet = contract.verify( candidate( vec![( "name", "hi".into() ), ( "volume", Value::Int( 3 ))]));
    let loud = contract.verify( candidate( vec![( "name", "hi".into() ), ( "volume", Value::Int( 12 ))]));

    assert!( quiet.is_ok() );
    assert!( matches!( loud, Err( Violation::InvariantFailed( ref message )) if message.contains( "12" )));

}

#[test]
fn sortable_contracts_reject_overlapping_ordering() {

    let contract = Contract::sortable( "stage" );
    let list = | names: &[&str] | provides( names );

    let unordered = contract.verify( candidate( vec![( "name", "a".into() )]));
    let ordered = contract.verify( candidate( vec![( "name", "a".into() ), ( "before", list( &[ "b" ])), ( "after", list( &[ "c" ]))]));
    let overlapping = contract.verify( candidate( vec![( "name", "a".into() ), ( "before", list( &[ "b" ])), ( "after", list( &[ "b" ]))]));

    assert!( contract.is_sortable() );
    assert!( unordered.is_ok() );
    assert!( ordered.is_ok() );
    assert!( matches!( overlapping, Err( Violation::InvariantFailed( _ ))));

}

#[test]
fn methods_are_checked_against_their_signature() {

    let tree = UnitTree::new();
    tree.wat( "counter", crate::unit_tree::COUNTER );
    let host = tree.host();
    let counter = host.load( &tree.unit( "counter" ), empty_resolver() ).expect( "Failed to load unit" );
    let increment = counter.get( "increment" ).cloned().expect( "Export missing" );
    let limit = counter.get( "limit" ).cloned().expect( "Export missing" );

    let matching = Contract::new( "counter" ).with_method( "run", Signature::new([], [ WasmType::I32 ]));
    let mismatching = Contract::new( "counter" ).with_method( "run", Signature::new([ WasmType::I64 ], [ WasmType::I32 ]));

    assert!( matching.verify( candidate( vec![( "name", "c".into() ), ( "run", increment.clone() )])).is_ok() );
    assert!( matches!(
        mismatching.verify( candidate( vec![( "name", "c".into() ), ( "run", increment )])),
        Err( Violation::BrokenMethod { error: CallError::SignatureMismatch { .. }, .. }),
    ));
    assert!( matches!(
        matching.verify( candidate( vec![( "name", "c".into() ), ( "run", limit )])),
        Err( Violation::BrokenMethod { error: CallError::NotCallable( _ ), .. }),
    ));

}

#[test]
fn host_functions_satisfy_untyped_methods_only() {

    let func = Value::from( HostFunc::new(|_, _| Ok(()) ));
    let untyped = Contract::new( "hook" ).with_attribute( "run", AttributeKind::Method( None ));
    let typed = Contract::new( "hook" ).with_method( "run", Signature::new([], []));

    assert!( untyped.verify( candidate( vec![( "name", "h".into() ), ( "run", func.clone() )])).is_ok() );
    assert!( matches!(
        typed.verify( candidate( vec![( "name", "h".into() ), ( "run", func )])),
        Err( Violation::BrokenMethod { error: CallError::Untyped( _ ), .. }),
    ));
    assert!( matches!(
        untyped.verify( candidate( vec![( "name", "h".into() ), ( "run", "not a function".into() )])),
        Err( Violation::BrokenMethod { .. }),
    ));

}
