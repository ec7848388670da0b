use std::sync::Arc ;
use wasm_isolate::{ empty_resolver, DictResolver, Namespace, Resolver, StackedResolver, Target, Value };
use crate::unit_tree::qn ;

#[test]
fn first_successful_layer_wins() {

    let first = Arc::new( DictResolver::new([( qn( "shared" ), Target::from( Namespace::new().with( "layer", 1_i64 )))]));
    let second = Arc::new( DictResolver::new([
        ( qn( "shared" ), Target::from( Namespace::new().with( "layer", 2_i64 ))),
        ( qn( "only_second" ), Target::from( Namespace::new().with( "layer", 2_i64 ))),
    ]));
    let resolver = StackedResolver::new([ empty_resolver(), first as Arc<dyn Resolver>, second as Arc<dyn Resolver> ]);

    let layer = | name: &str | match resolver.lookup( &qn( name )) {
        Ok( Target::Namespace( namespace )) => namespace.get( "layer" ).and_then( Value::as_int ),
        _ => None,
    };
    assert_eq!( layer( "shared" ), Some( 1 ));
    assert_eq!( layer( "only_second" ), Some( 2 ));

}

#[test]
fn exhausted_chain_is_not_found() {

    let resolver = StackedResolver::new([ empty_resolver(), empty_resolver() ]);

    assert!( resolver.lookup( &qn( "anything" )).is_err() );
    assert!( !resolver.contains( &qn( "anything" )));
    assert!( StackedResolver::new( Vec::<Arc<dyn Resolver>>::new() ).lookup( &qn( "anything" )).is_err() );

}
