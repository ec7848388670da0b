use std::sync::Arc ;
use wasm_isolate::{ Contract, DuplicatePolicy, Registry, RegistryConfig, RegistryError };
use crate::unit_tree::{ qn, UnitTree };

fn stages() -> UnitTree {
    let tree = UnitTree::new();
    tree.declarations( "plugins.greet", r#"
        [greet]
        provides = ["stage"]
        name = "greet"
        after = ["log"]
    "# );
    tree.declarations( "plugins.log", r#"
        [log]
        provides = ["stage"]
        name = "log"
        before = ["missing"]
    "# );
    tree.declarations( "plugins.nested.shout", r#"
        [shout]
        provides = ["stage"]
        name = "shout"
        before = ["greet"]
    "# );
    tree.declarations( "plugins.rejected", r#"
        [unnamed]
        provides = ["stage"]

        [overlap]
        provides = ["stage"]
        name = "overlap"
        before = ["log"]
        after = ["log"]
    "# );
    tree.wat( "plugins.broken", "(module (func (export \"f\") i32.add))" );
    tree
}

fn registry( tree: &UnitTree ) -> Registry {
    Registry::new( Arc::new( tree.host() ), &RegistryConfig::default() ).expect( "Invalid configuration" )
}

#[test]
fn verified_plugins_are_keyed_by_name() {

    let tree = stages();
    let registry = registry( &tree );

    let plugins = registry.retrieve( &Contract::sortable( "stage" ), None ).expect( "Discovery failed" );

    assert_eq!( plugins.keys().map( String::as_str ).collect::<Vec<_>>(), vec![ "greet", "log", "shout" ]);
    assert_eq!( plugins[ "shout" ].origin(), Some( &qn( "plugins.nested.shout" )));

}

#[test]
fn sortable_results_are_mirrored() {

    let tree = stages();
    let registry = registry( &tree );

    let plugins = registry.retrieve( &Contract::sortable( "stage" ), None ).expect( "Discovery failed" );

    assert!( plugins[ "log" ].before().contains( "greet" ));
    assert!( !plugins[ "log" ].before().contains( "missing" ));
    assert!( plugins[ "greet" ].after().contains( "shout" ));

}

#[test]
fn sorted_retrieval_orders_plugins() {

    let tree = stages();
    let registry = registry( &tree );
    let contract = Contract::sortable( "stage" );

    let sorted = registry.retrieve_sorted( &contract, &[ "*" ], None ).expect( "Sorting failed" );
    let names = sorted.iter().map(| plugin | plugin.name() ).collect::<Vec<_>>();
    assert_eq!( names, vec![ "log", "shout", "greet" ]);

    let partial = registry.retrieve_sorted( &contract, &[ "*", "-shout" ], None ).expect( "Sorting failed" );
    let names = partial.iter().map(| plugin | plugin.name() ).collect::<Vec<_>>();
    assert_eq!( names, vec![ "log", "greet" ]);

}

#[test]
fn named_retrieval_follows_the_request() {

    let tree = stages();
    let registry = registry( &tree );
    let contract = Contract::sortable( "stage" );

    let named = registry.retrieve_named( &contract, &[ "shout", "log" ], None ).expect( "Retrieval failed" );
    let names = named.iter().map(| plugin | plugin.name() ).collect::<Vec<_>>();

    assert_eq!( names, vec![ "shout", "log" ]);

}

#[test]
fn unsatisfied_contracts_yield_nothing() {

    let tree = stages();
    let registry = registry( &tree );
    let contract = Contract::new( "nobody-provides-this" );

    let plugins = registry.retrieve( &contract, None ).expect( "Discovery failed" );
    assert!( plugins.is_empty() );

    match registry.retrieve_named( &contract, &[ "x" ], None ) {
        Err( RegistryError::PluginNotFound { name, contract }) => {
            assert_eq!( name, "x" );
            assert_eq!( contract, "nobody-provides-this" );
        }
        other => panic!( "Expected PluginNotFound, found {:?}", other ),
    }

}

#[test]
fn results_are_cached_until_cleared() {

    let tree = stages();
    let registry = registry( &tree );
    let contract = Contract::sortable( "stage" );

    let first = registry.retrieve( &contract, None ).expect( "Discovery failed" );
    tree.declarations( "plugins.late", r#"
        [late]
        provides = ["stage"]
        name = "late"
    "# );
    let cached = registry.retrieve( &contract, None ).expect( "Discovery failed" );
    assert!( Arc::ptr_eq( &first, &cached ));
    assert!( !cached.contains_key( "late" ));

    registry.clear_cache();
    let fresh = registry.retrieve( &contract, None ).expect( "Discovery failed" );
    assert!( fresh.contains_key( "late" ));

}

#[test]
fn duplicate_names_follow_the_policy() {

    let tree = UnitTree::new();
    tree.declarations( "plugins.a_first", "[dup]\nprovides = [\"stage\"]\nname = \"dup\"\nkind = 1" );
    tree.declarations( "plugins.b_second", "[dup]\nprovides = [\"stage\"]\nname = \"dup\"\nkind = 2" );
    let contract = Contract::new( "stage" );

    let rejecting = registry( &tree );
    assert!( matches!(
        rejecting.retrieve( &contract, None ),
        Err( RegistryError::DuplicatePlugin { ref name, .. }) if name == "dup",
    ));

    let replacing = registry( &tree ).with_duplicates( DuplicatePolicy::LastWins );
    let plugins = replacing.retrieve( &contract, None ).expect( "Discovery failed" );
    assert_eq!( plugins[ "dup" ].origin(), Some( &qn( "plugins.b_second" )));

}

#[test]
fn cycles_fail_sorted_retrieval() {

    let tree = UnitTree::new();
    tree.declarations( "plugins.pair", r#"
        [chicken]
        provides = ["stage"]
        name = "chicken"
        before = ["egg"]

        [egg]
        provides = ["stage"]
        name = "egg"
        before = ["chicken"]
    "# );
    let registry = registry( &tree );
    let contract = Contract::sortable( "stage" );

    assert_eq!( registry.retrieve( &contract, None ).expect( "Discovery failed" ).len(), 2 );
    assert!( matches!(
        registry.retrieve_sorted( &contract, &[ "*" ], None ),
        Err( RegistryError::CyclicDependency( _ )),
    ));

}

#[test]
fn a_missing_root_is_an_error() {

    let tree = UnitTree::new();
    let registry = registry( &tree );

    assert!( matches!( registry.retrieve( &Contract::new( "stage" ), None ), Err( RegistryError::Root( _ ))));

}
