use std::panic::{ catch_unwind, AssertUnwindSafe };
use std::sync::Arc ;
use wasm_isolate::{ empty_resolver, DictResolver, Host, LoadError, Resolver };
use crate::unit_tree::{ qn, UnitTree };

#[test]
fn state_is_restored_after_nested_frames() {

    let host = Host::default();
    host.install_hook( Arc::new( DictResolver::default() ));
    let before = host.snapshot();

    host.run_isolated( empty_resolver(), | ctx | {
        assert_eq!( ctx.depth(), 1 );
        assert!( ctx.snapshot().is_isolated() );
        assert_eq!( ctx.snapshot().hook_count(), 0 );
        assert_eq!( ctx.ambient_snapshot(), before );

        let outer = ctx.snapshot();
        ctx.run_isolated( empty_resolver(), | inner | {
            assert_eq!( inner.depth(), 2 );
            assert_eq!( inner.ambient_snapshot(), before );
        });
        assert_eq!( ctx.depth(), 1 );
        assert_eq!( ctx.snapshot(), outer );
    });

    assert_eq!( host.snapshot(), before );
    assert_eq!( before.hook_count(), 1 );
    assert!( !before.is_isolated() );

}

#[test]
fn state_is_restored_after_a_failed_load() {

    let tree = UnitTree::new();
    tree.wat( "broken", "(module (func (export \"f\") i32.add))" );
    let host = tree.host();
    let before = host.snapshot();

    let result = host.load( &tree.unit( "broken" ), empty_resolver() );

    assert!( matches!( result, Err( LoadError::Compile { .. })), "Unexpected result: {:?}", result );
    assert_eq!( host.snapshot(), before );

}

#[test]
fn state_is_restored_after_a_panic() {

    let host = Host::default();
    host.install_hook( Arc::new( DictResolver::default() ));
    let before = host.snapshot();

    let result = catch_unwind( AssertUnwindSafe(|| host.run_isolated( empty_resolver(), | ctx | {
        ctx.run_isolated( empty_resolver(), |_| panic!( "plugin exploded" ));
    })));

    assert!( result.is_err() );
    assert_eq!( host.snapshot(), before );
    assert_eq!( host.take_hooks().len(), 1 );

}

#[test]
fn isolated_loads_leave_the_ambient_cache_alone() {

    let tree = UnitTree::new();
    tree.wat( "counter", crate::unit_tree::COUNTER );
    let host = tree.host();

    let handle = host.load( &tree.unit( "counter" ), empty_resolver() ).expect( "Failed to load unit" );

    assert!( handle.is_sandboxed() );
    assert!( !host.snapshot().is_cached( &qn( "counter" )));

    host.import( &qn( "counter" )).expect( "Failed to import unit" );
    assert!( host.snapshot().is_cached( &qn( "counter" )));

    host.clear_cache();
    assert_eq!( host.snapshot().cached().count(), 0 );

}

#[test]
fn frames_only_resolve_through_their_resolver() {

    let tree = UnitTree::new();
    tree.wat( "counter", crate::unit_tree::COUNTER );
    let host = tree.host();

    let resolver = Arc::clone( host.resolver() ) as Arc<dyn Resolver> ;
    let found = host.run_isolated( resolver, | ctx | ctx.import( &qn( "counter" )).is_ok() );
    let hidden = host.run_isolated( empty_resolver(), | ctx | ctx.import( &qn( "counter" )));

    assert!( found );
    assert!( matches!( hidden, Err( LoadError::NotFound( _ ))));

}
