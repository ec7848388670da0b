use wasm_isolate::{ CodeKind, HostResolver, Namespace, Resolver, Target, UnitKind };
use crate::unit_tree::{ qn, UnitTree };

#[test]
fn units_are_found_on_search_roots() {

    let tree = UnitTree::new();
    tree.wat( "lib.counter", crate::unit_tree::COUNTER );
    tree.declarations( "lib.settings", "level = 1" );
    let resolver = HostResolver::new([ tree.path().to_path_buf() ]);

    let counter = resolver.locate( &qn( "lib.counter" )).expect( "Module not found" );
    assert_eq!( counter.kind(), UnitKind::Module );
    assert!( matches!( counter.code(), Some(( _, CodeKind::Text ))));
    assert!( counter.declarations().is_none() );
    assert!( counter.directory().is_none() );

    let package = resolver.locate( &qn( "lib" )).expect( "Package not found" );
    assert!( package.is_package() );
    assert_eq!( package.directory(), Some( tree.path().join( "lib" ).as_path() ));
    let children = package.children().expect( "Failed to list package" );
    let names = children.iter().map(| unit | unit.name().as_str() ).collect::<Vec<_>>();
    assert_eq!( names, vec![ "lib.counter", "lib.settings" ]);

    assert!( resolver.locate( &qn( "lib.missing" )).is_err() );

}

#[test]
fn later_roots_fill_in_for_earlier_ones() {

    let first = UnitTree::new();
    let second = UnitTree::new();
    first.declarations( "shared", "root = 1" );
    second.declarations( "shared", "root = 2" );
    second.declarations( "second_only", "root = 2" );
    let resolver = HostResolver::new([ first.path().to_path_buf(), second.path().to_path_buf() ]);

    let shared = resolver.locate( &qn( "shared" )).expect( "Unit not found" );
    assert!( shared.declarations().is_some_and(| path | path.starts_with( first.path() )));
    assert!( resolver.contains( &qn( "second_only" )));

}

#[test]
fn registered_namespaces_shadow_units() {

    let tree = UnitTree::new();
    tree.declarations( "settings", "level = 1" );
    let resolver = HostResolver::new([ tree.path().to_path_buf() ]);
    resolver.register( qn( "settings" ), Namespace::new().with( "level", 2_i64 ));

    assert!( matches!( resolver.lookup( &qn( "settings" )), Ok( Target::Namespace( _ ))));
    assert!( resolver.locate( &qn( "settings" )).is_ok() );

}

#[test]
fn invalid_entries_are_not_children() {

    let tree = UnitTree::new();
    tree.package( "plugins" );
    tree.declarations( "plugins.good", "a = 1" );
    std::fs::write( tree.path().join( "plugins" ).join( "not valid.toml" ), "a = 1" ).expect( "Failed to write file" );
    std::fs::write( tree.path().join( "plugins" ).join( "notes.txt" ), "ignored" ).expect( "Failed to write file" );

    let children = tree.unit( "plugins" ).children().expect( "Failed to list package" );

    assert_eq!( children.len(), 1 );
    assert_eq!( children[0].name(), &qn( "plugins.good" ));

}
