use wasm_isolate::{ empty_resolver, LoadError, Value };
use crate::unit_tree::UnitTree ;

#[test]
fn declarations_become_namespace_values() {

    let tree = UnitTree::new();
    tree.wat( "tool", crate::unit_tree::COUNTER );
    tree.declarations( "tool", r#"
        title = "Tool"
        ratio = 0.5
        enabled = true
        tags = ["a", "b"]
        bump = { export = "increment" }

        [limits]
        max = 3
    "# );
    let host = tree.host();

    let tool = host.load( &tree.unit( "tool" ), empty_resolver() ).expect( "Failed to load unit" );

    assert_eq!( tool.get( "title" ), Some( &Value::from( "Tool" )));
    assert_eq!( tool.get( "ratio" ).and_then( Value::as_float ), Some( 0.5 ));
    assert_eq!( tool.get( "enabled" ).and_then( Value::as_bool ), Some( true ));
    assert_eq!( tool.get( "tags" ).and_then( Value::as_str_list ), Some( vec![ "a", "b" ]));
    assert_eq!(
        tool.get( "limits" ).and_then( Value::as_record ).and_then(| limits | limits.get( "max" )),
        Some( &Value::Int( 3 )),
    );
    let bump = tool.get( "bump" ).and_then( Value::as_export ).expect( "Export reference not bound" );
    assert_eq!(( bump.unit().as_str(), bump.name() ), ( "tool", "increment" ));
    assert_eq!( tool.call( "bump", &[] ).expect( "Call failed" )[0].unwrap_i32(), 1 );
    assert_eq!( tool.call( "increment", &[] ).expect( "Call failed" )[0].unwrap_i32(), 2 );

}

#[test]
fn references_to_unknown_exports_fail_the_load() {

    let tree = UnitTree::new();
    tree.declarations( "tool", r#"run = { export = "missing" }"# );
    let host = tree.host();

    let result = host.load( &tree.unit( "tool" ), empty_resolver() );

    assert!( matches!( result, Err( LoadError::UnknownExport { ref export, .. }) if export == "missing" ), "Unexpected result: {:?}", result );

}

#[test]
fn malformed_declarations_fail_the_load() {

    let tree = UnitTree::new();
    tree.declarations( "tool", "this is not toml" );
    let host = tree.host();

    let result = host.load( &tree.unit( "tool" ), empty_resolver() );

    assert!( matches!( result, Err( LoadError::Declarations { .. })), "Unexpected result: {:?}", result );

}

#[test]
fn packages_without_module_files_load_empty() {

    let tree = UnitTree::new();
    tree.package( "plugins" );
    let host = tree.host();

    let package = host.load( &tree.unit( "plugins" ), empty_resolver() ).expect( "Failed to load package" );

    assert!( package.namespace().is_empty() );

}

#[test]
fn package_module_files_are_the_package_namespace() {

    let tree = UnitTree::new();
    tree.declarations( "plugins.mod", "title = \"Plugins\"" );
    let host = tree.host();

    let package = host.load( &tree.unit( "plugins" ), empty_resolver() ).expect( "Failed to load package" );

    assert_eq!( package.get( "title" ), Some( &Value::from( "Plugins" )));

}

#[test]
fn proxied_namespaces_replace_only_named_entries() {

    let tree = UnitTree::new();
    tree.declarations( "tool", r#"
        title = "Tool"
        level = 1
    "# );
    let host = tree.host();
    let tool = host.load_named( &crate::unit_tree::qn( "tool" ), empty_resolver() ).expect( "Failed to load unit" );

    let proxy = tool.namespace().proxy([( "level".to_string(), Value::Int( 2 ))]);

    assert_eq!( proxy.get( "title" ), Some( &Value::from( "Tool" )));
    assert_eq!( proxy.get( "level" ), Some( &Value::Int( 2 )));
    assert_eq!( tool.get( "level" ), Some( &Value::Int( 1 )));

}

#[test]
fn named_loads_of_unknown_units_fail() {

    let tree = UnitTree::new();
    let host = tree.host();

    let result = host.load_named( &crate::unit_tree::qn( "missing" ), empty_resolver() );

    assert!( matches!( result, Err( LoadError::NotFound( _ ))), "Unexpected result: {:?}", result );

}
