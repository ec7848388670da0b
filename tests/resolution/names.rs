use wasm_isolate::{ NameError, QualifiedName };
use crate::unit_tree::qn ;

#[test]
fn names_split_into_parent_and_last_segment() {

    let name = qn( "plugins.stages.greet" );

    assert_eq!( name.last(), "greet" );
    assert_eq!( name.parent(), Some( qn( "plugins.stages" )));
    assert_eq!( name.segments().collect::<Vec<_>>(), vec![ "plugins", "stages", "greet" ]);
    assert_eq!( qn( "plugins" ).last(), "plugins" );
    assert_eq!( qn( "plugins" ).parent(), None );
    assert_eq!( qn( "plugins.stages" ).child( "greet" ).expect( "Valid segment rejected" ), name );

}

#[test]
fn containment_respects_segment_boundaries() {

    let root = qn( "plugins" );

    assert!( qn( "plugins" ).is_within( &root ));
    assert!( qn( "plugins.stages.greet" ).is_within( &root ));
    assert!( !qn( "plugins_extra" ).is_within( &root ));
    assert!( !qn( "lib.plugins" ).is_within( &root ));
    assert!( !root.is_within( &qn( "plugins.stages" )));

}

#[test]
fn malformed_names_are_rejected() {

    assert!( matches!( QualifiedName::new( "" ), Err( NameError::Empty )));
    assert!( matches!(
        QualifiedName::new( "plugins..greet" ),
        Err( NameError::InvalidSegment { ref segment, .. }) if segment.is_empty(),
    ));
    assert!( matches!( "plugins.9lives".parse::<QualifiedName>(), Err( NameError::InvalidSegment { .. })));
    assert!( qn( "plugins" ).child( "a.b" ).is_err() );

}
