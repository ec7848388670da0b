use std::collections::BTreeSet ;
use wasm_isolate::expand_names ;

const KNOWN: [&str; 3] = [ "a", "b", "c" ];

fn expand( requested: &[&str] ) -> Vec<String> {
    expand_names( KNOWN, requested )
}

fn set( names: Vec<String> ) -> BTreeSet<String> { names.into_iter().collect() }

#[test]
fn wildcard_minus_exclusion() {
    assert_eq!( expand( &[ "*", "-b" ]), vec![ "a", "c" ]);
}

#[test]
fn token_order_does_not_change_the_set() {
    assert_eq!( set( expand( &[ "-b", "*" ])), set( expand( &[ "*", "-b" ])));
    assert_eq!( set( expand( &[ "c", "a" ])), set( expand( &[ "a", "c" ])));
}

#[test]
fn explicit_names_come_first_and_once() {
    assert_eq!( expand( &[ "c", "*" ]), vec![ "c", "a", "b" ]);
    assert_eq!( expand( &[ "a", "a" ]), vec![ "a" ]);
}

#[test]
fn exclusions_beat_explicit_names() {
    assert_eq!( expand( &[ "a", "b", "-a" ]), vec![ "b" ]);
}

#[test]
fn unknown_explicit_names_survive() {
    assert_eq!( expand( &[ "x" ]), vec![ "x" ]);
    assert!( expand( &[] ).is_empty() );
    assert!( expand( &[ "-a" ]).is_empty() );
}
