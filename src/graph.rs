//! Ordering constraints between plugins.
//!
//! Each plugin may name others it must run `before` and others it must run
//! `after`. [`mirror_edges`] makes both views agree across a whole set of
//! plugins; [`sort_plugins`] produces an order honouring every constraint
//! among the plugins it is given.

use std::collections::{ BTreeMap, BTreeSet, HashMap };
use thiserror::Error ;
use tracing::debug ;



/// Anything with a name and ordering sets.
pub trait Ordered {
    fn name( &self ) -> &str ;
    /// Names that must come after this one.
    fn before( &self ) -> &BTreeSet<String> ;
    /// Names that must come before this one.
    fn after( &self ) -> &BTreeSet<String> ;
    /// Mutable `( before, after )`.
    fn edges_mut( &mut self ) -> ( &mut BTreeSet<String>, &mut BTreeSet<String> ) ;
}

#[derive( Error, Debug, Clone, PartialEq, Eq )]
#[error( "Cyclic dependency between [{}]", cycle.join( ", " ))]
pub struct CycleError {
    /// The names along the cycle, in visiting order.
    pub cycle: Vec<String>,
}

/// Makes the graph symmetric: `A.before ∋ B` iff `B.after ∋ A`.
///
/// Names that are not keys of `plugins` are dropped from every set.
pub fn mirror_edges<P: Ordered>( plugins: &mut BTreeMap<String, P> ) {
    let known = plugins.keys().cloned().collect::<BTreeSet<_>>();
    let mut mirrored_after = Vec::new();
    let mut mirrored_before = Vec::new();

    for ( name, plugin ) in plugins.iter_mut() {
        let ( before, after ) = plugin.edges_mut();
        for edges in [ &mut *before, &mut *after ] {
            edges.retain(| other | match known.contains( other ) {
                true => true,
                false => {
                    debug!( plugin = %name, missing = %other, "Pruning edge to unknown plugin" );
                    false
                }
            });
        }
        mirrored_after.extend( before.iter().map(| other | ( other.clone(), name.clone() )));
        mirrored_before.extend( after.iter().map(| other | ( other.clone(), name.clone() )));
    }

    for ( target, source ) in mirrored_after {
        if let Some( plugin ) = plugins.get_mut( &target ) { plugin.edges_mut().1.insert( source ); }
    }
    for ( target, source ) in mirrored_before {
        if let Some( plugin ) = plugins.get_mut( &target ) { plugin.edges_mut().0.insert( source ); }
    }
}

#[derive( Debug, Clone, Copy, PartialEq, Eq )]
enum Mark { Unvisited, Active, Done }

/// Orders `plugins` so that every plugin comes after everything it must follow.
///
/// A depth-first post-order over predecessors, seeded in input order, so equal
/// inputs always give equal outputs. Constraints naming plugins outside the
/// input are ignored.
///
/// # Errors
/// Returns [`CycleError`] if the constraints among the inputs are circular.
pub fn sort_plugins<P: Ordered>( plugins: Vec<P> ) -> Result<Vec<P>, CycleError> {
    let predecessors = predecessors( &plugins );

    let mut marks = vec![ Mark::Unvisited; plugins.len() ];
    let mut path = Vec::new();
    let mut order = Vec::with_capacity( plugins.len() );
    for seed in 0..plugins.len() {
        visit( seed, &predecessors, &mut marks, &mut path, &mut order ).map_err(| cycle | CycleError {
            cycle: cycle.into_iter().map(| position | plugins[ position ].name().to_string() ).collect(),
        })?;
    }

    let mut slots = plugins.into_iter().map( Some ).collect::<Vec<_>>();
    Ok( order.into_iter().filter_map(| position | slots[ position ].take() ).collect() )
}

fn predecessors<P: Ordered>( plugins: &[P] ) -> Vec<BTreeSet<usize>> {
    let index = plugins.iter().enumerate()
        .map(|( position, plugin )| ( plugin.name(), position ))
        .collect::<HashMap<_, _>>();
    let mut predecessors = vec![ BTreeSet::new(); plugins.len() ];
    for ( position, plugin ) in plugins.iter().enumerate() {
        for other in plugin.after().iter().filter_map(| name | index.get( name.as_str() )) {
            predecessors[ position ].insert( *other );
        }
        for other in plugin.before().iter().filter_map(| name | index.get( name.as_str() )) {
            predecessors[ *other ].insert( position );
        }
    }
    predecessors
}

fn visit(
    node: usize,
    predecessors: &[BTreeSet<usize>],
    marks: &mut [Mark],
    path: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> Result<(), Vec<usize>> {
    match marks[ node ] {
        Mark::Done => return Ok(()),
        Mark::Active => {
            let start = path.iter().position(| visited | *visited == node ).unwrap_or( 0 );
            return Err( path[ start.. ].to_vec() );
        }
        Mark::Unvisited => {}
    }
    marks[ node ] = Mark::Active ;
    path.push( node );
    for predecessor in &predecessors[ node ] {
        visit( *predecessor, predecessors, marks, path, order )?;
    }
    path.pop();
    marks[ node ] = Mark::Done ;
    order.push( node );
    Ok(())
}
