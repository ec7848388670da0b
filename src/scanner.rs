//! Lazy discovery of contract candidates across a unit tree.

use std::collections::btree_map ;
use std::sync::Arc ;
use tracing::{ debug, warn };

use crate::{ Candidate, Contract, Host, LoadableUnit, Resolver, UnitHandle, Value };



/// Walks a package tree, loading each unit under a fixed resolver.
pub struct PluginScanner<'h> {
    host: &'h Host,
    resolver: Arc<dyn Resolver>,
}

impl<'h> PluginScanner<'h> {

    pub fn new( host: &'h Host, resolver: Arc<dyn Resolver> ) -> Self {
        Self { host, resolver }
    }

    /// Lazily yields the candidates `contract` accepts from `root` and all of
    /// its descendants, visiting units depth first in name order.
    ///
    /// Units that fail to load and values that fail to adapt are logged and
    /// skipped. The returned iterator cannot be restarted.
    pub fn scan<'c>( &self, root: LoadableUnit, contract: &'c Contract ) -> Scan<'h, 'c> {
        Scan {
            host: self.host,
            resolver: Arc::clone( &self.resolver ),
            contract,
            pending: vec![ root ],
            current: None,
        }
    }

}

/// The iterator returned by [`PluginScanner::scan`].
pub struct Scan<'h, 'c> {
    host: &'h Host,
    resolver: Arc<dyn Resolver>,
    contract: &'c Contract,
    pending: Vec<LoadableUnit>,
    current: Option<( UnitHandle, btree_map::IntoIter<String, Value> )>,
}

impl Scan<'_, '_> {

    fn next_unit( &mut self ) -> Option<()> {
        let unit = self.pending.pop()?;
        match unit.children() {
            Ok( children ) => self.pending.extend( children.into_iter().rev() ),
            Err( err ) => warn!( unit = %unit.name(), error = %err, "Skipping children of unreadable package" ),
        }
        match self.host.load( &unit, Arc::clone( &self.resolver )) {
            Ok( handle ) => {
                debug!( unit = %unit.name(), "Scanning unit" );
                let values = handle.namespace().clone().into_iter();
                self.current = Some(( handle, values ));
            }
            Err( err ) => warn!( unit = %unit.name(), error = %err, "Skipping unit that failed to load" ),
        }
        Some(())
    }

}

impl Iterator for Scan<'_, '_> {
    type Item = Candidate ;

    fn next( &mut self ) -> Option<Self::Item> {
        loop {
            if let Some(( handle, values )) = &mut self.current {
                for ( key, value ) in values.by_ref() {
                    match self.contract.adapt( &value, handle.name(), &key ) {
                        Ok( Some( candidate )) => return Some( candidate.with_unit( handle.clone() )),
                        Ok( None ) => {}
                        Err( err ) => warn!( contract = self.contract.name(), error = %err, "Skipping value that failed to adapt" ),
                    }
                }
                self.current = None ;
            }
            self.next_unit()?;
        }
    }
}
