//! Contract-driven plugin discovery with per-contract caching.

use std::collections::{ BTreeMap, HashMap };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use thiserror::Error ;
use tracing::{ debug, error, info, info_span, warn };

use crate::{
    ConfigError, Contract, DuplicatePolicy, Host, Namespace, NotFound, Overrides, Plugin,
    PluginScanner, QualifiedName, RegistryConfig, Resolver, Target,
};
use crate::expand::expand_names ;
use crate::graph::{ mirror_edges, sort_plugins, CycleError };
use crate::resolver::ExclusiveResolver ;



/// Verified plugins of one contract, keyed by plugin name.
pub type PluginMap = BTreeMap<String, Plugin> ;

#[derive( Error, Debug )]
pub enum RegistryError {
    #[error( "No plugin named '{name}' provides '{contract}'" )] PluginNotFound { name: String, contract: String },
    #[error( "{0}" )] CyclicDependency( #[from] CycleError ),
    #[error( "More than one plugin named '{name}' provides '{contract}'" )] DuplicatePlugin { name: String, contract: String },
    #[error( "Plugin root unavailable: {0}" )] Root( #[from] NotFound ),
}

/// Discovers, verifies and orders the plugins below one plugin root.
///
/// Results of unparameterised retrievals are cached per contract name until
/// [`Registry::clear_cache`] is called; nothing invalidates them otherwise.
pub struct Registry {
    host: Arc<Host>,
    root: QualifiedName,
    parameters_unit: QualifiedName,
    resolver: Arc<dyn Resolver>,
    duplicates: DuplicatePolicy,
    cache: Mutex<HashMap<String, Arc<PluginMap>>>,
}

impl Registry {

    /// Builds a registry over `host` from `config`.
    ///
    /// The config's search paths are added to the host resolver. Plugins see
    /// the host resolver minus the excluded names, under the configured
    /// overrides.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if a configured name is invalid or an override
    /// references an export.
    pub fn new( host: Arc<Host>, config: &RegistryConfig ) -> Result<Self, ConfigError> {
        for path in &config.search_paths { host.resolver().add_search_path( path.clone() ); }

        let base = Arc::clone( host.resolver() ) as Arc<dyn Resolver> ;
        let exclusive = Arc::new( ExclusiveResolver::new( base, config.excluded()? ));
        let overrides = config.override_namespaces()?.into_iter()
            .map(|( name, namespace )| ( name, Target::from( namespace )))
            .collect::<Overrides>();
        let resolver: Arc<dyn Resolver> = match overrides.is_empty() {
            true => exclusive,
            false => Arc::new( exclusive.with_overrides( overrides )),
        };

        Ok( Self {
            root: config.plugin_root()?,
            parameters_unit: config.parameters_unit()?,
            host,
            resolver,
            duplicates: config.duplicates,
            cache: Mutex::default(),
        })
    }

    /// Replaces the resolver plugins are loaded under.
    pub fn with_resolver( mut self, resolver: Arc<dyn Resolver> ) -> Self {
        self.resolver = resolver ;
        self
    }

    /// Layers `overrides` over the current resolver.
    pub fn with_overrides( mut self, overrides: Overrides ) -> Self {
        self.resolver = Arc::new( self.resolver.with_overrides( overrides ));
        self
    }

    pub fn with_duplicates( mut self, policy: DuplicatePolicy ) -> Self {
        self.duplicates = policy ;
        self
    }

    #[inline] pub fn host( &self ) -> &Arc<Host> { &self.host }
    #[inline] pub fn plugin_root( &self ) -> &QualifiedName { &self.root }
    #[inline] pub fn resolver( &self ) -> &Arc<dyn Resolver> { &self.resolver }

    /// Every plugin below the plugin root that satisfies `contract`.
    ///
    /// Without `parameters` (or with an empty namespace) a cached result is
    /// returned as-is. Otherwise the tree is scanned afresh with `parameters`
    /// importable under the parameters unit name, and the result is not cached.
    /// Sortable contracts get their ordering edges mirrored. A contract nobody
    /// satisfies yields an empty map.
    ///
    /// Every plugin keeps the unit it was found in, so [`Plugin::late_import`]
    /// resolves through the same resolver, parameters included.
    ///
    /// # Errors
    /// Returns [`RegistryError::Root`] if the plugin root is not on the search
    /// path, or [`RegistryError::DuplicatePlugin`] under [`DuplicatePolicy::Reject`].
    pub fn retrieve( &self, contract: &Contract, parameters: Option<&Namespace> ) -> Result<Arc<PluginMap>, RegistryError> {
        let parameters = parameters.filter(| parameters | !parameters.is_empty() );
        if parameters.is_none() {
            if let Some( cached ) = self.cache().get( contract.name() ) {
                debug!( contract = contract.name(), "Serving cached plugins" );
                return Ok( Arc::clone( cached ));
            }
        }

        let span = info_span!( "discover", contract = contract.name() );
        let _entered = span.enter();

        let resolver = match parameters {
            Some( parameters ) => {
                let overrides = Overrides::from([( self.parameters_unit.clone(), Target::from( parameters.clone() ))]);
                Arc::new( Arc::clone( &self.resolver ).with_overrides( overrides )) as Arc<dyn Resolver>
            }
            None => Arc::clone( &self.resolver ),
        };
        let root = self.host.resolver().locate( &self.root )?;
        info!( root = %self.root, parameterised = parameters.is_some(), "Discovering plugins" );

        let mut plugins = PluginMap::new();
        for candidate in PluginScanner::new( &self.host, Arc::clone( &resolver )).scan( root, contract ) {
            let origin = candidate.origin().clone();
            let key = candidate.key().to_string();
            let candidate = match contract.verify( candidate ) {
                Ok( candidate ) => candidate,
                Err( violation ) => {
                    warn!( unit = %origin, value = %key, reason = %violation, "Rejected candidate" );
                    continue ;
                }
            };
            let plugin = match parameters {
                Some( _ ) => Plugin::from_candidate( &candidate ).pinning( Arc::clone( &resolver )),
                None => Plugin::from_candidate( &candidate ),
            };
            debug!( plugin = plugin.name(), unit = %origin, "Accepted plugin" );
            if plugins.contains_key( plugin.name() ) {
                match self.duplicates {
                    DuplicatePolicy::Reject => return Err( RegistryError::DuplicatePlugin {
                        name: plugin.name().to_string(),
                        contract: contract.name().to_string(),
                    }),
                    DuplicatePolicy::LastWins => warn!( plugin = plugin.name(), unit = %origin, "Replacing plugin of the same name" ),
                }
            }
            plugins.insert( plugin.name().to_string(), plugin );
        }

        if contract.is_sortable() { mirror_edges( &mut plugins ); }
        info!( count = plugins.len(), "Discovery finished" );

        let plugins = Arc::new( plugins );
        if parameters.is_none() {
            self.cache().insert( contract.name().to_string(), Arc::clone( &plugins ));
        }
        Ok( plugins )
    }

    /// The plugins `names` expands to, in expansion order.
    ///
    /// # Errors
    /// Returns [`RegistryError::PluginNotFound`] for the first requested name
    /// that no plugin carries, besides the failures of [`Registry::retrieve`].
    pub fn retrieve_named<S: AsRef<str>>(
        &self,
        contract: &Contract,
        names: &[S],
        parameters: Option<&Namespace>,
    ) -> Result<Vec<Plugin>, RegistryError> {
        let plugins = self.retrieve( contract, parameters )?;
        expand_names( plugins.keys(), names ).into_iter()
            .map(| name | plugins.get( &name ).cloned().ok_or_else(|| RegistryError::PluginNotFound {
                name,
                contract: contract.name().to_string(),
            }))
            .collect()
    }

    /// Like [`Registry::retrieve_named`], ordered so that every plugin follows
    /// those it must run after.
    ///
    /// # Errors
    /// Returns [`RegistryError::CyclicDependency`] if the requested plugins
    /// cannot be ordered, besides the failures of [`Registry::retrieve_named`].
    pub fn retrieve_sorted<S: AsRef<str>>(
        &self,
        contract: &Contract,
        names: &[S],
        parameters: Option<&Namespace>,
    ) -> Result<Vec<Plugin>, RegistryError> {
        let plugins = self.retrieve_named( contract, names, parameters )?;
        sort_plugins( plugins ).map_err(| err | {
            error!( contract = contract.name(), error = %err, "Cannot order plugins" );
            RegistryError::from( err )
        })
    }

    /// Forgets every cached retrieval.
    pub fn clear_cache( &self ) {
        self.cache().clear();
    }

    fn cache( &self ) -> MutexGuard<'_, HashMap<String, Arc<PluginMap>>> {
        self.cache.lock().unwrap_or_else( PoisonError::into_inner )
    }

}

impl std::fmt::Debug for Registry {
    fn fmt( &self, f: &mut std::fmt::Formatter<'_> ) -> std::fmt::Result {
        f.debug_struct( "Registry" )
            .field( "root", &self.root )
            .field( "parameters_unit", &self.parameters_unit )
            .field( "resolver", &self.resolver )
            .field( "duplicates", &self.duplicates )
            .finish_non_exhaustive()
    }
}
