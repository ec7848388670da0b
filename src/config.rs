//! Registry configuration, loadable from TOML.
//!
//! ```toml
//! plugin_root = "plugins"
//! parameters_unit = "parameters"
//! search_paths = ["./units"]
//! exclude = ["plugins.experimental"]
//! duplicates = "last-wins"
//!
//! [overrides."app.settings"]
//! greeting = "hello"
//! ```

use std::collections::BTreeMap ;
use std::fs ;
use std::path::{ Path, PathBuf };
use serde::Deserialize ;
use thiserror::Error ;

use crate::{ NameError, Namespace, QualifiedName };
use crate::declarations::convert_table ;



#[derive( Error, Debug )]
pub enum ConfigError {
    #[error( "Failed to read '{}': {error}", path.display() )] Io { path: PathBuf, #[source] error: std::io::Error },
    #[error( "Malformed configuration: {0}" )] Parse( #[from] toml::de::Error ),
    #[error( "Invalid unit name: {0}" )] Name( #[from] NameError ),
    #[error( "Override '{unit}' references export '{export}', but overrides cannot contain exports" )] ExportInOverride { unit: String, export: String },
}

/// What happens when two discovered plugins share a name under one contract.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize )]
#[serde( rename_all = "kebab-case" )]
pub enum DuplicatePolicy {
    /// Fail the discovery with [`RegistryError::DuplicatePlugin`]( crate::RegistryError::DuplicatePlugin ).
    #[default]
    Reject,
    /// Keep the plugin discovered last, logging a warning.
    LastWins,
}

#[derive( Debug, Clone, PartialEq, Deserialize )]
#[serde( default, deny_unknown_fields )]
pub struct RegistryConfig {
    /// The package scanned for plugins.
    pub plugin_root: String,
    /// The unit name under which retrieval parameters are injected.
    pub parameters_unit: String,
    /// Extra search roots appended to the host resolver.
    pub search_paths: Vec<PathBuf>,
    /// Unit names the registry's resolver refuses to resolve.
    pub exclude: Vec<String>,
    /// Unit names bound to fixed namespaces of declared values.
    pub overrides: BTreeMap<String, toml::Table>,
    pub duplicates: DuplicatePolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            plugin_root: "plugins".to_string(),
            parameters_unit: "parameters".to_string(),
            search_paths: Vec::new(),
            exclude: Vec::new(),
            overrides: BTreeMap::new(),
            duplicates: DuplicatePolicy::default(),
        }
    }
}

impl RegistryConfig {

    /// # Errors
    /// Returns [`ConfigError::Parse`] if `text` is not a valid configuration.
    pub fn from_toml_str( text: &str ) -> Result<Self, ConfigError> {
        Ok( toml::from_str( text )? )
    }

    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file( path: impl AsRef<Path> ) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string( path ).map_err(| error | ConfigError::Io { path: path.to_path_buf(), error })?;
        Self::from_toml_str( &text )
    }

    pub(crate) fn plugin_root( &self ) -> Result<QualifiedName, ConfigError> {
        Ok( QualifiedName::new( &self.plugin_root )? )
    }

    pub(crate) fn parameters_unit( &self ) -> Result<QualifiedName, ConfigError> {
        Ok( QualifiedName::new( &self.parameters_unit )? )
    }

    pub(crate) fn excluded( &self ) -> Result<Vec<QualifiedName>, ConfigError> {
        self.exclude.iter()
            .map(| name | QualifiedName::new( name ).map_err( ConfigError::from ))
            .collect()
    }

    pub(crate) fn override_namespaces( &self ) -> Result<Vec<( QualifiedName, Namespace )>, ConfigError> {
        self.overrides.iter()
            .map(|( unit, table )| {
                let entries = convert_table( table.clone(), &mut | export | Err( ConfigError::ExportInOverride {
                    unit: unit.clone(),
                    export: export.to_string(),
                }))?;
                Ok(( QualifiedName::new( unit )?, entries.into_iter().collect() ))
            })
            .collect()
    }

}
