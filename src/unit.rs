//! Loadable units and their on-disk layout.
//!
//! Under a search root, the unit `a.b.c` is either a **module**, stored as
//! `a/b/c.{wasm,cwasm,wat}` with an optional `a/b/c.toml` declarations file,
//! or a **package**, stored as the directory `a/b/c/` whose own code and
//! declarations live in `mod.*`. A package's children are the other units
//! found directly inside its directory.

use std::fs ;
use std::io ;
use std::path::{ Path, PathBuf };
use itertools::Itertools ;
use pipe_trait::Pipe ;
use tracing::debug ;

use crate::QualifiedName ;



/// Extension of a unit's declarations file.
pub const DECLARATIONS_EXTENSION: &str = "toml" ;

/// File stem a package uses for its own code and declarations.
pub const PACKAGE_STEM: &str = "mod" ;

#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum UnitKind { Module, Package }

/// The format of a unit's code, in lookup precedence order.
#[derive( Debug, Clone, Copy, PartialEq, Eq, Hash )]
pub enum CodeKind {
    /// A `.wasm` binary module.
    Binary,
    /// A `.cwasm` module precompiled for this host. Such units bypass isolation.
    Precompiled,
    /// A `.wat` text module.
    Text,
}

impl CodeKind {

    pub const ALL: [Self; 3] = [ Self::Binary, Self::Precompiled, Self::Text ];

    pub fn extension( self ) -> &'static str {
        match self {
            Self::Binary => "wasm",
            Self::Precompiled => "cwasm",
            Self::Text => "wat",
        }
    }

    pub fn from_extension( extension: &str ) -> Option<Self> {
        Self::ALL.into_iter().find(| kind | kind.extension() == extension )
    }

    #[inline] pub fn is_native( self ) -> bool { self == Self::Precompiled }

}

/// Something a resolver can point at and the loader can turn into a namespace.
#[derive( Debug, Clone, PartialEq, Eq )]
pub struct LoadableUnit {
    name: QualifiedName,
    kind: UnitKind,
    code: Option<( PathBuf, CodeKind )>,
    declarations: Option<PathBuf>,
    directory: Option<PathBuf>,
}

impl LoadableUnit {

    /// Finds `name` underneath `root`.
    pub fn locate( root: &Path, name: &QualifiedName ) -> Option<Self> {
        let base = name.segments().fold( root.to_path_buf(), | path, segment | path.join( segment ));
        Self::at( name.clone(), &base )
    }

    /// Interprets `base` (a path without extension) as the unit `name`.
    ///
    /// A directory is a package, whether or not it carries `mod.*` files.
    /// Otherwise `base` is a module if at least one of its code or declarations
    /// files exists.
    pub fn at( name: QualifiedName, base: &Path ) -> Option<Self> {
        if base.is_dir() {
            let ( code, declarations ) = unit_files( base, PACKAGE_STEM );
            return Some( Self { name, kind: UnitKind::Package, code, declarations, directory: Some( base.to_path_buf() )});
        }
        let stem = base.file_name()?.to_str()?;
        let ( code, declarations ) = unit_files( base.parent()?, stem );
        if code.is_none() && declarations.is_none() { return None }
        Some( Self { name, kind: UnitKind::Module, code, declarations, directory: None })
    }

    #[inline] pub fn name( &self ) -> &QualifiedName { &self.name }
    #[inline] pub fn kind( &self ) -> UnitKind { self.kind }
    #[inline] pub fn is_package( &self ) -> bool { self.kind == UnitKind::Package }
    #[inline] pub fn code( &self ) -> Option<( &Path, CodeKind )> { self.code.as_ref().map(|( path, kind )| ( path.as_path(), *kind )) }
    #[inline] pub fn declarations( &self ) -> Option<&Path> { self.declarations.as_deref() }
    #[inline] pub fn directory( &self ) -> Option<&Path> { self.directory.as_deref() }

    /// Whether this unit is precompiled native code that cannot be sandboxed.
    #[inline] pub fn is_native( &self ) -> bool { self.code.as_ref().is_some_and(|( _, kind )| kind.is_native() ) }

    /// The units directly inside a package, in name order. Modules have none.
    ///
    /// Entries whose names are not valid segments are skipped.
    ///
    /// # Errors
    /// Returns the I/O error if the package directory cannot be listed.
    pub fn children( &self ) -> io::Result<Vec<LoadableUnit>> {
        let Some( directory ) = &self.directory else { return Ok( Vec::new() ) };
        fs::read_dir( directory )?
            .map(| entry | entry.map(| entry | entry.path() ))
            .collect::<io::Result<Vec<_>>>()?
            .iter()
            .filter_map(| path | child_stem( path ))
            .sorted()
            .dedup()
            .filter_map(| stem | match self.name.child( &stem ) {
                Ok( name ) => Self::at( name, &directory.join( &stem )),
                Err( err ) => {
                    debug!( package = %self.name, entry = %stem, error = %err, "Skipping entry" );
                    None
                }
            })
            .collect::<Vec<_>>()
            .pipe( Ok )
    }

}

fn unit_files( directory: &Path, stem: &str ) -> ( Option<( PathBuf, CodeKind )>, Option<PathBuf> ) {
    let code = CodeKind::ALL.into_iter()
        .map(| kind | ( directory.join( format!( "{}.{}", stem, kind.extension() )), kind ))
        .find(|( path, _ )| path.is_file() );
    let declarations = directory.join( format!( "{}.{}", stem, DECLARATIONS_EXTENSION ))
        .pipe(| path | path.is_file().then_some( path ));
    ( code, declarations )
}

fn child_stem( path: &Path ) -> Option<String> {
    if path.is_dir() { return path.file_name()?.to_str().map( str::to_string ) }
    let extension = path.extension()?.to_str()?;
    if extension != DECLARATIONS_EXTENSION && CodeKind::from_extension( extension ).is_none() { return None }
    let stem = path.file_stem()?.to_str()?;
    ( stem != PACKAGE_STEM ).then(|| stem.to_string() )
}
