#[allow( dead_code )]
mod unit_tree {

    use std::path::Path ;
    use once_cell::sync::Lazy ;
    use wasm_isolate::{ Host, LoadableUnit, QualifiedName };

    static TRACING: Lazy<()> = Lazy::new(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter( tracing_subscriber::EnvFilter::from_default_env() )
            .with_test_writer()
            .try_init();
    });

    pub fn init_tracing() { Lazy::force( &TRACING ); }

    pub fn qn( name: &str ) -> QualifiedName {
        name.parse().expect( "Invalid qualified name in test" )
    }

    /// A throwaway search root populated file by file.
    pub struct UnitTree { root: tempfile::TempDir }

    impl UnitTree {

        pub fn new() -> Self {
            init_tracing();
            Self { root: tempfile::tempdir().expect( "Failed to create temporary directory" ) }
        }

        pub fn path( &self ) -> &Path { self.root.path() }

        /// Writes the file of unit `name` with `extension`, creating package
        /// directories for every enclosing segment.
        pub fn file( &self, name: &str, extension: &str, contents: impl AsRef<[u8]> ) -> &Self {
            let segments = name.split( '.' ).collect::<Vec<_>>();
            let ( last, packages ) = segments.split_last().expect( "Empty unit name" );
            let directory = packages.iter().fold( self.path().to_path_buf(), | path, segment | path.join( segment ));
            std::fs::create_dir_all( &directory ).expect( "Failed to create package directory" );
            std::fs::write( directory.join( format!( "{}.{}", last, extension )), contents ).expect( "Failed to write unit file" );
            self
        }

        pub fn wat( &self, name: &str, text: &str ) -> &Self { self.file( name, "wat", text ) }

        pub fn declarations( &self, name: &str, text: &str ) -> &Self { self.file( name, "toml", text ) }

        pub fn package( &self, name: &str ) -> &Self {
            let directory = name.split( '.' ).fold( self.path().to_path_buf(), | path, segment | path.join( segment ));
            std::fs::create_dir_all( directory ).expect( "Failed to create package directory" );
            self
        }

        pub fn host( &self ) -> Host { Host::default().with_search_path( self.path() ) }

        pub fn unit( &self, name: &str ) -> LoadableUnit {
            LoadableUnit::locate( self.path(), &qn( name )).expect( "Unit is missing from the tree" )
        }

    }

    pub const COUNTER: &str = r#"(module
        (global $count (mut i32) (i32.const 0))
        (func (export "increment") (result i32)
            global.get $count
            i32.const 1
            i32.add
            global.set $count
            global.get $count)
        (global (export "limit") i32 (i32.const 10)))"# ;

}
