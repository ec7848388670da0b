//! Turning a [`LoadableUnit`] into a populated [`UnitCell`].
//!
//! Every load compiles the unit's code (if any) into a fresh `Store`, binds
//! each wasm import by resolving its module name through the active frame,
//! instantiates, and finally merges the instance's exports with the unit's
//! declarations into one [`Namespace`].

use std::fs ;
use std::path::{ Path, PathBuf };
use std::sync::Arc ;
use thiserror::Error ;
use tracing::{ debug, warn };
use wasmtime::{ Engine, Extern, ExternType, Func, FuncType, Global, GlobalType, ImportType, Instance, Module, Store, Val, ValType };

use crate::{ ExportKind, ExportRef, HostFunc, IsolationContext, LoadableUnit, Namespace, NameError, NotFound, QualifiedName, Resolver, Target, UnitCell, UnitHandle, Value };
use crate::cell::{ Loaded, Runtime };
use crate::declarations::convert_table ;
use crate::isolation::Scope ;
use crate::unit::CodeKind ;



/// Errors raised while loading a unit.
#[derive( Error, Debug )]
pub enum LoadError {
    #[error( transparent )] NotFound( #[from] NotFound ),
    #[error( "Failed to read '{}': {error}", path.display() )] Io { path: PathBuf, #[source] error: std::io::Error },
    #[error( "Malformed declarations in '{}': {error}", path.display() )] Declarations { path: PathBuf, #[source] error: toml::de::Error },
    #[error( "Unit '{unit}' declares a reference to unknown export '{export}'" )] UnknownExport { unit: QualifiedName, export: String },
    #[error( "Failed to compile unit '{unit}': {error}" )] Compile { unit: QualifiedName, error: wasmtime::Error },
    #[error( "Failed to instantiate unit '{unit}': {error}" )] Instantiate { unit: QualifiedName, error: wasmtime::Error },
    #[error( "Unit '{unit}' imports from invalid module name '{module}': {error}" )] InvalidImport { unit: QualifiedName, module: String, #[source] error: NameError },
    #[error( "Unit '{unit}' imports '{field}' which '{from}' does not provide" )] MissingImport { unit: QualifiedName, from: QualifiedName, field: String },
    #[error( "Unit '{unit}' cannot import '{from}.{field}': {reason}" )] UnsupportedImport { unit: QualifiedName, from: QualifiedName, field: String, reason: String },
    #[error( "Unit '{unit}' imports global '{from}.{field}' while '{from}' is still loading" )] CircularImport { unit: QualifiedName, from: QualifiedName, field: String },
    #[error( "Unit '{0}' is already loaded" )] AlreadyLoaded( QualifiedName ),
    #[error( "Unit '{0}' has not finished loading" )] NotReady( QualifiedName ),
    #[error( "The resolver unit '{0}' was loaded under no longer exists" )] ContextDropped( QualifiedName ),
}

impl IsolationContext<'_> {

    /// Loads `unit` in a new frame bound to `resolver`.
    ///
    /// Precompiled units cannot be sandboxed: they are loaded without a frame and
    /// resolve their imports ambiently.
    ///
    /// # Errors
    /// Returns [`LoadError`] if the unit or any of its imports fail to load.
    pub fn load( &mut self, unit: &LoadableUnit, resolver: Arc<dyn Resolver> ) -> Result<UnitHandle, LoadError> {
        self.load_into( unit, resolver, UnitCell::new( unit.name().clone() ))
    }

    /// Like [`IsolationContext::load`], populating a caller-provided cell.
    ///
    /// # Errors
    /// Returns [`LoadError::AlreadyLoaded`] if `cell` was already populated.
    pub fn load_into(
        &mut self,
        unit: &LoadableUnit,
        resolver: Arc<dyn Resolver>,
        cell: Arc<UnitCell>,
    ) -> Result<UnitHandle, LoadError> {
        if cell.is_loaded() { return Err( LoadError::AlreadyLoaded( cell.name().clone() )) }
        match unit.is_native() {
            true => {
                warn!( unit = %unit.name(), "Loading precompiled unit outside isolation" );
                self.load_cell( unit, &cell, Scope::Ambient )?;
            }
            false => self.run_isolated( resolver, | ctx | ctx.load_cell( unit, &cell, Scope::Frame ))?,
        }
        UnitHandle::from_cell( cell )
    }

    /// Resolves `name` through the innermost frame, as an import inside it would.
    ///
    /// # Errors
    /// Returns [`LoadError`] if the name cannot be resolved or loaded, or
    /// [`LoadError::NotReady`] if it names a unit that is still loading.
    pub fn import( &mut self, name: &QualifiedName ) -> Result<UnitHandle, LoadError> {
        self.resolve( name, Scope::Frame ).and_then( UnitHandle::from_cell )
    }

    /// Resolves `name` through the state outside every frame.
    ///
    /// # Errors
    /// See [`IsolationContext::import`].
    pub fn import_ambient( &mut self, name: &QualifiedName ) -> Result<UnitHandle, LoadError> {
        self.resolve( name, Scope::Ambient ).and_then( UnitHandle::from_cell )
    }

    fn resolve( &mut self, name: &QualifiedName, scope: Scope ) -> Result<Arc<UnitCell>, LoadError> {
        if let Some( cell ) = self.state_mut( scope ).cache.get( name ) { return Ok( Arc::clone( cell )) }
        let host = self.host();
        let target = self.state_mut( scope ).lookup( host.resolver(), name )?;
        debug!( unit = %name, "Resolved import" );
        let cell = UnitCell::new( name.clone() );
        match target {
            Target::Namespace( namespace ) => {
                populate( &cell, Loaded { namespace: ( *namespace ).clone(), context: None, sandboxed: false })?;
                self.state_mut( scope ).cache.insert( name.clone(), Arc::clone( &cell ));
            }
            Target::Unit( unit ) if unit.is_native() => {
                if let Some( cell ) = self.state_mut( Scope::Ambient ).cache.get( name ) { return Ok( Arc::clone( cell )) }
                warn!( unit = %unit.name(), "Loading precompiled unit outside isolation" );
                self.load_cell( &unit, &cell, Scope::Ambient )?;
            }
            Target::Unit( unit ) => self.load_cell( &unit, &cell, scope )?,
        }
        Ok( cell )
    }

    /// Registers `cell` under its name in `scope`'s cache, then loads into it.
    /// The registration is withdrawn if loading fails.
    fn load_cell( &mut self, unit: &LoadableUnit, cell: &Arc<UnitCell>, scope: Scope ) -> Result<(), LoadError> {
        self.state_mut( scope ).cache.insert( cell.name().clone(), Arc::clone( cell ));
        let result = self.load_body( unit, cell, scope );
        if result.is_err() {
            let cache = &mut self.state_mut( scope ).cache ;
            if cache.get( cell.name() ).is_some_and(| cached | Arc::ptr_eq( cached, cell )) {
                cache.remove( cell.name() );
            }
        }
        result
    }

    fn load_body( &mut self, unit: &LoadableUnit, cell: &Arc<UnitCell>, scope: Scope ) -> Result<(), LoadError> {
        debug!( unit = %unit.name(), kind = ?unit.kind(), "Loading unit" );
        let host = self.host();
        let declarations = read_declarations( unit )?;

        let mut namespace = Namespace::new();
        if let Some(( path, kind )) = unit.code() {
            let module = compile( host.engine(), unit, path, kind )?;
            let mut store = Store::new( host.engine(), () );
            let mut imports = Vec::new();
            for import in module.imports() {
                imports.push( self.bind_import( &mut store, unit, &import, scope )?);
            }
            let instance = Instance::new( &mut store, &module, &imports )
                .map_err(| error | LoadError::Instantiate { unit: unit.name().clone(), error })?;
            let runtime = Runtime::new( cell.name().clone(), store, instance );
            namespace.extend( module.exports().map(| export | (
                export.name().to_string(),
                Value::Export( ExportRef::bound( &runtime, export.name().to_string(), ExportKind::from( &export.ty() ))),
            )));
        }

        if let Some( table ) = declarations {
            let entries = convert_table( table, &mut | export | match namespace.get( export ) {
                Some( value @ Value::Export( _ )) => Ok( value.clone() ),
                _ => Err( LoadError::UnknownExport { unit: unit.name().clone(), export: export.to_string() }),
            })?;
            namespace.extend( entries );
        }

        let entrypoint = match scope {
            Scope::Frame => self.state().entrypoint.as_ref(),
            Scope::Ambient => None,
        };
        populate( cell, Loaded {
            namespace,
            sandboxed: entrypoint.is_some(),
            context: entrypoint.map( Arc::downgrade ),
        })?;
        debug!( unit = %cell.name(), "Loaded unit" );
        Ok(())
    }

    fn bind_import(
        &mut self,
        store: &mut Store<()>,
        unit: &LoadableUnit,
        import: &ImportType<'_>,
        scope: Scope,
    ) -> Result<Extern, LoadError> {
        let from = QualifiedName::new( import.module() ).map_err(| error | LoadError::InvalidImport {
            unit: unit.name().clone(),
            module: import.module().to_string(),
            error,
        })?;
        let field = import.name();
        let cell = self.resolve( &from, scope )?;
        let value = match cell.namespace() {
            Some( namespace ) => Some( namespace.get( field ).cloned().ok_or_else(|| LoadError::MissingImport {
                unit: unit.name().clone(),
                from: from.clone(),
                field: field.to_string(),
            })?),
            None => None,
        };
        let unsupported = | reason: String | LoadError::UnsupportedImport {
            unit: unit.name().clone(),
            from: from.clone(),
            field: field.to_string(),
            reason,
        };

        match ( import.ty(), value ) {
            ( ExternType::Func( ty ), Some( Value::Export( export ))) if export.kind() == ExportKind::Func =>
                Ok( forward( store, ty, export )),
            ( ExternType::Func( ty ), Some( Value::Host( func ))) => Ok( host_func( store, ty, func )),
            ( ExternType::Func( ty ), None ) =>
                Ok( forward( store, ty, ExportRef::pending( &cell, field.to_string(), ExportKind::Func ))),
            ( ExternType::Func( _ ), Some( other )) =>
                Err( unsupported( format!( "a {} cannot satisfy a function import", other.kind_name() ))),
            ( ExternType::Global( ty ), Some( value )) =>
                snapshot_global( store, ty, &value ).map( Extern::Global ).map_err( unsupported ),
            ( ExternType::Global( _ ), None ) => Err( LoadError::CircularImport {
                unit: unit.name().clone(),
                from: from.clone(),
                field: field.to_string(),
            }),
            ( ExternType::Memory( _ ), _ ) => Err( unsupported( "memory imports are not supported".to_string() )),
            ( ExternType::Table( _ ), _ ) => Err( unsupported( "table imports are not supported".to_string() )),
            #[allow( unreachable_patterns )]
            _ => Err( unsupported( "unsupported import kind".to_string() )),
        }
    }

}

fn populate( cell: &UnitCell, loaded: Loaded ) -> Result<(), LoadError> {
    cell.populate( loaded ).map_err(|_| LoadError::AlreadyLoaded( cell.name().clone() ))
}

fn read_declarations( unit: &LoadableUnit ) -> Result<Option<toml::Table>, LoadError> {
    let Some( path ) = unit.declarations() else { return Ok( None ) };
    let text = fs::read_to_string( path ).map_err(| error | LoadError::Io { path: path.to_path_buf(), error })?;
    toml::from_str( &text )
        .map( Some )
        .map_err(| error | LoadError::Declarations { path: path.to_path_buf(), error })
}

fn compile( engine: &Engine, unit: &LoadableUnit, path: &Path, kind: CodeKind ) -> Result<Module, LoadError> {
    let module = match kind {
        CodeKind::Binary | CodeKind::Text => Module::from_file( engine, path ),
        // SAFETY: precompiled artefacts are trusted host files; wasmtime checks
        // that they were produced for this engine configuration before use.
        CodeKind::Precompiled => unsafe { Module::deserialize_file( engine, path ) },
    };
    module.map_err(| error | LoadError::Compile { unit: unit.name().clone(), error })
}

/// A function in the importer's store that forwards every call to `target`.
fn forward( store: &mut Store<()>, ty: FuncType, target: ExportRef ) -> Extern {
    Func::new( &mut *store, ty, move | _caller, params, results | {
        target.call_into( params, results ).map_err( wasmtime::Error::new )
    }).into()
}

fn host_func( store: &mut Store<()>, ty: FuncType, func: HostFunc ) -> Extern {
    Func::new( &mut *store, ty, move | _caller, params, results | func.call( params, results )).into()
}

/// A global in the importer's store holding the current value of `value`.
fn snapshot_global( store: &mut Store<()>, ty: GlobalType, value: &Value ) -> Result<Global, String> {
    let val = match value {
        Value::Export( export ) if export.kind() == ExportKind::Global => export.global().map_err(| err | err.to_string() )?,
        other => declared_val( other, ty.content() )
            .ok_or_else(|| format!( "a {} cannot initialise a {:?} global", other.kind_name(), ty.content() ))?,
    };
    Global::new( &mut *store, ty, val ).map_err(| err | err.to_string() )
}

#[allow( clippy::cast_possible_truncation )]
fn declared_val( value: &Value, ty: &ValType ) -> Option<Val> {
    match ( value, ty ) {
        ( Value::Int( n ), ValType::I32 ) => i32::try_from( *n ).ok().map( Val::I32 ),
        ( Value::Int( n ), ValType::I64 ) => Some( Val::I64( *n )),
        ( Value::Bool( b ), ValType::I32 ) => Some( Val::I32( i32::from( *b ))),
        ( Value::Int( _ ) | Value::Float( _ ), ValType::F32 ) => value.as_float().map(| n | Val::F32(( n as f32 ).to_bits() )),
        ( Value::Int( _ ) | Value::Float( _ ), ValType::F64 ) => value.as_float().map(| n | Val::F64( n.to_bits() )),
        _ => None,
    }
}
