use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CredoError, Result};

pub const CONFIG_FILE_NAME: &str = "credo.json";
pub const CONFIG_ENV: &str = "CREDO_CONFIG";

/// The four logical schemas of the CREDO database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Schema {
    Credo,
    PdbChem,
    Pdb,
    Variations,
}

impl Schema {
    pub const ALL: [Schema; 4] = [
        Schema::Credo,
        Schema::PdbChem,
        Schema::Pdb,
        Schema::Variations,
    ];

    pub fn logical_name(self) -> &'static str {
        match self {
            Schema::Credo => "credo",
            Schema::PdbChem => "pdbchem",
            Schema::Pdb => "pdb",
            Schema::Variations => "variations",
        }
    }

    fn from_logical_name(name: &str) -> Option<Self> {
        Schema::ALL
            .into_iter()
            .find(|schema| schema.logical_name() == name)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.logical_name())
    }
}

/// Maps logical schemas onto the schema names used by the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaNames {
    names: BTreeMap<Schema, String>,
}

impl SchemaNames {
    pub fn resolve(&self, schema: Schema) -> &str {
        self.names
            .get(&schema)
            .map(String::as_str)
            .unwrap_or_else(|| schema.logical_name())
    }

    /// The logical schema configured under the physical name `name`.
    pub fn schema_for(&self, name: &str) -> Option<Schema> {
        Schema::ALL
            .into_iter()
            .find(|schema| self.resolve(*schema) == name)
    }

    pub fn physical_names(&self) -> Vec<String> {
        Schema::ALL
            .into_iter()
            .map(|schema| self.resolve(schema).to_string())
            .collect()
    }
}

impl Default for SchemaNames {
    fn default() -> Self {
        let names = Schema::ALL
            .into_iter()
            .map(|schema| (schema, schema.logical_name().to_string()))
            .collect();
        Self { names }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolClass {
    /// A fresh connection per checkout, closed on release.
    Null,
    /// One connection shared by every session.
    Singleton,
    /// A bounded queue of `pool_size` connections.
    Queue,
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub driver: String,
    pub user: String,
    pub passwd: String,
    pub host: String,
    pub port: u16,
    pub db: String,
    pub pool_class: PoolClass,
    pub pool_recycle: Option<Duration>,
    pub pool_size: u32,
    pub stream_results: bool,
}

#[derive(Debug, Clone)]
pub struct SchemaConfig {
    pub name: String,
    pub reflect: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extras {
    pub rdkit: bool,
    pub rdkit_cartridge: bool,
    pub openeye: bool,
}

#[derive(Debug, Clone)]
pub struct CredoConfig {
    pub connection: ConnectionConfig,
    pub schemas: BTreeMap<Schema, SchemaConfig>,
    pub debug_sql: bool,
    pub extras: Extras,
    pub pdb_directory: Option<PathBuf>,
    url_override: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    connection: RawConnectionConfig,
    schema: BTreeMap<String, RawSchemaConfig>,
    #[serde(default)]
    debug: RawDebugConfig,
    #[serde(default)]
    extras: RawExtras,
    #[serde(default)]
    directory: RawDirectory,
}

#[derive(Debug, Deserialize)]
struct RawConnectionConfig {
    #[serde(default = "default_driver")]
    driver: String,
    user: String,
    #[serde(default)]
    passwd: String,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    db: String,
    poolclass: Option<String>,
    pool_recycle: Option<u64>,
    pool_size: Option<u32>,
    #[serde(default)]
    stream_results: bool,
}

#[derive(Debug, Deserialize)]
struct RawSchemaConfig {
    name: String,
    #[serde(default)]
    reflect: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDebugConfig {
    #[serde(rename = "SQL", default)]
    sql: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawExtras {
    #[serde(default)]
    rdkit: bool,
    #[serde(rename = "rdkit-cartridge", default)]
    rdkit_cartridge: bool,
    #[serde(default)]
    openeye: bool,
}

#[derive(Debug, Default, Deserialize)]
struct RawDirectory {
    pdb: Option<PathBuf>,
}

fn default_driver() -> String {
    "postgresql".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

const DEFAULT_POOL_SIZE: u32 = 5;

impl CredoConfig {
    /// Resolves the configuration path from `CREDO_CONFIG`, falling back to
    /// `credo.json` in the package root.
    pub fn default_path() -> PathBuf {
        dotenvy::dotenv().ok();
        std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| Path::new(env!("CARGO_MANIFEST_DIR")).join(CONFIG_FILE_NAME))
    }

    pub fn from_default_location() -> Result<Self> {
        Self::load(&Self::default_path())
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CredoError::ConfigMissing(path.to_path_buf()));
        }

        let raw = std::fs::read_to_string(path).map_err(|e| {
            CredoError::Config(format!("failed to read config {}: {e}", path.display()))
        })?;

        let mut config = Self::parse(&raw).map_err(|e| match e {
            CredoError::Config(msg) => CredoError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })?;
        config.url_override = std::env::var("DATABASE_URL").ok();
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let parsed: FileConfig = serde_json::from_str(raw)
            .map_err(|e| CredoError::Config(format!("failed to parse JSON: {e}")))?;
        Self::from_raw(parsed)
    }

    fn from_raw(raw: FileConfig) -> Result<Self> {
        let pool_class = match raw.connection.poolclass.as_deref() {
            None | Some("queue") => PoolClass::Queue,
            Some("null") => PoolClass::Null,
            Some("singleton") => PoolClass::Singleton,
            Some(other) => {
                return Err(CredoError::Config(format!(
                    "connection.poolclass must be one of null, singleton, queue (got '{other}')"
                )));
            }
        };

        let pool_size = raw.connection.pool_size.unwrap_or(DEFAULT_POOL_SIZE);
        if pool_class == PoolClass::Queue && pool_size == 0 {
            return Err(CredoError::Config(
                "connection.pool_size must be greater than zero for queue pools".to_string(),
            ));
        }

        if raw.connection.driver.trim().is_empty() {
            return Err(CredoError::Config(
                "connection.driver must not be empty".to_string(),
            ));
        }

        let connection = ConnectionConfig {
            driver: raw.connection.driver,
            user: raw.connection.user,
            passwd: raw.connection.passwd,
            host: raw.connection.host,
            port: raw.connection.port,
            db: raw.connection.db,
            pool_class,
            pool_recycle: raw
                .connection
                .pool_recycle
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            pool_size,
            stream_results: raw.connection.stream_results,
        };

        let mut schemas = BTreeMap::new();
        for (logical, schema) in raw.schema {
            let key = Schema::from_logical_name(&logical).ok_or_else(|| {
                CredoError::Config(format!("unknown logical schema '{logical}'"))
            })?;
            if schema.name.trim().is_empty() {
                return Err(CredoError::Config(format!(
                    "schema.{logical}.name must not be empty"
                )));
            }
            if schema.reflect.is_empty() {
                return Err(CredoError::Config(format!(
                    "schema.{logical}.reflect must list at least one table"
                )));
            }
            schemas.insert(
                key,
                SchemaConfig {
                    name: schema.name,
                    reflect: schema.reflect,
                },
            );
        }

        if !schemas.contains_key(&Schema::Credo) {
            return Err(CredoError::Config(
                "schema.credo must be configured".to_string(),
            ));
        }

        Ok(Self {
            connection,
            schemas,
            debug_sql: raw.debug.sql,
            extras: Extras {
                rdkit: raw.extras.rdkit,
                rdkit_cartridge: raw.extras.rdkit_cartridge,
                openeye: raw.extras.openeye,
            },
            pdb_directory: raw.directory.pdb,
            url_override: None,
        })
    }

    pub fn database_url(&self) -> String {
        if let Some(url) = &self.url_override {
            return url.clone();
        }
        let c = &self.connection;
        let scheme = match c.driver.as_str() {
            "postgresql" | "postgres" | "postgresql+psycopg2" => "postgres",
            other => other,
        };
        let user = urlencoding::encode(&c.user);
        let db = urlencoding::encode(&c.db);
        if c.passwd.is_empty() {
            format!("{scheme}://{user}@{}:{}/{db}", c.host, c.port)
        } else {
            let passwd = urlencoding::encode(&c.passwd);
            format!("{scheme}://{user}:{passwd}@{}:{}/{db}", c.host, c.port)
        }
    }

    pub fn schema_names(&self) -> SchemaNames {
        let mut names = SchemaNames::default();
        for (schema, cfg) in &self.schemas {
            names.names.insert(*schema, cfg.name.clone());
        }
        names
    }

    /// Tables to reflect for one logical schema.
    pub fn reflect_list(&self, schema: Schema) -> &[String] {
        self.schemas
            .get(&schema)
            .map(|cfg| cfg.reflect.as_slice())
            .unwrap_or(&[])
    }
}
