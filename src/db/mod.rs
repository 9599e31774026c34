pub mod catalog;
pub mod pool;
pub mod types;

use std::sync::Arc;

use sqlx::pool::PoolConnection;
use sqlx::Postgres;
use tracing::{debug, info, warn};

use crate::config::{CredoConfig, SchemaNames};
use crate::error::Result;

pub use catalog::{Capabilities, Capability, Catalog, ColumnMetadata, TableMetadata};
pub use pool::{ConnectionPool, PROBE_QUERY};
pub use types::{Cube, Vector3d};

/// Target used for statement logging.
pub const SQL_LOG_TARGET: &str = "credo::sql";

struct CredoInner {
    config: CredoConfig,
    names: SchemaNames,
    pool: ConnectionPool,
    catalog: Catalog,
    capabilities: Capabilities,
}

/// Handle to a CREDO database: the connection pool plus the reflected
/// catalog and detected capabilities. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct Credo {
    inner: Arc<CredoInner>,
}

impl std::fmt::Debug for Credo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credo")
            .field("db", &self.inner.config.connection.db)
            .field("tables", &self.inner.catalog.len())
            .field("capabilities", &self.inner.capabilities.to_string())
            .finish()
    }
}

impl Credo {
    /// Opens the pool, reflects the configured schemas and probes for
    /// optional capabilities.
    pub async fn connect(config: CredoConfig) -> Result<Self> {
        let url = config.database_url();
        let pool = ConnectionPool::new(&config.connection, &url)?;
        let names = config.schema_names();

        let mut conn = pool.acquire().await?;
        let catalog = Catalog::reflect(&mut conn, &config, &names).await?;
        let capabilities = Capabilities::detect(&mut conn, &config).await?;
        drop(conn);

        info!(
            stage = "startup",
            event = "credo.connect",
            db = %config.connection.db,
            tables = catalog.len(),
            capabilities = %capabilities,
            "connected to CREDO"
        );

        Ok(Self {
            inner: Arc::new(CredoInner {
                config,
                names,
                pool,
                catalog,
                capabilities,
            }),
        })
    }

    pub async fn from_default_config() -> Result<Self> {
        Self::connect(CredoConfig::from_default_location()?).await
    }

    /// A handle that neither reflects nor probes; connections are opened on
    /// first use and capabilities are taken from the config extras.
    pub fn lazy(config: CredoConfig) -> Result<Self> {
        let capabilities = Capabilities::assumed(&config);
        Self::lazy_with(config, capabilities)
    }

    pub fn lazy_with(config: CredoConfig, capabilities: Capabilities) -> Result<Self> {
        let url = config.database_url();
        let pool = ConnectionPool::new(&config.connection, &url)?;
        let names = config.schema_names();
        Ok(Self {
            inner: Arc::new(CredoInner {
                config,
                names,
                pool,
                catalog: Catalog::default(),
                capabilities,
            }),
        })
    }

    pub fn config(&self) -> &CredoConfig {
        &self.inner.config
    }

    pub fn schema_names(&self) -> &SchemaNames {
        &self.inner.names
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.inner.capabilities
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.inner.capabilities.has(capability)
    }

    /// Checks `capability` for `operation`, logging a warning when it is
    /// unavailable. Callers return an empty result on `false`.
    pub fn require(&self, capability: Capability, operation: &str) -> bool {
        let available = self.has(capability);
        if !available {
            warn!(
                stage = "capability",
                event = "capability.missing",
                capability = %capability,
                operation,
                "capability unavailable, returning no results"
            );
        }
        available
    }

    pub fn debug_sql(&self) -> bool {
        self.inner.config.debug_sql
    }

    pub fn stream_results(&self) -> bool {
        self.inner.config.connection.stream_results
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.inner.pool
    }

    /// Checks out a probed connection.
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        self.inner.pool.acquire().await
    }

    pub async fn health_check(&self) -> Result<String> {
        let mut conn = self.acquire().await?;
        sqlx::query_scalar::<_, i32>(PROBE_QUERY)
            .fetch_one(&mut *conn)
            .await?;
        Ok("ok".to_string())
    }

    /// Discards every pooled connection.
    pub async fn dispose(&self) -> Result<()> {
        let generation = self.inner.pool.generation();
        self.inner.pool.dispose(generation).await
    }

    pub async fn close(&self) {
        self.inner.pool.close().await;
    }

    pub(crate) fn log_sql(&self, sql: &str, binds: usize) {
        if self.debug_sql() {
            info!(target: SQL_LOG_TARGET, binds, "{sql}");
        } else {
            debug!(target: SQL_LOG_TARGET, binds, "{sql}");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub const TEST_CONFIG: &str = r#"{
        "connection": {"user": "credo", "db": "credo", "poolclass": "queue", "pool_size": 2},
        "schema": {
            "credo": {"name": "credo", "reflect": ["structures", "chains", "contacts"]},
            "pdbchem": {"name": "pdbchem", "reflect": ["chem_comps"]},
            "pdb": {"name": "pdb", "reflect": ["res_map"]},
            "variations": {"name": "variations", "reflect": ["variations"]}
        },
        "extras": {"rdkit": true, "rdkit-cartridge": true, "openeye": true}
    }"#;

    /// A lazy handle that never connects unless a query is executed.
    pub fn lazy_credo() -> Credo {
        let config = CredoConfig::parse(TEST_CONFIG).expect("test config");
        Credo::lazy(config).expect("lazy handle")
    }

    pub fn lazy_credo_without(capability: Capability) -> Credo {
        let config = CredoConfig::parse(TEST_CONFIG).expect("test config");
        let mut capabilities = Capabilities::assumed(&config);
        capabilities.set(capability, false);
        Credo::lazy_with(config, capabilities).expect("lazy handle")
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn lazy_handle_uses_config_extras() {
        let credo = lazy_credo();
        assert!(credo.has(Capability::RdkitCartridge));
        assert!(credo.has(Capability::OpenEye));
        assert!(credo.catalog().is_empty());
        assert_eq!(credo.schema_names().resolve(crate::config::Schema::PdbChem), "pdbchem");
    }

    #[tokio::test]
    async fn require_reports_missing_capabilities() {
        let credo = lazy_credo_without(Capability::OpenEye);
        assert!(!credo.require(Capability::OpenEye, "test"));
        assert!(credo.require(Capability::Trigram, "test"));
    }
}
