use std::sync::RwLock;
use std::time::{Duration, Instant};

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Postgres;
use tracing::{debug, info, warn};

use crate::config::{ConnectionConfig, PoolClass};
use crate::error::{CredoError, Result};

pub const PROBE_QUERY: &str = "SELECT 1";

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
struct PoolSettings {
    url: String,
    pool_class: PoolClass,
    pool_size: u32,
    pool_recycle: Option<Duration>,
}

impl PoolSettings {
    fn options(&self) -> PgPoolOptions {
        let options = PgPoolOptions::new()
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .min_connections(0)
            .test_before_acquire(false)
            .max_lifetime(self.pool_recycle);

        match self.pool_class {
            PoolClass::Null => options
                .max_connections(self.pool_size.max(1))
                .after_release(|_conn, _meta| Box::pin(async move { Ok(false) })),
            PoolClass::Singleton => options.max_connections(1),
            PoolClass::Queue => options.max_connections(self.pool_size.max(1)),
        }
    }

    fn build(&self) -> Result<PgPool> {
        self.options()
            .connect_lazy(&self.url)
            .map_err(CredoError::Database)
    }
}

/// The shared connection pool.
///
/// Every checkout runs [`PROBE_QUERY`] on the connection. When the probe (or
/// the checkout itself) fails with a disconnect, the whole pool is disposed
/// and replaced, and the checkout is attempted exactly once more against the
/// fresh pool.
pub struct ConnectionPool {
    settings: PoolSettings,
    current: RwLock<(u64, PgPool)>,
}

impl ConnectionPool {
    pub fn new(config: &ConnectionConfig, url: &str) -> Result<Self> {
        let settings = PoolSettings {
            url: url.to_string(),
            pool_class: config.pool_class,
            pool_size: config.pool_size,
            pool_recycle: config.pool_recycle,
        };
        let pool = settings.build()?;
        info!(
            stage = "pool",
            event = "pool.create",
            pool_class = ?settings.pool_class,
            pool_size = settings.pool_size,
            pool_recycle_secs = settings.pool_recycle.map(|d| d.as_secs()),
            "connection pool created"
        );
        Ok(Self {
            settings,
            current: RwLock::new((0, pool)),
        })
    }

    fn snapshot(&self) -> (u64, PgPool) {
        match self.current.read() {
            Ok(guard) => (guard.0, guard.1.clone()),
            Err(poisoned) => {
                let guard = poisoned.into_inner();
                (guard.0, guard.1.clone())
            }
        }
    }

    pub fn generation(&self) -> u64 {
        self.snapshot().0
    }

    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        let (generation, pool) = self.snapshot();
        match checkout(&pool).await {
            Ok(conn) => Ok(conn),
            Err(err) if crate::error::is_disconnect(&err) || is_probe_failure(&err) => {
                warn!(
                    stage = "pool",
                    event = "pool.probe",
                    result = "fail",
                    generation,
                    error = %err,
                    "connection probe failed, disposing pool"
                );
                self.dispose(generation).await?;
                let (_, fresh) = self.snapshot();
                checkout(&fresh).await.map_err(|e| {
                    CredoError::Pool(format!("checkout failed after pool dispose: {e}"))
                })
            }
            Err(err) => Err(CredoError::Database(err)),
        }
    }

    /// Replaces the pool if it is still at `generation`. Calling this twice for
    /// the same generation disposes only once.
    pub async fn dispose(&self, generation: u64) -> Result<()> {
        let replacement = self.settings.build()?;
        let stale = {
            let mut guard = match self.current.write() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            if guard.0 != generation {
                debug!(
                    stage = "pool",
                    event = "pool.dispose",
                    result = "skipped",
                    generation,
                    current = guard.0,
                    "pool already replaced"
                );
                return Ok(());
            }
            let stale = std::mem::replace(&mut guard.1, replacement);
            guard.0 += 1;
            stale
        };

        let start = Instant::now();
        stale.close().await;
        info!(
            stage = "pool",
            event = "pool.dispose",
            result = "ok",
            generation,
            duration_ms = start.elapsed().as_millis(),
            "stale pool closed"
        );
        Ok(())
    }

    pub async fn close(&self) {
        let (_, pool) = self.snapshot();
        pool.close().await;
    }
}

async fn checkout(pool: &PgPool) -> std::result::Result<PoolConnection<Postgres>, sqlx::Error> {
    let mut conn = pool.acquire().await?;
    sqlx::query_scalar::<_, i32>(PROBE_QUERY)
        .fetch_one(&mut *conn)
        .await?;
    Ok(conn)
}

fn is_probe_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .map(|code| code.starts_with("08") || code == "57P01")
            .unwrap_or(false),
        sqlx::Error::Protocol(_) => true,
        _ => false,
    }
}
