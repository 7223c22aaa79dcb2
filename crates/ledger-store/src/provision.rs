//! PostgreSQL connection provisioning.
//!
//! [`PoolSupervisor`] owns the connection pool for the lifetime of the
//! process. At startup it retries the first connection with exponential
//! backoff so the service tolerates a database that is still booting; later,
//! [`PoolSupervisor::reprovision`] swaps in a fresh pool when the store
//! reports that it is unreachable.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use backoff::ExponentialBackoff;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::{Result, StoreError};

/// Minimum spacing between two pool replacements.
const REPROVISION_COOLDOWN: Duration = Duration::from_secs(1);

/// Exponential backoff used while waiting for the database at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
}

impl RetryPolicy {
    /// Delay schedule without jitter and without an elapsed-time limit; the
    /// retry count bounds the loop instead.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.min_delay,
            initial_interval: self.min_delay,
            max_interval: self.max_delay,
            multiplier: self.factor,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 10,
            min_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            factor: 2.0,
        }
    }
}

/// Connection settings for the PostgreSQL store.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub bootstrap: RetryPolicy,
}

impl DatabaseConfig {
    /// Creates a configuration for `url` with default pool limits.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(30),
            bootstrap: RetryPolicy::default(),
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// `DATABASE_URL` wins when present; otherwise the URL is assembled from
    /// `DB_USER`, `DB_PASSWORD`, `DB_HOST`, `DB_PORT` and `DB_NAME`. Pool
    /// limits come from `DB_MAX_CONNECTIONS`, `DB_ACQUIRE_TIMEOUT_MS` and
    /// `DB_IDLE_TIMEOUT_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`DatabaseConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let url = lookup("DATABASE_URL").unwrap_or_else(|| {
            let user = lookup("DB_USER").unwrap_or_else(|| "postgres".to_string());
            let password =
                lookup("DB_PASSWORD").unwrap_or_else(|| "inventariofacil123".to_string());
            let host = lookup("DB_HOST").unwrap_or_else(|| "db".to_string());
            let port = lookup("DB_PORT").unwrap_or_else(|| "5432".to_string());
            let name = lookup("DB_NAME").unwrap_or_else(|| "inventariofacil".to_string());
            format!("postgres://{user}:{password}@{host}:{port}/{name}")
        });

        let millis = |key: &str| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
        };

        let defaults = Self::new(url);
        Self {
            max_connections: lookup("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_connections),
            acquire_timeout: millis("DB_ACQUIRE_TIMEOUT_MS").unwrap_or(defaults.acquire_timeout),
            idle_timeout: millis("DB_IDLE_TIMEOUT_MS").unwrap_or(defaults.idle_timeout),
            ..defaults
        }
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .idle_timeout(self.idle_timeout)
    }

    fn lazy_pool(&self) -> Result<PgPool> {
        Ok(self.pool_options().connect_lazy(&self.url)?)
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("bootstrap", &self.bootstrap)
            .finish()
    }
}

/// Owns the live PostgreSQL pool and replaces it on demand.
pub struct PoolSupervisor {
    config: DatabaseConfig,
    pool: RwLock<PgPool>,
    generation: AtomicU64,
    last_reprovision: Mutex<Option<Instant>>,
}

impl PoolSupervisor {
    /// Builds the pool and waits until one connection succeeds.
    ///
    /// Fails with `Unavailable` once the retry policy is exhausted; callers
    /// treat that as fatal.
    #[tracing::instrument(skip(config), fields(max_connections = config.max_connections))]
    pub async fn bootstrap(config: DatabaseConfig) -> Result<Self> {
        let pool = config.lazy_pool()?;
        let retries = config.bootstrap.retries;
        let attempts = &AtomicU32::new(0);
        let pool_ref = &pool;

        let connect = move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match pool_ref.acquire().await {
                Ok(connection) => {
                    drop(connection);
                    Ok(())
                }
                Err(err) if attempt > retries => Err(backoff::Error::permanent(err)),
                Err(err) => Err(backoff::Error::transient(err)),
            }
        };
        let on_retry = |err: sqlx::Error, delay: Duration| {
            tracing::warn!(
                attempt = attempts.load(Ordering::SeqCst),
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "database connection failed, retrying"
            );
        };

        let outcome =
            backoff::future::retry_notify(config.bootstrap.backoff(), connect, on_retry).await;
        let attempts = attempts.load(Ordering::SeqCst);
        if let Err(err) = outcome {
            pool.close().await;
            return Err(StoreError::Unavailable(format!(
                "giving up after {attempts} attempts: {err}"
            )));
        }

        tracing::info!(attempts, "connected to PostgreSQL");
        Ok(Self::from_pool(config, pool))
    }

    /// Wraps an already connected pool.
    pub fn from_pool(config: DatabaseConfig, pool: PgPool) -> Self {
        Self {
            config,
            pool: RwLock::new(pool),
            generation: AtomicU64::new(0),
            last_reprovision: Mutex::new(None),
        }
    }

    /// Returns a handle to the current pool.
    pub fn pool(&self) -> PgPool {
        self.pool
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the pool with a fresh one and closes the old pool in the
    /// background. Calls within the cooldown window are ignored.
    pub fn reprovision(&self) -> Result<()> {
        {
            let mut last = self
                .last_reprovision
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if last.is_some_and(|at| at.elapsed() < REPROVISION_COOLDOWN) {
                return Ok(());
            }
            *last = Some(Instant::now());
        }

        let fresh = self.config.lazy_pool()?;
        let old = std::mem::replace(
            &mut *self.pool.write().unwrap_or_else(PoisonError::into_inner),
            fresh,
        );
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        metrics::counter!("ledger_pool_reprovisions_total").increment(1);
        tracing::warn!(generation, "connection pool replaced");

        tokio::spawn(async move { old.close().await });
        Ok(())
    }

    /// Closes the current pool, waiting for checked-out connections.
    pub async fn close(&self) {
        self.pool().close().await;
    }
}
