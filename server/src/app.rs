//! Shared state handed to every request handler.

use std::time::Instant;

use hostel_core::HostelConfig;
use hostel_core::db::{self, DbPool};
use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;

pub type Conn = PooledConnection<SqliteConnectionManager>;

pub struct App {
    pool: DbPool,
    config: HostelConfig,
    started_at: Instant,
}

impl App {
    pub fn new(pool: DbPool, config: HostelConfig) -> Self {
        Self {
            pool,
            config,
            started_at: Instant::now(),
        }
    }

    /// Open the configured database, apply migrations and build the app.
    pub fn open(config: HostelConfig) -> hostel_core::Result<Self> {
        let pool = db::initialize_pool(&config.resolved_db_path(), config.pool_size)?;
        let mut conn = pool.get().map_err(db::DbError::from)?;
        db::migrate_to_latest(&mut conn)?;
        drop(conn);
        Ok(Self::new(pool, config))
    }

    pub fn conn(&self) -> hostel_core::Result<Conn> {
        Ok(self.pool.get().map_err(db::DbError::from)?)
    }

    pub fn config(&self) -> &HostelConfig {
        &self.config
    }

    pub fn uptime_s(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
