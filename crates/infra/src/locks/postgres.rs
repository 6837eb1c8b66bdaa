//! Postgres session-level advisory locks.

use async_trait::async_trait;
use sqlx::postgres::PgConnection;
use tracing::debug;

use scanfleet_core::LockKey;

use super::{LockCoordinator, LockError, LockSession};
use crate::db::Database;

/// Lock coordinator backed by `pg_try_advisory_lock`.
///
/// Each session owns one freshly opened connection; it is never shared or
/// returned to a pool while a lock may be outstanding on it.
#[derive(Debug, Clone)]
pub struct PgAdvisoryLocks {
    db: Database,
}

impl PgAdvisoryLocks {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LockCoordinator for PgAdvisoryLocks {
    async fn open_session(&self) -> Result<Box<dyn LockSession>, LockError> {
        let conn = self.db.connect().await?;
        Ok(Box::new(PgLockSession {
            db: self.db.clone(),
            conn: Some(conn),
        }))
    }
}

struct PgLockSession {
    db: Database,
    conn: Option<PgConnection>,
}

#[async_trait]
impl LockSession for PgLockSession {
    async fn try_acquire(&mut self, key: LockKey) -> Result<bool, LockError> {
        let conn = self.conn.as_mut().ok_or(LockError::Closed)?;
        let acquired = self
            .db
            .bounded(
                "pg_try_advisory_lock",
                sqlx::query_scalar::<_, bool>("SELECT pg_try_advisory_lock($1)")
                    .bind(key.as_i64())
                    .fetch_one(&mut *conn),
            )
            .await?;
        Ok(acquired)
    }

    async fn release(&mut self, key: LockKey) -> Result<bool, LockError> {
        let conn = self.conn.as_mut().ok_or(LockError::Closed)?;
        let released = self
            .db
            .bounded(
                "pg_advisory_unlock",
                sqlx::query_scalar::<_, bool>("SELECT pg_advisory_unlock($1)")
                    .bind(key.as_i64())
                    .fetch_one(&mut *conn),
            )
            .await?;
        Ok(released)
    }

    async fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.db.release(conn).await;
            debug!("lock session closed");
        }
    }
}
