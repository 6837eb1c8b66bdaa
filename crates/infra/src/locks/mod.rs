//! Location locks shared across every emulator process.
//!
//! A [`LockCoordinator`] hands out [`LockSession`]s. Each session stands for
//! one dedicated connection; locks are scoped to the session that took them and
//! disappear when it is closed or dropped, so a crashed worker cannot strand a
//! location.

pub mod in_memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use scanfleet_core::LockKey;

use crate::db::DbError;

pub use in_memory::InMemoryLocks;
pub use postgres::PgAdvisoryLocks;

#[derive(Debug, Error)]
pub enum LockError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error("lock session already closed")]
    Closed,
}

/// Factory of lock sessions.
#[async_trait]
pub trait LockCoordinator: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn LockSession>, LockError>;
}

/// One connection's worth of advisory locks.
#[async_trait]
pub trait LockSession: Send {
    /// Non-blocking attempt. `Ok(false)` means someone else holds the key.
    async fn try_acquire(&mut self, key: LockKey) -> Result<bool, LockError>;

    /// Release a key held by this session. `Ok(false)` means it was not held.
    async fn release(&mut self, key: LockKey) -> Result<bool, LockError>;

    /// Close the session, dropping anything still held. Idempotent.
    async fn close(&mut self);
}

#[async_trait]
impl<C> LockCoordinator for Arc<C>
where
    C: LockCoordinator + ?Sized,
{
    async fn open_session(&self) -> Result<Box<dyn LockSession>, LockError> {
        (**self).open_session().await
    }
}
