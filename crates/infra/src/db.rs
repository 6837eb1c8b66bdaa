//! Postgres connection factory.
//!
//! Every store read and every lock session gets its own connection, opened
//! on demand and closed when the call is done. There is deliberately no pool:
//! advisory locks are scoped to the connection that took them, and a pooled
//! connection could be handed to someone else while a lock is still held.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use thiserror::Error;
use tracing::warn;

use crate::config::StoreConfig;

/// Boxed query future borrowing a connection for `'c`.
pub type QueryFuture<'c, T> = Pin<Box<dyn Future<Output = Result<T, sqlx::Error>> + Send + 'c>>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("connect failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("{op} timed out")]
    Timeout { op: &'static str },

    #[error("{op} failed: {source}")]
    Query {
        op: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

/// Opens short-lived connections with a bounded wait.
#[derive(Clone)]
pub struct Database {
    options: PgConnectOptions,
    timeout: Duration,
}

impl core::fmt::Debug for Database {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Database")
            .field("host", &self.options.get_host())
            .field("database", &self.options.get_database())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Database {
    pub fn new(config: &StoreConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password)
            .application_name("scanfleet-emulator");

        Self {
            options,
            timeout: config.timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Open a fresh connection.
    pub async fn connect(&self) -> Result<PgConnection, DbError> {
        match tokio::time::timeout(self.timeout, PgConnection::connect_with(&self.options)).await {
            Ok(Ok(conn)) => Ok(conn),
            Ok(Err(e)) => Err(DbError::Connect(e)),
            Err(_) => Err(DbError::Timeout { op: "connect" }),
        }
    }

    /// Run a query future under the store timeout.
    pub async fn bounded<T, F>(&self, op: &'static str, query: F) -> Result<T, DbError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, query).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(DbError::Query { op, source }),
            Err(_) => Err(DbError::Timeout { op }),
        }
    }

    /// Open a connection, run `query` on it under the timeout, and close it
    /// again whatever the outcome.
    pub async fn with_connection<T, F>(&self, op: &'static str, query: F) -> Result<T, DbError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut PgConnection) -> QueryFuture<'c, T> + Send,
    {
        let mut conn = self.connect().await?;
        let result = self.bounded(op, query(&mut conn)).await;
        self.release(conn).await;
        result
    }

    /// Close a connection, logging instead of failing.
    ///
    /// A connection that cannot be closed cleanly is dropped, which tears
    /// down the socket and with it any session-level locks.
    pub async fn release(&self, conn: PgConnection) {
        match tokio::time::timeout(self.timeout, conn.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "closing store connection failed"),
            Err(_) => warn!("closing store connection timed out"),
        }
    }
}
