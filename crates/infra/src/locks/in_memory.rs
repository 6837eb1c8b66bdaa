//! Process-local advisory locks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use scanfleet_core::LockKey;

use super::{LockCoordinator, LockError, LockSession};

#[derive(Debug, Clone, Copy)]
struct Holder {
    session: u64,
    depth: u32,
}

type Table = Arc<Mutex<HashMap<LockKey, Holder>>>;

fn lock_table(table: &Table) -> MutexGuard<'_, HashMap<LockKey, Holder>> {
    table.lock().unwrap_or_else(|e| e.into_inner())
}

/// Process-local lock table with the same session semantics as Postgres
/// advisory locks: reentrant per session, released when the session goes away.
///
/// Used in offline mode and in tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryLocks {
    table: Table,
    next_session: Arc<AtomicU64>,
}

impl InMemoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held by any session.
    pub fn held(&self) -> usize {
        lock_table(&self.table).len()
    }

    pub fn is_held(&self, key: LockKey) -> bool {
        lock_table(&self.table).contains_key(&key)
    }
}

#[async_trait]
impl LockCoordinator for InMemoryLocks {
    async fn open_session(&self) -> Result<Box<dyn LockSession>, LockError> {
        let id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(Box::new(InMemorySession {
            id,
            table: self.table.clone(),
            closed: false,
        }))
    }
}

struct InMemorySession {
    id: u64,
    table: Table,
    closed: bool,
}

impl InMemorySession {
    fn release_all(&mut self) {
        let id = self.id;
        lock_table(&self.table).retain(|_, holder| holder.session != id);
    }
}

#[async_trait]
impl LockSession for InMemorySession {
    async fn try_acquire(&mut self, key: LockKey) -> Result<bool, LockError> {
        if self.closed {
            return Err(LockError::Closed);
        }
        let mut table = lock_table(&self.table);
        match table.get_mut(&key) {
            Some(holder) if holder.session == self.id => {
                holder.depth += 1;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => {
                table.insert(
                    key,
                    Holder {
                        session: self.id,
                        depth: 1,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn release(&mut self, key: LockKey) -> Result<bool, LockError> {
        if self.closed {
            return Err(LockError::Closed);
        }
        let mut table = lock_table(&self.table);
        match table.get_mut(&key) {
            Some(holder) if holder.session == self.id => {
                holder.depth -= 1;
                if holder.depth == 0 {
                    table.remove(&key);
                }
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close(&mut self) {
        if !self.closed {
            self.release_all();
            self.closed = true;
        }
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.release_all();
    }
}
