//! Per-statement serialization of reconciliations

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of one async lock per statement.
///
/// Completions against the same statement run one at a time; completions
/// against different statements do not block each other.
#[derive(Debug, Default)]
pub struct StatementLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl StatementLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a statement
    pub async fn acquire(&self, statement_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop locks nobody holds or waits on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(statement_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Number of statements currently tracked
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_statement_is_exclusive() {
        let locks = Arc::new(StatementLocks::new());
        let guard = locks.acquire("stmt1").await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire("stmt1").await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_statements_do_not_block() {
        let locks = StatementLocks::new();
        let _first = locks.acquire("stmt1").await;
        let _second = locks.acquire("stmt2").await;
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn test_released_locks_are_pruned() {
        let locks = StatementLocks::new();
        drop(locks.acquire("stmt1").await);
        drop(locks.acquire("stmt2").await);
        let _guard = locks.acquire("stmt3").await;
        assert_eq!(locks.len(), 1);
    }
}
