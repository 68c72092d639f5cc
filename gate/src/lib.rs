//! The Serialization Gate (C2): a process-wide, single-holder mutex with a
//! timed, FIFO-fair acquire.
//!
//! Every write path (ingest, rollback) acquires the gate before touching the
//! store and releases it once its effects are committed. Reads (balance
//! queries) never go through the gate.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Semaphore, SemaphorePermit};

/// Errors the gate can return.
#[derive(Debug, Error)]
pub enum GateError {
    /// The TTL elapsed before this caller reached the front of the queue and
    /// acquired the gate.
    #[error("timed out waiting to acquire the serialization gate")]
    Timeout,
}

/// A single-holder, FIFO-fair mutex with a bounded-wait acquire.
///
/// Backed by a `tokio::sync::Semaphore` with one permit: acquiring the
/// permit *is* taking the lock, and the semaphore already wakes waiters in
/// the order they called `acquire`.
pub struct SerializationGate {
    semaphore: Semaphore,
}

impl Default for SerializationGate {
    fn default() -> Self {
        Self::new()
    }
}

impl SerializationGate {
    pub fn new() -> Self {
        SerializationGate {
            semaphore: Semaphore::new(1),
        }
    }

    /// Waits up to `ttl` to become the sole holder. Returns a guard that
    /// releases the gate when dropped; dropping it is the only supported
    /// release, so release is inherently idempotent-safe.
    pub async fn acquire(&self, ttl: Duration) -> Result<GateGuard<'_>, GateError> {
        match tokio::time::timeout(ttl, self.semaphore.acquire()).await {
            Ok(Ok(permit)) => Ok(GateGuard { _permit: permit }),
            Ok(Err(_)) => unreachable!("SerializationGate semaphore is never closed"),
            Err(_) => Err(GateError::Timeout),
        }
    }
}

/// Holds the gate. The gate is released when this guard is dropped.
pub struct GateGuard<'a> {
    _permit: SemaphorePermit<'a>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn second_acquire_waits_for_first_release() {
        let gate = Arc::new(SerializationGate::new());
        let first = gate.acquire(Duration::from_millis(500)).await.unwrap();

        let gate2 = gate.clone();
        let (tx, rx) = tokio::sync::oneshot::channel();
        let waiter = tokio::spawn(async move {
            let result = gate2.acquire(Duration::from_millis(500)).await;
            let _ = tx.send(result.is_ok());
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(first);

        assert!(rx.await.unwrap());
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn acquire_times_out_while_held() {
        let gate = SerializationGate::new();
        let _first = gate.acquire(Duration::from_secs(5)).await.unwrap();
        let result = gate.acquire(Duration::from_millis(20)).await;
        assert!(matches!(result, Err(GateError::Timeout)));
    }

    #[tokio::test]
    async fn waiters_are_served_in_fifo_order() {
        let gate = Arc::new(SerializationGate::new());
        let first = gate.acquire(Duration::from_secs(5)).await.unwrap();

        let order = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let mut handles = Vec::new();
        for i in 0..3 {
            let gate = gate.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _guard = gate.acquire(Duration::from_secs(5)).await.unwrap();
                order.lock().await.push(i);
            }));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        drop(first);
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(*order.lock().await, vec![0, 1, 2]);
    }
}
