//! Bounded executor for decode, annotation and model inference.
//!
//! Admission is capped at `max_concurrency + queue_depth`; anything beyond
//! that fails fast with `PoolError::Saturated`. Admitted work waits for one
//! of `max_concurrency` permits and is bounded by the configured timeout,
//! queue wait included.
//!
//! Work started by [`InferencePool::run`] can hand its slot to a blocking
//! thread through [`Lease::current`]; the slot then stays taken until that
//! thread returns, even if the caller has already timed out.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("inference queue is full ({0} requests admitted)")]
    Saturated(usize),

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("inference worker failed: {0}")]
    Worker(String),

    #[error("inference pool is shut down")]
    Closed,
}

/// Decrements the admission counter when the admitted work completes or is dropped.
struct AdmissionGuard {
    admitted: Arc<AtomicUsize>,
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        self.admitted.fetch_sub(1, Ordering::AcqRel);
    }
}

struct LeaseInner {
    _permit: OwnedSemaphorePermit,
    _guard: AdmissionGuard,
}

/// Concurrency permit and admission slot held by work running under
/// [`InferencePool::run`]. Released when the last clone is dropped.
#[derive(Clone)]
pub struct Lease(Arc<LeaseInner>);

tokio::task_local! {
    static CURRENT_LEASE: Lease;
}

impl Lease {
    /// Lease of the enclosing `run` call, if any.
    pub fn current() -> Option<Lease> {
        CURRENT_LEASE.try_with(Lease::clone).ok()
    }
}

#[derive(Debug, Clone)]
pub struct InferencePool {
    semaphore: Arc<Semaphore>,
    admitted: Arc<AtomicUsize>,
    max_concurrency: usize,
    capacity: usize,
    timeout: Duration,
}

impl InferencePool {
    pub fn new(max_concurrency: usize, queue_depth: usize, timeout: Duration) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            admitted: Arc::new(AtomicUsize::new(0)),
            max_concurrency,
            capacity: max_concurrency + queue_depth,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Work currently running or waiting for a permit.
    pub fn in_flight(&self) -> usize {
        self.admitted.load(Ordering::Acquire)
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn admit(&self) -> Result<AdmissionGuard, PoolError> {
        let capacity = self.capacity;
        self.admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < capacity).then_some(n + 1)
            })
            .map_err(PoolError::Saturated)?;
        Ok(AdmissionGuard {
            admitted: self.admitted.clone(),
        })
    }

    /// Run an async model call under a permit. On timeout the future is
    /// dropped; clones of its [`Lease`] keep the slot until they drop too.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, PoolError>
    where
        F: Future<Output = T>,
    {
        let guard = self.admit()?;
        let semaphore = self.semaphore.clone();
        let work = async move {
            let permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| PoolError::Closed)?;
            let lease = Lease(Arc::new(LeaseInner {
                _permit: permit,
                _guard: guard,
            }));
            Ok(CURRENT_LEASE.scope(lease, fut).await)
        };
        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| PoolError::Timeout(self.timeout))?
    }

    /// Run CPU-bound work on the blocking pool under a permit.
    ///
    /// The permit and admission slot travel with the closure, so a timed-out
    /// caller stops waiting but the slot frees only when the work returns.
    pub async fn run_blocking<F, T>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let guard = self.admit()?;
        let semaphore = self.semaphore.clone();
        let work = async move {
            let permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| PoolError::Closed)?;
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let _guard = guard;
                f()
            })
            .await
            .map_err(|e| PoolError::Worker(e.to_string()))
        };
        tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| PoolError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn test_run_returns_output() {
        let pool = InferencePool::new(2, 2, Duration::from_secs(1));
        assert_eq!(pool.run(async { 7 }).await.unwrap(), 7);
        assert_eq!(pool.run_blocking(|| 8).await.unwrap(), 8);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out_and_releases_slot() {
        let pool = InferencePool::new(1, 0, Duration::from_secs(5));
        let err = pool
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout(_)));
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.run(async {}).await.is_ok());
    }

    #[tokio::test]
    async fn test_lease_visible_only_inside_run() {
        let pool = InferencePool::new(1, 0, Duration::from_secs(1));
        assert!(Lease::current().is_none());
        assert!(pool.run(async { Lease::current().is_some() }).await.unwrap());
    }

    #[tokio::test]
    async fn test_held_lease_outlives_timed_out_call() {
        let pool = InferencePool::new(1, 0, Duration::from_millis(20));
        let (lease_tx, lease_rx) = tokio::sync::oneshot::channel();

        let err = pool
            .run(async move {
                let _ = lease_tx.send(Lease::current());
                std::future::pending::<()>().await
            })
            .await
            .unwrap_err();
        assert!(matches!(err, PoolError::Timeout(_)));

        let lease = lease_rx.await.unwrap().unwrap();
        assert_eq!(pool.in_flight(), 1);
        assert!(matches!(
            pool.run(async {}).await.unwrap_err(),
            PoolError::Saturated(1)
        ));

        drop(lease);
        assert_eq!(pool.in_flight(), 0);
        assert!(pool.run(async {}).await.is_ok());
    }

    #[tokio::test]
    async fn test_saturation_fails_fast() {
        let pool = InferencePool::new(1, 1, Duration::from_secs(5));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let (started_tx, started_rx) = tokio::sync::oneshot::channel::<()>();

        let p1 = pool.clone();
        let first = tokio::spawn(async move {
            p1.run(async move {
                let _ = started_tx.send(());
                let _ = release_rx.await;
            })
            .await
        });
        started_rx.await.unwrap();

        // Second request queues behind the first.
        let p2 = pool.clone();
        let second = tokio::spawn(async move { p2.run(async { 2 }).await });
        while pool.in_flight() < 2 {
            tokio::task::yield_now().await;
        }

        let err = pool.run(async { 3 }).await.unwrap_err();
        assert!(matches!(err, PoolError::Saturated(2)));

        release_tx.send(()).unwrap();
        first.await.unwrap().unwrap();
        assert_eq!(second.await.unwrap().unwrap(), 2);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let pool = InferencePool::new(2, 100, Duration::from_secs(5));
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let pool = pool.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                pool.run_blocking(move || {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    running.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
