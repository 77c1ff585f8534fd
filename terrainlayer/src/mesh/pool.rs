//! Bounded worker pool for mesh generation.
//!
//! Tessellation runs on the rayon thread pool. The number of jobs in flight
//! is capped by a semaphore; when no permit is free the caller is told to
//! come back later instead of queueing behind other tiles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Default cap on concurrent transforms: one per available core.
pub fn default_max_active_transforms() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}

/// Semaphore-gated access to the rayon pool.
#[derive(Debug)]
pub struct TransformPool {
    semaphore: Arc<Semaphore>,
    max_active: usize,
    active: Arc<AtomicUsize>,
}

impl TransformPool {
    pub fn new(max_active: usize) -> Self {
        tracing::debug!(max_active, "Created transform pool");
        Self {
            semaphore: Arc::new(Semaphore::new(max_active)),
            max_active,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_max_active_transforms())
    }

    /// Reserves a worker slot if one is free.
    pub fn try_acquire(&self) -> Option<TransformPermit> {
        let permit = Arc::clone(&self.semaphore).try_acquire_owned().ok()?;
        self.active.fetch_add(1, Ordering::AcqRel);
        Some(TransformPermit {
            _permit: permit,
            active: Arc::clone(&self.active),
        })
    }

    /// Runs `compute` on the rayon pool, then hands its result to `on_complete`.
    ///
    /// The permit is released before `on_complete` runs.
    pub fn spawn<T, C, F>(&self, permit: TransformPermit, compute: C, on_complete: F)
    where
        T: Send + 'static,
        C: FnOnce() -> T + Send + 'static,
        F: FnOnce(T) + Send + 'static,
    {
        rayon::spawn(move || {
            let output = compute();
            drop(permit);
            on_complete(output);
        });
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for TransformPool {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// A reserved worker slot, released on drop.
#[derive(Debug)]
pub struct TransformPermit {
    _permit: OwnedSemaphorePermit,
    active: Arc<AtomicUsize>,
}

impl Drop for TransformPermit {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}
