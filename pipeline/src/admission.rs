use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::trace;

use crate::model::GenericError;

/// Bounds the number of concurrently executing pipeline runs. Once the
/// bound is reached, `acquire` suspends the caller until a slot frees
/// (backpressure instead of unbounded queuing). Admission order is not
/// FIFO: any blocked caller may proceed once a slot frees.
#[derive(Clone)]
pub struct AdmissionController {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

/// Held for the lifetime of one pipeline run. The slot frees exactly once,
/// on drop, which also covers early returns and caller cancellation — a
/// cancelled `acquire` grants nothing and releases nothing.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionController {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub async fn acquire(&self) -> Result<AdmissionPermit, GenericError> {
        let permit = Arc::clone(&self.semaphore).acquire_owned().await?;
        trace!(
            "Admission granted, {} of {} slots free",
            self.semaphore.available_permits(),
            self.max_concurrent
        );

        Ok(AdmissionPermit { _permit: permit })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }
}
