use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Concurrency gate capping the number of in-flight calls.
///
/// Wraps a counting semaphore and tracks the current number of permit
/// holders plus the running high-water mark, so a run can report the peak
/// concurrency it actually reached.
pub struct Gate {
    capacity: u64,
    semaphore: Arc<Semaphore>,
    gauge: Arc<GateGauge>,
}

#[derive(Default)]
struct GateGauge {
    current: AtomicU64,
    peak: AtomicU64,
}

impl Gate {
    /// Create a gate with `capacity` permits. Capacity must be at least 1.
    pub fn new(capacity: u64) -> Result<Self> {
        if capacity == 0 {
            anyhow::bail!("concurrency limit must be at least 1");
        }

        Ok(Self {
            capacity,
            semaphore: Arc::new(Semaphore::new(capacity as usize)),
            gauge: Arc::new(GateGauge::default()),
        })
    }

    /// Wait until a permit is free and take it. The permit returns to the
    /// pool when the returned guard drops, on every exit path.
    pub async fn admit(&self) -> GatePermit {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .expect("gate semaphore is never closed");

        let holders = self.gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.gauge.peak.fetch_max(holders, Ordering::SeqCst);

        GatePermit {
            gauge: self.gauge.clone(),
            _permit: permit,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of permits held right now.
    pub fn in_flight(&self) -> u64 {
        self.gauge.current.load(Ordering::SeqCst)
    }

    /// Highest number of permits held simultaneously since construction.
    pub fn peak_in_flight(&self) -> u64 {
        self.gauge.peak.load(Ordering::SeqCst)
    }
}

/// Guard for one admitted slot.
pub struct GatePermit {
    gauge: Arc<GateGauge>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        self.gauge.current.fetch_sub(1, Ordering::SeqCst);
    }
}
