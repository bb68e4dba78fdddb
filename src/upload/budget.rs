//! Concurrency budget for chunk uploads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Limits the number of chunk uploads in flight.
///
/// Each upload holds a [`BudgetPermit`] for its whole lifetime; dropping
/// the permit returns the slot. Acquisition waits for a free slot but gives
/// up as soon as the cancellation token fires.
#[derive(Debug, Clone)]
pub struct UploadBudget {
    max_concurrent: usize,
    semaphore: Arc<Semaphore>,
    counters: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl UploadBudget {
    /// Creates a budget with the given number of slots (at least one).
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            max_concurrent,
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Returns the number of slots.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Returns the number of permits currently held.
    pub fn active_count(&self) -> usize {
        self.counters.active.load(Ordering::Acquire)
    }

    /// Returns the highest number of permits held at the same time.
    pub fn peak_count(&self) -> usize {
        self.counters.peak.load(Ordering::Acquire)
    }

    /// Returns true if every slot is taken.
    pub fn is_full(&self) -> bool {
        self.semaphore.available_permits() == 0
    }

    /// Waits for a free slot.
    ///
    /// Returns `None` if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Option<BudgetPermit> {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok()?,
        };

        let active = self.counters.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.counters.peak.fetch_max(active, Ordering::AcqRel);

        Some(BudgetPermit {
            _permit: permit,
            counters: Arc::clone(&self.counters),
        })
    }
}

impl Default for UploadBudget {
    fn default() -> Self {
        Self::new(crate::core::config::DEFAULT_FILE_UPLOAD_CONCURRENCY)
    }
}

/// A held upload slot. Released on drop.
#[derive(Debug)]
pub struct BudgetPermit {
    _permit: OwnedSemaphorePermit,
    counters: Arc<Counters>,
}

impl Drop for BudgetPermit {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_budget_minimum() {
        let budget = UploadBudget::new(0);
        assert_eq!(budget.max_concurrent(), 1);
        assert_eq!(budget.active_count(), 0);
        assert!(!budget.is_full());
    }

    #[tokio::test]
    async fn test_acquire_and_release() {
        let budget = UploadBudget::new(2);
        let cancel = CancellationToken::new();

        let a = budget.acquire(&cancel).await.unwrap();
        let b = budget.acquire(&cancel).await.unwrap();
        assert_eq!(budget.active_count(), 2);
        assert!(budget.is_full());

        drop(a);
        assert_eq!(budget.active_count(), 1);
        assert!(!budget.is_full());

        drop(b);
        assert_eq!(budget.active_count(), 0);
        assert_eq!(budget.peak_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_budget_observes_cancellation() {
        let budget = UploadBudget::new(1);
        let cancel = CancellationToken::new();
        let _held = budget.acquire(&cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            trigger.cancel();
        });

        assert!(budget.acquire(&cancel).await.is_none());
        assert_eq!(budget.active_count(), 1);
    }
}
