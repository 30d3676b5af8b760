//! Bounded worker pool with per-item failure isolation.
//!
//! Every clone of a [`BatchRunner`] shares one width budget. The calling
//! thread always drains the queue itself and extra threads are spawned only
//! while the budget allows, so a `map` issued from inside a worker reuses the
//! remaining budget instead of opening a second pool.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;

pub const DEFAULT_WORKERS: usize = 4;

/// Work item that can name itself in log output
pub trait BatchItem: Send {
    fn label(&self) -> String;
}

impl BatchItem for PathBuf {
    fn label(&self) -> String {
        self.display().to_string()
    }
}

impl BatchItem for String {
    fn label(&self) -> String {
        self.clone()
    }
}

impl BatchItem for u32 {
    fn label(&self) -> String {
        self.to_string()
    }
}

#[derive(Debug)]
struct Budget {
    available: AtomicUsize,
}

impl Budget {
    /// Take up to `wanted` slots, returning how many were granted
    fn acquire(&self, wanted: usize) -> usize {
        if wanted == 0 {
            return 0;
        }
        match self
            .available
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current > 0).then(|| current - current.min(wanted))
            }) {
            Ok(previous) => previous.min(wanted),
            Err(_) => 0,
        }
    }

    fn release(&self, count: usize) {
        self.available.fetch_add(count, Ordering::AcqRel);
    }
}

struct SlotGuard<'a>(&'a Budget);

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.0.release(1);
    }
}

/// Bounded concurrent map used for both note and asset workloads
#[derive(Debug, Clone)]
pub struct BatchRunner {
    width: usize,
    budget: Arc<Budget>,
}

impl Default for BatchRunner {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl BatchRunner {
    pub fn new(width: usize) -> Self {
        let width = width.max(1);
        Self {
            width,
            budget: Arc::new(Budget {
                // The calling thread is the first worker
                available: AtomicUsize::new(width - 1),
            }),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Run `worker` over every item, at most `width` at a time.
    ///
    /// Results arrive in completion order. An item whose worker returns
    /// `Err` or panics is logged with its label and left out of the result;
    /// sibling items are unaffected.
    pub fn map<T, R, E, F>(&self, items: Vec<T>, worker: F) -> Vec<R>
    where
        T: BatchItem,
        R: Send,
        E: fmt::Display,
        F: Fn(T) -> Result<R, E> + Sync,
    {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        let queue = Mutex::new(VecDeque::from(items));
        let (tx, rx) = mpsc::channel();

        thread::scope(|scope| {
            let extra = self.budget.acquire(self.width.min(total) - 1);
            tracing::debug!("Batch of {} items on {} threads", total, extra + 1);

            for _ in 0..extra {
                let tx = tx.clone();
                let queue = &queue;
                let worker = &worker;
                let budget = &*self.budget;
                scope.spawn(move || {
                    let _slot = SlotGuard(budget);
                    drain(queue, worker, &tx);
                });
            }

            drain(&queue, &worker, &tx);
        });
        drop(tx);

        let results: Vec<R> = rx.into_iter().collect();
        if results.len() < total {
            tracing::warn!("{} of {} items failed", total - results.len(), total);
        }
        results
    }
}

fn drain<T, R, E, F>(queue: &Mutex<VecDeque<T>>, worker: &F, tx: &Sender<R>)
where
    T: BatchItem,
    E: fmt::Display,
    F: Fn(T) -> Result<R, E>,
{
    loop {
        let Some(item) = queue.lock().pop_front() else {
            break;
        };
        let label = item.label();

        match panic::catch_unwind(AssertUnwindSafe(|| worker(item))) {
            Ok(Ok(result)) => {
                // Receiver outlives every worker
                let _ = tx.send(result);
            }
            Ok(Err(err)) => tracing::warn!("Failed to process {}: {}", label, err),
            Err(payload) => {
                tracing::error!("Worker panicked on {}: {}", label, panic_message(&payload))
            }
        }
    }
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn track_peak(current: &AtomicUsize, peak: &AtomicUsize) {
        let now = current.fetch_add(1, Ordering::SeqCst) + 1;
        peak.fetch_max(now, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(10));
        current.fetch_sub(1, Ordering::SeqCst);
    }

    #[test]
    fn test_collects_every_successful_result() {
        let runner = BatchRunner::new(4);
        let mut results = runner.map((1..=20).collect::<Vec<u32>>(), |n| {
            Ok::<_, String>(n * 2)
        });
        results.sort_unstable();

        assert_eq!(results, (1..=20).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_batch() {
        let runner = BatchRunner::default();
        let results: Vec<u32> = runner.map(Vec::<u32>::new(), Ok::<_, String>);
        assert!(results.is_empty());
    }

    #[test]
    fn test_failures_are_isolated() {
        let runner = BatchRunner::new(3);
        let mut results = runner.map((1..=10).collect::<Vec<u32>>(), |n| {
            if n % 3 == 0 {
                Err(format!("{n} is divisible by three"))
            } else {
                Ok(n)
            }
        });
        results.sort_unstable();

        assert_eq!(results, vec![1, 2, 4, 5, 7, 8, 10]);
    }

    #[test]
    fn test_panics_are_isolated() {
        let runner = BatchRunner::new(2);
        let results = runner.map((1..=6).collect::<Vec<u32>>(), |n| {
            if n == 4 {
                panic!("boom");
            }
            Ok::<_, String>(n)
        });

        assert_eq!(results.len(), 5);
        assert!(!results.contains(&4));
    }

    #[test]
    fn test_width_bounds_concurrency() {
        let runner = BatchRunner::new(3);
        let current = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results = runner.map((0..24).collect::<Vec<u32>>(), |n| {
            track_peak(&current, &peak);
            Ok::<_, String>(n)
        });

        assert_eq!(results.len(), 24);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[test]
    fn test_nested_map_stays_within_width() {
        let runner = BatchRunner::new(4);
        let current = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);

        let results = runner.map((0..6).collect::<Vec<u32>>(), |outer| {
            let inner = runner.map((0..5).collect::<Vec<u32>>(), |n| {
                track_peak(&current, &peak);
                Ok::<_, String>(n)
            });
            Ok::<_, String>((outer, inner.len()))
        });

        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|(_, count)| *count == 5));
        assert!(peak.load(Ordering::SeqCst) <= 4);
    }

    #[test]
    fn test_budget_is_restored_after_batch() {
        let runner = BatchRunner::new(4);
        let _ = runner.map((0..8).collect::<Vec<u32>>(), Ok::<_, String>);

        assert_eq!(runner.budget.available.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_zero_width_runs_inline() {
        let runner = BatchRunner::new(0);
        assert_eq!(runner.width(), 1);

        let results = runner.map(vec!["a".to_string(), "b".to_string()], |s| {
            Ok::<_, String>(s.len())
        });
        assert_eq!(results, vec![1, 1]);
    }
}
