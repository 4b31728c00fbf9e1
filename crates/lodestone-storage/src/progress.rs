//! Shared upload progress accounting.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::ProgressFn;

/// Minimum interval between intermediate progress callbacks.
const MIN_FIRE_INTERVAL: Duration = Duration::from_millis(200);

struct ReporterState {
    done: u64,
    last_fire: Option<Instant>,
}

/// Cumulative byte counter that throttles a progress callback.
///
/// Callers `add` bytes as parts of the upload complete; the callback fires at
/// most every 200 ms. `flush` fires unconditionally so completion is always
/// reported exactly once.
pub struct ProgressReporter {
    total: u64,
    callback: ProgressFn,
    state: Mutex<ReporterState>,
}

impl ProgressReporter {
    /// Create a reporter for `total` expected bytes. Immediately reports a
    /// zero sample so observers see the upload begin.
    #[must_use]
    pub fn new(total: u64, callback: ProgressFn) -> Self {
        callback(0, total);
        Self {
            total,
            callback,
            state: Mutex::new(ReporterState {
                done: 0,
                last_fire: Some(Instant::now()),
            }),
        }
    }

    /// Account `bytes` more completed; fires the callback when the throttle
    /// window has elapsed.
    pub fn add(&self, bytes: u64) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.done = state.done.saturating_add(bytes);
        let now = Instant::now();
        let due = state
            .last_fire
            .is_none_or(|last| now.duration_since(last) >= MIN_FIRE_INTERVAL);
        if due {
            state.last_fire = Some(now);
            (self.callback)(state.done, self.total);
        }
    }

    /// Report the final tally regardless of the throttle window.
    pub fn flush(&self) {
        let Ok(state) = self.state.lock() else {
            return;
        };
        (self.callback)(state.done, self.total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn reports_zero_sample_on_construction() {
        let calls = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&calls);
        let reporter = ProgressReporter::new(
            100,
            Arc::new(move |done, total| {
                seen.fetch_add(1, Ordering::SeqCst);
                assert!(done <= total);
            }),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        drop(reporter);
    }

    #[test]
    fn throttles_intermediate_reports() {
        let calls = Arc::new(AtomicU64::new(0));
        let seen = Arc::clone(&calls);
        let reporter = ProgressReporter::new(
            1000,
            Arc::new(move |_, _| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        );
        // All adds land inside the 200 ms window opened at construction.
        for _ in 0..50 {
            reporter.add(10);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn flush_always_fires_with_final_tally() {
        let last = Arc::new(AtomicU64::new(u64::MAX));
        let seen = Arc::clone(&last);
        let reporter = ProgressReporter::new(
            30,
            Arc::new(move |done, total| {
                assert_eq!(total, 30);
                seen.store(done, Ordering::SeqCst);
            }),
        );
        reporter.add(10);
        reporter.add(20);
        reporter.flush();
        assert_eq!(last.load(Ordering::SeqCst), 30);
    }

    #[test]
    fn zero_total_reports_bytes_only() {
        let totals = Arc::new(AtomicU64::new(u64::MAX));
        let seen = Arc::clone(&totals);
        let reporter = ProgressReporter::new(
            0,
            Arc::new(move |_, total| {
                seen.store(total, Ordering::SeqCst);
            }),
        );
        reporter.add(5);
        reporter.flush();
        assert_eq!(totals.load(Ordering::SeqCst), 0);
    }
}
