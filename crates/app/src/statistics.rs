//! Distribution statistics — how long dispatch rounds and individual
//! components take.
//!
//! The dispatcher is the only writer. Readers take a [`StatisticsSnapshot`]
//! under a lock held only for the copy, so reading never stalls a round for
//! longer than that.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Running min / max / total over a series of durations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    count: u64,
    total: Duration,
    min: Duration,
    max: Duration,
}

impl Timing {
    fn record(&mut self, elapsed: Duration) {
        if self.count == 0 || elapsed < self.min {
            self.min = elapsed;
        }
        if elapsed > self.max {
            self.max = elapsed;
        }
        self.total += elapsed;
        self.count += 1;
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[must_use]
    pub fn min(&self) -> Duration {
        self.min
    }

    #[must_use]
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Mean duration, zero when nothing was recorded.
    #[must_use]
    pub fn average(&self) -> Duration {
        u32::try_from(self.count)
            .ok()
            .and_then(|count| self.total.checked_div(count))
            .unwrap_or_default()
    }
}

/// Duration expressed in fractional milliseconds.
#[must_use]
pub fn as_millis_f64(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Point-in-time copy of the statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatisticsSnapshot {
    pub rounds: Timing,
    pub items: Timing,
    /// Component that took the longest single delivery.
    pub max_item_name: String,
    /// Component currently handling an event and for how long.
    pub current_item: Option<(String, Duration)>,
}

#[derive(Debug, Default)]
struct Accumulators {
    rounds: Timing,
    items: Timing,
    max_item_name: String,
    round_started: Option<Instant>,
    current_item: Option<(String, Instant)>,
}

/// Accumulates per-round and per-component delivery times.
#[derive(Debug, Default)]
pub struct DistributionStatistics {
    inner: Mutex<Accumulators>,
}

impl DistributionStatistics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_round(&self) {
        self.lock().round_started = Some(Instant::now());
    }

    pub fn end_round(&self) {
        let mut inner = self.lock();
        if let Some(started) = inner.round_started.take() {
            inner.rounds.record(started.elapsed());
        }
    }

    pub fn start_item(&self, name: &str) {
        self.lock().current_item = Some((name.to_string(), Instant::now()));
    }

    pub fn end_item(&self) {
        let mut inner = self.lock();
        if let Some((name, started)) = inner.current_item.take() {
            let elapsed = started.elapsed();
            if inner.items.count == 0 || elapsed > inner.items.max {
                inner.max_item_name = name;
            }
            inner.items.record(elapsed);
        }
    }

    /// Zero the accumulators. An in-flight round or delivery still completes
    /// and is counted.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.rounds = Timing::default();
        inner.items = Timing::default();
        inner.max_item_name.clear();
    }

    /// The component being delivered to right now, and for how long.
    #[must_use]
    pub fn current_item(&self) -> Option<(String, Duration)> {
        self.lock()
            .current_item
            .as_ref()
            .map(|(name, started)| (name.clone(), started.elapsed()))
    }

    #[must_use]
    pub fn snapshot(&self) -> StatisticsSnapshot {
        let inner = self.lock();
        StatisticsSnapshot {
            rounds: inner.rounds,
            items: inner.items,
            max_item_name: inner.max_item_name.clone(),
            current_item: inner
                .current_item
                .as_ref()
                .map(|(name, started)| (name.clone(), started.elapsed())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Accumulators> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
