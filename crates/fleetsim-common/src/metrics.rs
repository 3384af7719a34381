//! ---
//! fleet_section: "01-core-functionality"
//! fleet_subsection: "module"
//! fleet_type: "source"
//! fleet_scope: "code"
//! fleet_description: "Shared primitives and utilities for the generator runtime."
//! fleet_version: "v0.1.0"
//! fleet_owner: "tbd"
//! ---
use std::collections::VecDeque;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

const DEFAULT_SAMPLE_CAPACITY: usize = 4_096;

/// Rolling window of tick jitter samples, in milliseconds.
#[derive(Debug)]
pub struct JitterHistogram {
    capacity: usize,
    samples: Mutex<VecDeque<f64>>,
}

impl Default for JitterHistogram {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_SAMPLE_CAPACITY)
    }
}

impl JitterHistogram {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn record(&self, jitter: Duration) {
        let mut samples = self.samples.lock();
        if samples.len() == self.capacity {
            samples.pop_front();
        }
        samples.push_back(jitter.as_secs_f64() * 1_000.0);
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    pub fn summary(&self) -> Option<JitterSummary> {
        let samples = self.samples.lock();
        if samples.is_empty() {
            return None;
        }
        let count = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / count;
        let variance = if samples.len() > 1 {
            samples
                .iter()
                .map(|value| (value - mean) * (value - mean))
                .sum::<f64>()
                / (count - 1.0)
        } else {
            0.0
        };
        Some(JitterSummary {
            mean_ms: mean,
            std_dev_ms: variance.sqrt(),
            max_ms: samples.iter().copied().fold(f64::MIN, f64::max),
            min_ms: samples.iter().copied().fold(f64::MAX, f64::min),
            samples: samples.len() as u64,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JitterSummary {
    pub mean_ms: f64,
    pub std_dev_ms: f64,
    pub max_ms: f64,
    pub min_ms: f64,
    pub samples: u64,
}

/// Measures the spacing between consecutive ticks against the configured period.
#[derive(Debug)]
pub struct LoopTimingReporter {
    target_interval: Duration,
    last_tick: Mutex<Option<Instant>>,
    histogram: JitterHistogram,
}

impl LoopTimingReporter {
    pub fn new(target_interval: Duration) -> Self {
        Self {
            target_interval,
            last_tick: Mutex::new(None),
            histogram: JitterHistogram::default(),
        }
    }

    /// Record a tick observed at `now` and return the absolute deviation from
    /// the target period. The first tick has nothing to compare against and returns `None`.
    pub fn record_tick_at(&self, now: Instant) -> Option<Duration> {
        let mut last_tick = self.last_tick.lock();
        let jitter = last_tick.map(|previous| {
            let actual = now.saturating_duration_since(previous);
            if actual > self.target_interval {
                actual - self.target_interval
            } else {
                self.target_interval - actual
            }
        });
        if let Some(jitter) = jitter {
            self.histogram.record(jitter);
        }
        *last_tick = Some(now);
        jitter
    }

    pub fn histogram(&self) -> &JitterHistogram {
        &self.histogram
    }
}
