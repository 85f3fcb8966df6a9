//! Tick sources.
//!
//! The engine never reads a clock. Something outside calls `tick(now)`; a
//! [`TickSource`] is the injectable thing that decides when and with which `now`.
//! [`FixedStep`] produces evenly spaced timestamps with no waiting, for tests and
//! offline simulation. [`IntervalTicks`] follows the wall clock at a fixed cadence
//! and stops when a shared flag is cleared (e.g. from a Ctrl+C handler).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Produces tick timestamps in milliseconds.
pub trait TickSource {
    /// Timestamp of the next tick, or `None` when the source is exhausted.
    fn next_tick(&mut self) -> Option<f64>;
}

/// Evenly spaced timestamps, optionally limited to a number of ticks.
///
/// ```rust
/// use motus_engine::{FixedStep, TickSource};
///
/// let mut ticks = FixedStep::new(0.0, 16.0).limit(3);
/// assert_eq!(ticks.next_tick(), Some(0.0));
/// assert_eq!(ticks.next_tick(), Some(16.0));
/// assert_eq!(ticks.next_tick(), Some(32.0));
/// assert_eq!(ticks.next_tick(), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FixedStep {
    start_ms: f64,
    step_ms: f64,
    index: u64,
    remaining: Option<u64>,
}

impl FixedStep {
    /// Unbounded ticks from `start_ms` every `step_ms` (non-positive steps become 1 ms).
    pub fn new(start_ms: f64, step_ms: f64) -> Self {
        Self {
            start_ms: if start_ms.is_finite() { start_ms } else { 0.0 },
            step_ms: if step_ms.is_finite() && step_ms > 0.0 { step_ms } else { 1.0 },
            index: 0,
            remaining: None,
        }
    }

    /// Stop after `ticks` more ticks.
    pub fn limit(mut self, ticks: u64) -> Self {
        self.remaining = Some(ticks);
        self
    }
}

impl TickSource for FixedStep {
    fn next_tick(&mut self) -> Option<f64> {
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }
        // Multiply rather than accumulate so long runs do not drift.
        let now = self.start_ms + self.index as f64 * self.step_ms;
        self.index += 1;
        Some(now)
    }
}

/// Wall-clock ticks at a fixed cadence.
///
/// Timestamps are milliseconds since the first tick. Each call sleeps until the
/// next deadline; a late tick does not trigger catch-up bursts.
#[derive(Debug)]
pub struct IntervalTicks {
    interval: Duration,
    started: Option<Instant>,
    next_deadline: Option<Instant>,
    running: Arc<AtomicBool>,
    remaining: Option<u64>,
}

impl IntervalTicks {
    /// Ticks every `interval_ms` until `running` is cleared.
    pub fn new(interval_ms: f64, running: Arc<AtomicBool>) -> Self {
        let interval_ms = if interval_ms.is_finite() && interval_ms > 0.0 {
            interval_ms
        } else {
            16.0
        };
        Self {
            interval: Duration::from_secs_f64(interval_ms / 1000.0),
            started: None,
            next_deadline: None,
            running,
            remaining: None,
        }
    }

    /// Stop after `ticks` more ticks.
    pub fn limit(mut self, ticks: u64) -> Self {
        self.remaining = Some(ticks);
        self
    }

    /// The stop flag.
    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }
}

impl TickSource for IntervalTicks {
    fn next_tick(&mut self) -> Option<f64> {
        if !self.running.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(remaining) = &mut self.remaining {
            if *remaining == 0 {
                return None;
            }
            *remaining -= 1;
        }

        if let Some(deadline) = self.next_deadline {
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }
        let tick_at = Instant::now();
        // The first tick defines zero.
        let started = *self.started.get_or_insert(tick_at);
        let next = self
            .next_deadline
            .map_or(tick_at + self.interval, |d| (d + self.interval).max(tick_at));
        self.next_deadline = Some(next);

        if !self.running.load(Ordering::SeqCst) {
            return None;
        }
        Some(tick_at.duration_since(started).as_secs_f64() * 1000.0)
    }
}
