//! Soft per-caller rate tracking.
//!
//! Counts webhook hits per source address in a sliding window and warns once
//! when the threshold is crossed. Observability only; nothing is ever
//! dropped.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

const WINDOW: Duration = Duration::from_secs(60);
const THRESHOLD: u32 = 120;

/// Capacity at which stale windows get pruned.
const PRUNE_AT: usize = 1024;

pub struct RateTracker {
    window: Duration,
    threshold: u32,
    counters: Mutex<HashMap<String, (u32, Instant)>>,
}

impl Default for RateTracker {
    fn default() -> Self {
        Self::new(WINDOW, THRESHOLD)
    }
}

impl RateTracker {
    pub fn new(window: Duration, threshold: u32) -> Self {
        Self {
            window,
            threshold,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Record one hit for `key` and return the count in the current window.
    pub fn track(&self, key: &str) -> u32 {
        let now = Instant::now();
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());

        if counters.len() >= PRUNE_AT {
            let window = self.window;
            counters.retain(|_, (_, started)| now.duration_since(*started) < window);
        }

        let entry = counters.entry(key.to_string()).or_insert((0, now));
        if now.duration_since(entry.1) >= self.window {
            *entry = (0, now);
        }
        entry.0 += 1;

        if entry.0 == self.threshold {
            warn!("source {key} hit {} webhooks inside {:?}", entry.0, self.window);
        }

        entry.0
    }
}
