//! # Panic history for supervised loops.
//!
//! Each caught panic is recorded as a [`Recovering`]; the [`Recoverings`]
//! history answers the frequency question behind the recovery budget ("has
//! this worker panicked N times within the last window?") and is trimmed
//! after every successful recovery so it stays bounded.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// A single recorded panic occurrence.
#[derive(Clone, Debug)]
pub struct Recovering {
    at: Instant,
    reason: String,
}

impl Recovering {
    /// When the panic was caught.
    pub fn at(&self) -> Instant {
        self.at
    }

    /// The panic message, or `"unknown panic"` for non-string payloads.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Bounded history of caught panics, newest last.
#[derive(Debug, Default)]
pub struct Recoverings {
    entries: VecDeque<Recovering>,
}

impl Recoverings {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a panic occurrence stamped with the current time.
    pub fn record(&mut self, reason: impl Into<String>) {
        self.entries.push_back(Recovering {
            at: Instant::now(),
            reason: reason.into(),
        });
    }

    /// The most recent occurrence.
    pub fn last(&self) -> Option<&Recovering> {
        self.entries.back()
    }

    /// True if at least `count` occurrences happened within the last `window`.
    pub fn frequency(&self, count: usize, window: Duration) -> bool {
        if count == 0 {
            return true;
        }
        let recent = self
            .entries
            .iter()
            .filter(|r| r.at.elapsed() <= window)
            .count();
        recent >= count
    }

    /// Keeps only the `keep` most recent occurrences.
    pub fn trim(&mut self, keep: usize) {
        while self.entries.len() > keep {
            self.entries.pop_front();
        }
    }

    /// Number of recorded occurrences.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
