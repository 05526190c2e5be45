//! In-memory suppression of redundant rollup work for the same
//! `(path, rollup)` pair within one tier window.
//!
//! This is an optimization, not a correctness mechanism: a process restart
//! forgets all state here and may redo rollups that had already run. That's
//! fine because rollup writes are replacements (`SET data = ?`), so redoing
//! one is idempotent.

use std::collections::HashMap;

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub(crate) struct RollupDedup {
    next_eligible: Mutex<HashMap<String, i64>>,
}

impl RollupDedup {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// True when a rollup for `(path, rollup)` at wall-time `now` is
    /// permitted: either nothing has rolled yet, or the last roll's
    /// recorded next-eligible-time has already passed.
    pub(crate) fn should_roll(&self, path: &str, rollup: i64, now: i64) -> bool {
        match self.next_eligible.lock().get(&key(path, rollup)) {
            Some(&next) => now >= next,
            None => true,
        }
    }

    /// Record that a rollup for `(path, rollup)` ran at `now`; no further
    /// rollup for this pair is eligible until `now + rollup`.
    pub(crate) fn mark_rolled(&self, path: &str, rollup: i64, now: i64) {
        self.next_eligible
            .lock()
            .insert(key(path, rollup), now + rollup);
    }
}

fn key(path: &str, rollup: i64) -> String {
    format!("{path}{rollup}")
}
