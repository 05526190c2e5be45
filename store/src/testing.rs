//! An in-memory [`Session`] for exercising the ingest and fetch paths
//! without a real cluster. Mirrors the decorator-style mock sinks used
//! elsewhere in this codebase: it records every call it sees and plays back
//! canned responses queued up front.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::SessionError;
use crate::session::{BindValue, Consistency, Row, Session};

/// One recorded `execute` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub statement: String,
    pub values: Vec<BindValue>,
    pub consistency: Consistency,
}

#[derive(Debug, Default)]
struct MockState {
    prepare_calls: Vec<String>,
    calls: Vec<Call>,
    responses: HashMap<String, VecDeque<Vec<Row>>>,
    failures: HashMap<String, VecDeque<()>>,
    prepare_delay: Option<Duration>,
}

/// A [`Session`] whose "prepared handle" is just the statement text itself
/// — there is nothing to prepare against, so `prepare` is a no-op that
/// only exists to satisfy the trait and record that it was called.
#[derive(Debug, Default)]
pub struct MockSession {
    state: Mutex<MockState>,
}

impl MockSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response for the next `execute` against `statement`.
    /// Queuing more than one response for the same statement plays them
    /// back in FIFO order; unqueued statements default to an empty row
    /// set, which is the common case for writes.
    pub fn with_response(&self, statement: impl Into<String>, rows: Vec<Row>) -> &Self {
        self.state
            .lock()
            .responses
            .entry(statement.into())
            .or_default()
            .push_back(rows);
        self
    }

    /// Queue a failure for the next `execute` against `statement`: instead
    /// of a canned row set, it returns `SessionError::Execute`. Queued
    /// independently of `with_response`'s row queue so a statement can fail
    /// once and then succeed on a later call.
    pub fn with_execute_error(&self, statement: impl Into<String>) -> &Self {
        self.state
            .lock()
            .failures
            .entry(statement.into())
            .or_default()
            .push_back(());
        self
    }

    /// Make every future `prepare` call sleep for `delay` before resolving.
    /// Lets tests hold the ingest worker mid-batch to exercise the channel's
    /// backpressure deterministically under a paused clock.
    pub fn with_prepare_delay(&self, delay: Duration) -> &Self {
        self.state.lock().prepare_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn prepare_count(&self) -> usize {
        self.state.lock().prepare_calls.len()
    }
}

#[async_trait]
impl Session for MockSession {
    type Prepared = String;

    async fn prepare(&self, statement: &str) -> Result<String, SessionError> {
        let delay = {
            let mut state = self.state.lock();
            state.prepare_calls.push(statement.to_string());
            state.prepare_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(statement.to_string())
    }

    async fn execute(
        &self,
        prepared: &String,
        values: Vec<BindValue>,
        consistency: Consistency,
    ) -> Result<Vec<Row>, SessionError> {
        let mut state = self.state.lock();
        state.calls.push(Call {
            statement: prepared.clone(),
            values,
            consistency,
        });

        if let Some(queue) = state.failures.get_mut(prepared) {
            if queue.pop_front().is_some() {
                return Err(SessionError::Execute(Box::from(format!(
                    "mock execute failure for `{prepared}`"
                ))));
            }
        }

        Ok(state
            .responses
            .get_mut(prepared)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default())
    }
}
