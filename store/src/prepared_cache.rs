//! Maps exact statement text to a prepared handle, preparing lazily on
//! first use.
//!
//! Concurrent first-prepare races are acceptable: two callers can both miss
//! the cache for the same text, both prepare, and both insert — the second
//! insert simply overwrites the first with an equally-valid handle. Nothing
//! here needs to coordinate around that, which is what keeps the read path
//! lock-free in the common (already-cached) case.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::error::SessionError;
use crate::session::Session;

#[derive(Debug)]
pub(crate) struct PreparedCache<S: Session> {
    entries: RwLock<HashMap<String, S::Prepared>>,
}

impl<S: Session> PreparedCache<S> {
    pub(crate) fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(crate) async fn prepare(&self, session: &S, sql: &str) -> Result<S::Prepared, SessionError> {
        if let Some(prepared) = self.entries.read().get(sql) {
            return Ok(prepared.clone());
        }

        let prepared = session.prepare(sql).await?;
        self.entries.write().insert(sql.to_string(), prepared.clone());
        Ok(prepared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSession;

    #[tokio::test]
    async fn second_prepare_of_the_same_text_does_not_round_trip() {
        let session = MockSession::new();
        let cache = PreparedCache::new();

        let sql = "SELECT 1";
        let first = cache.prepare(&session, sql).await.unwrap();
        let second = cache.prepare(&session, sql).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(session.prepare_count(), 1);
    }

    #[tokio::test]
    async fn distinct_text_prepares_independently() {
        let session = MockSession::new();
        let cache = PreparedCache::new();

        cache.prepare(&session, "SELECT 1").await.unwrap();
        cache.prepare(&session, "SELECT 2").await.unwrap();

        assert_eq!(session.prepare_count(), 2);
    }
}
