//! The public surface of this crate: `ingest_channel` for producers,
//! `fetch` for readers.

use std::sync::Arc;

use tokio::sync::{mpsc, OnceCell};

use crate::aggregate::Aggregation;
use crate::batch::BatchReceiver;
use crate::config::{StoreConfig, BATCH_TIMEOUT};
use crate::dedup::RollupDedup;
use crate::error::FetchError;
use crate::fetch::{self, FetchResult};
use crate::ingest;
use crate::prepared_cache::PreparedCache;
use crate::sample::Sample;
use crate::session::Session;

/// Ties a [`Session`] to the process-wide state the ingest/fetch paths
/// share: the prepared-statement cache and the rollup-dedup map. Both live
/// as long as the `Store` does; there is no global/singleton state.
#[derive(Debug)]
pub struct Store<S: Session> {
    session: Arc<S>,
    prepared: Arc<PreparedCache<S>>,
    dedup: Arc<RollupDedup>,
    chan_size: usize,
    batch_size: usize,
    sender: OnceCell<mpsc::Sender<Sample>>,
}

impl<S> Store<S>
where
    S: Session + 'static,
{
    /// Build a store around an already-connected session. Construction
    /// does not spawn the ingest worker; that happens lazily on the first
    /// call to [`Store::ingest_channel`].
    pub fn new(session: S, config: &StoreConfig) -> Self {
        Self {
            session: Arc::new(session),
            prepared: Arc::new(PreparedCache::new()),
            dedup: Arc::new(RollupDedup::new()),
            chan_size: config.chan_size,
            batch_size: config.batch_size,
            sender: OnceCell::new(),
        }
    }

    /// Returns the producer-side of the ingest channel, spawning the
    /// ingest worker on first call. Every call after the first returns a
    /// clone of the same sender (and thus the same worker).
    pub async fn ingest_channel(&self) -> mpsc::Sender<Sample> {
        self.sender
            .get_or_init(|| async {
                let (tx, rx) = mpsc::channel(self.chan_size);
                let batches = BatchReceiver::new(rx, self.batch_size, BATCH_TIMEOUT);
                tokio::spawn(ingest::run(
                    Arc::clone(&self.session),
                    Arc::clone(&self.prepared),
                    Arc::clone(&self.dedup),
                    batches,
                ));
                tx
            })
            .await
            .clone()
    }

    /// Runs a contiguous-range read at a fixed resolution and reduces it
    /// with `method`. `tenant` is accepted for forward compatibility but is
    /// currently always the empty string.
    #[allow(clippy::too_many_arguments)]
    pub async fn fetch(
        &self,
        method: Aggregation,
        table: &str,
        paths: &[String],
        _tenant: &str,
        rollup: i64,
        period: i64,
        from: i64,
        to: i64,
    ) -> Result<FetchResult, FetchError> {
        fetch::fetch(
            self.session.as_ref(),
            self.prepared.as_ref(),
            method,
            table,
            paths,
            rollup,
            period,
            from,
            to,
        )
        .await
    }
}
