//! Turns a stream of individual samples into batches, emitting one whenever
//! either the size or the wait threshold fires. This is the only flow
//! control between producers and the database: the channel feeding this
//! receiver is bounded, so producers block once it fills.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::sample::Sample;

pub(crate) struct BatchReceiver {
    rx: mpsc::Receiver<Sample>,
    batch_size: usize,
    batch_timeout: Duration,
}

impl BatchReceiver {
    pub(crate) fn new(rx: mpsc::Receiver<Sample>, batch_size: usize, batch_timeout: Duration) -> Self {
        Self {
            rx,
            batch_size,
            batch_timeout,
        }
    }

    /// Waits for the first sample, then keeps collecting (preserving
    /// arrival order) until the batch reaches `batch_size` or
    /// `batch_timeout` has elapsed since the first sample arrived.
    /// Returns `None` once the channel is closed and drained.
    pub(crate) async fn next_batch(&mut self) -> Option<Vec<Sample>> {
        let first = self.rx.recv().await?;

        let mut batch = Vec::with_capacity(self.batch_size);
        batch.push(first);

        let deadline = Instant::now() + self.batch_timeout;
        while batch.len() < self.batch_size {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match tokio::time::timeout(remaining, self.rx.recv()).await {
                Ok(Some(sample)) => batch.push(sample),
                Ok(None) => break,
                Err(_elapsed) => break,
            }
        }

        Some(batch)
    }
}
