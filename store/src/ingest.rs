//! The ingest worker: consumes one batch at a time, writes the finest tier,
//! and kicks off rollups for every coarser tier.
//!
//! DB operations within a batch are not awaited by this loop — each write or
//! rollup-fetch/reduce/write chain runs as its own detached task so the
//! worker can move on to the next group, or the next batch, without
//! blocking on any single path's completion. A failure anywhere in that
//! chain is logged and otherwise invisible: it never stops the worker and
//! never affects any other path or tier.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::batch::BatchReceiver;
use crate::dedup::RollupDedup;
use crate::prepared_cache::PreparedCache;
use crate::query_templates;
use crate::sample::Sample;
use crate::session::{BindValue, Consistency, Session};

pub(crate) async fn run<S>(
    session: Arc<S>,
    prepared: Arc<PreparedCache<S>>,
    dedup: Arc<RollupDedup>,
    mut batches: BatchReceiver,
) where
    S: Session + 'static,
{
    while let Some(batch) = batches.next_batch().await {
        if batch.is_empty() {
            continue;
        }
        process_batch(&session, &prepared, &dedup, batch).await;
    }
    tracing::info!("ingest worker exiting: channel closed and drained");
}

async fn process_batch<S>(
    session: &Arc<S>,
    prepared: &Arc<PreparedCache<S>>,
    dedup: &Arc<RollupDedup>,
    batch: Vec<Sample>,
) where
    S: Session + 'static,
{
    let Some(finest) = batch.iter().min_by_key(|s| s.rollup) else {
        return;
    };
    let low_table = finest.table.clone();
    let low_rollup = finest.rollup;
    let low_period = finest.period;

    if batch
        .iter()
        .any(|s| s.rollup == low_rollup && s.table != low_table)
    {
        tracing::warn!(
            rollup = low_rollup,
            chosen_table = %low_table,
            "batch has more than one table at the finest rollup; normalizing to the first one seen"
        );
    }

    // Group by rollup, ascending. Group 0 (the smallest rollup) is the
    // finest tier and gets a raw write; every other group gets rolled up.
    let mut groups: BTreeMap<i64, Vec<Sample>> = BTreeMap::new();
    for sample in batch {
        groups.entry(sample.rollup).or_default().push(sample);
    }

    for (index, (_rollup, samples)) in groups.into_iter().enumerate() {
        if index == 0 {
            write_raw(session, prepared, samples).await;
        } else {
            roll_up_tier(
                session, prepared, dedup, samples, &low_table, low_rollup, low_period,
            )
            .await;
        }
    }
}

/// Writes group 0 (the finest tier) by appending each sample's metric onto
/// its `(path, time)` row. Non-finite metrics are dropped before binding;
/// everything else is fired off as its own task.
async fn write_raw<S>(session: &Arc<S>, prepared: &Arc<PreparedCache<S>>, samples: Vec<Sample>)
where
    S: Session + 'static,
{
    let mut by_table: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        by_table.entry(sample.table.clone()).or_default().push(sample);
    }

    for (table, samples) in by_table {
        let sql = query_templates::raw_insert(&table);
        let handle = match prepared.prepare(session, &sql).await {
            Ok(handle) => handle,
            Err(error) => {
                tracing::error!(%table, %error, "failed to prepare raw insert");
                continue;
            }
        };

        for sample in samples {
            if !sample.metric.is_finite() {
                tracing::warn!(
                    path = %sample.path,
                    metric = sample.metric,
                    "dropping non-finite metric from raw insert"
                );
                continue;
            }

            let session = Arc::clone(session);
            let handle = handle.clone();
            tokio::spawn(async move {
                let values = vec![
                    BindValue::BigInt(sample.ttl),
                    BindValue::DoubleList(vec![sample.metric]),
                    BindValue::BigInt(sample.rollup),
                    BindValue::BigInt(sample.period),
                    BindValue::Text(sample.path.clone()),
                    BindValue::BigInt(sample.time),
                ];
                if let Err(error) = session.execute(&handle, values, Consistency::Any).await {
                    tracing::error!(path = %sample.path, table = %sample.table, %error, "raw insert failed");
                }
            });
        }
    }
}

/// Rolls up one coarser tier, one distinct path at a time. Each path's
/// dedup check/mark happens synchronously (so two rollups for the same
/// `(path, rollup)` in quick succession can't both pass the check); the
/// fetch-reduce-write chain that follows is detached.
async fn roll_up_tier<S>(
    session: &Arc<S>,
    prepared: &Arc<PreparedCache<S>>,
    dedup: &Arc<RollupDedup>,
    samples: Vec<Sample>,
    low_table: &str,
    low_rollup: i64,
    low_period: i64,
) where
    S: Session + 'static,
{
    let Some(rollup) = samples.first().map(|s| s.rollup) else {
        return;
    };

    let mut by_path: BTreeMap<String, Vec<Sample>> = BTreeMap::new();
    for sample in samples {
        by_path.entry(sample.path.clone()).or_default().push(sample);
    }

    for (path, rows) in by_path {
        let Some(first) = rows.into_iter().next() else {
            continue;
        };
        let time = first.time;
        let period = first.period;
        let ttl = first.ttl;
        let table = first.table;

        if !dedup.should_roll(&path, rollup, time) {
            continue;
        }
        dedup.mark_rolled(&path, rollup, time);

        let session = Arc::clone(session);
        let prepared = Arc::clone(prepared);
        let low_table = low_table.to_string();

        tokio::spawn(async move {
            let fetch_sql = query_templates::rollup_fetch(&low_table);
            let fetch_handle = match prepared.prepare(&session, &fetch_sql).await {
                Ok(handle) => handle,
                Err(error) => {
                    tracing::error!(%path, %error, "failed to prepare rollup source fetch");
                    return;
                }
            };

            let fetch_values = vec![
                BindValue::Text(path.clone()),
                BindValue::BigInt(low_rollup),
                BindValue::BigInt(low_period),
                BindValue::BigInt(time - rollup),
                BindValue::BigInt(time),
            ];
            let rows = match session
                .execute(&fetch_handle, fetch_values, Consistency::One)
                .await
            {
                Ok(rows) => rows,
                Err(error) => {
                    tracing::error!(%path, %error, "rollup source fetch failed");
                    return;
                }
            };

            let flattened: Vec<f64> = rows.into_iter().flat_map(|row| row.data).collect();
            if flattened.is_empty() {
                // No rollup write issued; the dedup mark stands regardless.
                return;
            }
            let mean = flattened.iter().sum::<f64>() / flattened.len() as f64;
            if !mean.is_finite() {
                return;
            }

            let insert_sql = query_templates::rollup_insert(&table);
            let insert_handle = match prepared.prepare(&session, &insert_sql).await {
                Ok(handle) => handle,
                Err(error) => {
                    tracing::error!(%path, %error, "failed to prepare rollup insert");
                    return;
                }
            };

            let insert_values = vec![
                BindValue::BigInt(ttl),
                BindValue::DoubleList(vec![mean]),
                BindValue::BigInt(rollup),
                BindValue::BigInt(period),
                BindValue::Text(path.clone()),
                BindValue::BigInt(time),
            ];
            if let Err(error) = session
                .execute(&insert_handle, insert_values, Consistency::Any)
                .await
            {
                tracing::error!(%path, %error, "rollup insert failed");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::session::Row;
    use crate::testing::MockSession;

    fn sample(path: &str, time: i64, metric: f64, rollup: i64, table: &str) -> Sample {
        Sample {
            path: path.to_string(),
            time,
            metric,
            rollup,
            period: 1440,
            ttl: 86_400,
            table: table.to_string(),
        }
    }

    async fn drain(session: &Arc<MockSession>) {
        // Give spawned tasks a chance to run; the worker itself never
        // awaits them, so tests poll briefly instead of relying on a
        // synchronous return.
        for _ in 0..50 {
            tokio::task::yield_now().await;
        }
        let _ = session;
    }

    #[tokio::test]
    async fn raw_write_goes_to_the_finest_tier_table() {
        let session = Arc::new(MockSession::new());
        let prepared = Arc::new(PreparedCache::new());
        let dedup = Arc::new(RollupDedup::new());

        let batch = vec![sample("a.b", 60, 1.5, 60, "metric")];
        process_batch(&session, &prepared, &dedup, batch).await;
        drain(&session).await;

        let calls = session.calls();
        let raw_insert_sql = query_templates::raw_insert("metric");
        assert!(calls.iter().any(|c| c.statement == raw_insert_sql));
    }

    #[tokio::test]
    async fn non_finite_metric_is_dropped_before_binding() {
        let session = Arc::new(MockSession::new());
        let prepared = Arc::new(PreparedCache::new());
        let dedup = Arc::new(RollupDedup::new());

        let batch = vec![sample("a.b", 60, f64::NAN, 60, "metric")];
        process_batch(&session, &prepared, &dedup, batch).await;
        drain(&session).await;

        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn two_tier_batch_rolls_up_using_the_mean_of_finest_tier_rows() {
        let session = Arc::new(MockSession::new());
        let prepared = Arc::new(PreparedCache::new());
        let dedup = Arc::new(RollupDedup::new());

        let rollup_fetch_sql = query_templates::rollup_fetch("metric");
        session.with_response(
            &rollup_fetch_sql,
            vec![
                Row {
                    path: None,
                    time: None,
                    data: vec![10.0],
                },
                Row {
                    path: None,
                    time: None,
                    data: vec![20.0],
                },
            ],
        );

        let batch = vec![
            sample("a.b", 300, 10.0, 60, "metric"),
            sample("a.b", 300, 0.0, 300, "metric"),
        ];
        process_batch(&session, &prepared, &dedup, batch).await;
        drain(&session).await;

        let rollup_insert_sql = query_templates::rollup_insert("metric");
        let calls = session.calls();
        let insert_call = calls
            .iter()
            .find(|c| c.statement == rollup_insert_sql)
            .expect("expected a rollup insert");
        assert!(insert_call
            .values
            .contains(&BindValue::DoubleList(vec![15.0])));
    }

    #[tokio::test]
    async fn dedup_suppresses_the_second_batch_for_the_same_window() {
        let session = Arc::new(MockSession::new());
        let prepared = Arc::new(PreparedCache::new());
        let dedup = Arc::new(RollupDedup::new());

        let rollup_fetch_sql = query_templates::rollup_fetch("metric");
        session.with_response(
            &rollup_fetch_sql,
            vec![Row {
                path: None,
                time: None,
                data: vec![5.0],
            }],
        );

        let first_batch = vec![
            sample("a.b", 300, 1.0, 60, "metric"),
            sample("a.b", 300, 0.0, 300, "metric"),
        ];
        process_batch(&session, &prepared, &dedup, first_batch).await;
        drain(&session).await;

        let second_batch = vec![
            sample("a.b", 300, 1.0, 60, "metric"),
            sample("a.b", 300, 0.0, 300, "metric"),
        ];
        process_batch(&session, &prepared, &dedup, second_batch).await;
        drain(&session).await;

        let rollup_insert_sql = query_templates::rollup_insert("metric");
        let insert_count = session
            .calls()
            .iter()
            .filter(|c| c.statement == rollup_insert_sql)
            .count();
        assert_eq!(insert_count, 1);
    }

    #[tokio::test]
    async fn empty_rollup_source_issues_no_write_but_still_marks_dedup() {
        let session = Arc::new(MockSession::new());
        let prepared = Arc::new(PreparedCache::new());
        let dedup = Arc::new(RollupDedup::new());

        // No canned response for the rollup-source fetch: MockSession
        // defaults to an empty row set.
        let batch = vec![
            sample("a.b", 300, 1.0, 60, "metric"),
            sample("a.b", 300, 0.0, 300, "metric"),
        ];
        process_batch(&session, &prepared, &dedup, batch).await;
        drain(&session).await;

        let rollup_insert_sql = query_templates::rollup_insert("metric");
        assert!(!session
            .calls()
            .iter()
            .any(|c| c.statement == rollup_insert_sql));
        assert!(!dedup.should_roll("a.b", 300, 300));
    }

    #[tokio::test]
    async fn one_failing_path_does_not_block_another_in_the_same_tier() {
        let session = Arc::new(MockSession::new());
        let prepared = Arc::new(PreparedCache::new());
        let dedup = Arc::new(RollupDedup::new());

        let rollup_fetch_sql = query_templates::rollup_fetch("metric");
        session.with_response(
            &rollup_fetch_sql,
            vec![Row {
                path: None,
                time: None,
                data: vec![1.0],
            }],
        );
        session.with_response(
            &rollup_fetch_sql,
            vec![Row {
                path: None,
                time: None,
                data: vec![2.0],
            }],
        );

        let batch = vec![
            sample("a.b", 300, 1.0, 60, "metric"),
            sample("c.d", 300, 1.0, 60, "metric"),
            sample("a.b", 300, 0.0, 300, "metric"),
            sample("c.d", 300, 0.0, 300, "metric"),
        ];
        process_batch(&session, &prepared, &dedup, batch).await;
        drain(&session).await;

        let rollup_insert_sql = query_templates::rollup_insert("metric");
        let insert_count = session
            .calls()
            .iter()
            .filter(|c| c.statement == rollup_insert_sql)
            .count();
        assert_eq!(insert_count, 2);
    }

    #[tokio::test]
    async fn worker_exits_once_the_channel_is_dropped() {
        let (tx, rx) = mpsc::channel(10);
        let session = Arc::new(MockSession::new());
        let prepared = Arc::new(PreparedCache::new());
        let dedup = Arc::new(RollupDedup::new());
        let batches = BatchReceiver::new(rx, 500, Duration::from_secs(5));

        let handle = tokio::spawn(run(session, prepared, dedup, batches));
        drop(tx);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should exit promptly once the channel closes")
            .unwrap();
    }
}
