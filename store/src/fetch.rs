//! Contiguous-range read, densified onto a regular grid and reduced with
//! the caller's chosen [`Aggregation`].

use std::collections::{BTreeMap, HashMap};

use crate::aggregate::{Aggregation, Point};
use crate::error::FetchError;
use crate::prepared_cache::PreparedCache;
use crate::query_templates;
use crate::session::{BindValue, Consistency, Session};

/// The result of a [`crate::Store::fetch`] call. `from`/`to` are
/// grid-aligned and may differ from what the caller asked for.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub from: i64,
    pub to: i64,
    pub step: i64,
    pub series: HashMap<String, Vec<Point>>,
}

pub(crate) async fn fetch<S>(
    session: &S,
    prepared: &PreparedCache<S>,
    method: Aggregation,
    table: &str,
    paths: &[String],
    rollup: i64,
    period: i64,
    from: i64,
    to: i64,
) -> Result<FetchResult, FetchError>
where
    S: Session,
{
    if paths.is_empty() {
        return Ok(empty_result(from, to, rollup));
    }

    let sql = query_templates::range_fetch(table);
    let handle = prepared.prepare(session, &sql).await?;

    let values = vec![
        BindValue::TextList(paths.to_vec()),
        BindValue::BigInt(rollup),
        BindValue::BigInt(period),
        BindValue::BigInt(from),
        BindValue::BigInt(to),
    ];
    let rows = session.execute(&handle, values, Consistency::One).await?;

    if rows.is_empty() {
        return Ok(empty_result(from, to, rollup));
    }

    let min_point = floor_to_grid(from, rollup);
    let max_point = floor_to_grid(to, rollup);

    // Group by path, then by time, flattening each row's `data` list into
    // its bucket (duplicate writes to the same bucket already accumulated
    // at the database; this just handles more than one row surviving for
    // the same path/time, which the schema's primary key rules out but
    // costs nothing to tolerate).
    let mut by_path: HashMap<String, BTreeMap<i64, Vec<f64>>> = HashMap::new();
    for row in rows {
        let (Some(path), Some(time)) = (row.path, row.time) else {
            continue;
        };
        by_path.entry(path).or_default().entry(time).or_default().extend(row.data);
    }

    let mut series = HashMap::with_capacity(by_path.len());
    for (path, values_by_time) in by_path {
        let mut points = Vec::new();
        let mut t = min_point;
        while t <= max_point {
            let values = values_by_time.get(&t).cloned().unwrap_or_default();
            points.push(method.reduce(&values));
            t += rollup;
        }
        series.insert(path, points);
    }

    Ok(FetchResult {
        from: min_point,
        to: max_point,
        step: rollup,
        series,
    })
}

fn empty_result(from: i64, to: i64, rollup: i64) -> FetchResult {
    FetchResult {
        from,
        to,
        step: rollup,
        series: HashMap::new(),
    }
}

fn floor_to_grid(t: i64, rollup: i64) -> i64 {
    t.div_euclid(rollup) * rollup
}
