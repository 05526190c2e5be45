//! The abstract boundary between the engine and the database.
//!
//! The core only needs three capabilities from a wide-column driver:
//! prepare a parameterized statement, execute it asynchronously with bound
//! values at a given consistency level, and get rows back. [`Session`]
//! captures exactly that, generic over whatever opaque prepared-statement
//! handle the underlying driver returns, so [`prepared_cache::PreparedCache`]
//! can cache it without knowing its shape.
//!
//! [`ScyllaSession`] is the production implementation, backed by the
//! `scylla` driver (Cassandra/ScyllaDB wire-compatible). [`crate::testing`]
//! provides an in-memory mock for tests.

use std::sync::Arc;

use async_trait::async_trait;
use scylla::frame::value::SerializedValues;
use scylla::transport::load_balancing::{RoundRobinPolicy, TokenAwarePolicy};
use scylla::transport::Compression;
use scylla::{Session as ScyllaDriverSession, SessionBuilder};

use crate::config::StoreConfig;
use crate::error::SessionError;

/// A positional bind value. Covers exactly the CQL shapes the query
/// templates in [`crate::query_templates`] need: scalars for `ttl`,
/// `rollup`, `period`, `time`, `path`, plus the two list shapes used for the
/// `data` column and the `path IN ?` predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    BigInt(i64),
    DoubleList(Vec<f64>),
    TextList(Vec<String>),
}

/// Consistency level for a single execution. The core only ever asks for
/// one of two levels: the weakest possible acknowledgement for writes
/// (`Any`), or a single replica for reads (`One`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Any,
    One,
}

impl From<Consistency> for scylla::statement::Consistency {
    fn from(c: Consistency) -> Self {
        match c {
            Consistency::Any => scylla::statement::Consistency::Any,
            Consistency::One => scylla::statement::Consistency::LocalOne,
        }
    }
}

/// A row returned from a fetch. Unpopulated columns (a query that doesn't
/// select `path`/`time`, such as the rollup-source fetch) are left `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub path: Option<String>,
    pub time: Option<i64>,
    pub data: Vec<f64>,
}

/// The capability seam between the engine and the database driver.
#[async_trait]
pub trait Session: Send + Sync + std::fmt::Debug {
    /// Opaque handle returned by preparing a statement. Cloning it must be
    /// cheap: the prepared-statement cache clones it out on every cache hit.
    type Prepared: Clone + Send + Sync + std::fmt::Debug;

    /// Prepare `statement` against the session. Idempotent: preparing the
    /// same text twice is harmless, just wasted work.
    async fn prepare(&self, statement: &str) -> Result<Self::Prepared, SessionError>;

    /// Execute a previously prepared statement with positional `values` at
    /// the given `consistency`, returning whatever rows the database sends
    /// back (empty for a write).
    async fn execute(
        &self,
        prepared: &Self::Prepared,
        values: Vec<BindValue>,
        consistency: Consistency,
    ) -> Result<Vec<Row>, SessionError>;
}

/// Production [`Session`] backed by a `scylla::Session`.
#[derive(Debug)]
pub struct ScyllaSession {
    inner: ScyllaDriverSession,
}

impl ScyllaSession {
    /// Connect to the cluster described by `config` and select its keyspace.
    pub async fn connect(config: &StoreConfig) -> Result<Self, SessionError> {
        let policy = Arc::new(TokenAwarePolicy::new(Box::new(RoundRobinPolicy::new())));

        let mut builder = SessionBuilder::new()
            .known_nodes(&config.cluster)
            .compression(Some(Compression::Lz4))
            .load_balancing(policy);

        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.user(user, pass);
        }

        let inner = builder
            .build()
            .await
            .map_err(|e| SessionError::Connect(Box::new(e)))?;

        inner
            .use_keyspace(&config.keyspace, false)
            .await
            .map_err(|e| SessionError::Connect(Box::new(e)))?;

        Ok(Self { inner })
    }
}

fn to_serialized_values(values: &[BindValue]) -> Result<SerializedValues, SessionError> {
    let mut serialized = SerializedValues::new();
    for value in values {
        let result = match value {
            BindValue::Text(s) => serialized.add_value(s),
            BindValue::BigInt(n) => serialized.add_value(n),
            BindValue::DoubleList(xs) => serialized.add_value(xs),
            BindValue::TextList(xs) => serialized.add_value(xs),
        };
        result.map_err(|e| SessionError::Execute(Box::new(e)))?;
    }
    Ok(serialized)
}

#[async_trait]
impl Session for ScyllaSession {
    type Prepared = scylla::prepared_statement::PreparedStatement;

    async fn prepare(&self, statement: &str) -> Result<Self::Prepared, SessionError> {
        self.inner
            .prepare(statement)
            .await
            .map_err(|e| SessionError::Prepare {
                statement: statement.to_string(),
                source: Box::new(e),
            })
    }

    async fn execute(
        &self,
        prepared: &Self::Prepared,
        values: Vec<BindValue>,
        consistency: Consistency,
    ) -> Result<Vec<Row>, SessionError> {
        let mut prepared = prepared.clone();
        prepared.set_consistency(consistency.into());

        let serialized = to_serialized_values(&values)?;
        let result = self
            .inner
            .execute(&prepared, serialized)
            .await
            .map_err(|e| SessionError::Execute(Box::new(e)))?;

        let Some(rows) = result.rows else {
            return Ok(Vec::new());
        };

        // Column order follows the SELECT list in query_templates: either
        // `(path, data, time)` for the range fetch or `(data,)` for the
        // single-path rollup fetch. Either way `data` is the last column we
        // need and is always a list<double>.
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let mut cols = row.columns.into_iter();
            let out_row = if values_has_path_and_time(&prepared) {
                let path = cols.next().flatten().and_then(as_text);
                let data = cols.next().flatten().map(as_double_list).unwrap_or_default();
                let time = cols.next().flatten().and_then(as_bigint);
                Row { path, time, data }
            } else {
                let data = cols.next().flatten().map(as_double_list).unwrap_or_default();
                Row {
                    path: None,
                    time: None,
                    data,
                }
            };
            out.push(out_row);
        }
        Ok(out)
    }
}

/// The two query shapes this core issues differ only in whether they select
/// `path`/`time` alongside `data`; the range fetch does, the rollup-source
/// fetch doesn't. We distinguish on prepared statement text rather than
/// carrying a separate flag through the call chain.
fn values_has_path_and_time(prepared: &scylla::prepared_statement::PreparedStatement) -> bool {
    prepared.get_statement().contains("SELECT path, data, time")
}

fn as_text(value: scylla::frame::response::result::CqlValue) -> Option<String> {
    match value {
        scylla::frame::response::result::CqlValue::Text(s) => Some(s),
        _ => None,
    }
}

fn as_bigint(value: scylla::frame::response::result::CqlValue) -> Option<i64> {
    match value {
        scylla::frame::response::result::CqlValue::BigInt(n) => Some(n),
        _ => None,
    }
}

fn as_double_list(value: scylla::frame::response::result::CqlValue) -> Vec<f64> {
    match value {
        scylla::frame::response::result::CqlValue::List(items) => items
            .into_iter()
            .filter_map(|v| match v {
                scylla::frame::response::result::CqlValue::Double(d) => Some(d),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
