//! Storage core for a Graphite-style metrics backend.
//!
//! This crate owns the two hard paths of a time-series metrics store backed
//! by a wide-column database (Cassandra/ScyllaDB family):
//!
//! * **ingest + rollup** — samples arrive on a bounded channel, are batched,
//!   written at their finest resolution tier, and opportunistically reduced
//!   into coarser tiers ([`ingest`]).
//! * **range fetch + aggregation** — a contiguous time range is read back,
//!   densified onto a regular grid, and reduced with one of a handful of
//!   aggregation functions ([`fetch`], [`aggregate`]).
//!
//! Everything here is driver-agnostic: the [`session::Session`] trait is the
//! only seam onto the database, so the engine can be driven by
//! [`session::ScyllaSession`] in production or by [`testing::MockSession`] in
//! tests.
//!
//! Out of scope, by design: the line-protocol ingest listeners, the
//! path-index search service, the HTTP query API, and loading configuration
//! from a YAML file. Those are external collaborators this crate is wired
//! into but does not implement.

#![deny(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

mod aggregate;
mod batch;
mod config;
mod dedup;
mod error;
mod fetch;
mod ingest;
mod prepared_cache;
mod query_templates;
mod sample;
mod session;
mod store;

pub mod testing;

pub use aggregate::{Aggregation, Point};
pub use config::StoreConfig;
pub use error::{FetchError, SessionError};
pub use fetch::FetchResult;
pub use sample::Sample;
pub use session::{BindValue, Consistency, Row, ScyllaSession, Session};
pub use store::Store;
