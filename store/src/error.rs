use std::error::Error as StdError;

/// Failures surfaced by a [`crate::session::Session`] implementation.
///
/// These wrap driver-level failures generically rather than naming a
/// specific driver's error type, so the core stays usable against any
/// wide-column driver that can implement the trait.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to connect to cluster: {0}")]
    Connect(#[source] Box<dyn StdError + Send + Sync>),

    #[error("failed to prepare statement `{statement}`: {source}")]
    Prepare {
        statement: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    #[error("failed to execute statement: {0}")]
    Execute(#[source] Box<dyn StdError + Send + Sync>),
}

/// Failures that can cross the public [`crate::Store::fetch`] boundary.
///
/// Ingest never returns an error to its caller (it is fire-and-forget);
/// `fetch` is the one operation that propagates database failures
/// synchronously, per the error-handling design.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Session(#[from] SessionError),
}
