/// A single metric observation accepted on the ingest channel.
///
/// `time` is expected to already be aligned to `rollup` (divisible by it);
/// the engine does not align it on the caller's behalf.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Dotted metric identifier, e.g. `servers.web01.cpu.user`.
    pub path: String,
    /// Unix seconds, divisible by `rollup`.
    pub time: i64,
    /// The observed value. Non-finite values are dropped before the raw
    /// write, never persisted.
    pub metric: f64,
    /// Tier resolution in seconds.
    pub rollup: i64,
    /// Tier retention multiplier.
    pub period: i64,
    /// Row expiry in seconds, applied at write time by the database.
    pub ttl: i64,
    /// Name of the per-tier storage table this sample belongs to.
    pub table: String,
}
