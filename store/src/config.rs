//! Configuration keys this crate understands. Loading them from a YAML file
//! (or any other source) is a bootstrap concern that lives outside this
//! crate; `StoreConfig` is only the struct that bootstrap hands to
//! [`crate::Store::new`].

use std::time::Duration;

/// Batch wait threshold. Fixed, not configurable, per the ingest design.
pub(crate) const BATCH_TIMEOUT: Duration = Duration::from_secs(5);

const DEFAULT_CHAN_SIZE: usize = 10_000;
const DEFAULT_BATCH_SIZE: usize = 500;

/// Construction parameters for a [`crate::Store`].
///
/// Derives both `clap::Parser` (so it can be embedded in a larger CLI's
/// argument struct) and `serde::Deserialize` (so it can be embedded in a
/// larger YAML-driven bootstrap) without this crate doing either of those
/// things itself.
#[derive(Debug, Clone, clap::Parser, serde::Deserialize)]
pub struct StoreConfig {
    /// Keyspace to select after connecting.
    #[clap(long, env = "METRICS_STORE_KEYSPACE")]
    pub keyspace: String,

    /// One or more `host:port` contact points for the cluster.
    #[clap(long = "cluster", env = "METRICS_STORE_CLUSTER", num_args = 1.., required = true)]
    pub cluster: Vec<String>,

    /// Advisory replication factor; not enforced by this crate.
    #[clap(long, env = "METRICS_STORE_REPFACTOR", default_value = "1")]
    pub repfactor: u32,

    /// Capacity of the bounded ingest channel.
    #[clap(long, env = "METRICS_STORE_CHAN_SIZE", default_value_t = DEFAULT_CHAN_SIZE)]
    pub chan_size: usize,

    /// Maximum number of samples per batch.
    #[clap(long, env = "METRICS_STORE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Optional credentials; both must be set or both left unset.
    #[clap(long, env = "METRICS_STORE_USERNAME")]
    pub username: Option<String>,

    #[clap(long, env = "METRICS_STORE_PASSWORD")]
    pub password: Option<String>,

    /// Reserved for future load-balancing/placement hints; unused by this
    /// crate today.
    #[clap(long = "hints", env = "METRICS_STORE_HINTS", num_args = 0.., default_values_t = Vec::<String>::new())]
    #[serde(default)]
    pub hints: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            keyspace: String::new(),
            cluster: Vec::new(),
            repfactor: 1,
            chan_size: DEFAULT_CHAN_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            username: None,
            password: None,
            hints: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = StoreConfig::default();
        assert_eq!(config.chan_size, 10_000);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.repfactor, 1);
        assert!(config.hints.is_empty());
    }
}
