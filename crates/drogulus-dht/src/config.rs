//! Node configuration: the tunables from the constants table, overridable
//! per-deployment without touching the `const` defaults.

use serde::{Deserialize, Serialize};

use crate::{
    ALLOWED_RPC_FAILS, ALPHA, K, LOOKUP_TIMEOUT_SECS, REFRESH_INTERVAL_SECS, REFRESH_TIMEOUT_SECS,
    REPLICATE_INTERVAL_SECS, RESPONSE_TIMEOUT_SECS, RPC_TIMEOUT_SECS,
};

/// Failure loading or parsing a [`NodeConfig`] from TOML.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Everything needed to stand up a [`crate::node::Node`] beyond its
/// keypair: the advertised endpoint and every tunable timing constant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// The software version string advertised in peer records and
    /// envelopes.
    pub version: String,

    /// This node's transport-addressable endpoint, as advertised to peers
    /// (e.g. `netstring://203.0.113.4:4000` or `http://203.0.113.4:4000`).
    pub uri: String,

    /// The port peers should use to reply to this node, included in every
    /// outgoing envelope's `reply_port`.
    pub reply_port: u16,

    /// Maximum contacts per bucket (and per replacement cache).
    pub k: usize,

    /// Lookup parallelism: max in-flight requests per lookup round.
    pub alpha: usize,

    /// Seconds a bucket may go unaccessed before `get_refresh_list` flags
    /// it for a refresh.
    pub refresh_timeout_secs: u64,

    /// Seconds between periodic refresh timer firings.
    pub refresh_interval_secs: u64,

    /// Seconds after a `Store` write before the republish timer re-checks
    /// the key.
    pub replicate_interval_secs: u64,

    /// Per-RPC transport-level timeout, in seconds.
    pub rpc_timeout_secs: u64,

    /// Seconds a sent request waits for a reply before timing out.
    pub response_timeout_secs: u64,

    /// Overall deadline, in seconds, for a single lookup.
    pub lookup_timeout_secs: u64,

    /// RPC failures a peer may accrue before forced eviction.
    pub allowed_rpc_fails: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            version: env!("CARGO_PKG_VERSION").to_string(),
            uri: "netstring://127.0.0.1:4000".to_string(),
            reply_port: 4000,
            k: K,
            alpha: ALPHA,
            refresh_timeout_secs: REFRESH_TIMEOUT_SECS,
            refresh_interval_secs: REFRESH_INTERVAL_SECS,
            replicate_interval_secs: REPLICATE_INTERVAL_SECS,
            rpc_timeout_secs: RPC_TIMEOUT_SECS,
            response_timeout_secs: RESPONSE_TIMEOUT_SECS,
            lookup_timeout_secs: LOOKUP_TIMEOUT_SECS,
            allowed_rpc_fails: ALLOWED_RPC_FAILS,
        }
    }
}

impl NodeConfig {
    /// Load a config from a TOML file, falling back to [`Default`] values
    /// for any field the file omits.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_the_constants_table() {
        let config = NodeConfig::default();
        assert_eq!(config.k, K);
        assert_eq!(config.alpha, ALPHA);
        assert_eq!(config.allowed_rpc_fails, ALLOWED_RPC_FAILS);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let toml_text = "uri = \"netstring://198.51.100.2:5000\"\n";
        let config: NodeConfig = toml::from_str(toml_text).unwrap();
        assert_eq!(config.uri, "netstring://198.51.100.2:5000");
        assert_eq!(config.k, K);
    }
}
