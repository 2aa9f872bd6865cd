//! Rebalancing configuration

use quiver_client::ShardTransferMethod;
use serde::{Deserialize, Serialize};

/// Settings applied to every compound rebalancing operation
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RebalancingConfig {
    /// Transfer method for replicate and equalize transfers
    #[serde(default)]
    pub replicate_transfer_method: ShardTransferMethod,

    /// Transfer method for drain moves
    ///
    /// Streaming does not need a consistent snapshot of a shard that keeps
    /// taking writes while it is drained.
    #[serde(default)]
    pub drain_transfer_method: ShardTransferMethod,

    /// Whether replication ignores the configured replication factor by default
    #[serde(default = "default_ignore_replication_factor")]
    pub ignore_replication_factor: bool,
}

fn default_ignore_replication_factor() -> bool {
    true
}

impl Default for RebalancingConfig {
    fn default() -> Self {
        Self {
            replicate_transfer_method: ShardTransferMethod::default(),
            drain_transfer_method: ShardTransferMethod::default(),
            ignore_replication_factor: default_ignore_replication_factor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RebalancingConfig::default();
        assert_eq!(config.drain_transfer_method, ShardTransferMethod::StreamRecords);
        assert_eq!(
            config.replicate_transfer_method,
            ShardTransferMethod::StreamRecords
        );
        assert!(config.ignore_replication_factor);
    }

    #[test]
    fn test_from_toml() {
        let config: RebalancingConfig = toml::from_str(
            r#"
replicate_transfer_method = "snapshot"
ignore_replication_factor = false
"#,
        )
        .unwrap();

        assert_eq!(config.replicate_transfer_method, ShardTransferMethod::Snapshot);
        assert_eq!(config.drain_transfer_method, ShardTransferMethod::StreamRecords);
        assert!(!config.ignore_replication_factor);
    }
}
