use serde::{Deserialize, Serialize};

use crate::OrchestratorConfig;

/// Default value for `num_blocks` in [`SimulationConfig`].
const DEFAULT_NUM_BLOCKS: u64 = 4;

/// Default value for `txs_per_block` in [`SimulationConfig`].
const DEFAULT_TXS_PER_BLOCK: usize = 2;

/// Default value for `first_block_number` in [`SimulationConfig`].
const DEFAULT_FIRST_BLOCK_NUMBER: u64 = 1;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Label appended to the whoami string. Takes precedence over the envvar.
    pub service_label: Option<String>,
}

/// Shape of the epoch the client binary simulates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub epoch_number: u64,

    #[serde(default = "default_first_block_number")]
    pub first_block_number: u64,

    #[serde(default = "default_num_blocks")]
    pub num_blocks: u64,

    #[serde(default = "default_txs_per_block")]
    pub txs_per_block: usize,
}

fn default_first_block_number() -> u64 {
    DEFAULT_FIRST_BLOCK_NUMBER
}

fn default_num_blocks() -> u64 {
    DEFAULT_NUM_BLOCKS
}

fn default_txs_per_block() -> usize {
    DEFAULT_TXS_PER_BLOCK
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            epoch_number: 0,
            first_block_number: default_first_block_number(),
            num_blocks: default_num_blocks(),
            txs_per_block: default_txs_per_block(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_load() {
        let config_string = r#"
            [orchestrator]
            max_concurrent_jobs = 4
            prover_id = "0101010101010101010101010101010101010101010101010101010101010101"

            [logging]
            service_label = "prover-1"

            [simulation]
            epoch_number = 3
            first_block_number = 10
            num_blocks = 5
        "#;

        let config = toml::from_str::<ClientConfig>(config_string);
        assert!(
            config.is_ok(),
            "should be able to load client TOML config but got: {:?}",
            config.err()
        );

        let config = config.unwrap();
        assert_eq!(config.orchestrator.max_concurrent_jobs, 4);
        assert!(config.orchestrator.kickoff_tube_proofs);
        assert_eq!(config.logging.service_label.as_deref(), Some("prover-1"));
        assert_eq!(config.simulation.epoch_number, 3);
        assert_eq!(config.simulation.first_block_number, 10);
        assert_eq!(config.simulation.num_blocks, 5);
        assert_eq!(config.simulation.txs_per_block, DEFAULT_TXS_PER_BLOCK);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = toml::from_str::<ClientConfig>("").unwrap();
        assert_eq!(config, ClientConfig::default());
    }
}
