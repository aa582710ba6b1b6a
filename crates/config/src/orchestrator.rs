use rollup_primitives::buf::Buf32;
use serde::{Deserialize, Serialize};

/// Default value for `max_concurrent_jobs` in [`OrchestratorConfig`].
const DEFAULT_MAX_CONCURRENT_JOBS: usize = 8;

/// Configuration for the epoch proving pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Max number of prover jobs that may run at the same time.
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Identity of the prover, committed to in the rollup public inputs.
    #[serde(default)]
    pub prover_id: Buf32,

    /// If tube proofs should be started as soon as the txs of a block are known.
    #[serde(default = "default_kickoff_tube_proofs")]
    pub kickoff_tube_proofs: bool,
}

fn default_max_concurrent_jobs() -> usize {
    DEFAULT_MAX_CONCURRENT_JOBS
}

fn default_kickoff_tube_proofs() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: default_max_concurrent_jobs(),
            prover_id: Buf32::zero(),
            kickoff_tube_proofs: default_kickoff_tube_proofs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_orchestrator_config_defaults() {
        let config = toml::from_str::<OrchestratorConfig>("").unwrap();
        assert_eq!(config, OrchestratorConfig::default());
        assert_eq!(config.max_concurrent_jobs, 8);
        assert!(config.kickoff_tube_proofs);
        assert!(config.prover_id.is_zero());
    }

    #[test]
    fn test_orchestrator_config_prover_id_hex() {
        let config = toml::from_str::<OrchestratorConfig>(
            r#"
            max_concurrent_jobs = 2
            prover_id = "0x00000000000000000000000000000000000000000000000000000000000000ff"
            kickoff_tube_proofs = false
            "#,
        )
        .unwrap();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.prover_id, Buf32::from_u64(0xff));
        assert!(!config.kickoff_tube_proofs);
    }
}
