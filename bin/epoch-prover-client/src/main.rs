//! Epoch prover client.
//!
//! Proves a synthetic epoch end to end with the native prover.

use std::{fs, sync::Arc};

use anyhow::Context;
use args::Args;
use rollup_common::{
    env::parse_env_or,
    logging::{self, LoggerConfig},
};
use rollup_config::ClientConfig;
use rollup_epoch_prover::{EpochOrchestrator, NativeEpochProver};
use tracing::*;

mod args;
mod simulation;

/// Overrides `orchestrator.max_concurrent_jobs` from the environment.
const MAX_JOBS_ENVVAR: &str = "ROLLUP_MAX_CONCURRENT_JOBS";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Args = argh::from_env();
    let config = load_config(&args)?;

    logging::init(LoggerConfig::with_label(
        "epoch-prover-client",
        config.logging.service_label.as_deref(),
    ));
    info!(?config, "running epoch prover client");

    let res = run(config).await;
    if let Err(e) = &res {
        error!(err = %e, "epoch proving failed");
    }

    logging::finalize();
    res
}

async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let prover = Arc::new(NativeEpochProver::new());
    let vk_tree = Arc::new(prover.vk_tree());
    let orchestrator = EpochOrchestrator::new(prover.clone(), vk_tree, config.orchestrator.clone());

    let epoch = simulation::build_epoch(&config.simulation, config.orchestrator.prover_id);
    let result = simulation::run_epoch(&orchestrator, &prover, epoch).await?;

    let public_inputs = &result.public_inputs;
    info!(
        epoch_number = %config.simulation.epoch_number,
        end_block_number = %public_inputs.end_block_number,
        num_blobs = %result.batched_blob_inputs.num_blobs,
        end_archive = ?public_inputs.end_archive,
        proof = %hex::encode(result.proof.as_bytes()),
        "epoch proven"
    );
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<ClientConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str::<ClientConfig>(&raw)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => ClientConfig::default(),
    };
    apply_overrides(&mut config, args);
    Ok(config)
}

fn apply_overrides(config: &mut ClientConfig, args: &Args) {
    if let Some(num_blocks) = args.num_blocks {
        config.simulation.num_blocks = num_blocks;
    }
    if let Some(txs_per_block) = args.txs_per_block {
        config.simulation.txs_per_block = txs_per_block;
    }
    if let Some(epoch) = args.epoch {
        config.simulation.epoch_number = epoch;
    }
    config.orchestrator.max_concurrent_jobs =
        parse_env_or(MAX_JOBS_ENVVAR, config.orchestrator.max_concurrent_jobs);
}

#[cfg(test)]
mod tests {
    use rollup_config::OrchestratorConfig;

    use super::*;

    fn args(num_blocks: Option<u64>, epoch: Option<u64>) -> Args {
        Args {
            config: None,
            num_blocks,
            txs_per_block: None,
            epoch,
        }
    }

    #[test]
    fn test_overrides_replace_config_values() {
        let mut config = ClientConfig::default();
        apply_overrides(&mut config, &args(Some(7), Some(3)));
        assert_eq!(config.simulation.num_blocks, 7);
        assert_eq!(config.simulation.epoch_number, 3);
        assert_eq!(config.simulation.txs_per_block, 2);
    }

    #[tokio::test]
    async fn test_simulated_epoch_is_proven() {
        let mut config = ClientConfig {
            orchestrator: OrchestratorConfig {
                max_concurrent_jobs: 2,
                ..Default::default()
            },
            ..Default::default()
        };
        apply_overrides(&mut config, &args(Some(5), None));
        run(config).await.unwrap();
    }

    #[tokio::test]
    async fn test_simulated_epoch_without_tube_kickoff() {
        let mut config = ClientConfig::default();
        config.orchestrator.kickoff_tube_proofs = false;
        apply_overrides(&mut config, &args(Some(1), Some(2)));
        run(config).await.unwrap();
    }
}
