use std::path::PathBuf;

use argh::FromArgs;

/// Command-line arguments
#[derive(Debug, FromArgs)]
pub struct Args {
    #[argh(option, short = 'c', description = "path to configuration")]
    pub config: Option<PathBuf>,

    #[argh(option, description = "number of blocks in the simulated epoch")]
    pub num_blocks: Option<u64>,

    #[argh(option, description = "number of txs in each simulated block")]
    pub txs_per_block: Option<usize>,

    #[argh(option, description = "epoch number to simulate")]
    pub epoch: Option<u64>,
}
