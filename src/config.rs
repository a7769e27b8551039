//! Command-line and environment configuration for the terminal player.
use clap::Parser;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::path::PathBuf;

use crate::storage::{DirStore, StorageError};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Play 2048 in the terminal", long_about = None)]
pub struct Config {
    /// Directory holding the saved game and the leaderboard
    #[arg(
        long,
        value_name = "DIR",
        env = "TWENTY48_DATA_DIR",
        default_value = ".twenty48"
    )]
    pub data_dir: PathBuf,

    /// Seed for tile spawning (random when omitted)
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Default log filter, used when RUST_LOG is not set
    #[arg(long, value_name = "FILTER", default_value = "warn")]
    pub log: String,
}

impl Config {
    pub fn open_store(&self) -> Result<DirStore, StorageError> {
        DirStore::open(&self.data_dir)
    }

    pub fn rng(&self) -> SmallRng {
        match self.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        }
    }
}
