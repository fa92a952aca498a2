//! Configuration of [`EpisodeReplayBuffer`](super::EpisodeReplayBuffer).
use crate::Schema;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    default::Default,
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`EpisodeReplayBuffer`](super::EpisodeReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EpisodeBufferConfig {
    /// Total capacity in transitions. The buffer holds `capacity / horizon`
    /// episode slots; remainder transitions are unreachable capacity.
    pub capacity: usize,

    /// Number of timesteps per episode for per-transition fields.
    pub horizon: usize,

    /// Seed of the random number generator drawing overwrite slots.
    pub seed: u64,

    /// Fields tracked by the buffer.
    pub schema: Schema,
}

impl Default for EpisodeBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            horizon: 50,
            seed: 42,
            schema: Schema::default(),
        }
    }
}

impl EpisodeBufferConfig {
    /// Sets the capacity in transitions.
    pub fn capacity(mut self, v: usize) -> Self {
        self.capacity = v;
        self
    }

    /// Sets the episode horizon.
    pub fn horizon(mut self, v: usize) -> Self {
        self.horizon = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the field schema.
    pub fn schema(mut self, v: Schema) -> Self {
        self.schema = v;
        self
    }

    /// Loads the configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves the configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
