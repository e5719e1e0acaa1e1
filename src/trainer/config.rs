//! Configuration of [`Trainer`](super::Trainer).
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::network::NetworkConfig;

/// Epsilon-greedy exploration schedule.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ExplorationConfig {
    pub initial_epsilon: f32,
    /// Multiplied into epsilon after every epoch.
    pub decay: f32,
    pub min_epsilon: f32,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            initial_epsilon: 1.0,
            decay: 0.993,
            min_epsilon: 0.10,
        }
    }
}

/// Stop once the rolling win rate has held at or above `win_rate` for
/// `consecutive_epochs` epochs in a row.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct EarlyStopConfig {
    pub win_rate: f32,
    pub consecutive_epochs: usize,
}

impl Default for EarlyStopConfig {
    fn default() -> Self {
        Self {
            win_rate: 0.90,
            consecutive_epochs: 20,
        }
    }
}

/// When the target network is overwritten with the online network's weights.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Clone, Copy)]
pub enum TargetSync {
    /// After every `n` gradient steps.
    EveryLearningSteps(usize),
    /// At the end of every epoch that trained.
    EveryEpoch,
}

impl Default for TargetSync {
    fn default() -> Self {
        TargetSync::EveryLearningSteps(10)
    }
}

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TrainerConfig {
    pub exploration: ExplorationConfig,

    pub early_stop: EarlyStopConfig,

    pub network: NetworkConfig,

    /// Maximum number of transitions kept for replay.
    pub replay_capacity: usize,

    /// Discount factor applied to bootstrapped Q-values.
    pub discount: f32,

    /// Learning starts once the buffer holds `min(batch_size, min_replay_size)` transitions.
    pub min_replay_size: usize,

    /// Gradient steps taken after each episode.
    pub train_iters_per_epoch: usize,

    pub target_sync: TargetSync,

    /// Reward stored when the agent has no valid move left.
    pub stuck_penalty: f32,

    /// Reward stored when an episode hits the step cap.
    pub timeout_penalty: f32,

    /// Directory model files are saved to and loaded from.
    pub models_dir: PathBuf,

    /// Seed for network initialization and exploration. Random when unset.
    pub seed: Option<u64>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            exploration: ExplorationConfig::default(),
            early_stop: EarlyStopConfig::default(),
            network: NetworkConfig::default(),
            replay_capacity: 5000,
            discount: 0.99,
            min_replay_size: 64,
            train_iters_per_epoch: 4,
            target_sync: TargetSync::default(),
            stuck_penalty: -0.2,
            timeout_penalty: -10.0,
            models_dir: PathBuf::from("saved_models"),
            seed: None,
        }
    }
}

impl TrainerConfig {
    /// Sets the exploration schedule.
    pub fn exploration(mut self, v: ExplorationConfig) -> Self {
        self.exploration = v;
        self
    }

    /// Sets the early-stop rule.
    pub fn early_stop(mut self, v: EarlyStopConfig) -> Self {
        self.early_stop = v;
        self
    }

    /// Sets the network architecture and optimizer.
    pub fn network(mut self, v: NetworkConfig) -> Self {
        self.network = v;
        self
    }

    /// Sets the replay buffer capacity.
    pub fn replay_capacity(mut self, v: usize) -> Self {
        self.replay_capacity = v;
        self
    }

    /// Sets the discount factor.
    pub fn discount(mut self, v: f32) -> Self {
        self.discount = v;
        self
    }

    /// Sets the replay size learning waits for.
    pub fn min_replay_size(mut self, v: usize) -> Self {
        self.min_replay_size = v;
        self
    }

    /// Sets the number of gradient steps per epoch.
    pub fn train_iters_per_epoch(mut self, v: usize) -> Self {
        self.train_iters_per_epoch = v;
        self
    }

    /// Sets the target network sync cadence.
    pub fn target_sync(mut self, v: TargetSync) -> Self {
        self.target_sync = v;
        self
    }

    /// Sets the model directory.
    pub fn models_dir(mut self, v: impl Into<PathBuf>) -> Self {
        self.models_dir = v.into();
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = Some(v);
        self
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
