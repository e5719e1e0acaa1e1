//! YAML configuration for the maze and the trainer.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```yaml
//! maze:
//!   start: { row: 0, col: 0 }
//!   no_move_policy: FallbackUp
//! trainer:
//!   discount: 0.95
//!   seed: 7
//! ```
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::maze::{default_grid, Cell, FeatureSet, Maze, NoMovePolicy, ShapedReward};
use crate::trainer::{Trainer, TrainerConfig};

/// How to build the [`Maze`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct MazeConfig {
    /// Rows of 0 (wall) / 1 (free).
    pub grid: Vec<Vec<u8>>,
    pub start: Cell,
    /// Bottom-right cell when unset.
    pub target: Option<Cell>,
    pub features: FeatureSet,
    pub no_move_policy: NoMovePolicy,
    pub reward: ShapedReward,
}

impl Default for MazeConfig {
    fn default() -> Self {
        Self {
            grid: default_grid(),
            start: Cell::new(0, 0),
            target: None,
            features: FeatureSet::default(),
            no_move_policy: NoMovePolicy::default(),
            reward: ShapedReward::default(),
        }
    }
}

impl MazeConfig {
    /// Target cell: the configured one, else the bottom-right corner.
    pub fn target_cell(&self) -> Cell {
        self.target.unwrap_or_else(|| {
            let rows = self.grid.len().max(1);
            let cols = self.grid.first().map(Vec::len).unwrap_or(1).max(1);
            Cell::new(rows - 1, cols - 1)
        })
    }

    pub fn build(&self) -> Result<Maze> {
        Maze::with_options(
            self.grid.clone(),
            self.start,
            self.target_cell(),
            self.features,
            self.no_move_policy,
            Box::new(self.reward.clone()),
        )
    }
}

/// Root of the config file read by the command line tool.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub maze: MazeConfig,
    pub trainer: TrainerConfig,
}

impl AppConfig {
    /// Constructs [`AppConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`AppConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Maze and trainer wired together.
    pub fn build_trainer(&self) -> Result<Trainer> {
        Ok(Trainer::new(self.maze.build()?, self.trainer.clone()))
    }
}
