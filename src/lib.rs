//! # treasure_hunt - Deep Q-Learning in a Grid Maze
//!
//! An agent learns to walk from a start cell to a target cell in a small grid
//! maze. It picks moves with an epsilon-greedy policy over a Q-network, stores
//! every transition in a replay buffer, and fits the network to bootstrapped
//! targets computed with a periodically synchronized target network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use treasure_hunt::maze::{Cell, Maze};
//! use treasure_hunt::trainer::{Trainer, TrainerConfig};
//!
//! let config = TrainerConfig::default().seed(42);
//! let mut trainer = Trainer::new(Maze::default_maze(), config);
//!
//! // Train, stopping early once the agent wins reliably. The model is
//! // written to saved_models/smart_agent.bin.
//! let report = trainer.train(1000, 64, 500, "smart_agent").unwrap();
//!
//! // Walk the maze greedily with the trained network.
//! let outcome = trainer.play(Cell::new(0, 0), 500).unwrap();
//! println!("{:?} after {} steps", outcome.status, outcome.steps);
//! ```
//!
//! ## Module Organization
//!
//! - [`maze`] - Grid environment, reward shaping, observations, rendering
//! - [`replay_buffer`] - Experience replay and DQN target construction
//! - [`trainer`] - Training loop, greedy play, model persistence
//! - [`model`] - The `QModel` interface and name-keyed model files
//! - [`network`] - Dense Q-network implementing `QModel`
//! - [`activations`], [`layers`], [`loss`], [`optimizer`] - Network building blocks
//! - [`metrics`] - Per-epoch records and training reports
//! - [`config`] - YAML configuration
//! - [`error`] - Error types and result handling

pub mod activations;
pub mod config;
pub mod error;
pub mod layers;
pub mod loss;
pub mod maze;
pub mod metrics;
pub mod model;
pub mod network;
pub mod optimizer;
pub mod replay_buffer;
pub mod trainer;

#[cfg(test)]
mod tests;
