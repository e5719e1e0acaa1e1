//! # Trainer
//!
//! Owns the maze, the online and target networks, and the replay buffer, and
//! runs the DQN loop over them:
//!
//! 1. reset the maze and play one episode with epsilon-greedy actions,
//!    storing every transition;
//! 2. if the buffer is large enough, take a few gradient steps on sampled
//!    batches, syncing the target network on a fixed cadence;
//! 3. decay epsilon, update the rolling win rate, log the epoch, and check
//!    the early-stop rule and the cancel token.
//!
//! The model is saved when training returns, whatever the reason.
//!
//! ```rust,no_run
//! use treasure_hunt::maze::{Cell, Maze};
//! use treasure_hunt::trainer::{Trainer, TrainerConfig};
//!
//! let mut trainer = Trainer::new(Maze::default_maze(), TrainerConfig::default());
//! let report = trainer.train(500, 64, 500, "smart_agent").unwrap();
//! println!("stopped after {} epochs: {:?}", report.epochs_run, report.stop_reason);
//!
//! let outcome = trainer.play(Cell::new(0, 0), 500).unwrap();
//! println!("{:?} in {} steps", outcome.status, outcome.steps);
//! ```

pub mod config;
mod session;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use ndarray::{Array1, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{MazeError, Result};
use crate::maze::{Action, Cell, Maze, Status};
use crate::metrics::{EpochRecord, StopReason, TrainingReport};
use crate::model::{ModelStore, QModel};
use crate::network::NeuralNetwork;
use crate::replay_buffer::{ReplayBuffer, Transition};

pub use config::{EarlyStopConfig, ExplorationConfig, TargetSync, TrainerConfig};
pub use session::{decayed_epsilon, EpisodeOutcome, TrainingSession};

/// Shared flag asking a running `train()` to stop after the current epoch.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// How a greedy `play()` run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayStatus {
    Win,
    Stuck,
    Timeout,
}

/// Result of [`Trainer::play`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayOutcome {
    pub status: PlayStatus,
    pub steps: usize,
    /// Cells occupied after each step, starting with the start cell.
    pub path: Vec<Cell>,
    pub total_reward: f32,
}

/// Index of the highest Q-value among `valid` actions. Invalid actions count
/// as negative infinity and ties go to the lowest index.
pub fn masked_argmax(q_values: ArrayView1<f32>, valid: &[Action]) -> Option<Action> {
    let mut best: Option<(Action, f32)> = None;
    for &action in Action::ALL.iter().filter(|a| valid.contains(a)) {
        let q = q_values.get(action.index()).copied().unwrap_or(f32::NEG_INFINITY);
        if best.map_or(true, |(_, best_q)| q > best_q) {
            best = Some((action, q));
        }
    }
    best.map(|(action, _)| action)
}

fn greedy_action<M: QModel>(model: &M, state: &Array1<f32>, valid: &[Action]) -> Option<Action> {
    let q_values = model.predict(state.view().insert_axis(Axis(0)));
    masked_argmax(q_values.row(0), valid)
}

/// DQN training and evaluation on one maze.
pub struct Trainer {
    maze: Maze,
    config: TrainerConfig,
    online: Option<NeuralNetwork>,
    target: Option<NeuralNetwork>,
    buffer: ReplayBuffer,
    store: ModelStore,
    cancel: CancelToken,
    rng: StdRng,
}

impl Trainer {
    pub fn new(maze: Maze, config: TrainerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Trainer {
            buffer: ReplayBuffer::new(config.replay_capacity, config.discount),
            store: ModelStore::new(config.models_dir.clone()),
            maze,
            config,
            online: None,
            target: None,
            cancel: CancelToken::new(),
            rng,
        }
    }

    pub fn maze(&self) -> &Maze {
        &self.maze
    }

    pub fn maze_mut(&mut self) -> &mut Maze {
        &mut self.maze
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.buffer
    }

    pub fn online(&self) -> Option<&NeuralNetwork> {
        self.online.as_ref()
    }

    pub fn target(&self) -> Option<&NeuralNetwork> {
        self.target.as_ref()
    }

    pub fn has_model(&self) -> bool {
        self.online.is_some()
    }

    /// A handle that stops `train()` at the next epoch boundary when cancelled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn list_models(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    /// Forget the networks and the replay buffer; the next `train()` starts fresh.
    pub fn reset_models(&mut self) {
        self.online = None;
        self.target = None;
        self.buffer.clear();
    }

    /// Use `network` as the online network. The target becomes a copy of it
    /// and the replay buffer is emptied.
    pub fn install_model(&mut self, network: NeuralNetwork) -> Result<()> {
        network.validate()?;
        self.check_architecture(&network)?;
        self.target = Some(network.clone());
        self.online = Some(network);
        self.buffer.clear();
        Ok(())
    }

    /// Load `<models_dir>/<name>.bin`. On failure the trainer keeps whatever
    /// model it had before.
    pub fn load_model(&mut self, name: &str) -> Result<()> {
        let network: NeuralNetwork = self.store.load(name)?;
        self.install_model(network)?;
        info!("Model '{}' loaded successfully.", name);
        Ok(())
    }

    pub fn save_model(&self, name: &str) -> Result<PathBuf> {
        let online = self
            .online
            .as_ref()
            .ok_or_else(|| MazeError::UninitializedModels("no model to save".to_string()))?;
        self.store.save(name, online)
    }

    /// Run up to `epochs` training episodes and save the model as `model_name`.
    pub fn train(
        &mut self,
        epochs: usize,
        batch_size: usize,
        max_steps: usize,
        model_name: &str,
    ) -> Result<TrainingReport> {
        if batch_size == 0 {
            return Err(MazeError::invalid_parameter("batch_size", "must be at least 1"));
        }
        if max_steps == 0 {
            return Err(MazeError::invalid_parameter("max_steps", "must be at least 1"));
        }
        self.store.path_for(model_name)?;
        self.ensure_models()?;

        let mut session = TrainingSession::new(
            self.config.exploration.clone(),
            self.config.early_stop.clone(),
            self.maze.area(),
        );
        let started = Instant::now();
        let mut records = Vec::with_capacity(epochs);
        let mut stop_reason = StopReason::Exhausted;

        info!("Starting training: {} epochs, max {} steps", epochs, max_steps);
        info!(
            "Model: {} | Epsilon: {:.3} -> {:.3}",
            model_name, self.config.exploration.initial_epsilon, self.config.exploration.min_epsilon
        );

        for epoch in 0..epochs {
            if self.cancel.is_cancelled() {
                info!("Training interrupted, saving model before returning");
                stop_reason = StopReason::Cancelled;
                break;
            }

            let (outcome, steps) = self.run_episode(max_steps, session.epsilon())?;
            session.record_episode(outcome, steps);
            let loss = self.learn(batch_size, &mut session)?;
            let converged = session.finish_epoch();

            let record = EpochRecord {
                epoch,
                outcome,
                steps,
                loss: loss.unwrap_or(0.0),
                trained: loss.is_some(),
                win_rate: session.win_rate(),
                epsilon: session.epsilon(),
                elapsed_secs: started.elapsed().as_secs_f64(),
            };
            info!("{}", record.log_line());
            records.push(record);

            if converged {
                info!(
                    "Early stop: win rate stayed >= {:.2} for {} epochs",
                    self.config.early_stop.win_rate, self.config.early_stop.consecutive_epochs
                );
                stop_reason = StopReason::EarlyStop;
                break;
            }
        }

        let model_path = match stop_reason {
            StopReason::Cancelled => match self.save_model(model_name) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Could not save model '{}' after interruption: {}", model_name, e);
                    None
                }
            },
            _ => Some(self.save_model(model_name)?),
        };
        self.cancel.reset();

        Ok(TrainingReport {
            model_name: model_name.to_string(),
            model_path,
            stop_reason,
            epochs_run: session.epochs_completed(),
            learning_steps: session.learning_steps(),
            final_epsilon: session.epsilon(),
            final_win_rate: session.win_rate(),
            best_steps: session.best_steps(),
            epochs: records,
        })
    }

    /// Greedy rollout from `start` with no exploration and no learning.
    pub fn play(&mut self, start: Cell, max_steps: usize) -> Result<PlayOutcome> {
        let online = self
            .online
            .as_ref()
            .ok_or_else(|| MazeError::UninitializedModels("no model loaded".to_string()))?;
        if !self.maze.is_free(start) {
            return Err(MazeError::invalid_parameter(
                "start".to_string(),
                format!("{} is not a free cell", start),
            ));
        }

        self.maze.reset(Some(start));
        let mut prev = self.maze.state();
        let mut path = vec![prev];
        let mut steps = 0;
        let mut total_reward = 0.0;

        let status = if start == self.maze.target() {
            PlayStatus::Win
        } else {
            loop {
                if steps >= max_steps {
                    break PlayStatus::Timeout;
                }
                let valid = self.maze.valid_actions(None);
                let state = self.maze.observe();
                let action = match greedy_action(online, &state, &valid) {
                    Some(action) => action,
                    None => break PlayStatus::Stuck,
                };

                steps += 1;
                let step = self.maze.act(action, Some(prev));
                total_reward += step.reward;
                prev = self.maze.state();
                path.push(prev);

                if step.status == Status::Win {
                    break PlayStatus::Win;
                }
            }
        };

        info!("Evaluation from {} ended in {} steps: {:?}", start, steps, status);
        Ok(PlayOutcome {
            status,
            steps,
            path,
            total_reward,
        })
    }

    fn check_architecture<M: QModel>(&self, network: &M) -> Result<()> {
        let input = self.maze.observation_len();
        if network.input_dim() != input || network.num_actions() != Action::COUNT {
            return Err(MazeError::dimension_mismatch(
                format!("{} inputs and {} actions", input, Action::COUNT),
                format!("{} inputs and {} actions", network.input_dim(), network.num_actions()),
            ));
        }
        Ok(())
    }

    fn ensure_models(&mut self) -> Result<()> {
        if self.online.is_none() {
            let network = NeuralNetwork::new(
                self.maze.observation_len(),
                Action::COUNT,
                &self.config.network,
                &mut self.rng,
            )?;
            debug!(
                "Built Q-network with layer sizes {:?}",
                std::iter::once(network.input_dim())
                    .chain(network.layers.iter().map(|l| l.output_size()))
                    .collect::<Vec<_>>()
            );
            self.online = Some(network);
            self.target = None;
        }
        if let Some(online) = &self.online {
            self.check_architecture(online)?;
            if self.target.is_none() {
                self.target = Some(online.clone());
            }
        }
        Ok(())
    }

    fn run_episode(&mut self, max_steps: usize, epsilon: f32) -> Result<(EpisodeOutcome, usize)> {
        let online = self
            .online
            .as_ref()
            .ok_or_else(|| MazeError::UninitializedModels("online network missing".to_string()))?;

        self.maze.reset(None);
        let mut prev = self.maze.state();
        let mut state = self.maze.observe();
        let mut steps = 0;

        loop {
            steps += 1;

            let valid = self.maze.valid_actions(None);
            let explore = self.rng.gen::<f32>() < epsilon;
            let choice = if explore {
                valid.choose(&mut self.rng).copied()
            } else {
                greedy_action(online, &state, &valid)
            };
            let action = match choice {
                Some(action) => action,
                None => {
                    let penalty = self.config.stuck_penalty;
                    self.buffer
                        .remember(Transition::new(state.clone(), Action::Up, penalty, state, true));
                    return Ok((EpisodeOutcome::Stuck, steps));
                }
            };

            let step = self.maze.act(action, Some(prev));
            let won = step.status == Status::Win;
            self.buffer.remember(Transition::new(
                state.clone(),
                action,
                step.reward,
                step.observation.clone(),
                won,
            ));
            prev = self.maze.state();

            if won {
                return Ok((EpisodeOutcome::Win, steps));
            }

            if steps >= max_steps {
                let penalty = self.config.timeout_penalty;
                self.buffer
                    .remember(Transition::new(state, action, penalty, step.observation, true));
                return Ok((EpisodeOutcome::Timeout, steps));
            }

            state = step.observation;
        }
    }

    /// Gradient steps after an episode. Returns the last step's loss, or `None`
    /// when no step was taken because the buffer is still too small.
    fn learn(&mut self, batch_size: usize, session: &mut TrainingSession) -> Result<Option<f32>> {
        let threshold = batch_size.min(self.config.min_replay_size).max(1);
        if self.buffer.len() < threshold || self.config.train_iters_per_epoch == 0 {
            return Ok(None);
        }

        let mut loss = 0.0;
        for _ in 0..self.config.train_iters_per_epoch {
            let (inputs, targets) = self.buffer.build_training_batch(
                self.online.as_ref(),
                self.target.as_ref(),
                batch_size,
                &mut self.rng,
            )?;
            let online = self
                .online
                .as_mut()
                .ok_or_else(|| MazeError::UninitializedModels("online network missing".to_string()))?;
            loss = online.fit_one_step(inputs.view(), targets.view())?;

            let learning_steps = session.record_learning_step();
            if let TargetSync::EveryLearningSteps(every) = self.config.target_sync {
                if every > 0 && learning_steps % every == 0 {
                    self.sync_target()?;
                }
            }
        }
        if self.config.target_sync == TargetSync::EveryEpoch {
            self.sync_target()?;
        }
        Ok(Some(loss))
    }

    /// Copy the online network's weights into the target network.
    pub fn sync_target(&mut self) -> Result<()> {
        match (&self.online, &mut self.target) {
            (Some(online), Some(target)) => {
                target.set_weights(&online.weights())?;
                debug!("Target network synchronized");
                Ok(())
            }
            _ => Err(MazeError::UninitializedModels(
                "online and target networks must exist to sync".to_string(),
            )),
        }
    }
}
