use std::collections::VecDeque;

use super::config::{EarlyStopConfig, ExplorationConfig};

/// How an episode ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EpisodeOutcome {
    Win,
    Timeout,
    /// No valid action was left.
    Stuck,
}

impl EpisodeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            EpisodeOutcome::Win => "WIN",
            EpisodeOutcome::Timeout => "TIMEOUT",
            EpisodeOutcome::Stuck => "STUCK",
        }
    }
}

/// `max(min_epsilon, initial * decay^epochs)`.
pub fn decayed_epsilon(exploration: &ExplorationConfig, epochs: usize) -> f32 {
    let exponent = i32::try_from(epochs).unwrap_or(i32::MAX);
    exploration
        .min_epsilon
        .max(exploration.initial_epsilon * exploration.decay.powi(exponent))
}

/// Mutable state of one `train()` call.
#[derive(Debug, Clone)]
pub struct TrainingSession {
    exploration: ExplorationConfig,
    early_stop: EarlyStopConfig,
    epsilon: f32,
    epochs_completed: usize,
    learning_steps: usize,
    win_history: VecDeque<bool>,
    window: usize,
    streak: usize,
    best_steps: Option<usize>,
}

impl TrainingSession {
    /// `window` is the number of recent episodes the win rate covers.
    pub fn new(exploration: ExplorationConfig, early_stop: EarlyStopConfig, window: usize) -> Self {
        let window = window.max(1);
        TrainingSession {
            epsilon: decayed_epsilon(&exploration, 0),
            exploration,
            early_stop,
            epochs_completed: 0,
            learning_steps: 0,
            win_history: VecDeque::with_capacity(window),
            window,
            streak: 0,
            best_steps: None,
        }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    pub fn epochs_completed(&self) -> usize {
        self.epochs_completed
    }

    pub fn learning_steps(&self) -> usize {
        self.learning_steps
    }

    /// Fewest steps any winning episode took.
    pub fn best_steps(&self) -> Option<usize> {
        self.best_steps
    }

    /// Count one gradient step and return the new total.
    pub fn record_learning_step(&mut self) -> usize {
        self.learning_steps += 1;
        self.learning_steps
    }

    /// Push an episode result into the win window.
    pub fn record_episode(&mut self, outcome: EpisodeOutcome, steps: usize) {
        if self.win_history.len() == self.window {
            self.win_history.pop_front();
        }
        let won = outcome == EpisodeOutcome::Win;
        self.win_history.push_back(won);
        if won && self.best_steps.map_or(true, |best| steps < best) {
            self.best_steps = Some(steps);
        }
    }

    /// Fraction of wins among the last `window` episodes.
    pub fn win_rate(&self) -> f32 {
        if self.win_history.is_empty() {
            return 0.0;
        }
        let wins = self.win_history.iter().filter(|&&w| w).count();
        wins as f32 / self.win_history.len() as f32
    }

    /// Close the epoch: decay epsilon and update the early-stop streak.
    /// Returns `true` when training should stop early.
    pub fn finish_epoch(&mut self) -> bool {
        self.epochs_completed += 1;
        self.epsilon = decayed_epsilon(&self.exploration, self.epochs_completed);

        if self.win_rate() >= self.early_stop.win_rate {
            self.streak += 1;
        } else {
            self.streak = 0;
        }
        self.early_stop.consecutive_epochs > 0 && self.streak >= self.early_stop.consecutive_epochs
    }
}
