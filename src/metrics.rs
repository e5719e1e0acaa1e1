use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::trainer::EpisodeOutcome;

/// One line of the training log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub epoch: usize,
    pub outcome: EpisodeOutcome,
    pub steps: usize,
    /// Loss of the epoch's last gradient step. 0.0 when `trained` is false.
    pub loss: f32,
    /// Whether any gradient step ran this epoch.
    #[serde(default)]
    pub trained: bool,
    pub win_rate: f32,
    pub epsilon: f32,
    pub elapsed_secs: f64,
}

impl EpochRecord {
    /// Human-readable log line.
    pub fn log_line(&self) -> String {
        format!(
            "Epoch {:03} | {:<7} | Steps: {:4} | Loss: {:.4} | Win Rate: {:.3} | Epsilon: {:.3} | {}",
            self.epoch,
            self.outcome.label(),
            self.steps,
            self.loss,
            self.win_rate,
            self.epsilon,
            format_elapsed(Duration::from_secs_f64(self.elapsed_secs)),
        )
    }
}

/// Why a `train()` call returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// All requested epochs ran.
    Exhausted,
    /// The win rate held above the threshold long enough.
    EarlyStop,
    /// The cancel token was set.
    Cancelled,
}

/// Summary of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub model_name: String,
    /// Where the model was saved. `None` if saving after an interruption failed.
    pub model_path: Option<PathBuf>,
    pub stop_reason: StopReason,
    pub epochs_run: usize,
    pub learning_steps: usize,
    pub final_epsilon: f32,
    pub final_win_rate: f32,
    pub best_steps: Option<usize>,
    pub epochs: Vec<EpochRecord>,
}

impl TrainingReport {
    /// Mean loss over the epochs that trained.
    pub fn mean_loss(&self) -> f32 {
        let trained: Vec<f32> = self.epochs.iter().filter(|e| e.trained).map(|e| e.loss).collect();
        if trained.is_empty() {
            0.0
        } else {
            trained.iter().sum::<f32>() / trained.len() as f32
        }
    }

    /// Export the report, including every epoch record, as JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

/// `12.3s`, `4m 5s` or `1.2h`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let seconds = elapsed.as_secs_f64();
    if seconds < 60.0 {
        format!("{:.1}s", seconds)
    } else if seconds < 3600.0 {
        format!("{}m {}s", (seconds / 60.0) as u64, (seconds % 60.0) as u64)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}
