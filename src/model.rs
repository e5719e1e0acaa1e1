//! # Q-Model Interface
//!
//! The trainer and replay buffer only talk to value networks through
//! [`QModel`]. Anything that can predict a batch of Q-value rows, take one
//! optimizer step, hand out and accept its parameters, and round-trip through
//! a file can stand in for the in-tree [`NeuralNetwork`](crate::network::NeuralNetwork).
//!
//! [`ModelStore`] maps model names to files under a directory
//! (`saved_models/` by default).

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{MazeError, Result};

/// Weights and biases of one dense layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    pub weights: Array2<f32>,
    pub biases: Array1<f32>,
}

/// Narrow value-network interface.
pub trait QModel {
    /// Length of the feature vectors the model accepts.
    fn input_dim(&self) -> usize;

    /// Number of Q-values produced per state.
    fn num_actions(&self) -> usize;

    /// `batch × input_dim` in, `batch × num_actions` out. No side effects.
    fn predict(&self, states: ArrayView2<f32>) -> Array2<f32>;

    /// One gradient step towards `targets`. Returns the loss measured before the update.
    fn fit_one_step(&mut self, inputs: ArrayView2<f32>, targets: ArrayView2<f32>) -> Result<f32>;

    fn weights(&self) -> Vec<LayerParams>;

    /// Replace all parameters. Shapes must match the current architecture.
    fn set_weights(&mut self, params: &[LayerParams]) -> Result<()>;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>
    where
        Self: Sized;
}

/// Name-keyed model files in one directory.
#[derive(Clone, Debug)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub const EXTENSION: &'static str = "bin";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ModelStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `name`. A trailing `.bin` on the name is ignored.
    /// Names must stay inside the store directory: no separators, `.` or `..`.
    pub fn path_for(&self, name: &str) -> Result<PathBuf> {
        let suffix = format!(".{}", Self::EXTENSION);
        let stem = name.strip_suffix(suffix.as_str()).unwrap_or(name);
        if stem.is_empty() || stem == "." || stem == ".." || stem.contains(|c: char| c == '/' || c == '\\') {
            return Err(MazeError::invalid_parameter(
                "model name".to_string(),
                format!("'{}' is not a plain file name", name),
            ));
        }
        Ok(self.dir.join(format!("{}.{}", stem, Self::EXTENSION)))
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_for(name).map(|path| path.is_file()).unwrap_or(false)
    }

    /// Write `model` to a temporary file and rename it into place, so an
    /// interrupted save never leaves a truncated model behind. The temporary
    /// file is removed if writing or renaming fails.
    pub fn save<M: QModel>(&self, name: &str, model: &M) -> Result<PathBuf> {
        let path = self.path_for(name)?;
        fs::create_dir_all(&self.dir)?;
        let tmp = path.with_extension(format!("{}.tmp", Self::EXTENSION));
        let written = model.save(&tmp).and_then(|()| fs::rename(&tmp, &path).map_err(MazeError::from));
        if let Err(e) = written {
            if tmp.exists() {
                let _ = fs::remove_file(&tmp);
            }
            return Err(e);
        }
        info!("Model saved: {}", path.display());
        Ok(path)
    }

    pub fn load<M: QModel>(&self, name: &str) -> Result<M> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(MazeError::ModelNotFound(path));
        }
        debug!("Loading model from {}", path.display());
        M::load(&path)
    }

    /// Names of the saved models, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(Self::EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

impl Default for ModelStore {
    fn default() -> Self {
        ModelStore::new("saved_models")
    }
}
