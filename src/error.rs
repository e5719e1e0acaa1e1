use thiserror::Error;

/// Result type for treasure_hunt operations
pub type Result<T> = std::result::Result<T, MazeError>;

/// Main error type for the maze, replay buffer, network and trainer
#[derive(Debug, Error)]
pub enum MazeError {
    /// Invalid dimensions for operations
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid parameter value
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        name: String,
        reason: String,
    },

    /// Maze grid rejected at construction
    #[error("Invalid maze: {0}")]
    InvalidMaze(String),

    /// Sampling from a replay buffer with nothing in it
    #[error("Empty buffer: {0}")]
    EmptyBuffer(String),

    /// Online or target network requested before one was built or loaded
    #[error("Models not initialized: {0}")]
    UninitializedModels(String),

    /// No saved model file under the requested name
    #[error("Model not found: {}", .0.display())]
    ModelNotFound(std::path::PathBuf),

    /// IO errors (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Model (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration file errors
    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),

    /// Metrics export errors
    #[error("Export error: {0}")]
    Export(#[from] serde_json::Error),
}

// Helper functions for common error patterns
impl MazeError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        MazeError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_parameter<S: Into<String>>(name: S, reason: S) -> Self {
        MazeError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
