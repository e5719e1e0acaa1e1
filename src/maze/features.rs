use ndarray::Array1;
use serde::{Deserialize, Serialize};

use super::{Action, Maze};

/// Which features [`Maze::observe`] produces. The length is fixed per variant,
/// so the network input size is fixed for a training run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureSet {
    /// `[row, col]`, each scaled to `[-1, 1]`.
    Position,
    /// `Position`, normalized distance to target, then one 0/1 flag per action
    /// telling whether that move is open.
    #[default]
    Extended,
}

impl FeatureSet {
    /// Length of the observation vectors this set produces.
    pub fn dim(&self) -> usize {
        match self {
            FeatureSet::Position => 2,
            FeatureSet::Extended => 3 + Action::COUNT,
        }
    }

    pub(super) fn observe(&self, maze: &Maze) -> Array1<f32> {
        let (rows, cols) = maze.shape();
        let cell = maze.state();

        let mut features = Vec::with_capacity(self.dim());
        features.push(scale(cell.row, rows));
        features.push(scale(cell.col, cols));

        if let FeatureSet::Extended = self {
            let dist = cell.manhattan(maze.target()) as f32;
            features.push(dist / (rows + cols) as f32);

            let open = maze.open_neighbours(cell);
            for action in Action::ALL {
                features.push(if open.contains(&action) { 1.0 } else { 0.0 });
            }
        }

        Array1::from_vec(features)
    }
}

fn scale(x: usize, n: usize) -> f32 {
    if n <= 1 {
        0.0
    } else {
        2.0 * x as f32 / (n - 1) as f32 - 1.0
    }
}
