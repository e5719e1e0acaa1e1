use serde::{Deserialize, Serialize};

use super::Cell;

/// Everything a reward policy may look at after a successful move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MoveEvent {
    /// Position before this move.
    pub from: Cell,
    /// Position after this move.
    pub to: Cell,
    /// Position handed to `act` by the caller, used for distance shaping.
    pub prev: Option<Cell>,
    pub target: Cell,
    /// `to` had been entered before in this episode.
    pub revisit: bool,
    /// `to` has exactly one open neighbour.
    pub dead_end: bool,
    pub reached_target: bool,
}

/// Scores moves for [`Maze::act`](super::Maze::act).
pub trait RewardPolicy: Send {
    /// Reward for bumping into a wall or the border. The agent does not move.
    fn invalid_move(&self) -> f32;

    /// Reward for a move that changed the agent's position.
    fn on_move(&self, event: &MoveEvent) -> f32;
}

/// Additive reward shaping: step cost, revisit penalty, optional distance
/// and dead-end terms, and a fixed reward for reaching the target.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShapedReward {
    pub step_cost: f32,
    pub invalid_move: f32,
    pub revisit: f32,
    /// `(closer, farther)` terms on the Manhattan distance to the target.
    pub distance: Option<(f32, f32)>,
    pub dead_end: Option<f32>,
    pub win: f32,
}

impl Default for ShapedReward {
    fn default() -> Self {
        ShapedReward {
            step_cost: -0.05,
            invalid_move: -1.0,
            revisit: -0.10,
            distance: Some((0.2, -0.1)),
            dead_end: Some(-0.15),
            win: 10.0,
        }
    }
}

impl ShapedReward {
    /// Heavier revisit penalty, no distance or dead-end terms.
    pub fn loop_averse() -> Self {
        ShapedReward {
            step_cost: -0.05,
            invalid_move: -1.0,
            revisit: -0.3,
            distance: None,
            dead_end: None,
            win: 5.0,
        }
    }
}

impl RewardPolicy for ShapedReward {
    fn invalid_move(&self) -> f32 {
        self.invalid_move
    }

    fn on_move(&self, event: &MoveEvent) -> f32 {
        if event.reached_target {
            return self.win;
        }

        let mut reward = self.step_cost;

        if let (Some((closer, farther)), Some(prev)) = (self.distance, event.prev) {
            let before = prev.manhattan(event.target);
            let after = event.to.manhattan(event.target);
            if after < before {
                reward += closer;
            } else if after > before {
                reward += farther;
            }
        }

        if event.revisit {
            reward += self.revisit;
        }

        if let Some(penalty) = self.dead_end {
            if event.dead_end {
                reward += penalty;
            }
        }

        reward
    }
}
