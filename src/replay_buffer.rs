use std::collections::VecDeque;

use ndarray::{Array1, Array2, ArrayD, Axis, Ix1};
use rand::seq::index;
use rand::Rng;

use crate::error::{MazeError, Result};
use crate::maze::Action;
use crate::model::QModel;

/// One step of experience. States are owned copies, so later changes to the
/// environment cannot alter stored history.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    pub state: Array1<f32>,
    pub action: Action,
    pub reward: f32,
    pub next_state: Array1<f32>,
    pub done: bool,
}

impl Transition {
    pub fn new(state: Array1<f32>, action: Action, reward: f32, next_state: Array1<f32>, done: bool) -> Self {
        Transition {
            state,
            action,
            reward,
            next_state,
            done,
        }
    }

    /// Build a transition from states shaped either `[n]` or `[1, n]`.
    pub fn from_dyn(
        state: ArrayD<f32>,
        action: Action,
        reward: f32,
        next_state: ArrayD<f32>,
        done: bool,
    ) -> Result<Self> {
        Ok(Transition {
            state: flatten_state(state)?,
            action,
            reward,
            next_state: flatten_state(next_state)?,
            done,
        })
    }
}

/// Strip a singleton batch axis from a state vector.
pub fn flatten_state(state: ArrayD<f32>) -> Result<Array1<f32>> {
    let shape = state.shape().to_vec();
    let flat = match shape.as_slice() {
        [_] => state,
        [1, _] => state.index_axis_move(Axis(0), 0),
        _ => {
            return Err(MazeError::dimension_mismatch(
                "[n] or [1, n]".to_string(),
                format!("{:?}", shape),
            ))
        }
    };
    flat.into_dimensionality::<Ix1>()
        .map_err(|e| MazeError::dimension_mismatch("one axis".to_string(), e.to_string()))
}

/// Fixed-capacity FIFO store of transitions.
#[derive(Clone, Debug)]
pub struct ReplayBuffer {
    buffer: VecDeque<Transition>,
    capacity: usize,
    discount: f32,
}

impl ReplayBuffer {
    pub fn new(capacity: usize, discount: f32) -> Self {
        let capacity = capacity.max(1);
        ReplayBuffer {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            discount,
        }
    }

    /// Append a transition, evicting the oldest one when full.
    pub fn remember(&mut self, transition: Transition) {
        if self.buffer.len() == self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(transition);
    }

    /// Draw `min(n, len)` distinct transitions uniformly at random.
    pub fn sample_batch<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<&Transition>> {
        if self.buffer.is_empty() {
            return Err(MazeError::EmptyBuffer("cannot sample from an empty replay buffer".to_string()));
        }
        let amount = n.min(self.buffer.len());
        Ok(index::sample(rng, self.buffer.len(), amount)
            .into_iter()
            .map(|i| &self.buffer[i])
            .collect())
    }

    /// Sample a batch and compute DQN regression targets for it.
    ///
    /// Each target row starts as the online network's Q-values for the state,
    /// and only the taken action's entry is replaced: by the reward for terminal
    /// transitions, otherwise by `reward + discount * max Q_target(next_state)`.
    pub fn build_training_batch<M: QModel, R: Rng + ?Sized>(
        &self,
        online: Option<&M>,
        target: Option<&M>,
        batch_size: usize,
        rng: &mut R,
    ) -> Result<(Array2<f32>, Array2<f32>)> {
        let (online, target) = match (online, target) {
            (Some(online), Some(target)) => (online, target),
            _ => {
                return Err(MazeError::UninitializedModels(
                    "online and target networks must be set before building a batch".to_string(),
                ))
            }
        };

        let batch = self.sample_batch(batch_size, rng)?;
        let state_dim = batch[0].state.len();
        if state_dim != online.input_dim() {
            return Err(MazeError::dimension_mismatch(
                format!("{} state features", online.input_dim()),
                format!("{}", state_dim),
            ));
        }

        let mut states = Array2::zeros((batch.len(), state_dim));
        let mut next_states = Array2::zeros((batch.len(), state_dim));
        for (i, t) in batch.iter().enumerate() {
            if t.state.len() != state_dim || t.next_state.len() != state_dim {
                return Err(MazeError::dimension_mismatch(
                    format!("{} state features", state_dim),
                    format!("{} / {}", t.state.len(), t.next_state.len()),
                ));
            }
            states.row_mut(i).assign(&t.state);
            next_states.row_mut(i).assign(&t.next_state);
        }

        let mut targets = online.predict(states.view());
        let next_q_values = target.predict(next_states.view());

        for (i, t) in batch.iter().enumerate() {
            let value = if t.done {
                t.reward
            } else {
                let max_next_q = next_q_values
                    .row(i)
                    .iter()
                    .fold(f32::NEG_INFINITY, |max, &val| max.max(val));
                t.reward + self.discount * max_next_q
            };
            targets[[i, t.action.index()]] = value;
        }

        Ok((states, targets))
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn discount(&self) -> f32 {
        self.discount
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Transition> {
        self.buffer.iter()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
