use std::path::Path;

use ndarray::{array, Array1, Array2, ArrayD, ArrayView2, IxDyn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{MazeError, Result};
use crate::maze::Action;
use crate::model::{LayerParams, QModel};
use crate::network::NeuralNetwork;
use crate::replay_buffer::{flatten_state, ReplayBuffer, Transition};

/// Returns the same Q-row for every state.
struct FixedQ {
    row: Array1<f32>,
}

impl QModel for FixedQ {
    fn input_dim(&self) -> usize {
        2
    }

    fn num_actions(&self) -> usize {
        self.row.len()
    }

    fn predict(&self, states: ArrayView2<f32>) -> Array2<f32> {
        let mut out = Array2::zeros((states.nrows(), self.row.len()));
        for mut r in out.rows_mut() {
            r.assign(&self.row);
        }
        out
    }

    fn fit_one_step(&mut self, _inputs: ArrayView2<f32>, _targets: ArrayView2<f32>) -> Result<f32> {
        Ok(0.0)
    }

    fn weights(&self) -> Vec<LayerParams> {
        Vec::new()
    }

    fn set_weights(&mut self, _params: &[LayerParams]) -> Result<()> {
        Ok(())
    }

    fn save(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        Err(MazeError::ModelNotFound(path.to_path_buf()))
    }
}

/// Q-value `j` is `scale * x0 + j`, so every row depends on its state.
struct LinearQ {
    scale: f32,
}

impl QModel for LinearQ {
    fn input_dim(&self) -> usize {
        2
    }

    fn num_actions(&self) -> usize {
        Action::COUNT
    }

    fn predict(&self, states: ArrayView2<f32>) -> Array2<f32> {
        Array2::from_shape_fn((states.nrows(), Action::COUNT), |(i, j)| self.scale * states[[i, 0]] + j as f32)
    }

    fn fit_one_step(&mut self, _inputs: ArrayView2<f32>, _targets: ArrayView2<f32>) -> Result<f32> {
        Ok(0.0)
    }

    fn weights(&self) -> Vec<LayerParams> {
        Vec::new()
    }

    fn set_weights(&mut self, _params: &[LayerParams]) -> Result<()> {
        Ok(())
    }

    fn save(&self, _path: &Path) -> Result<()> {
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        Err(MazeError::ModelNotFound(path.to_path_buf()))
    }
}

fn transition(reward: f32, done: bool, action: Action) -> Transition {
    Transition::new(array![0.5, -0.5], action, reward, array![0.6, -0.4], done)
}

#[test]
fn test_replay_buffer_add_and_sample() {
    let mut buffer = ReplayBuffer::new(10, 0.99);
    let t = transition(1.0, false, Action::Down);
    buffer.remember(t.clone());
    assert_eq!(buffer.len(), 1);

    let mut rng = StdRng::seed_from_u64(0);
    let sample = buffer.sample_batch(1, &mut rng).unwrap();
    assert_eq!(sample[0], &t);
}

#[test]
fn test_replay_buffer_evicts_oldest() {
    let mut buffer = ReplayBuffer::new(3, 0.99);
    for i in 0..4 {
        buffer.remember(transition(i as f32, false, Action::Up));
    }

    assert_eq!(buffer.len(), 3);
    assert_eq!(buffer.capacity(), 3);
    let rewards: Vec<f32> = buffer.iter().map(|t| t.reward).collect();
    assert_eq!(rewards, vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_stored_states_are_copies() {
    let mut buffer = ReplayBuffer::new(3, 0.99);
    let mut state = array![1.0, 2.0];
    buffer.remember(Transition::new(state.clone(), Action::Up, 0.0, state.clone(), false));
    state[0] = 100.0;
    assert_eq!(buffer.iter().next().unwrap().state, array![1.0, 2.0]);
}

#[test]
fn test_sample_empty_buffer() {
    let buffer = ReplayBuffer::new(10, 0.99);
    let mut rng = StdRng::seed_from_u64(0);
    assert!(buffer.is_empty());
    assert!(matches!(buffer.sample_batch(4, &mut rng), Err(MazeError::EmptyBuffer(_))));
}

#[test]
fn test_sample_without_replacement() {
    let mut buffer = ReplayBuffer::new(10, 0.99);
    for i in 0..5 {
        buffer.remember(transition(i as f32, false, Action::Up));
    }

    let mut rng = StdRng::seed_from_u64(7);
    let sample = buffer.sample_batch(10, &mut rng).unwrap();
    assert_eq!(sample.len(), 5);
    let mut rewards: Vec<f32> = sample.iter().map(|t| t.reward).collect();
    rewards.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert_eq!(rewards, vec![0.0, 1.0, 2.0, 3.0, 4.0]);

    assert_eq!(buffer.sample_batch(3, &mut rng).unwrap().len(), 3);
}

#[test]
fn test_clear() {
    let mut buffer = ReplayBuffer::new(4, 0.9);
    buffer.remember(transition(0.0, true, Action::Left));
    buffer.clear();
    assert!(buffer.is_empty());
    assert_eq!(buffer.discount(), 0.9);
}

#[test]
fn test_capacity_is_at_least_one() {
    let mut buffer = ReplayBuffer::new(0, 0.99);
    buffer.remember(transition(0.0, false, Action::Up));
    buffer.remember(transition(1.0, false, Action::Up));
    assert_eq!(buffer.len(), 1);
    assert_eq!(buffer.iter().next().unwrap().reward, 1.0);
}

#[test]
fn test_from_dyn_shapes() {
    let flat = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, 2.0, 3.0]).unwrap();
    let batched = ArrayD::from_shape_vec(IxDyn(&[1, 3]), vec![4.0, 5.0, 6.0]).unwrap();

    let t = Transition::from_dyn(flat, Action::Right, 0.5, batched, false).unwrap();
    assert_eq!(t.state, array![1.0, 2.0, 3.0]);
    assert_eq!(t.next_state, array![4.0, 5.0, 6.0]);

    let wide = ArrayD::from_shape_vec(IxDyn(&[2, 3]), vec![0.0; 6]).unwrap();
    assert!(matches!(flatten_state(wide), Err(MazeError::DimensionMismatch { .. })));

    let scalar = ArrayD::from_shape_vec(IxDyn(&[]), vec![1.0]).unwrap();
    assert!(matches!(flatten_state(scalar), Err(MazeError::DimensionMismatch { .. })));
}

#[test]
fn test_training_batch_requires_models() {
    let mut buffer = ReplayBuffer::new(4, 0.99);
    buffer.remember(transition(0.0, false, Action::Up));
    let mut rng = StdRng::seed_from_u64(0);
    let online = FixedQ { row: array![0.0, 0.0, 0.0, 0.0] };

    let result = buffer.build_training_batch::<NeuralNetwork, _>(None, None, 1, &mut rng);
    assert!(matches!(result, Err(MazeError::UninitializedModels(_))));

    let result = buffer.build_training_batch(Some(&online), None, 1, &mut rng);
    assert!(matches!(result, Err(MazeError::UninitializedModels(_))));
}

#[test]
fn test_training_batch_empty_buffer() {
    let buffer = ReplayBuffer::new(4, 0.99);
    let mut rng = StdRng::seed_from_u64(0);
    let q = FixedQ { row: array![0.0, 0.0, 0.0, 0.0] };
    let result = buffer.build_training_batch(Some(&q), Some(&q), 8, &mut rng);
    assert!(matches!(result, Err(MazeError::EmptyBuffer(_))));
}

#[test]
fn test_terminal_target_is_reward() {
    let mut buffer = ReplayBuffer::new(4, 0.9);
    buffer.remember(transition(5.0, true, Action::Right));
    let online = FixedQ { row: array![1.0, 2.0, 3.0, 4.0] };
    let target = FixedQ { row: array![0.5, 2.0, -1.0, 0.0] };
    let mut rng = StdRng::seed_from_u64(0);

    let (inputs, targets) = buffer.build_training_batch(Some(&online), Some(&target), 1, &mut rng).unwrap();
    assert_eq!(inputs, array![[0.5, -0.5]]);
    assert_eq!(targets, array![[1.0, 2.0, 3.0, 5.0]]);
}

#[test]
fn test_non_terminal_target_bootstraps() {
    let mut buffer = ReplayBuffer::new(4, 0.9);
    buffer.remember(transition(1.0, false, Action::Up));
    let online = FixedQ { row: array![1.0, 2.0, 3.0, 4.0] };
    let target = FixedQ { row: array![0.5, 2.0, -1.0, 0.0] };
    let mut rng = StdRng::seed_from_u64(0);

    let (_, targets) = buffer.build_training_batch(Some(&online), Some(&target), 1, &mut rng).unwrap();
    assert!((targets[[0, 0]] - (1.0 + 0.9 * 2.0)).abs() < 1e-6);
    assert_eq!(targets.row(0).slice(ndarray::s![1..]).to_vec(), vec![2.0, 3.0, 4.0]);
}

#[test]
fn test_mixed_batch_rows_match_their_transitions() {
    let discount = 0.9;
    let mut buffer = ReplayBuffer::new(8, discount);
    for k in 0..6 {
        let x = k as f32;
        buffer.remember(Transition::new(
            array![x, 0.0],
            Action::from_index(k % 4).unwrap(),
            10.0 * x,
            array![x + 0.5, 0.0],
            k % 2 == 0,
        ));
    }
    let online = LinearQ { scale: 1.0 };
    let target = LinearQ { scale: 2.0 };
    let mut rng = StdRng::seed_from_u64(9);

    let (inputs, targets) = buffer.build_training_batch(Some(&online), Some(&target), 6, &mut rng).unwrap();
    let mut seen: Vec<usize> = (0..6).map(|i| inputs[[i, 0]] as usize).collect();

    for (i, &k) in seen.iter().enumerate() {
        let x = k as f32;
        let action = k % 4;
        // max over the target row at x + 0.5 is the last action
        let expected_taken = if k % 2 == 0 {
            10.0 * x
        } else {
            10.0 * x + discount * (2.0 * (x + 0.5) + 3.0)
        };
        for j in 0..Action::COUNT {
            let expected = if j == action { expected_taken } else { x + j as f32 };
            assert!(
                (targets[[i, j]] - expected).abs() < 1e-4,
                "row {} (k = {}), action {}: {} != {}",
                i,
                k,
                j,
                targets[[i, j]],
                expected
            );
        }
    }

    seen.sort_unstable();
    assert_eq!(seen, vec![0, 1, 2, 3, 4, 5]);
}

#[test]
fn test_training_batch_shapes() {
    let mut buffer = ReplayBuffer::new(16, 0.99);
    for i in 0..10 {
        buffer.remember(transition(i as f32, i % 3 == 0, Action::from_index(i % 4).unwrap()));
    }
    let q = FixedQ { row: array![0.0, 0.0, 0.0, 0.0] };
    let mut rng = StdRng::seed_from_u64(3);

    let (inputs, targets) = buffer.build_training_batch(Some(&q), Some(&q), 6, &mut rng).unwrap();
    assert_eq!(inputs.dim(), (6, 2));
    assert_eq!(targets.dim(), (6, 4));
}
