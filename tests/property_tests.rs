#[cfg(test)]
mod property_tests {
    use ndarray::array;
    use proptest::prelude::*;
    use treasure_hunt::maze::{Action, Cell, FeatureSet, Maze, NoMovePolicy, ShapedReward, Status};
    use treasure_hunt::replay_buffer::{ReplayBuffer, Transition};
    use treasure_hunt::trainer::{decayed_epsilon, ExplorationConfig};

    // Random rectangular 0/1 grid with the top-left and bottom-right cells free
    fn grid_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
        (1usize..=6, 1usize..=6)
            .prop_flat_map(|(rows, cols)| prop::collection::vec(prop::collection::vec(0u8..=1, cols), rows))
            .prop_map(|mut grid| {
                let rows = grid.len();
                let cols = grid[0].len();
                grid[0][0] = 1;
                grid[rows - 1][cols - 1] = 1;
                grid
            })
    }

    fn build(grid: Vec<Vec<u8>>, features: FeatureSet, policy: NoMovePolicy) -> Maze {
        let target = Cell::new(grid.len() - 1, grid[0].len() - 1);
        Maze::with_options(grid, Cell::new(0, 0), target, features, policy, Box::new(ShapedReward::default()))
            .unwrap()
    }

    fn action_strategy() -> impl Strategy<Value = Action> {
        (0usize..4).prop_map(|i| Action::from_index(i).unwrap())
    }

    proptest! {
        #[test]
        fn test_valid_actions_stay_on_free_cells(grid in grid_strategy()) {
            let mut maze = build(grid, FeatureSet::Extended, NoMovePolicy::Stuck);
            for cell in maze.free_cells() {
                for action in maze.valid_actions(Some(cell)) {
                    maze.reset(Some(cell));
                    maze.act(action, None);
                    prop_assert!(maze.is_free(maze.state()));
                    prop_assert_eq!(maze.state().manhattan(cell), 1);
                }
            }
        }

        #[test]
        fn test_fallback_only_when_enclosed(grid in grid_strategy()) {
            let stuck = build(grid.clone(), FeatureSet::Extended, NoMovePolicy::Stuck);
            let fallback = build(grid, FeatureSet::Extended, NoMovePolicy::FallbackUp);
            for cell in stuck.free_cells() {
                let actions = stuck.valid_actions(Some(cell));
                if actions.is_empty() {
                    prop_assert_eq!(fallback.valid_actions(Some(cell)), vec![Action::Up]);
                } else {
                    prop_assert_eq!(fallback.valid_actions(Some(cell)), actions);
                }
            }
        }

        #[test]
        fn test_random_walk_keeps_invariants(
            grid in grid_strategy(),
            actions in prop::collection::vec(action_strategy(), 1..50),
        ) {
            let mut maze = build(grid, FeatureSet::Extended, NoMovePolicy::Stuck);
            let len = maze.observation_len();
            for action in actions {
                let before = maze.state();
                let allowed = maze.valid_actions(None).contains(&action);
                let step = maze.act(action, Some(before));

                prop_assert!(maze.is_free(maze.state()));
                prop_assert_eq!(step.observation.len(), len);
                prop_assert!(step.observation.iter().all(|v| (-1.0..=1.0).contains(v)));
                if !allowed {
                    prop_assert_eq!(maze.state(), before);
                    prop_assert!(step.reward < 0.0);
                }
                if step.status == Status::Win {
                    prop_assert_eq!(step.reward, 10.0);
                    prop_assert_eq!(maze.state(), maze.target());
                    maze.reset(None);
                }
            }
        }

        #[test]
        fn test_position_features_are_scaled(grid in grid_strategy()) {
            let mut maze = build(grid, FeatureSet::Position, NoMovePolicy::Stuck);
            for cell in maze.free_cells() {
                maze.reset(Some(cell));
                let obs = maze.observe();
                prop_assert_eq!(obs.len(), 2);
                prop_assert!(obs.iter().all(|v| (-1.0..=1.0).contains(v)));
            }
        }

        #[test]
        fn test_replay_buffer_never_exceeds_capacity(capacity in 1usize..50, pushes in 0usize..200) {
            let mut buffer = ReplayBuffer::new(capacity, 0.99);
            for i in 0..pushes {
                buffer.remember(Transition::new(array![i as f32], Action::Up, i as f32, array![0.0], false));
            }
            prop_assert_eq!(buffer.len(), pushes.min(capacity));
            if pushes > 0 {
                let newest = buffer.iter().last().unwrap().reward;
                prop_assert_eq!(newest, (pushes - 1) as f32);
            }
        }

        #[test]
        fn test_epsilon_never_below_minimum(
            decay in 0.5f32..0.99,
            min_epsilon in 0.0f32..0.5,
            epochs in 0usize..5000,
        ) {
            let exploration = ExplorationConfig { initial_epsilon: 1.0, decay, min_epsilon };
            let eps = decayed_epsilon(&exploration, epochs);
            prop_assert!(eps >= min_epsilon);
            prop_assert!(eps <= 1.0);
            prop_assert!(decayed_epsilon(&exploration, epochs + 1) <= eps);
        }
    }
}
