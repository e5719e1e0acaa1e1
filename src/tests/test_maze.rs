use crate::error::MazeError;
use crate::maze::{
    Action, Cell, FeatureSet, Maze, MazeRenderer, NoMovePolicy, ShapedReward, Status, TextRenderer,
};

fn assert_close(actual: f32, expected: f32) {
    assert!((actual - expected).abs() < 1e-6, "expected {}, got {}", expected, actual);
}

fn corridor(reward: ShapedReward) -> Maze {
    Maze::with_options(
        vec![vec![1, 1, 1]],
        Cell::new(0, 0),
        Cell::new(0, 2),
        FeatureSet::Extended,
        NoMovePolicy::Stuck,
        Box::new(reward),
    )
    .unwrap()
}

fn enclosed(policy: NoMovePolicy) -> Maze {
    Maze::with_options(
        vec![vec![1, 0, 1]],
        Cell::new(0, 0),
        Cell::new(0, 2),
        FeatureSet::Extended,
        policy,
        Box::new(ShapedReward::default()),
    )
    .unwrap()
}

#[test]
fn test_default_maze_layout() {
    let maze = Maze::default_maze();
    assert_eq!(maze.shape(), (7, 7));
    assert_eq!(maze.area(), 49);
    assert_eq!(maze.start(), Cell::new(0, 0));
    assert_eq!(maze.target(), Cell::new(6, 6));
    assert_eq!(maze.state(), maze.start());
    assert!(!maze.is_free(Cell::new(0, 1)));
    assert!(!maze.is_free(Cell::new(7, 0)));
}

#[test]
fn test_invalid_grids_are_rejected() {
    let cases = vec![
        (vec![], Cell::new(0, 0), Cell::new(0, 0)),
        (vec![vec![1, 1], vec![1]], Cell::new(0, 0), Cell::new(0, 1)),
        (vec![vec![1, 2]], Cell::new(0, 0), Cell::new(0, 0)),
        (vec![vec![0, 1]], Cell::new(0, 0), Cell::new(0, 1)),
        (vec![vec![1, 0]], Cell::new(0, 0), Cell::new(0, 1)),
        (vec![vec![1, 1]], Cell::new(0, 0), Cell::new(3, 3)),
    ];
    for (grid, start, target) in cases {
        match Maze::new(grid.clone(), start, target) {
            Err(MazeError::InvalidMaze(_)) => {}
            other => panic!("grid {:?} should be rejected, got {:?}", grid, other),
        }
    }
}

#[test]
fn test_valid_actions_in_index_order() {
    let maze = Maze::default_maze();
    assert_eq!(maze.valid_actions(None), vec![Action::Down]);
    assert_eq!(
        maze.valid_actions(Some(Cell::new(1, 1))),
        vec![Action::Left, Action::Right]
    );
    assert_eq!(
        maze.valid_actions(Some(Cell::new(5, 4))),
        vec![Action::Up, Action::Down, Action::Left, Action::Right]
    );
}

#[test]
fn test_valid_actions_lead_to_free_cells() {
    let mut maze = Maze::default_maze();
    for cell in maze.free_cells() {
        for action in maze.valid_actions(Some(cell)) {
            maze.reset(Some(cell));
            maze.act(action, None);
            assert_ne!(maze.state(), cell, "{:?} from {} did not move", action, cell);
            assert!(maze.is_free(maze.state()));
        }
    }
}

#[test]
fn test_no_move_policy_stuck() {
    let maze = enclosed(NoMovePolicy::Stuck);
    assert!(maze.valid_actions(None).is_empty());
}

#[test]
fn test_no_move_policy_fallback_up() {
    let maze = enclosed(NoMovePolicy::FallbackUp);
    assert_eq!(maze.valid_actions(None), vec![Action::Up]);
}

#[test]
fn test_invalid_move_keeps_position() {
    let mut maze = Maze::default_maze();
    let before = maze.observe();
    let step = maze.act(Action::Right, Some(maze.state()));

    assert_eq!(maze.state(), Cell::new(0, 0));
    assert_eq!(step.status, Status::Playing);
    assert!(step.reward < 0.0);
    assert_close(step.reward, -1.0);
    assert_eq!(step.observation, before);

    let step = maze.act(Action::Up, None);
    assert_eq!(maze.state(), Cell::new(0, 0));
    assert_close(step.reward, -1.0);
}

#[test]
fn test_win_reward_is_exact() {
    let mut maze = Maze::new(vec![vec![1, 1]], Cell::new(0, 0), Cell::new(0, 1)).unwrap();
    let step = maze.act(Action::Right, Some(Cell::new(0, 0)));
    assert_eq!(step.status, Status::Win);
    assert_eq!(step.reward, 10.0);

    let mut maze = corridor(ShapedReward::loop_averse());
    maze.reset(Some(Cell::new(0, 1)));
    let step = maze.act(Action::Right, None);
    assert_eq!(step.status, Status::Win);
    assert_eq!(step.reward, 5.0);
}

#[test]
fn test_shaped_reward_terms() {
    let mut maze = corridor(ShapedReward::default());

    // closer: step cost + distance bonus
    let step = maze.act(Action::Right, Some(Cell::new(0, 0)));
    assert_close(step.reward, -0.05 + 0.2);

    // farther, revisited, dead end
    let step = maze.act(Action::Left, Some(Cell::new(0, 1)));
    assert_close(step.reward, -0.05 - 0.1 - 0.10 - 0.15);
    assert_eq!(maze.visit_count(Cell::new(0, 0)), 2);
}

#[test]
fn test_distance_shaping_needs_prev() {
    let mut maze = corridor(ShapedReward::default());
    let step = maze.act(Action::Right, None);
    assert_close(step.reward, -0.05);
}

#[test]
fn test_loop_averse_revisit_penalty() {
    let mut maze = corridor(ShapedReward::loop_averse());
    maze.act(Action::Right, Some(Cell::new(0, 0)));
    let step = maze.act(Action::Left, Some(Cell::new(0, 1)));
    assert_close(step.reward, -0.05 - 0.3);
}

#[test]
fn test_reset_clears_visits_and_ignores_walls() {
    let mut maze = Maze::default_maze();
    maze.act(Action::Down, None);
    maze.act(Action::Up, None);
    assert_eq!(maze.visit_count(Cell::new(0, 0)), 2);

    let state = maze.reset(Some(Cell::new(0, 1)));
    assert_eq!(state, Cell::new(0, 0));
    assert_eq!(maze.visit_count(Cell::new(0, 0)), 1);
    assert_eq!(maze.visit_count(Cell::new(1, 0)), 0);

    assert_eq!(maze.reset(Some(Cell::new(4, 4))), Cell::new(4, 4));
    assert_eq!(maze.reset(Some(Cell::new(40, 4))), Cell::new(0, 0));
}

#[test]
fn test_observe_extended() {
    let maze = Maze::default_maze();
    let obs = maze.observe();
    assert_eq!(obs.len(), 7);
    assert_eq!(obs.len(), maze.observation_len());
    assert_close(obs[0], -1.0);
    assert_close(obs[1], -1.0);
    assert_close(obs[2], 12.0 / 14.0);
    assert_eq!(obs.slice(ndarray::s![3..]).to_vec(), vec![0.0, 1.0, 0.0, 0.0]);
    assert_eq!(maze.observe(), obs);
}

#[test]
fn test_observe_position_scaling() {
    let mut maze = Maze::with_options(
        vec![vec![1], vec![1], vec![1]],
        Cell::new(0, 0),
        Cell::new(2, 0),
        FeatureSet::Position,
        NoMovePolicy::Stuck,
        Box::new(ShapedReward::default()),
    )
    .unwrap();
    assert_eq!(maze.observe().to_vec(), vec![-1.0, 0.0]);

    maze.act(Action::Down, None);
    assert_eq!(maze.observe().to_vec(), vec![0.0, 0.0]);
    maze.act(Action::Down, None);
    assert_eq!(maze.observe().to_vec(), vec![1.0, 0.0]);
}

#[test]
fn test_feature_dims_match_observations() {
    assert_eq!(FeatureSet::Position.dim(), 2);
    assert_eq!(FeatureSet::Extended.dim(), 7);

    let maze = corridor(ShapedReward::default());
    assert_eq!(maze.observation_len(), FeatureSet::Extended.dim());
    assert_eq!(maze.observe().len(), maze.observation_len());
}

#[test]
fn test_cell_parsing() {
    assert_eq!("2,3".parse::<Cell>().unwrap(), Cell::new(2, 3));
    assert_eq!(" (4, 5) ".parse::<Cell>().unwrap(), Cell::new(4, 5));
    assert!("2".parse::<Cell>().is_err());
    assert!("a,b".parse::<Cell>().is_err());
    assert!("1,2,3".parse::<Cell>().is_err());
    assert!("-1,2".parse::<Cell>().is_err());
    assert_eq!(Cell::new(1, 2).to_string(), "(1, 2)");
}

#[test]
fn test_action_indices() {
    for (i, action) in Action::ALL.iter().enumerate() {
        assert_eq!(action.index(), i);
        assert_eq!(Action::from_index(i), Some(*action));
    }
    assert_eq!(Action::from_index(Action::COUNT), None);
}

#[test]
fn test_text_renderer() {
    let maze = Maze::new(vec![vec![1, 1], vec![0, 1]], Cell::new(0, 0), Cell::new(1, 1)).unwrap();
    let renderer = TextRenderer::new();

    assert_eq!(maze.show(&renderer, None), "@ .\n# T\n");
    let path = [Cell::new(0, 0), Cell::new(0, 1)];
    assert_eq!(maze.show(&renderer, Some(&path)), "@ *\n# T\n");
    assert_eq!(TextRenderer { spaced: false }.render(&maze, &path), "@*\n#T\n");
}

#[test]
fn test_renderer_marks_start_when_agent_moved() {
    let mut maze = Maze::new(vec![vec![1, 1, 1]], Cell::new(0, 0), Cell::new(0, 2)).unwrap();
    maze.act(Action::Right, None);
    assert_eq!(maze.show(&TextRenderer { spaced: false }, None), "S@T\n");
}
