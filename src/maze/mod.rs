//! # Maze Environment
//!
//! A deterministic grid world. The agent starts on a free cell and moves one
//! cell at a time until it reaches the target. Walls and the grid border block
//! movement; a blocked move costs a penalty but is never an error.
//!
//! ```rust
//! use treasure_hunt::maze::{Action, Cell, Maze, Status};
//!
//! let grid = vec![
//!     vec![1, 1],
//!     vec![0, 1],
//! ];
//! let mut maze = Maze::new(grid, Cell::new(0, 0), Cell::new(1, 1)).unwrap();
//! assert_eq!(maze.valid_actions(None), vec![Action::Right]);
//!
//! let step = maze.act(Action::Right, Some(maze.state()));
//! assert_eq!(step.status, Status::Playing);
//! let step = maze.act(Action::Down, Some(maze.state()));
//! assert_eq!(step.status, Status::Win);
//! ```

pub mod features;
pub mod render;
pub mod reward;

use std::fmt;
use std::str::FromStr;

use log::warn;
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{MazeError, Result};

pub use features::FeatureSet;
pub use render::{MazeRenderer, TextRenderer};
pub use reward::{MoveEvent, RewardPolicy, ShapedReward};

/// Grid value of a free cell in a maze definition.
pub const FREE: u8 = 1;
/// Grid value of a wall in a maze definition.
pub const WALL: u8 = 0;

/// The 7×7 maze the agent is trained on by default.
pub const DEFAULT_GRID: [[u8; 7]; 7] = [
    [1, 0, 1, 1, 1, 1, 1],
    [1, 1, 1, 0, 0, 1, 0],
    [0, 0, 0, 1, 1, 1, 0],
    [1, 1, 1, 1, 0, 0, 1],
    [1, 0, 0, 0, 1, 1, 1],
    [1, 0, 1, 1, 1, 1, 1],
    [1, 1, 1, 0, 1, 1, 1],
];

/// The default grid as owned rows.
pub fn default_grid() -> Vec<Vec<u8>> {
    DEFAULT_GRID.iter().map(|row| row.to_vec()).collect()
}

/// A `(row, col)` position in the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Cell { row, col }
    }

    pub fn manhattan(&self, other: Cell) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

impl From<(usize, usize)> for Cell {
    fn from((row, col): (usize, usize)) -> Self {
        Cell { row, col }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

impl FromStr for Cell {
    type Err = MazeError;

    /// Parses `"r,c"`, optionally wrapped in parentheses.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut parts = trimmed.split(',').map(str::trim);
        let parse = |part: Option<&str>| -> Result<usize> {
            part.and_then(|p| p.parse().ok())
                .ok_or_else(|| MazeError::invalid_parameter("cell", "expected \"row,col\""))
        };
        let row = parse(parts.next())?;
        let col = parse(parts.next())?;
        if parts.next().is_some() {
            return Err(MazeError::invalid_parameter("cell", "expected \"row,col\""));
        }
        Ok(Cell { row, col })
    }
}

/// One of the four moves. Discriminants are the network's output indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Action {
    /// All actions in index order.
    pub const ALL: [Action; 4] = [Action::Up, Action::Down, Action::Left, Action::Right];

    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Action> {
        Action::ALL.get(index).copied()
    }

    /// Row/column offset of the move.
    fn delta(self) -> (isize, isize) {
        match self {
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
            Action::Right => (0, 1),
        }
    }
}

/// Episode status reported by [`Maze::act`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Playing,
    Win,
}

/// What to do when a cell has no open neighbour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoMovePolicy {
    /// Report no valid actions; the trainer ends the episode as stuck.
    #[default]
    Stuck,
    /// Report `Up` so the agent always has something to do.
    FallbackUp,
}

/// Result of one [`Maze::act`] call.
#[derive(Clone, Debug)]
pub struct Step {
    pub observation: Array1<f32>,
    pub reward: f32,
    pub status: Status,
}

/// The grid-world environment.
pub struct Maze {
    cells: Vec<bool>,
    rows: usize,
    cols: usize,
    start: Cell,
    target: Cell,
    state: Cell,
    visits: Vec<u32>,
    features: FeatureSet,
    no_move: NoMovePolicy,
    reward: Box<dyn RewardPolicy>,
}

impl Maze {
    /// Build a maze with the default feature set, no-move policy and reward shaping.
    pub fn new(grid: Vec<Vec<u8>>, start: Cell, target: Cell) -> Result<Self> {
        Self::with_options(
            grid,
            start,
            target,
            FeatureSet::default(),
            NoMovePolicy::default(),
            Box::new(ShapedReward::default()),
        )
    }

    /// The 7×7 default maze, start at the top-left, target at the bottom-right.
    pub fn default_maze() -> Self {
        Self::new(default_grid(), Cell::new(0, 0), Cell::new(6, 6))
            .expect("default grid has free start and target")
    }

    pub fn with_options(
        grid: Vec<Vec<u8>>,
        start: Cell,
        target: Cell,
        features: FeatureSet,
        no_move: NoMovePolicy,
        reward: Box<dyn RewardPolicy>,
    ) -> Result<Self> {
        let rows = grid.len();
        let cols = grid.first().map(Vec::len).unwrap_or(0);
        if rows == 0 || cols == 0 {
            return Err(MazeError::InvalidMaze("grid is empty".to_string()));
        }

        let mut cells = Vec::with_capacity(rows * cols);
        for (r, row) in grid.iter().enumerate() {
            if row.len() != cols {
                return Err(MazeError::InvalidMaze(format!(
                    "row {} has {} columns, expected {}",
                    r,
                    row.len(),
                    cols
                )));
            }
            for (c, &value) in row.iter().enumerate() {
                match value {
                    FREE => cells.push(true),
                    WALL => cells.push(false),
                    other => {
                        return Err(MazeError::InvalidMaze(format!(
                            "cell ({}, {}) has value {}, expected 0 or 1",
                            r, c, other
                        )))
                    }
                }
            }
        }

        let mut maze = Maze {
            cells,
            rows,
            cols,
            start,
            target,
            state: start,
            visits: vec![0; rows * cols],
            features,
            no_move,
            reward,
        };
        if !maze.is_free(start) {
            return Err(MazeError::InvalidMaze(format!("start {} is not a free cell", start)));
        }
        if !maze.is_free(target) {
            return Err(MazeError::InvalidMaze(format!("target {} is not a free cell", target)));
        }
        maze.reset(None);
        Ok(maze)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of cells, free or not.
    pub fn area(&self) -> usize {
        self.rows * self.cols
    }

    pub fn start(&self) -> Cell {
        self.start
    }

    pub fn target(&self) -> Cell {
        self.target
    }

    pub fn state(&self) -> Cell {
        self.state
    }

    pub fn features(&self) -> FeatureSet {
        self.features
    }

    pub fn no_move_policy(&self) -> NoMovePolicy {
        self.no_move
    }

    /// Length of the vectors returned by [`Maze::observe`].
    pub fn observation_len(&self) -> usize {
        self.features.dim()
    }

    pub fn is_free(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols && self.cells[self.index(cell)]
    }

    pub fn free_cells(&self) -> Vec<Cell> {
        (0..self.rows)
            .flat_map(|row| (0..self.cols).map(move |col| Cell::new(row, col)))
            .filter(|&cell| self.is_free(cell))
            .collect()
    }

    /// How many times `cell` was entered since the last reset.
    pub fn visit_count(&self, cell: Cell) -> u32 {
        if cell.row < self.rows && cell.col < self.cols {
            self.visits[self.index(cell)]
        } else {
            0
        }
    }

    /// Put the agent on `start` (or the configured start) and clear visit counts.
    pub fn reset(&mut self, start: Option<Cell>) -> Cell {
        let start = match start {
            Some(cell) if self.is_free(cell) => cell,
            Some(cell) => {
                warn!("Start {} is not a free cell, using {}", cell, self.start);
                self.start
            }
            None => self.start,
        };
        self.state = start;
        self.visits.iter_mut().for_each(|v| *v = 0);
        let idx = self.index(start);
        self.visits[idx] = 1;
        self.state
    }

    /// Directions from `cell` into an in-bounds free cell, in index order.
    pub fn open_neighbours(&self, cell: Cell) -> Vec<Action> {
        Action::ALL
            .iter()
            .copied()
            .filter(|&action| self.neighbour(cell, action).is_some())
            .collect()
    }

    /// Valid actions from `cell` (default: current state), after the no-move policy.
    pub fn valid_actions(&self, cell: Option<Cell>) -> Vec<Action> {
        let actions = self.open_neighbours(cell.unwrap_or(self.state));
        if actions.is_empty() && self.no_move == NoMovePolicy::FallbackUp {
            return vec![Action::Up];
        }
        actions
    }

    /// Apply `action`. `prev` is the caller's record of where the agent was
    /// before this move; when given, the reward policy may use it for distance
    /// shaping.
    pub fn act(&mut self, action: Action, prev: Option<Cell>) -> Step {
        let from = self.state;
        let to = match self.neighbour(from, action) {
            Some(cell) => cell,
            None => {
                return Step {
                    observation: self.observe(),
                    reward: self.reward.invalid_move(),
                    status: Status::Playing,
                }
            }
        };

        self.state = to;
        let idx = self.index(to);
        self.visits[idx] += 1;

        let event = MoveEvent {
            from,
            to,
            prev,
            target: self.target,
            revisit: self.visits[idx] > 1,
            dead_end: self.open_neighbours(to).len() == 1,
            reached_target: to == self.target,
        };
        let reward = self.reward.on_move(&event);
        let status = if event.reached_target { Status::Win } else { Status::Playing };

        Step {
            observation: self.observe(),
            reward,
            status,
        }
    }

    /// Feature vector of the current state.
    pub fn observe(&self) -> Array1<f32> {
        self.features.observe(self)
    }

    /// Hand the grid and `path` to a renderer.
    pub fn show<R: MazeRenderer>(&self, renderer: &R, path: Option<&[Cell]>) -> R::Output {
        renderer.render(self, path.unwrap_or(&[]))
    }

    fn neighbour(&self, cell: Cell, action: Action) -> Option<Cell> {
        let (dr, dc) = action.delta();
        let row = cell.row.checked_add_signed(dr)?;
        let col = cell.col.checked_add_signed(dc)?;
        let next = Cell::new(row, col);
        self.is_free(next).then_some(next)
    }

    fn index(&self, cell: Cell) -> usize {
        cell.row * self.cols + cell.col
    }
}

impl fmt::Debug for Maze {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Maze")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("start", &self.start)
            .field("target", &self.target)
            .field("state", &self.state)
            .field("features", &self.features)
            .field("no_move", &self.no_move)
            .finish()
    }
}
