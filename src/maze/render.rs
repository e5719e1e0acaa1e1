use super::{Cell, Maze};

/// Turns a maze and a visited path into something a user can look at.
pub trait MazeRenderer {
    type Output;

    fn render(&self, maze: &Maze, path: &[Cell]) -> Self::Output;
}

/// ASCII rendering: `#` wall, `.` free, `*` path, `S` start, `T` target, `@` agent.
#[derive(Clone, Copy, Debug, Default)]
pub struct TextRenderer {
    /// Put a space between columns so the grid looks square in a terminal.
    pub spaced: bool,
}

impl TextRenderer {
    pub fn new() -> Self {
        TextRenderer { spaced: true }
    }
}

impl MazeRenderer for TextRenderer {
    type Output = String;

    fn render(&self, maze: &Maze, path: &[Cell]) -> String {
        let (rows, cols) = maze.shape();
        let mut canvas = vec![vec!['.'; cols]; rows];

        for (r, line) in canvas.iter_mut().enumerate() {
            for (c, ch) in line.iter_mut().enumerate() {
                if !maze.is_free(Cell::new(r, c)) {
                    *ch = '#';
                }
            }
        }

        for cell in path.iter().filter(|cell| cell.row < rows && cell.col < cols) {
            canvas[cell.row][cell.col] = '*';
        }

        let start = maze.start();
        let target = maze.target();
        canvas[start.row][start.col] = 'S';
        canvas[target.row][target.col] = 'T';
        let agent = maze.state();
        canvas[agent.row][agent.col] = '@';

        let separator = if self.spaced { " " } else { "" };
        let mut output = String::with_capacity(rows * (cols * 2 + 1));
        for line in canvas {
            let row: Vec<String> = line.iter().map(char::to_string).collect();
            output.push_str(&row.join(separator));
            output.push('\n');
        }
        output
    }
}
