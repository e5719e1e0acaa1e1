pub mod test_maze;
pub mod test_replay_buffer;
