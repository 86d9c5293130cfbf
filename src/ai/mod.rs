//! 电脑对手：穷举极小化极大搜索。

pub mod minimax;

pub use minimax::{best_move, score, ComputerPlayer, MoveDecision};
