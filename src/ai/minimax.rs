use serde::{Deserialize, Serialize};

use crate::game::{apply_move, evaluate, Board, CellIndex, Mark, Outcome};

const WIN_SCORE: i32 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MoveDecision {
    pub index: CellIndex,
    /// Score of the chosen move, positive when it favours O.
    pub evaluation: i32,
    pub nodes: u64,
}

struct SearchStats {
    nodes: u64,
}

impl SearchStats {
    fn new() -> Self {
        Self { nodes: 0 }
    }
}

/// Scores `board` with O maximizing and X minimizing.
///
/// Wins are worth `10 - depth` for O and `-10 + depth` for X so that faster
/// wins and slower losses are preferred. The whole remaining tree is searched.
pub fn score(board: &Board, depth: u32, maximizing: bool) -> i32 {
    score_rec(board, depth, maximizing, &mut SearchStats::new())
}

/// Best cell for `mark`, or `None` on a full board. Ties go to the lowest index.
pub fn best_move(board: &Board, mark: Mark) -> Option<CellIndex> {
    search_root(board, mark, &mut SearchStats::new()).map(|(index, _)| index)
}

fn score_rec(board: &Board, depth: u32, maximizing: bool, stats: &mut SearchStats) -> i32 {
    stats.nodes += 1;

    match evaluate(board) {
        Outcome::Win { winner: Mark::O } => return WIN_SCORE - depth as i32,
        Outcome::Win { winner: Mark::X } => return -WIN_SCORE + depth as i32,
        Outcome::Draw => return 0,
        Outcome::InProgress => {}
    }

    let mover = if maximizing { Mark::O } else { Mark::X };
    let children = board
        .empty_cells()
        .filter_map(|index| apply_move(board, index, mover).ok());

    if maximizing {
        let mut value = i32::MIN;
        for child in children {
            value = value.max(score_rec(&child, depth + 1, false, stats));
        }
        value
    } else {
        let mut value = i32::MAX;
        for child in children {
            value = value.min(score_rec(&child, depth + 1, true, stats));
        }
        value
    }
}

fn search_root(board: &Board, mark: Mark, stats: &mut SearchStats) -> Option<(CellIndex, i32)> {
    let mut best: Option<(CellIndex, i32)> = None;

    for index in board.empty_cells() {
        let Ok(child) = apply_move(board, index, mark) else {
            continue;
        };
        // the opponent moves next; O maximizes
        let value = score_rec(&child, 0, mark == Mark::X, stats);
        let better = match best {
            None => true,
            Some((_, current)) => match mark {
                Mark::O => value > current,
                Mark::X => value < current,
            },
        };
        if better {
            best = Some((index, value));
        }
    }

    best
}

/// 电脑玩家，附带搜索统计。
#[derive(Debug, Default, Clone)]
pub struct ComputerPlayer {
    last_nodes: u64,
}

impl ComputerPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decide(&mut self, board: &Board, mark: Mark) -> Option<MoveDecision> {
        let mut stats = SearchStats::new();
        let decision = search_root(board, mark, &mut stats).map(|(index, evaluation)| {
            MoveDecision {
                index,
                evaluation,
                nodes: stats.nodes,
            }
        });
        self.last_nodes = stats.nodes;
        decision
    }

    /// Nodes visited by the most recent call to [`ComputerPlayer::decide`].
    pub fn last_nodes(&self) -> u64 {
        self.last_nodes
    }
}
