use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::rules::{evaluate, winning_line};

/// 棋盘格子数量（3x3，行优先编号 0..=8）。
pub const BOARD_SIZE: usize = 9;
/// 电脑回合的默认延迟（毫秒）。
pub const DEFAULT_COMPUTER_DELAY_MS: u32 = 500;

/// 棋盘格子下标。
pub type CellIndex = usize;
/// 会话代数，每次重置递增。
pub type Epoch = u64;

/// 八条连线：三行、三列、两条对角线，按固定顺序扫描。
pub const WIN_LINES: [[CellIndex; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    pub fn opponent(self) -> Mark {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mark::X => "X",
            Mark::O => "O",
        }
    }
}

impl Default for Mark {
    fn default() -> Self {
        Mark::X
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mark {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "X" => Ok(Mark::X),
            "O" => Ok(Mark::O),
            _ => Err(()),
        }
    }
}

/// 3x3 棋盘，空格为 `None`。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub struct Board {
    cells: [Option<Mark>; BOARD_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_cells(cells: [Option<Mark>; BOARD_SIZE]) -> Self {
        Self { cells }
    }

    /// Parses the host page's representation: nine labels, each `""`, `"X"` or `"O"`.
    pub fn from_labels<S: AsRef<str>>(labels: &[S]) -> Option<Self> {
        if labels.len() != BOARD_SIZE {
            return None;
        }
        let mut cells = [None; BOARD_SIZE];
        for (cell, label) in cells.iter_mut().zip(labels) {
            let label = label.as_ref();
            if label.trim().is_empty() {
                continue;
            }
            *cell = Some(Mark::from_str(label).ok()?);
        }
        Some(Self { cells })
    }

    pub fn labels(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|cell| cell.map(Mark::as_str).unwrap_or("").to_string())
            .collect()
    }

    pub fn cells(&self) -> &[Option<Mark>; BOARD_SIZE] {
        &self.cells
    }

    pub fn get(&self, index: CellIndex) -> Option<Mark> {
        self.cells.get(index).copied().flatten()
    }

    pub fn is_vacant(&self, index: CellIndex) -> bool {
        index < BOARD_SIZE && self.cells[index].is_none()
    }

    pub fn empty_cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_none())
            .map(|(index, _)| index)
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn count(&self, mark: Mark) -> usize {
        self.cells.iter().filter(|cell| **cell == Some(mark)).count()
    }

    pub(crate) fn place(&mut self, index: CellIndex, mark: Mark) {
        self.cells[index] = Some(mark);
    }
}

/// 由棋盘推导出的对局结果，从不单独存储。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Outcome {
    InProgress,
    Win { winner: Mark },
    Draw,
}

impl Outcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::InProgress)
    }

    pub fn winner(&self) -> Option<Mark> {
        match self {
            Outcome::Win { winner } => Some(*winner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OpponentMode {
    Human,
    Computer,
}

impl OpponentMode {
    pub fn from_flag(is_computer_opponent: bool) -> Self {
        if is_computer_opponent {
            OpponentMode::Computer
        } else {
            OpponentMode::Human
        }
    }
}

impl Default for OpponentMode {
    fn default() -> Self {
        OpponentMode::Computer
    }
}

impl FromStr for OpponentMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "human" | "pvp" | "local" => Ok(OpponentMode::Human),
            "computer" | "ai" | "cpu" => Ok(OpponentMode::Computer),
            _ => Err(()),
        }
    }
}

/// 会话配置，前端可以以 JSON 形式传入。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionConfig {
    pub opponent: OpponentMode,
    pub computer_delay_ms: u32,
}

impl SessionConfig {
    pub fn with_opponent(mut self, opponent: OpponentMode) -> Self {
        self.opponent = opponent;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            opponent: OpponentMode::default(),
            computer_delay_ms: DEFAULT_COMPUTER_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Controller {
    Human,
    Computer,
}

/// 游戏事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    MarkPlaced {
        index: CellIndex,
        mark: Mark,
        by: Controller,
    },
    TurnPassed {
        next: Mark,
    },
    GameWon {
        winner: Mark,
        line: [CellIndex; 3],
    },
    GameDrawn,
    SessionReset {
        epoch: Epoch,
        opponent: OpponentMode,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    MarkCountMismatch { x: usize, o: usize },
    WrongTurn { expected: Mark, actual: Mark },
    DoubleWin,
    MovesAfterWin { winner: Mark },
    RunningFlagMismatch { running: bool },
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityError::MarkCountMismatch { x, o } => {
                write!(f, "impossible mark counts: {x} X against {o} O")
            }
            IntegrityError::WrongTurn { expected, actual } => {
                write!(f, "expected {expected} to move, session says {actual}")
            }
            IntegrityError::DoubleWin => f.write_str("both marks hold a complete line"),
            IntegrityError::MovesAfterWin { winner } => {
                write!(f, "marks were placed after {winner} completed a line")
            }
            IntegrityError::RunningFlagMismatch { running } => {
                write!(f, "running flag {running} disagrees with the board outcome")
            }
        }
    }
}

impl std::error::Error for IntegrityError {}

/// 电脑回合的凭据，重置后旧凭据作废。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplyTicket {
    pub epoch: Epoch,
    /// Marks on the board when the ticket was issued.
    pub ply: usize,
}

/// 前端渲染所需的全部信息。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayState {
    pub board: Vec<String>,
    pub status_message: String,
    pub is_terminal: bool,
    pub current_mark: Mark,
    pub outcome: Outcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winning_line: Option<[CellIndex; 3]>,
    pub awaiting_computer: bool,
    pub opponent: OpponentMode,
    pub epoch: Epoch,
}

/// 一局游戏的完整状态，由调用方显式持有。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameSession {
    pub board: Board,
    pub current: Mark,
    pub running: bool,
    #[serde(default)]
    pub config: SessionConfig,
    #[serde(default)]
    pub epoch: Epoch,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_reply: Option<ReplyTicket>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub event_log: Vec<GameEvent>,
}

impl GameSession {
    /// The computer always plays O.
    pub const COMPUTER_MARK: Mark = Mark::O;

    pub fn new(config: SessionConfig) -> Self {
        Self {
            board: Board::new(),
            current: Mark::X,
            running: true,
            config,
            epoch: 0,
            pending_reply: None,
            event_log: Vec::new(),
        }
    }

    pub fn opponent(&self) -> OpponentMode {
        self.config.opponent
    }

    pub fn record_event(&mut self, event: GameEvent) {
        self.event_log.push(event);
    }

    pub fn outcome(&self) -> Outcome {
        evaluate(&self.board)
    }

    pub fn is_finished(&self) -> bool {
        !self.running
    }

    /// `true` when the next move belongs to the computer.
    pub fn awaiting_computer(&self) -> bool {
        self.running
            && self.config.opponent == OpponentMode::Computer
            && self.current == Self::COMPUTER_MARK
    }

    /// Clears the board and invalidates any reply issued before the reset.
    pub fn reset(&mut self) {
        self.board = Board::new();
        self.current = Mark::X;
        self.running = true;
        self.epoch += 1;
        self.pending_reply = None;
        self.event_log.clear();
        self.record_event(GameEvent::SessionReset {
            epoch: self.epoch,
            opponent: self.config.opponent,
        });
    }

    pub fn status_message(&self) -> String {
        match self.outcome() {
            Outcome::Win { winner } => format!("{winner} Wins!"),
            Outcome::Draw => "Draw!".to_string(),
            Outcome::InProgress => format!("{}'s Turn", self.current),
        }
    }

    pub fn display_state(&self) -> DisplayState {
        let outcome = self.outcome();
        DisplayState {
            board: self.board.labels(),
            status_message: self.status_message(),
            is_terminal: outcome.is_terminal(),
            current_mark: self.current,
            outcome,
            winning_line: winning_line(&self.board),
            awaiting_computer: self.awaiting_computer(),
            opponent: self.config.opponent,
            epoch: self.epoch,
        }
    }

    pub fn ply(&self) -> usize {
        self.board.count(Mark::X) + self.board.count(Mark::O)
    }

    /// Checks that a snapshot could have been produced by legal play.
    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        let x = self.board.count(Mark::X);
        let o = self.board.count(Mark::O);
        if x != o && x != o + 1 {
            return Err(IntegrityError::MarkCountMismatch { x, o });
        }

        let x_line = WIN_LINES
            .iter()
            .any(|line| line.iter().all(|&i| self.board.get(i) == Some(Mark::X)));
        let o_line = WIN_LINES
            .iter()
            .any(|line| line.iter().all(|&i| self.board.get(i) == Some(Mark::O)));
        if x_line && o_line {
            return Err(IntegrityError::DoubleWin);
        }
        // the winner placed the last mark: X moves first, so X wins with one extra
        if x_line && x != o + 1 {
            return Err(IntegrityError::MovesAfterWin { winner: Mark::X });
        }
        if o_line && x != o {
            return Err(IntegrityError::MovesAfterWin { winner: Mark::O });
        }

        let outcome = self.outcome();
        if self.running == outcome.is_terminal() {
            return Err(IntegrityError::RunningFlagMismatch {
                running: self.running,
            });
        }

        if self.running {
            let expected = if x == o { Mark::X } else { Mark::O };
            if self.current != expected {
                return Err(IntegrityError::WrongTurn {
                    expected,
                    actual: self.current,
                });
            }
        }

        Ok(())
    }
}

impl Default for GameSession {
    fn default() -> Self {
        GameSession::new(SessionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board(labels: [&str; BOARD_SIZE]) -> Board {
        Board::from_labels(&labels).expect("labels should parse")
    }

    #[test]
    fn labels_roundtrip_through_host_representation() {
        let parsed = board(["X", "", "", "", "o", "", "", "", ""]);
        assert_eq!(parsed.get(0), Some(Mark::X));
        assert_eq!(parsed.get(4), Some(Mark::O));
        assert_eq!(parsed.labels()[4], "O");
        assert!(Board::from_labels(&["X"; 8]).is_none());
        assert!(Board::from_labels(&["Z"; 9]).is_none());
    }

    #[test]
    fn empty_cells_are_listed_in_ascending_order() {
        let parsed = board(["X", "", "O", "", "X", "", "", "O", ""]);
        let empty: Vec<_> = parsed.empty_cells().collect();
        assert_eq!(empty, vec![1, 3, 5, 6, 8]);
        assert!(!parsed.is_full());
    }

    #[test]
    fn new_session_starts_with_x_against_computer() {
        let session = GameSession::default();
        assert_eq!(session.status_message(), "X's Turn");
        assert_eq!(session.opponent(), OpponentMode::Computer);
        assert!(!session.awaiting_computer());
        assert_eq!(session.config.computer_delay_ms, DEFAULT_COMPUTER_DELAY_MS);
    }

    #[test]
    fn reset_bumps_epoch_and_logs() {
        let mut session = GameSession::default();
        session.board.place(0, Mark::X);
        session.current = Mark::O;
        session.reset();
        assert_eq!(session.epoch, 1);
        assert_eq!(session.board, Board::new());
        assert_eq!(session.current, Mark::X);
        assert_eq!(
            session.event_log,
            vec![GameEvent::SessionReset {
                epoch: 1,
                opponent: OpponentMode::Computer
            }]
        );
    }

    #[test]
    fn integrity_check_rejects_impossible_snapshots() {
        let mut session = GameSession::default();
        session.board = board(["O", "O", "", "", "", "", "", "", ""]);
        assert_eq!(
            session.integrity_check(),
            Err(IntegrityError::MarkCountMismatch { x: 0, o: 2 })
        );

        session.board = board(["X", "", "", "", "", "", "", "", ""]);
        session.current = Mark::X;
        assert_eq!(
            session.integrity_check(),
            Err(IntegrityError::WrongTurn {
                expected: Mark::O,
                actual: Mark::X
            })
        );

        session.board = board(["X", "X", "X", "O", "O", "", "", "", ""]);
        assert_eq!(
            session.integrity_check(),
            Err(IntegrityError::RunningFlagMismatch { running: true })
        );
        session.running = false;
        assert!(session.integrity_check().is_ok());

        session.board = board(["X", "X", "X", "O", "O", "", "O", "", ""]);
        assert_eq!(
            session.integrity_check(),
            Err(IntegrityError::MovesAfterWin { winner: Mark::X })
        );

        session.board = board(["O", "O", "O", "X", "X", "", "X", "X", ""]);
        assert_eq!(
            session.integrity_check(),
            Err(IntegrityError::MovesAfterWin { winner: Mark::O })
        );

        session.board = board(["O", "O", "O", "X", "X", "", "X", "", ""]);
        assert!(session.integrity_check().is_ok());
    }

    #[test]
    fn config_fills_missing_fields_from_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"opponent":"human"}"#).expect("config should parse");
        assert_eq!(config.opponent, OpponentMode::Human);
        assert_eq!(config.computer_delay_ms, DEFAULT_COMPUTER_DELAY_MS);
    }
}
