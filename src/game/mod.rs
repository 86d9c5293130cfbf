//! 游戏核心逻辑模块（棋盘、状态机、规则引擎）。

pub mod rules;
pub mod state;

pub use rules::{apply_move, evaluate, winning_line, MoveError, MoveResolution, RuleEngine};
pub use state::{
    Board,
    CellIndex,
    Controller,
    DisplayState,
    Epoch,
    GameEvent,
    GameSession,
    IntegrityError,
    Mark,
    OpponentMode,
    Outcome,
    ReplyTicket,
    SessionConfig,
    BOARD_SIZE,
    DEFAULT_COMPUTER_DELAY_MS,
    WIN_LINES,
};
