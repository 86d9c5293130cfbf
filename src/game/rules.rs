use serde::{Deserialize, Serialize};
use std::fmt;

use super::state::{
    Board, CellIndex, Controller, DisplayState, Epoch, GameEvent, GameSession, IntegrityError,
    Mark, OpponentMode, Outcome, ReplyTicket, BOARD_SIZE, WIN_LINES,
};
use crate::ai::ComputerPlayer;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum MoveError {
    OutOfRange {
        index: CellIndex,
    },
    CellOccupied {
        index: CellIndex,
    },
    GameFinished,
    NotPlayerTurn {
        expected: Controller,
    },
    NoLegalMove,
    StaleReply {
        ticket_epoch: Epoch,
        current_epoch: Epoch,
    },
    UnknownReply {
        ticket: ReplyTicket,
    },
    IntegrityViolation {
        error: IntegrityError,
    },
}

impl fmt::Display for MoveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MoveError::OutOfRange { index } => write!(f, "cell {index} is off the board"),
            MoveError::CellOccupied { index } => write!(f, "cell {index} is already taken"),
            MoveError::GameFinished => f.write_str("the game is over"),
            MoveError::NotPlayerTurn { expected } => {
                write!(f, "it is the {expected:?} player's turn")
            }
            MoveError::NoLegalMove => f.write_str("no empty cell left"),
            MoveError::StaleReply {
                ticket_epoch,
                current_epoch,
            } => write!(
                f,
                "reply issued for epoch {ticket_epoch}, session is at epoch {current_epoch}"
            ),
            MoveError::UnknownReply { ticket } => write!(
                f,
                "no pending reply matches the ticket for move {} of epoch {}",
                ticket.ply, ticket.epoch
            ),
            MoveError::IntegrityViolation { error } => write!(f, "integrity violation: {error}"),
        }
    }
}

impl std::error::Error for MoveError {}

/// Places `mark` on a copy of `board`. Turn order is the caller's concern.
pub fn apply_move(board: &Board, index: CellIndex, mark: Mark) -> Result<Board, MoveError> {
    if index >= BOARD_SIZE {
        return Err(MoveError::OutOfRange { index });
    }
    if !board.is_vacant(index) {
        return Err(MoveError::CellOccupied { index });
    }
    let mut next = *board;
    next.place(index, mark);
    Ok(next)
}

/// First completed line in declaration order, if any.
pub fn winning_line(board: &Board) -> Option<[CellIndex; 3]> {
    WIN_LINES.iter().copied().find(|&[a, b, c]| {
        matches!(board.get(a), Some(mark) if board.get(b) == Some(mark) && board.get(c) == Some(mark))
    })
}

pub fn evaluate(board: &Board) -> Outcome {
    if let Some([first, _, _]) = winning_line(board) {
        if let Some(winner) = board.get(first) {
            return Outcome::Win { winner };
        }
    }
    if board.is_full() {
        Outcome::Draw
    } else {
        Outcome::InProgress
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveResolution {
    pub state: DisplayState,
    pub events: Vec<GameEvent>,
}

impl MoveResolution {
    pub fn new(session: &GameSession, events: Vec<GameEvent>) -> Self {
        Self {
            state: session.display_state(),
            events,
        }
    }
}

/// 会话状态机：校验并应用人类与电脑的落子。
#[derive(Default)]
pub struct RuleEngine {
    computer: ComputerPlayer,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self {
            computer: ComputerPlayer::new(),
        }
    }

    fn ensure_running(session: &GameSession) -> Result<(), MoveError> {
        if session.is_finished() {
            return Err(MoveError::GameFinished);
        }
        Ok(())
    }

    fn ensure_integrity(session: &GameSession) -> Result<(), MoveError> {
        session
            .integrity_check()
            .map_err(|error| MoveError::IntegrityViolation { error })
    }

    /// Applies a move for the side to move, then settles the outcome.
    fn place(
        session: &mut GameSession,
        index: CellIndex,
        by: Controller,
    ) -> Result<Vec<GameEvent>, MoveError> {
        let mark = session.current;
        session.board = apply_move(&session.board, index, mark)?;

        let mut events = vec![GameEvent::MarkPlaced { index, mark, by }];
        match evaluate(&session.board) {
            Outcome::Win { winner } => {
                session.running = false;
                // evaluate only reports a win when a line exists
                let line = winning_line(&session.board).unwrap_or([index; 3]);
                events.push(GameEvent::GameWon { winner, line });
            }
            Outcome::Draw => {
                session.running = false;
                events.push(GameEvent::GameDrawn);
            }
            Outcome::InProgress => {
                session.current = mark.opponent();
                events.push(GameEvent::TurnPassed {
                    next: session.current,
                });
            }
        }

        for event in &events {
            session.record_event(event.clone());
        }
        Ok(events)
    }

    pub fn play_human(
        &mut self,
        session: &mut GameSession,
        index: CellIndex,
    ) -> Result<Vec<GameEvent>, MoveError> {
        Self::ensure_running(session)?;
        if session.awaiting_computer() {
            return Err(MoveError::NotPlayerTurn {
                expected: Controller::Computer,
            });
        }
        Self::place(session, index, Controller::Human)
    }

    /// Issues the ticket for the next computer reply. Only one ticket is
    /// outstanding per turn; asking again returns the pending one.
    pub fn begin_computer_turn(
        &mut self,
        session: &mut GameSession,
    ) -> Result<ReplyTicket, MoveError> {
        Self::ensure_running(session)?;
        if !session.awaiting_computer() {
            return Err(MoveError::NotPlayerTurn {
                expected: Controller::Human,
            });
        }
        // the same turn always yields the same ticket
        let ticket = ReplyTicket {
            epoch: session.epoch,
            ply: session.ply(),
        };
        session.pending_reply = Some(ticket);
        Ok(ticket)
    }

    pub fn finish_computer_turn(
        &mut self,
        session: &mut GameSession,
        ticket: ReplyTicket,
    ) -> Result<Vec<GameEvent>, MoveError> {
        if ticket.epoch != session.epoch {
            return Err(MoveError::StaleReply {
                ticket_epoch: ticket.epoch,
                current_epoch: session.epoch,
            });
        }
        // a ticket is redeemable once, for the turn it was issued in
        if session.pending_reply != Some(ticket) {
            return Err(MoveError::UnknownReply { ticket });
        }
        session.pending_reply = None;
        Self::ensure_running(session)?;
        if !session.awaiting_computer() {
            return Err(MoveError::NotPlayerTurn {
                expected: Controller::Human,
            });
        }

        let decision = self
            .computer
            .decide(&session.board, session.current)
            .ok_or(MoveError::NoLegalMove)?;
        Self::place(session, decision.index, Controller::Computer)
    }

    /// Convenience for synchronous callers: issue and redeem a ticket at once.
    pub fn play_computer(&mut self, session: &mut GameSession) -> Result<Vec<GameEvent>, MoveError> {
        let ticket = self.begin_computer_turn(session)?;
        self.finish_computer_turn(session, ticket)
    }

    pub fn restart(session: &mut GameSession) -> Vec<GameEvent> {
        session.reset();
        session.event_log.clone()
    }

    pub fn change_mode(session: &mut GameSession, opponent: OpponentMode) -> Vec<GameEvent> {
        session.config.opponent = opponent;
        Self::restart(session)
    }

    /// Replaces the session with an imported snapshot after validating it.
    pub fn load(session: &mut GameSession, snapshot: GameSession) -> Result<(), MoveError> {
        Self::ensure_integrity(&snapshot)?;
        let epoch = session.epoch.max(snapshot.epoch) + 1;
        *session = snapshot;
        session.epoch = epoch;
        session.pending_reply = None;
        Ok(())
    }
}
