pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use serde_wasm_bindgen::{from_value, to_value};
use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{best_move, score, ComputerPlayer, MoveDecision};
pub use game::{
    apply_move, evaluate, winning_line, Board, CellIndex, Controller, DisplayState, Epoch,
    GameEvent, GameSession, IntegrityError, Mark, MoveError, MoveResolution, OpponentMode,
    Outcome, ReplyTicket, RuleEngine, SessionConfig, BOARD_SIZE, WIN_LINES,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
}

fn to_js_error(error: MoveError) -> JsValue {
    to_value(&error).unwrap_or_else(|serialize_err| JsValue::from_str(&serialize_err.to_string()))
}

fn serde_to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn display_json(session: &GameSession) -> Result<String, JsValue> {
    serde_json::to_string(&session.display_state()).map_err(serde_to_js_error)
}

fn log_if_finished(session: &GameSession) {
    if session.is_finished() {
        utils::log(&format!(
            "game over after {} moves: {}",
            session.ply(),
            session.status_message()
        ));
    }
}

fn parse_board(board: JsValue) -> Result<Board, JsValue> {
    let labels: Vec<String> = from_value(board).map_err(JsValue::from)?;
    Board::from_labels(&labels)
        .ok_or_else(|| JsValue::from_str("board must hold nine cells of \"\", \"X\" or \"O\""))
}

/// 浏览器端持有的一局游戏。
#[wasm_bindgen]
pub struct TicTacToe {
    session: Rc<RefCell<GameSession>>,
    engine: Rc<RefCell<RuleEngine>>,
}

#[wasm_bindgen]
impl TicTacToe {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<TicTacToe, JsValue> {
        let config = match config_json {
            Some(json) => serde_json::from_str(&json).map_err(serde_to_js_error)?,
            None => SessionConfig::default(),
        };
        Ok(TicTacToe {
            session: Rc::new(RefCell::new(GameSession::new(config))),
            engine: Rc::new(RefCell::new(RuleEngine::new())),
        })
    }

    /// Human move. Returns `false` when the move was ignored.
    pub fn on_cell_activated(&self, index: usize) -> bool {
        let mut session = self.session.borrow_mut();
        match self.engine.borrow_mut().play_human(&mut session, index) {
            Ok(_) => {
                log_if_finished(&session);
                true
            }
            Err(_) => false,
        }
    }

    /// Like `on_cell_activated`, but reports the resolution or the rejection.
    pub fn play_cell_json(&self, index: usize) -> Result<String, JsValue> {
        let mut session = self.session.borrow_mut();
        let events = self
            .engine
            .borrow_mut()
            .play_human(&mut session, index)
            .map_err(to_js_error)?;
        log_if_finished(&session);
        serde_json::to_string(&MoveResolution::new(&session, events)).map_err(serde_to_js_error)
    }

    pub fn on_mode_changed(&self, is_computer_opponent: bool) {
        let opponent = OpponentMode::from_flag(is_computer_opponent);
        let mut session = self.session.borrow_mut();
        RuleEngine::change_mode(&mut session, opponent);
        utils::log(&format!("mode changed to {opponent:?}, epoch {}", session.epoch));
    }

    /// Accepts `"human"` / `"computer"` (and a few aliases) from a select box.
    pub fn set_mode(&self, mode: &str) -> Result<(), JsValue> {
        let opponent = OpponentMode::from_str(mode)
            .map_err(|_| JsValue::from_str(&format!("unknown opponent mode: {mode}")))?;
        self.on_mode_changed(opponent == OpponentMode::Computer);
        Ok(())
    }

    pub fn on_restart_requested(&self) {
        let mut session = self.session.borrow_mut();
        RuleEngine::restart(&mut session);
        utils::log(&format!("session restarted, epoch {}", session.epoch));
    }

    pub fn awaiting_computer(&self) -> bool {
        self.session.borrow().awaiting_computer()
    }

    pub fn display_state(&self) -> Result<JsValue, JsValue> {
        to_value(&self.session.borrow().display_state()).map_err(JsValue::from)
    }

    pub fn display_state_json(&self) -> Result<String, JsValue> {
        display_json(&self.session.borrow())
    }

    pub fn events_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.borrow().event_log).map_err(serde_to_js_error)
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&*self.session.borrow()).map_err(serde_to_js_error)
    }

    pub fn set_state_json(&self, json: &str) -> Result<(), JsValue> {
        let snapshot: GameSession = serde_json::from_str(json).map_err(serde_to_js_error)?;
        let mut session = self.session.borrow_mut();
        RuleEngine::load(&mut session, snapshot).map_err(to_js_error)
    }

    /// Plays the computer's reply after `delay_ms` (the session default when
    /// omitted). Resolves to the display state JSON. A reply issued before a
    /// restart or mode change, or a second reply for the same turn, is dropped
    /// when it fires.
    pub fn schedule_computer_move(&self, delay_ms: Option<u32>) -> Promise {
        let ticket = {
            let mut session = self.session.borrow_mut();
            self.engine.borrow_mut().begin_computer_turn(&mut session)
        };
        let delay = delay_ms.unwrap_or(self.session.borrow().config.computer_delay_ms);
        let session = Rc::clone(&self.session);
        let engine = Rc::clone(&self.engine);

        future_to_promise(async move {
            let ticket = ticket.map_err(to_js_error)?;
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }

            let mut session = session.borrow_mut();
            match engine.borrow_mut().finish_computer_turn(&mut session, ticket) {
                Ok(_) => log_if_finished(&session),
                Err(MoveError::StaleReply {
                    ticket_epoch,
                    current_epoch,
                }) => utils::log(&format!(
                    "dropping computer reply from epoch {ticket_epoch} (now {current_epoch})"
                )),
                Err(MoveError::UnknownReply { ticket }) => utils::log(&format!(
                    "dropping duplicate computer reply for move {}",
                    ticket.ply
                )),
                Err(error) => return Err(to_js_error(error)),
            }
            Ok(JsValue::from_str(&display_json(&session)?))
        })
    }
}

#[wasm_bindgen(js_name = "evaluateBoard")]
pub fn evaluate_board(board: JsValue) -> Result<JsValue, JsValue> {
    let board = parse_board(board)?;
    to_value(&evaluate(&board)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "computeBestMove")]
pub fn compute_best_move(board: JsValue, mark: &str) -> Result<Option<usize>, JsValue> {
    let board = parse_board(board)?;
    let mark = Mark::from_str(mark)
        .map_err(|_| JsValue::from_str(&format!("unknown mark: {mark}")))?;
    Ok(best_move(&board, mark))
}

#[wasm_bindgen(js_name = "validateSession")]
pub fn validate_session(state: JsValue) -> Result<(), JsValue> {
    let session: GameSession = from_value(state).map_err(JsValue::from)?;
    session
        .integrity_check()
        .map_err(|error| to_js_error(MoveError::IntegrityViolation { error }))
}
