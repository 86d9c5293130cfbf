//! Browser-side tests, run with `wasm-pack test --headless --chrome`.
#![cfg(target_arch = "wasm32")]

use tictactoe_wasm::{DisplayState, GameEvent, Mark, OpponentMode, TicTacToe};
use wasm_bindgen::JsValue;
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;

wasm_bindgen_test_configure!(run_in_browser);

fn display(game: &TicTacToe) -> DisplayState {
    let json = game.display_state_json().expect("display state should serialize");
    serde_json::from_str(&json).expect("display state should parse")
}

#[wasm_bindgen_test]
fn human_click_is_reflected_in_display_state() {
    let game = TicTacToe::new(None).expect("default config");
    assert!(game.on_cell_activated(0));
    assert!(!game.on_cell_activated(0), "occupied cell is ignored");

    let state = display(&game);
    assert_eq!(state.board[0], "X");
    assert_eq!(state.status_message, "O's Turn");
    assert!(state.awaiting_computer);
}

#[wasm_bindgen_test]
async fn computer_reply_fires_after_delay() {
    let game = TicTacToe::new(None).expect("default config");
    assert!(game.on_cell_activated(0));

    let resolved = JsFuture::from(game.schedule_computer_move(Some(0)))
        .await
        .expect("computer reply should resolve");
    let json = resolved.as_string().expect("reply resolves to JSON");
    let state: DisplayState = serde_json::from_str(&json).expect("display state should parse");
    assert_eq!(state.board[4], "O");
    assert_eq!(state.current_mark, Mark::X);
}

#[wasm_bindgen_test]
async fn restart_drops_pending_reply() {
    let game = TicTacToe::new(None).expect("default config");
    assert!(game.on_cell_activated(8));
    let pending = game.schedule_computer_move(Some(20));
    game.on_restart_requested();

    JsFuture::from(pending)
        .await
        .expect("stale reply resolves quietly");
    let state = display(&game);
    assert!(state.board.iter().all(String::is_empty));
    assert_eq!(state.status_message, "X's Turn");

    let events: Vec<GameEvent> =
        serde_json::from_str(&game.events_json().expect("events should serialize"))
            .expect("events should parse");
    assert_eq!(
        events,
        vec![GameEvent::SessionReset {
            epoch: 1,
            opponent: OpponentMode::Computer
        }]
    );
}

#[wasm_bindgen_test]
async fn duplicate_reply_for_one_turn_plays_once() {
    let game = TicTacToe::new(None).expect("default config");
    assert!(game.on_cell_activated(0));
    let first = game.schedule_computer_move(Some(0));
    let second = game.schedule_computer_move(Some(10));

    JsFuture::from(first).await.expect("first reply plays");
    assert!(game.on_cell_activated(8));
    JsFuture::from(second)
        .await
        .expect("duplicate reply resolves quietly");

    let state = display(&game);
    assert_eq!(state.board.iter().filter(|cell| cell.as_str() == "O").count(), 1);
    assert!(state.awaiting_computer);
}

#[wasm_bindgen_test]
fn mode_toggle_resets_to_human_play() {
    let game = TicTacToe::new(Some(r#"{"opponent":"computer"}"#.into())).expect("config parses");
    assert!(game.on_cell_activated(4));
    game.on_mode_changed(false);

    let state = display(&game);
    assert_eq!(state.opponent, OpponentMode::Human);
    assert!(state.board.iter().all(String::is_empty));
    assert!(game.on_cell_activated(0));
    assert!(game.on_cell_activated(1), "second human plays O");
}

#[wasm_bindgen_test]
fn free_functions_accept_host_boards() {
    let board = serde_wasm_bindgen::to_value(&["X", "", "", "", "", "", "", "", ""])
        .expect("board should convert");
    let best = tictactoe_wasm::compute_best_move(board, "O").expect("board is valid");
    assert_eq!(best, Some(4));

    let bogus = JsValue::from_str("not a board");
    assert!(tictactoe_wasm::evaluate_board(bogus).is_err());
}

#[wasm_bindgen_test]
fn play_cell_json_reports_rejections() {
    let game = TicTacToe::new(Some(r#"{"opponent":"human"}"#.into())).expect("config parses");
    let json = game.play_cell_json(2).expect("empty cell accepts a move");
    assert!(json.contains("MarkPlaced"));
    assert!(game.play_cell_json(2).is_err());
    assert!(game.play_cell_json(42).is_err());
}
