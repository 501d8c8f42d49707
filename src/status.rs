//! Console status board.

use std::sync::Arc;

use crate::state::AppState;
use crate::tunnel::to_ws_scheme;
use crate::types::Liveness;

const RULE: &str =
    "============================================================================";

/// Everything the board shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBoard {
    pub local_ws_url: String,
    pub local_api_url: String,
    pub public_url: Option<String>,
    pub liveness: Liveness,
}

impl StatusBoard {
    pub fn capture(state: &AppState, liveness: Liveness) -> Self {
        Self {
            local_ws_url: state.config.local_ws_url(),
            local_api_url: state.config.local_api_url(),
            public_url: state.public_url(),
            liveness,
        }
    }
}

fn connected(flag: bool) -> &'static str {
    if flag {
        "connected"
    } else {
        "not connected"
    }
}

pub fn render(board: &StatusBoard) -> String {
    let public = board
        .public_url
        .as_deref()
        .map(to_ws_scheme)
        .unwrap_or_else(|| "(pending)".to_string());

    [
        RULE.to_string(),
        format!("WebSocket relay on {}", board.local_ws_url),
        format!("Status API on {}", board.local_api_url),
        format!("Public address: {}", public),
        format!("Control: {}", connected(board.liveness.control_connected)),
        format!("Display: {}", connected(board.liveness.display_connected)),
    ]
    .join("\n")
}

/// Spawn a background task that redraws the board whenever liveness or the
/// public address changes
pub fn spawn_status_printer(state: Arc<AppState>) {
    let mut liveness_rx = state.registry.subscribe();
    let mut url_rx = state.subscribe_public_url();

    tokio::spawn(async move {
        loop {
            let liveness = *liveness_rx.borrow_and_update();
            let _ = url_rx.borrow_and_update();
            let board = StatusBoard::capture(&state, liveness);
            // Clear screen and home the cursor before redrawing
            println!("\x1b[2J\x1b[H{}", render(&board));

            tokio::select! {
                changed = liveness_rx.changed() => if changed.is_err() { break },
                changed = url_rx.changed() => if changed.is_err() { break },
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_pending_address() {
        let board = StatusBoard::capture(&AppState::default(), Liveness::default());
        let text = render(&board);

        assert!(text.contains("WebSocket relay on ws://localhost:8888"));
        assert!(text.contains("Status API on http://localhost:3001"));
        assert!(text.contains("Public address: (pending)"));
        assert!(text.contains("Control: not connected"));
        assert!(text.contains("Display: not connected"));
    }

    #[test]
    fn test_render_rewrites_public_scheme() {
        let state = AppState::default();
        state.set_public_url("https://abc.ngrok.app".to_string());
        let board = StatusBoard::capture(
            &state,
            Liveness {
                control_connected: true,
                display_connected: false,
            },
        );
        let text = render(&board);

        assert!(text.contains("Public address: wss://abc.ngrok.app"));
        assert!(text.contains("Control: connected"));
        assert!(text.contains("Display: not connected"));
    }
}
