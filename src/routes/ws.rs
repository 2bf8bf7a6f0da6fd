//! WebSocket upgrade + message loop.
//!
//! Every published screen is pushed to the client as `{"type":"screen", ...}`.
//! Client messages are parsed as JSON commands and forwarded to core logic;
//! failures come back as `{"type":"error"}`.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::controller::AdminAction;
use crate::logic::{self, ActionError};
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::state::AppState;
use crate::views::Screen;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "streamer_display", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

fn screen_message(screen: Screen) -> ServerWsMessage {
  let text = screen.to_string();
  ServerWsMessage::Screen { screen, text }
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> bool {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  if let Err(e) = socket.send(Message::Text(out)).await {
    error!(target: "streamer_display", error = %e, "WS send error");
    return false;
  }
  true
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "streamer_display", "WebSocket connected");
  let mut screens = state.subscribe_screens();
  let current = screens.borrow_and_update().clone();
  if !send(&mut socket, &screen_message(current)).await {
    return;
  }

  loop {
    tokio::select! {
      changed = screens.changed() => {
        if changed.is_err() {
          // Controller stopped; nothing more will be published.
          break;
        }
        let screen = screens.borrow_and_update().clone();
        if !send(&mut socket, &screen_message(screen)).await {
          break;
        }
      }
      msg = socket.recv() => {
        let Some(Ok(msg)) = msg else { break };
        match msg {
          Message::Text(txt) => {
            let reply = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => {
                debug!(target: "streamer_display", "WS received: {:?}", &incoming);
                handle_client_ws(incoming, &state).await
              }
              Err(e) => Some(ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) }),
            };
            if let Some(reply) = reply {
              if !send(&mut socket, &reply).await {
                break;
              }
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
    }
  }
  info!(target: "streamer_display", "WebSocket disconnected");
}

/// Commands answer only on failure; their effect arrives as the next screen push.
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> Option<ServerWsMessage> {
  let result: Result<(), ActionError> = match msg {
    ClientWsMessage::Ping => return Some(ServerWsMessage::Pong),
    ClientWsMessage::Navigate { path } => match logic::navigate(state, &path).await {
      Ok(screen) => return Some(screen_message(screen)),
      Err(e) => Err(e),
    },
    ClientWsMessage::EditScore { username, score } => logic::edit_score(state, &username, score),
    ClientWsMessage::ScriptedEvent { event_type } => logic::scripted_event(state, &event_type),
    ClientWsMessage::Overlay { overlay } => logic::set_overlay(state, overlay.as_deref()),
    ClientWsMessage::HighlightRandom => logic::highlight_random(state),
    ClientWsMessage::Search { term } => logic::search(state, &term),
    ClientWsMessage::SecretPoints { team } => logic::secret_points(state, &team),
    ClientWsMessage::ResetQuestions => logic::admin(state, AdminAction::ResetQuestions),
    ClientWsMessage::DeletePlayers => logic::admin(state, AdminAction::DeletePlayers),
    ClientWsMessage::AssignTeams => logic::admin(state, AdminAction::AssignTeams),
    ClientWsMessage::ChangeHost => logic::change_host(state),
  };
  result.err().map(|e| ServerWsMessage::Error { message: e.to_string() })
}
