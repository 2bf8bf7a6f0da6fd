//! Streamer actions shared by both HTTP and WebSocket handlers.
//!
//! Input is validated here; everything else is queued for the controller,
//! which owns the state and performs the backend calls.

use tracing::{info, instrument};

use crate::controller::{AdminAction, Command};
use crate::domain::{OverlayState, Team};
use crate::state::AppState;
use crate::views::Screen;

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
  #[error("unknown overlay type '{0}'")]
  UnknownOverlay(String),
  #[error("unknown team '{0}' (expected red or blue)")]
  UnknownTeam(String),
  #[error("{0} must not be empty")]
  Empty(&'static str),
  #[error("display controller is not running")]
  ControllerGone,
}

fn queue(state: &AppState, cmd: Command) -> Result<(), ActionError> {
  if state.send(cmd) {
    Ok(())
  } else {
    Err(ActionError::ControllerGone)
  }
}

#[instrument(level = "info", skip(state))]
pub async fn navigate(state: &AppState, path: &str) -> Result<Screen, ActionError> {
  state.navigate(path).await.ok_or(ActionError::ControllerGone)
}

#[instrument(level = "info", skip(state))]
pub fn edit_score(state: &AppState, username: &str, score: i64) -> Result<(), ActionError> {
  if username.trim().is_empty() {
    return Err(ActionError::Empty("username"));
  }
  queue(state, Command::EditScore { username: username.to_string(), score })
}

#[instrument(level = "info", skip(state))]
pub fn scripted_event(state: &AppState, event_type: &str) -> Result<(), ActionError> {
  if event_type.trim().is_empty() {
    return Err(ActionError::Empty("event_type"));
  }
  info!(target: "dashboard", %event_type, "Scripted event requested");
  queue(state, Command::TriggerScriptedEvent { event_type: event_type.to_string() })
}

/// `None` toggles the current overlay.
#[instrument(level = "info", skip(state))]
pub fn set_overlay(state: &AppState, kind: Option<&str>) -> Result<(), ActionError> {
  let requested = match kind {
    None => None,
    Some(raw) => Some(OverlayState::parse(raw).ok_or_else(|| ActionError::UnknownOverlay(raw.to_string()))?),
  };
  queue(state, Command::SetOverlay(requested))
}

pub fn highlight_random(state: &AppState) -> Result<(), ActionError> {
  queue(state, Command::HighlightRandom)
}

pub fn search(state: &AppState, term: &str) -> Result<(), ActionError> {
  queue(state, Command::Search { term: term.to_string() })
}

#[instrument(level = "info", skip(state))]
pub fn secret_points(state: &AppState, team: &str) -> Result<(), ActionError> {
  let team = Team::parse_side(team).ok_or_else(|| ActionError::UnknownTeam(team.to_string()))?;
  queue(state, Command::SecretPoints { team })
}

#[instrument(level = "info", skip(state))]
pub fn admin(state: &AppState, action: AdminAction) -> Result<(), ActionError> {
  info!(target: "dashboard", action = action.as_str(), "Admin action requested");
  queue(state, Command::Admin(action))
}

pub fn change_host(state: &AppState) -> Result<(), ActionError> {
  queue(state, Command::ChangeHost)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::controller::Input;
  use tokio::sync::{mpsc, watch};

  fn state() -> (AppState, mpsc::UnboundedReceiver<Input>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let (_screens, screen_rx) = watch::channel(Screen::blank());
    (AppState::new(tx, screen_rx), rx)
  }

  #[test]
  fn overlay_input_is_validated() {
    let (state, mut rx) = state();
    assert_eq!(set_overlay(&state, Some("sparkles")), Err(ActionError::UnknownOverlay("sparkles".into())));
    assert!(rx.try_recv().is_err());

    set_overlay(&state, Some("reveal")).unwrap();
    assert!(matches!(rx.try_recv(), Ok(Input::Command(Command::SetOverlay(Some(OverlayState::Reveal))))));
    set_overlay(&state, None).unwrap();
    assert!(matches!(rx.try_recv(), Ok(Input::Command(Command::SetOverlay(None)))));
  }

  #[test]
  fn secret_points_need_a_side() {
    let (state, mut rx) = state();
    assert_eq!(secret_points(&state, "none"), Err(ActionError::UnknownTeam("none".into())));
    secret_points(&state, "blue").unwrap();
    assert!(matches!(rx.try_recv(), Ok(Input::Command(Command::SecretPoints { team: Team::Blue }))));
  }

  #[test]
  fn empty_fields_are_rejected() {
    let (state, _rx) = state();
    assert_eq!(edit_score(&state, "  ", 3), Err(ActionError::Empty("username")));
    assert_eq!(scripted_event(&state, ""), Err(ActionError::Empty("event_type")));
  }

  #[tokio::test]
  async fn stopped_controller_is_reported() {
    let (state, rx) = state();
    drop(rx);
    assert_eq!(change_host(&state), Err(ActionError::ControllerGone));
    assert_eq!(navigate(&state, "/timer").await, Err(ActionError::ControllerGone));
  }
}
