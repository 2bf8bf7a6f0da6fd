//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs its parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, Query, State},
  http::{StatusCode, Uri},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{debug, info, instrument, warn};

use crate::controller::AdminAction;
use crate::logic::{self, ActionError};
use crate::protocol::*;
use crate::state::AppState;
use crate::views::Screen;

fn render(screen: Screen, format: Option<&str>) -> Response {
  let status = if screen.is_not_found() { StatusCode::NOT_FOUND } else { StatusCode::OK };
  match format {
    Some("json") => (status, Json(screen)).into_response(),
    _ => (status, screen.to_string()).into_response(),
  }
}

fn accepted(result: Result<(), ActionError>) -> Response {
  match result {
    Ok(()) => Json(AcceptedOut { accepted: true }).into_response(),
    Err(e) => {
      let status = match e {
        ActionError::ControllerGone => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_REQUEST,
      };
      warn!(target: "streamer_display", error = %e, "Rejected streamer action");
      (status, Json(ErrorOut { error: e.to_string() })).into_response()
    }
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

/// A screen path: navigate the display there and return what it shows.
#[instrument(level = "info", skip(state, q), fields(path = %uri.path()))]
pub async fn http_route(
  State(state): State<Arc<AppState>>,
  uri: Uri,
  Query(q): Query<ScreenQuery>,
) -> Response {
  match logic::navigate(&state, uri.path()).await {
    Ok(screen) => {
      info!(target: "streamer_display", path = %uri.path(), found = !screen.is_not_found(), "HTTP navigate served");
      render(screen, q.format.as_deref())
    }
    Err(e) => accepted(Err(e)),
  }
}

/// Paths with no screen (favicons, stray assets). Answers 404 and leaves the
/// mounted view alone.
#[instrument(level = "info", skip(state, q), fields(path = %uri.path()))]
pub async fn http_unknown_screen(
  State(state): State<Arc<AppState>>,
  uri: Uri,
  Query(q): Query<ScreenQuery>,
) -> Response {
  debug!(target: "streamer_display", path = %uri.path(), "No screen here; display left as is");
  render(Screen::not_found(uri.path(), &state.screen()), q.format.as_deref())
}

#[instrument(level = "info", skip(state, q))]
pub async fn http_get_screen(
  State(state): State<Arc<AppState>>,
  Query(q): Query<ScreenQuery>,
) -> Response {
  // Current screen as JSON unless text is asked for.
  let format = q.format.as_deref().unwrap_or("json");
  render(state.screen(), Some(format))
}

#[instrument(level = "info", skip(state, body), fields(%body.username, score = body.score))]
pub async fn http_post_score(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ScoreEditIn>,
) -> Response {
  accepted(logic::edit_score(&state, &body.username, body.score))
}

#[instrument(level = "info", skip(state, body), fields(%body.event_type))]
pub async fn http_post_scripted_event(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ScriptedEventIn>,
) -> Response {
  accepted(logic::scripted_event(&state, &body.event_type))
}

#[instrument(level = "info", skip(state, body), fields(kind = ?body.kind))]
pub async fn http_post_overlay(
  State(state): State<Arc<AppState>>,
  Json(body): Json<OverlayIn>,
) -> Response {
  accepted(logic::set_overlay(&state, body.kind.as_deref()))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_highlight_random(State(state): State<Arc<AppState>>) -> Response {
  accepted(logic::highlight_random(&state))
}

#[instrument(level = "info", skip(state, body), fields(%body.term))]
pub async fn http_post_search(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SearchIn>,
) -> Response {
  accepted(logic::search(&state, &body.term))
}

#[instrument(level = "info", skip(state, body), fields(%body.team))]
pub async fn http_post_secret_points(
  State(state): State<Arc<AppState>>,
  Json(body): Json<SecretPointsIn>,
) -> Response {
  accepted(logic::secret_points(&state, &body.team))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_admin(
  State(state): State<Arc<AppState>>,
  Path(action): Path<String>,
) -> Response {
  let action = match action.as_str() {
    "reset_questions" => AdminAction::ResetQuestions,
    "delete_players" => AdminAction::DeletePlayers,
    "assign_teams" => AdminAction::AssignTeams,
    other => {
      return (StatusCode::NOT_FOUND, Json(ErrorOut { error: format!("unknown admin action '{other}'") })).into_response();
    }
  };
  accepted(logic::admin(&state, action))
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_change_host(State(state): State<Arc<AppState>>) -> Response {
  accepted(logic::change_host(&state))
}
