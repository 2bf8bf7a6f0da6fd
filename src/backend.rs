//! HTTP client for the game server.
//!
//! Fetches return typed results; the POSTs are fire-and-forget from the
//! display's point of view, so callers log failures and move on. No retries.
//! Calls are instrumented with path, status and latency (never bodies).

use std::time::{Duration, Instant};

use reqwest::{header::USER_AGENT, multipart, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::domain::{HostBadge, HostRating, OverlayState, Player, Team, TeamScores};
use crate::protocol::{HostScoreOut, LeaderboardOut, OverlayBody, ScriptedEventBody, SecretPointsBody};
use crate::util::{trunc_for_log, value_number, value_text};

const CLIENT_UA: &str = "streamer-display/0.1";

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
  #[error("request to {path} failed: {source}")]
  Transport {
    path: String,
    #[source]
    source: reqwest::Error,
  },
  #[error("{path} returned HTTP {status}: {body}")]
  Status { path: String, status: StatusCode, body: String },
  #[error("could not decode {path} response: {source}")]
  Decode {
    path: String,
    #[source]
    source: serde_json::Error,
  },
}

#[derive(Clone, Debug)]
pub struct BackendClient {
  client: reqwest::Client,
  base_url: String,
}

enum Body<'a, B: Serialize> {
  Empty,
  Json(&'a B),
  Form(multipart::Form),
}

impl BackendClient {
  pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string() })
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  async fn call<B: Serialize>(&self, method: Method, path: &str, body: Body<'_, B>) -> Result<Value, BackendError> {
    let url = format!("{}{}", self.base_url, path);
    let started = Instant::now();
    let mut req = self.client.request(method, &url).header(USER_AGENT, CLIENT_UA);
    req = match body {
      Body::Empty => req,
      Body::Json(b) => req.json(b),
      Body::Form(form) => req.multipart(form),
    };

    let res = req.send().await.map_err(|source| BackendError::Transport { path: path.to_string(), source })?;
    let status = res.status();
    let text = res.text().await.map_err(|source| BackendError::Transport { path: path.to_string(), source })?;
    debug!(target: "backend", %path, %status, elapsed_ms = started.elapsed().as_millis() as u64, bytes = text.len(), "Backend replied");

    if !status.is_success() {
      return Err(BackendError::Status { path: path.to_string(), status, body: trunc_for_log(&text, 200) });
    }
    if text.trim().is_empty() {
      return Ok(Value::Null);
    }
    serde_json::from_str(&text).map_err(|source| BackendError::Decode { path: path.to_string(), source })
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
    let value = self.call::<()>(Method::GET, path, Body::Empty).await?;
    serde_json::from_value(value).map_err(|source| BackendError::Decode { path: path.to_string(), source })
  }

  async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<Value, BackendError> {
    self.call(Method::POST, path, Body::Json(body)).await
  }

  async fn post_empty(&self, path: &str) -> Result<Value, BackendError> {
    self.call::<()>(Method::POST, path, Body::Empty).await
  }

  //
  // Fetches
  //

  #[instrument(level = "info", skip(self))]
  pub async fn leaderboard(&self) -> Result<Vec<Player>, BackendError> {
    Ok(self.get_json::<LeaderboardOut>("/leaderboard").await?.leaderboard)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn team_scores(&self) -> Result<TeamScores, BackendError> {
    self.get_json("/get_team_scores").await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn current_host_score(&self) -> Result<HostBadge, BackendError> {
    let out: HostScoreOut = self.get_json("/get_current_host_score").await?;
    Ok(HostBadge { host_image: out.host_image, rating: Some(value_text(&out.score)) })
  }

  /// Host name → rating, in server order. Non-numeric ratings are skipped.
  #[instrument(level = "info", skip(self))]
  pub async fn host_ratings(&self) -> Result<Vec<HostRating>, BackendError> {
    let map: serde_json::Map<String, Value> = self.get_json("/get_scores").await?;
    Ok(map
      .into_iter()
      .filter_map(|(host, v)| match value_number(&v) {
        Some(rating) => Some(HostRating { host, rating }),
        None => {
          warn!(target: "backend", %host, value = %v, "Skipping non-numeric host rating");
          None
        }
      })
      .collect())
  }

  //
  // Actions
  //

  /// Multipart form, as the server reads `username` and `score` form fields.
  #[instrument(level = "info", skip(self))]
  pub async fn update_score(&self, username: &str, score: i64) -> Result<(), BackendError> {
    let form = multipart::Form::new().text("username", username.to_string()).text("score", score.to_string());
    self.call::<()>(Method::POST, "/update_score", Body::Form(form)).await.map(drop)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn secret_finale_points(&self, team: Team, amount: i64) -> Result<(), BackendError> {
    self.post_json("/secret_finale_points", &SecretPointsBody { team: team.as_str(), amount }).await.map(drop)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn trigger_scripted_event(&self, event_type: &str) -> Result<Value, BackendError> {
    self.post_json("/trigger_scripted_event", &ScriptedEventBody { event_type }).await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn trigger_overlay(&self, overlay: OverlayState) -> Result<(), BackendError> {
    self.post_json("/trigger_overlay", &OverlayBody { kind: overlay.as_str() }).await.map(drop)
  }

  #[instrument(level = "info", skip(self))]
  pub async fn assign_teams(&self) -> Result<Value, BackendError> {
    self.post_empty("/assign_teams").await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn reset_questions(&self) -> Result<Value, BackendError> {
    self.post_empty("/reset_questions").await
  }

  #[instrument(level = "info", skip(self))]
  pub async fn delete_players(&self) -> Result<Value, BackendError> {
    self.post_empty("/delete_players").await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::{
    extract::{Multipart, State},
    http::StatusCode as AxumStatus,
    routing::{get, post},
    Json, Router,
  };
  use serde_json::json;
  use std::sync::{Arc, Mutex};

  type Seen = Arc<Mutex<Vec<(String, Value)>>>;

  async fn record_json(State(seen): State<Seen>, uri: axum::http::Uri, Json(body): Json<Value>) -> Json<Value> {
    seen.lock().unwrap().push((uri.path().to_string(), body));
    Json(json!({"ok": true}))
  }

  async fn record_form(State(seen): State<Seen>, mut form: Multipart) -> Json<Value> {
    let mut fields = serde_json::Map::new();
    while let Some(field) = form.next_field().await.unwrap() {
      let name = field.name().unwrap_or_default().to_string();
      fields.insert(name, Value::String(field.text().await.unwrap()));
    }
    seen.lock().unwrap().push(("/update_score".into(), Value::Object(fields)));
    Json(json!({"ok": true}))
  }

  async fn mock_backend() -> (BackendClient, Seen) {
    let seen: Seen = Arc::default();
    let app = Router::new()
      .route("/leaderboard", get(|| async {
        Json(json!({"leaderboard": [
          {"username": "ann", "team": "red", "score": 40},
          {"username": "bo", "team": null, "score": 12}
        ]}))
      }))
      .route("/get_team_scores", get(|| async { Json(json!({"red": 1500, "blue": 900})) }))
      .route("/get_current_host_score", get(|| async { Json(json!({"score": 4.5, "host_image": "h.png"})) }))
      .route("/get_scores", get(|| async { Json(json!({"Zed": 3, "Amy": "4.5", "Kim": "n/a"})) }))
      .route("/trigger_scripted_event", post(record_json))
      .route("/trigger_overlay", post(record_json))
      .route("/secret_finale_points", post(record_json))
      .route("/update_score", post(record_form))
      .route("/reset_questions", post(|| async { AxumStatus::INTERNAL_SERVER_ERROR }))
      .route("/assign_teams", post(|| async { AxumStatus::OK }))
      .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

    let client = BackendClient::new(&format!("http://{addr}/"), Duration::from_secs(5)).unwrap();
    (client, seen)
  }

  #[tokio::test]
  async fn fetches_decode_server_shapes() {
    let (client, _) = mock_backend().await;
    assert!(!client.base_url().ends_with('/'));

    let board = client.leaderboard().await.unwrap();
    assert_eq!(board.len(), 2);
    assert_eq!(board[0].team, Team::Red);
    assert_eq!(board[1].team, Team::None);

    assert_eq!(client.team_scores().await.unwrap(), TeamScores { red: 1500.0, blue: 900.0 });

    let host = client.current_host_score().await.unwrap();
    assert_eq!(host, HostBadge { host_image: Some("h.png".into()), rating: Some("4.5".into()) });

    let ratings = client.host_ratings().await.unwrap();
    assert_eq!(
      ratings,
      vec![HostRating { host: "Zed".into(), rating: 3.0 }, HostRating { host: "Amy".into(), rating: 4.5 }]
    );
  }

  #[tokio::test]
  async fn actions_send_expected_bodies() {
    let (client, seen) = mock_backend().await;
    client.trigger_scripted_event("betray_fbi").await.unwrap();
    client.trigger_overlay(OverlayState::Reveal).await.unwrap();
    client.secret_finale_points(Team::Blue, 50).await.unwrap();
    client.update_score("ann", 77).await.unwrap();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(
      seen,
      vec![
        ("/trigger_scripted_event".to_string(), json!({"event_type": "betray_fbi"})),
        ("/trigger_overlay".to_string(), json!({"type": "reveal"})),
        ("/secret_finale_points".to_string(), json!({"team": "blue", "amount": 50})),
        ("/update_score".to_string(), json!({"username": "ann", "score": "77"})),
      ]
    );
  }

  #[tokio::test]
  async fn status_and_transport_failures_are_typed() {
    let (client, _) = mock_backend().await;
    assert!(matches!(
      client.reset_questions().await,
      Err(BackendError::Status { status, .. }) if status == StatusCode::INTERNAL_SERVER_ERROR
    ));
    // Empty 200 body is fine for actions.
    assert_eq!(client.assign_teams().await.unwrap(), Value::Null);
    // Not routed on the mock.
    assert!(matches!(client.delete_players().await, Err(BackendError::Status { .. })));

    let dead = BackendClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    assert!(matches!(dead.leaderboard().await, Err(BackendError::Transport { .. })));
  }
}
