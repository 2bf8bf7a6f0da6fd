//! Wire payloads: push-channel events, backend HTTP DTOs, and the local
//! HTTP/WebSocket surface used by the streamer's browser source.
//! Keep this small and stable so display and backend can evolve independently.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{
    default_weight, loose_weight, text_or_empty, Player, Question, QuestionType, ResponseSet, Team, TeamScores,
};
use crate::views::Screen;

/// Names of events exchanged over the push channel.
pub mod events {
    pub const TEAM_SCORE_UPDATE: &str = "team_score_update";
    pub const FINALE_FEED_EVENT: &str = "finale_feed_event";
    pub const SCORE_UPDATED: &str = "score_updated";
    pub const HOST_CHANGED: &str = "host_changed";
    pub const RESULTS: &str = "results";
    pub const SHOW_OVERLAY: &str = "show_overlay";
    pub const QUESTION_STARTED: &str = "question_started";

    pub const END_QUESTION: &str = "end_question";
    pub const CHANGE_HOST: &str = "change_host";
}

/// One frame on the push channel, in both directions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

//
// Push payloads (server → display)
//

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct FinaleFeedPayload {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub team: Team,
    #[serde(default, deserialize_with = "text_or_empty")]
    pub question: String,
    #[serde(default)]
    pub correct: bool,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ScoreUpdated {
    #[serde(default)]
    pub score: Value,
    #[serde(default)]
    pub host_image: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct HostChanged {
    #[serde(default)]
    pub host_image: Option<String>,
}

/// Snapshot delivered when a question closes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultsPayload {
    #[serde(default)]
    pub responses: ResponseSet,
    /// Comma-separated correct answer(s).
    #[serde(default, deserialize_with = "text_or_empty")]
    pub answer: String,
    #[serde(default)]
    pub question_type: QuestionType,
    #[serde(default = "default_weight", deserialize_with = "loose_weight")]
    pub weight: f64,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ShowOverlay {
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct QuestionStarted {
    pub question: Question,
    #[serde(default)]
    pub duration: u32,
    #[serde(default)]
    pub question_number: u32,
}

/// Decoded push event.
#[derive(Clone, Debug, PartialEq)]
pub enum PushEvent {
    TeamScoreUpdate(TeamScores),
    FinaleFeed(FinaleFeedPayload),
    ScoreUpdated(ScoreUpdated),
    HostChanged(HostChanged),
    Results(ResultsPayload),
    ShowOverlay(ShowOverlay),
    QuestionStarted(QuestionStarted),
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown push event '{0}'")]
    UnknownEvent(String),
    #[error("malformed '{event}' payload: {source}")]
    Payload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PushEvent {
    pub fn decode(event: &str, data: &Value) -> Result<Self, DecodeError> {
        fn parse<T: DeserializeOwned>(event: &str, data: &Value) -> Result<T, DecodeError> {
            // Some events arrive without a body; treat that as an empty object.
            let empty = Value::Object(serde_json::Map::new());
            let data = if data.is_null() { &empty } else { data };
            T::deserialize(data).map_err(|source| DecodeError::Payload {
                event: event.to_string(),
                source,
            })
        }

        Ok(match event {
            events::TEAM_SCORE_UPDATE => Self::TeamScoreUpdate(parse(event, data)?),
            events::FINALE_FEED_EVENT => Self::FinaleFeed(parse(event, data)?),
            events::SCORE_UPDATED => Self::ScoreUpdated(parse(event, data)?),
            events::HOST_CHANGED => Self::HostChanged(parse(event, data)?),
            events::RESULTS => Self::Results(parse(event, data)?),
            events::SHOW_OVERLAY => Self::ShowOverlay(parse(event, data)?),
            events::QUESTION_STARTED => Self::QuestionStarted(parse(event, data)?),
            other => return Err(DecodeError::UnknownEvent(other.to_string())),
        })
    }
}

//
// Emitted events (display → server)
//

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EndQuestion {
    pub question_number: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChangeHost {}

//
// Backend HTTP DTOs
//

#[derive(Debug, Deserialize)]
pub struct LeaderboardOut {
    #[serde(default)]
    pub leaderboard: Vec<Player>,
}

#[derive(Debug, Deserialize)]
pub struct HostScoreOut {
    #[serde(default)]
    pub score: Value,
    #[serde(default)]
    pub host_image: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ScriptedEventBody<'a> {
    pub event_type: &'a str,
}

#[derive(Debug, Serialize)]
pub struct OverlayBody<'a> {
    #[serde(rename = "type")]
    pub kind: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SecretPointsBody<'a> {
    pub team: &'a str,
    pub amount: i64,
}

//
// Local HTTP request/response DTOs
//

#[derive(Debug, Default, Deserialize)]
pub struct ScreenQuery {
    pub format: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreEditIn {
    pub username: String,
    pub score: i64,
}

#[derive(Debug, Deserialize)]
pub struct ScriptedEventIn {
    pub event_type: String,
}

/// Missing `type` toggles the overlay.
#[derive(Debug, Default, Deserialize)]
pub struct OverlayIn {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchIn {
    #[serde(default)]
    pub term: String,
}

#[derive(Debug, Deserialize)]
pub struct SecretPointsIn {
    pub team: String,
}

#[derive(Serialize)]
pub struct AcceptedOut {
    pub accepted: bool,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

//
// Local WebSocket
//

/// Commands the browser source / control panel can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    Navigate { path: String },
    EditScore { username: String, score: i64 },
    ScriptedEvent { event_type: String },
    Overlay {
        #[serde(default)]
        overlay: Option<String>,
    },
    HighlightRandom,
    Search {
        #[serde(default)]
        term: String,
    },
    SecretPoints { team: String },
    ResetQuestions,
    DeletePlayers,
    AssignTeams,
    ChangeHost,
}

/// Messages the display sends to local WebSocket clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Screen { screen: Screen, text: String },
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_results_with_loose_answer() {
        let ev = PushEvent::decode(
            events::RESULTS,
            &json!({"responses": {"a": "10"}, "answer": 12, "question_type": "numbers", "weight": -2}),
        )
        .unwrap();
        let PushEvent::Results(r) = ev else { panic!("expected results") };
        assert_eq!(r.answer, "12");
        assert_eq!(r.weight, -2.0);
        assert_eq!(r.responses.len(), 1);
    }

    #[test]
    fn decodes_bodyless_events() {
        let ev = PushEvent::decode(events::HOST_CHANGED, &Value::Null).unwrap();
        assert_eq!(ev, PushEvent::HostChanged(HostChanged { host_image: None }));
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(
            PushEvent::decode("confetti", &json!({})),
            Err(DecodeError::UnknownEvent(name)) if name == "confetti"
        ));
        assert!(matches!(
            PushEvent::decode(events::QUESTION_STARTED, &json!({"duration": 30})),
            Err(DecodeError::Payload { .. })
        ));
    }

    #[test]
    fn ws_commands_are_tagged() {
        let msg: ClientWsMessage =
            serde_json::from_value(json!({"type": "edit_score", "username": "ann", "score": 7})).unwrap();
        assert!(matches!(msg, ClientWsMessage::EditScore { score: 7, .. }));
        let msg: ClientWsMessage = serde_json::from_value(json!({"type": "overlay"})).unwrap();
        assert!(matches!(msg, ClientWsMessage::Overlay { overlay: None }));
    }

    #[test]
    fn emitted_payloads_have_expected_shape() {
        assert_eq!(serde_json::to_value(EndQuestion { question_number: 4 }).unwrap(), json!({"question_number": 4}));
        assert_eq!(serde_json::to_value(ChangeHost {}).unwrap(), json!({}));
    }
}
