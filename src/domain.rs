//! Domain models shown by the display: questions, players, teams, scores, overlay.
//!
//! Everything here mirrors server-owned data except `OverlayState`, which is
//! toggled locally and echoed to the server.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use uuid::Uuid;

use crate::util::{split_tokens, value_number, value_text};

/// Discriminant selecting both the input UI and the scoring rule of a question.
/// Tags the display does not know are kept verbatim so they can be shown.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuestionType {
  MultipleChoice,
  ThisOrThat,
  ShortAnswer,
  Numbers,
  RankedAnswer,
  Dropdown,
  Unknown(String),
}

impl QuestionType {
  pub fn parse(tag: &str) -> Self {
    match tag {
      "multiple_choice" => Self::MultipleChoice,
      "this_or_that" => Self::ThisOrThat,
      "short_answer" => Self::ShortAnswer,
      "numbers" => Self::Numbers,
      "ranked_answer" => Self::RankedAnswer,
      "dropdown" => Self::Dropdown,
      other => Self::Unknown(other.to_string()),
    }
  }

  pub fn as_str(&self) -> &str {
    match self {
      Self::MultipleChoice => "multiple_choice",
      Self::ThisOrThat => "this_or_that",
      Self::ShortAnswer => "short_answer",
      Self::Numbers => "numbers",
      Self::RankedAnswer => "ranked_answer",
      Self::Dropdown => "dropdown",
      Self::Unknown(tag) => tag,
    }
  }
}

impl Default for QuestionType {
  fn default() -> Self {
    Self::Unknown(String::new())
  }
}

impl Serialize for QuestionType {
  fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(self.as_str())
  }
}

impl<'de> Deserialize<'de> for QuestionType {
  fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let tag = Option::<String>::deserialize(d)?.unwrap_or_default();
    Ok(Self::parse(&tag))
  }
}

/// Accepts strings, numbers or null for free-form text fields.
pub fn text_or_empty<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
  Ok(value_text(&Value::deserialize(d)?))
}

pub fn default_weight() -> f64 {
  1.0
}

/// Weight as a number; null, missing or non-numeric values count as 1.
pub fn loose_weight<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
  Ok(value_number(&Value::deserialize(d)?).unwrap_or_else(default_weight))
}

/// A question as delivered to the display. Immutable once delivered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Question {
  #[serde(rename = "question", default, deserialize_with = "text_or_empty")]
  pub text: String,
  #[serde(default)]
  pub image_url: Option<String>,
  #[serde(default)]
  pub question_type: QuestionType,
  /// Comma-separated choices for choice-like types.
  #[serde(default, deserialize_with = "text_or_empty")]
  pub choices: String,
  /// Comma-separated correct answer(s).
  #[serde(default, deserialize_with = "text_or_empty")]
  pub answer: String,
  #[serde(default = "default_weight", deserialize_with = "loose_weight")]
  pub weight: f64,
}

impl Question {
  pub fn choice_list(&self) -> Vec<String> {
    split_tokens(&self.choices)
  }

  /// Image reference, if the server sent a non-empty one.
  pub fn image(&self) -> Option<&str> {
    self.image_url.as_deref().filter(|u| !u.trim().is_empty())
  }
}

/// Team affiliation. Anything other than red/blue (including null) is `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "Option<String>")]
pub enum Team {
  Red,
  Blue,
  #[default]
  None,
}

impl From<Option<String>> for Team {
  fn from(raw: Option<String>) -> Self {
    match raw.as_deref() {
      Some("red") => Self::Red,
      Some("blue") => Self::Blue,
      _ => Self::None,
    }
  }
}

impl Team {
  /// Strict parse used for streamer input where "none" makes no sense.
  pub fn parse_side(raw: &str) -> Option<Self> {
    match raw {
      "red" => Some(Self::Red),
      "blue" => Some(Self::Blue),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Red => "red",
      Self::Blue => "blue",
      Self::None => "none",
    }
  }

  /// Badge shown next to a player on the leaderboard.
  pub fn badge(&self) -> Option<&'static str> {
    match self {
      Self::Red => Some("MAFIA"),
      Self::Blue => Some("FBI"),
      Self::None => None,
    }
  }
}

/// Leaderboard entry. `score` is authoritative on the server; the display never computes it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
  pub username: String,
  #[serde(default)]
  pub team: Team,
  #[serde(default)]
  pub score: i64,
}

/// Team totals as last pushed or fetched.
/// The server sends either `red`/`blue` or `red_modifier`/`blue_modifier`,
/// sometimes both; the plain names win.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawTeamScores")]
pub struct TeamScores {
  pub red: f64,
  pub blue: f64,
}

#[derive(Deserialize)]
struct RawTeamScores {
  #[serde(default)]
  red: Value,
  #[serde(default)]
  blue: Value,
  #[serde(default)]
  red_modifier: Value,
  #[serde(default)]
  blue_modifier: Value,
}

impl From<RawTeamScores> for TeamScores {
  fn from(raw: RawTeamScores) -> Self {
    let pick = |plain: &Value, modifier: &Value| value_number(plain).or_else(|| value_number(modifier)).unwrap_or(0.0);
    Self { red: pick(&raw.red, &raw.red_modifier), blue: pick(&raw.blue, &raw.blue_modifier) }
  }
}

/// Whether team affiliation is revealed on stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayState {
  #[default]
  None,
  Reveal,
}

impl OverlayState {
  pub fn parse(raw: &str) -> Option<Self> {
    match raw {
      "none" => Some(Self::None),
      "reveal" => Some(Self::Reveal),
      _ => None,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Self::None => "none",
      Self::Reveal => "reveal",
    }
  }

  pub fn toggled(self) -> Self {
    match self {
      Self::None => Self::Reveal,
      Self::Reveal => Self::None,
    }
  }
}

/// Current host and their rating, shown in the header of every screen.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct HostBadge {
  pub host_image: Option<String>,
  pub rating: Option<String>,
}

/// One bar of the host ratings chart.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HostRating {
  pub host: String,
  pub rating: f64,
}

/// A line of the finale activity feed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeedEvent {
  pub id: Uuid,
  pub username: String,
  pub team: Team,
  pub question: String,
  pub correct: bool,
}

/// Player → submitted answer, in the order the server listed them.
/// Delivered once per question when it closes.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResponseSet(Vec<(String, String)>);

impl ResponseSet {
  #[cfg(test)]
  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn answers(&self) -> impl Iterator<Item = &str> {
    self.0.iter().map(|(_, answer)| answer.as_str())
  }
}

impl<P: Into<String>, A: Into<String>> FromIterator<(P, A)> for ResponseSet {
  fn from_iter<I: IntoIterator<Item = (P, A)>>(iter: I) -> Self {
    Self(iter.into_iter().map(|(p, a)| (p.into(), a.into())).collect())
  }
}

impl Serialize for ResponseSet {
  fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = s.serialize_map(Some(self.0.len()))?;
    for (player, answer) in &self.0 {
      map.serialize_entry(player, answer)?;
    }
    map.end()
  }
}

impl<'de> Deserialize<'de> for ResponseSet {
  fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    let map = Option::<serde_json::Map<String, Value>>::deserialize(d)?.unwrap_or_default();
    Ok(map.into_iter().map(|(player, answer)| (player, value_text(&answer))).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn question_type_round_trips_known_and_unknown_tags() {
    let known: QuestionType = serde_json::from_value(json!("this_or_that")).unwrap();
    assert_eq!(known, QuestionType::ThisOrThat);

    let unknown: QuestionType = serde_json::from_value(json!("essay")).unwrap();
    assert_eq!(unknown, QuestionType::Unknown("essay".into()));
    assert_eq!(serde_json::to_value(&unknown).unwrap(), json!("essay"));

    let missing: QuestionType = serde_json::from_value(Value::Null).unwrap();
    assert_eq!(missing, QuestionType::Unknown(String::new()));
  }

  #[test]
  fn question_tolerates_loose_fields() {
    let q: Question = serde_json::from_value(json!({
      "question": "How many moons?",
      "question_type": "numbers",
      "answer": 2,
      "choices": null,
      "image_url": ""
    }))
    .unwrap();
    assert_eq!(q.text, "How many moons?");
    assert_eq!(q.answer, "2");
    assert_eq!(q.choices, "");
    assert_eq!(q.weight, 1.0);
    assert_eq!(q.image(), None);
  }

  #[test]
  fn team_parses_anything_else_as_none() {
    let p: Player = serde_json::from_value(json!({"username": "ann", "team": "green", "score": 3})).unwrap();
    assert_eq!(p.team, Team::None);
    let p: Player = serde_json::from_value(json!({"username": "bo", "team": "red"})).unwrap();
    assert_eq!(p.team, Team::Red);
    assert_eq!(p.score, 0);
    assert_eq!(Team::parse_side("none"), None);
  }

  #[test]
  fn team_scores_accept_modifier_names() {
    let s: TeamScores = serde_json::from_value(json!({"red_modifier": 120, "blue_modifier": 80.5})).unwrap();
    assert_eq!(s, TeamScores { red: 120.0, blue: 80.5 });

    let s: TeamScores =
      serde_json::from_value(json!({"red": 1, "blue": 2, "red_modifier": 9, "blue_modifier": 9, "extra": true})).unwrap();
    assert_eq!(s, TeamScores { red: 1.0, blue: 2.0 });
    let s: TeamScores = serde_json::from_value(json!({"red": null, "red_modifier": "40", "blue": "n/a"})).unwrap();
    assert_eq!(s, TeamScores { red: 40.0, blue: 0.0 });
  }

  #[test]
  fn weight_falls_back_to_one() {
    for raw in [json!(null), json!("heavy"), json!({})] {
      let q: Question = serde_json::from_value(json!({"question": "q", "weight": raw})).unwrap();
      assert_eq!(q.weight, 1.0);
    }
    let q: Question = serde_json::from_value(json!({"question": "q", "weight": "2.5"})).unwrap();
    assert_eq!(q.weight, 2.5);
  }

  #[test]
  fn overlay_toggles() {
    assert_eq!(OverlayState::None.toggled(), OverlayState::Reveal);
    assert_eq!(OverlayState::Reveal.toggled(), OverlayState::None);
    assert_eq!(OverlayState::parse("reveal"), Some(OverlayState::Reveal));
    assert_eq!(OverlayState::parse("sparkles"), None);
  }

  #[test]
  fn response_set_keeps_arrival_order_and_stringifies() {
    let set: ResponseSet = serde_json::from_value(json!({"zed": "B", "amy": 12, "kim": "A"})).unwrap();
    assert_eq!(set.answers().collect::<Vec<_>>(), vec!["B", "12", "A"]);
    assert_eq!(serde_json::to_value(&set).unwrap(), json!({"zed": "B", "amy": "12", "kim": "A"}));

    let empty: ResponseSet = serde_json::from_value(Value::Null).unwrap();
    assert!(empty.is_empty());
  }
}
