//! Routes and the screen view models the display publishes.
//!
//! A `Screen` is what the stream shows right now. It serializes for the local
//! WebSocket and renders as plain text for the route endpoints.

use std::fmt;

use serde::Serialize;

use crate::domain::{FeedEvent, HostBadge, HostRating, OverlayState, Team};
use crate::resolver::QuestionView;
use crate::scoring::ResultsView;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
  Questions,
  Responses,
  Leaderboard,
  Hosts,
  Timer,
  Finale,
}

impl Route {
  pub fn from_path(path: &str) -> Option<Self> {
    let trimmed = path.trim_end_matches('/');
    match trimmed {
      "" | "/streamer.html" => Some(Self::Questions),
      "/responses" => Some(Self::Responses),
      "/leaderboard" => Some(Self::Leaderboard),
      "/hosts" => Some(Self::Hosts),
      "/timer" => Some(Self::Timer),
      "/finale" => Some(Self::Finale),
      _ => None,
    }
  }

  pub fn path(&self) -> &'static str {
    match self {
      Self::Questions => "/",
      Self::Responses => "/responses",
      Self::Leaderboard => "/leaderboard",
      Self::Hosts => "/hosts",
      Self::Timer => "/timer",
      Self::Finale => "/finale",
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Screen {
  pub path: String,
  pub route: Option<Route>,
  pub header: HostBadge,
  pub overlay: OverlayState,
  pub body: ScreenBody,
}

impl Screen {
  /// Screen shown before the controller has mounted anything.
  pub fn blank() -> Self {
    Self {
      path: "/".into(),
      route: Some(Route::Questions),
      header: HostBadge::default(),
      overlay: OverlayState::None,
      body: ScreenBody::Questions,
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self.body, ScreenBody::NotFound)
  }

  /// "No screen" page for `path`, with the header and overlay of `current`.
  pub fn not_found(path: &str, current: &Screen) -> Self {
    Self {
      path: path.to_string(),
      route: None,
      header: current.header.clone(),
      overlay: current.overlay,
      body: ScreenBody::NotFound,
    }
  }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "screen", rename_all = "snake_case")]
pub enum ScreenBody {
  Questions,
  Timer(TimerScreen),
  /// `/timer` entered without a question.
  NoQuestion,
  Responses(ResponsesScreen),
  Leaderboard(LeaderboardScreen),
  Hosts(HostsScreen),
  Finale(FinaleScreen),
  NotFound,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimerScreen {
  pub question_number: u32,
  /// `MM:SS` while running; gone once time is up.
  pub countdown: Option<String>,
  pub question: QuestionView,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponsesScreen {
  /// `None` while waiting for the results event.
  pub results: Option<ResultsView>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TeamBar {
  pub label: &'static str,
  pub score: f64,
  pub percent: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeaderboardRow {
  pub rank: usize,
  pub username: String,
  pub team: Team,
  pub badge: Option<&'static str>,
  pub score: i64,
  pub highlighted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LeaderboardScreen {
  pub blue: TeamBar,
  pub red: TeamBar,
  pub search: String,
  pub rows: Vec<LeaderboardRow>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HostsScreen {
  /// `None` until the ratings fetch completes.
  pub ratings: Option<Vec<HostRating>>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FinaleScreen {
  pub blue: TeamBar,
  pub red: TeamBar,
  pub feed: Vec<FeedEvent>,
}

impl fmt::Display for TeamBar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {} ({}%)", self.label, self.score, self.percent.floor())
  }
}

impl fmt::Display for Screen {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let rating = self.header.rating.as_deref().unwrap_or("-");
    match &self.header.host_image {
      Some(img) => writeln!(f, "[host {img}] 's Rating: {rating}")?,
      None => writeln!(f, "'s Rating: {rating}")?,
    }
    if self.overlay == OverlayState::Reveal {
      writeln!(f, "[overlay: reveal]")?;
    }
    writeln!(f)?;

    match &self.body {
      ScreenBody::Questions => writeln!(f, "Waiting for the next question..."),
      ScreenBody::NoQuestion => writeln!(f, "No question in progress."),
      ScreenBody::NotFound => writeln!(f, "No screen at {}", self.path),
      ScreenBody::Timer(t) => {
        if let Some(countdown) = &t.countdown {
          writeln!(f, "{countdown}")?;
        }
        writeln!(f, "Question {}", t.question_number)?;
        write!(f, "{}", t.question)
      }
      ScreenBody::Responses(r) => match &r.results {
        Some(results) => write!(f, "{results}"),
        None => writeln!(f, "Waiting for results..."),
      },
      ScreenBody::Leaderboard(l) => {
        writeln!(f, "{}  VS  {}", l.blue, l.red)?;
        if !l.search.is_empty() {
          writeln!(f, "Search: {}", l.search)?;
        }
        for row in &l.rows {
          let star = if row.highlighted { "★ " } else { "" };
          let badge = row.badge.map(|b| format!(" [{b}]")).unwrap_or_default();
          writeln!(f, "{:>3}. {star}{}{badge} {}", row.rank, row.username, row.score)?;
        }
        Ok(())
      }
      ScreenBody::Hosts(h) => {
        writeln!(f, "Host Ratings")?;
        match &h.ratings {
          None => writeln!(f, "Loading host ratings..."),
          Some(ratings) => {
            for r in ratings {
              writeln!(f, "  {}: {}", r.host, r.rating)?;
            }
            Ok(())
          }
        }
      }
      ScreenBody::Finale(fin) => {
        writeln!(f, "FINAL SHOWDOWN")?;
        writeln!(f, "{}  VS  {}", fin.blue, fin.red)?;
        if fin.feed.is_empty() {
          return writeln!(f, "Awaiting answers...");
        }
        for item in &fin.feed {
          let verdict = if item.correct { "SUCCESS" } else { "FAILURE" };
          writeln!(f, "{} is hacking... \"{}\" {verdict}", item.username, item.question)?;
        }
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn routes_from_paths() {
    assert_eq!(Route::from_path("/"), Some(Route::Questions));
    assert_eq!(Route::from_path("/streamer.html"), Some(Route::Questions));
    assert_eq!(Route::from_path("/timer"), Some(Route::Timer));
    assert_eq!(Route::from_path("/leaderboard/"), Some(Route::Leaderboard));
    assert_eq!(Route::from_path("/admin"), None);
    for route in [Route::Questions, Route::Responses, Route::Leaderboard, Route::Hosts, Route::Timer, Route::Finale] {
      assert_eq!(Route::from_path(route.path()), Some(route));
    }
  }

  #[test]
  fn waiting_and_empty_results_are_distinguishable() {
    let mut screen = Screen::blank();
    screen.body = ScreenBody::Responses(ResponsesScreen { results: None });
    let waiting = screen.to_string();
    screen.body = ScreenBody::Responses(ResponsesScreen { results: Some(ResultsView::NoResponses) });
    let empty = screen.to_string();

    assert!(waiting.contains("Waiting for results..."));
    assert!(empty.contains("No responses available."));
    assert_ne!(waiting, empty);
  }

  #[test]
  fn header_shows_host_rating() {
    let mut screen = Screen::blank();
    screen.header = HostBadge { host_image: Some("h.png".into()), rating: Some("4.5".into()) };
    assert!(screen.to_string().starts_with("[host h.png] 's Rating: 4.5"));
  }

  #[test]
  fn screen_json_is_tagged() {
    let mut screen = Screen::blank();
    screen.body = ScreenBody::NoQuestion;
    let v = serde_json::to_value(&screen).unwrap();
    assert_eq!(v["body"]["screen"], "no_question");
    assert_eq!(v["route"], "questions");
  }
}
