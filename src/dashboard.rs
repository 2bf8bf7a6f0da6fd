//! Dashboard state: team totals, leaderboard, host badge, host ratings,
//! finale feed, overlay.
//!
//! Two slices are kept apart on purpose:
//!   - `ServerSlice` mirrors the backend and is only replaced wholesale by
//!     fetches or pushes;
//!   - `LocalUi` (highlight, search, overlay, feed) is never touched by a refetch.
//!
//! Fetch replies carry a sequence number so an older reply that lands after a
//! newer one is discarded instead of rolling the view back.

use std::collections::VecDeque;

use rand::Rng;
use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::{FeedEvent, HostBadge, HostRating, OverlayState, Player, TeamScores};
use crate::protocol::FinaleFeedPayload;
use crate::util::percent_of_goal;
use crate::views::{FinaleScreen, HostsScreen, LeaderboardRow, LeaderboardScreen, TeamBar};

/// Display limits for the dashboard screens.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Goals {
  pub leaderboard: f64,
  pub finale: f64,
  pub feed_limit: usize,
}

/// Last applied sequence number of one fetched slot.
#[derive(Debug, Default)]
struct Freshness(u64);

impl Freshness {
  fn admit(&mut self, seq: u64) -> bool {
    if seq < self.0 {
      return false;
    }
    self.0 = seq;
    true
  }
}

#[derive(Debug, Default)]
struct ServerSlice {
  team_scores: TeamScores,
  leaderboard: Vec<Player>,
  host: HostBadge,
  host_ratings: Option<Vec<HostRating>>,
  finale_scores: TeamScores,

  team_scores_seq: Freshness,
  leaderboard_seq: Freshness,
  host_seq: Freshness,
  host_ratings_seq: Freshness,
}

#[derive(Debug, Default)]
struct LocalUi {
  highlighted: Option<String>,
  search: String,
  overlay: OverlayState,
  feed: VecDeque<FeedEvent>,
}

#[derive(Debug)]
pub struct Dashboard {
  goals: Goals,
  server: ServerSlice,
  ui: LocalUi,
}

impl Dashboard {
  pub fn new(goals: Goals) -> Self {
    Self { goals, server: ServerSlice::default(), ui: LocalUi::default() }
  }

  //
  // Server slice
  //

  pub fn apply_leaderboard(&mut self, seq: u64, players: Vec<Player>) -> bool {
    if !self.server.leaderboard_seq.admit(seq) {
      debug!(target: "dashboard", seq, "Discarding stale leaderboard reply");
      return false;
    }
    if let Some(name) = &self.ui.highlighted {
      if !players.iter().any(|p| &p.username == name) {
        self.ui.highlighted = None;
      }
    }
    self.server.leaderboard = players;
    true
  }

  pub fn apply_team_scores(&mut self, seq: u64, scores: TeamScores) -> bool {
    if !self.server.team_scores_seq.admit(seq) {
      debug!(target: "dashboard", seq, "Discarding stale team scores reply");
      return false;
    }
    self.server.team_scores = scores;
    true
  }

  pub fn apply_host_score(&mut self, seq: u64, badge: HostBadge) -> bool {
    if !self.server.host_seq.admit(seq) {
      return false;
    }
    self.server.host = badge;
    true
  }

  pub fn apply_host_ratings(&mut self, seq: u64, ratings: Vec<HostRating>) -> bool {
    if !self.server.host_ratings_seq.admit(seq) {
      return false;
    }
    self.server.host_ratings = Some(ratings);
    true
  }

  /// Ratings screen remounted: show loading until the new fetch lands.
  pub fn clear_host_ratings(&mut self) {
    self.server.host_ratings = None;
  }

  /// `score_updated` push: new rating, and the host image if one was sent.
  pub fn on_score_updated(&mut self, rating: String, host_image: Option<String>) {
    self.server.host.rating = Some(rating);
    if host_image.is_some() {
      self.server.host.host_image = host_image;
    }
  }

  /// `host_changed` push: new host starts at "0".
  pub fn on_host_changed(&mut self, host_image: Option<String>) {
    self.server.host = HostBadge { host_image, rating: Some("0".into()) };
  }

  pub fn set_finale_scores(&mut self, scores: TeamScores) {
    self.server.finale_scores = scores;
  }

  pub fn host(&self) -> &HostBadge {
    &self.server.host
  }

  #[cfg(test)]
  pub fn team_scores(&self) -> TeamScores {
    self.server.team_scores
  }

  #[cfg(test)]
  pub fn leaderboard(&self) -> &[Player] {
    &self.server.leaderboard
  }

  //
  // Local UI slice
  //

  /// Highlight a uniformly random player. Purely local; never sent upstream.
  pub fn highlight_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&str> {
    if self.server.leaderboard.is_empty() {
      return None;
    }
    let idx = rng.gen_range(0..self.server.leaderboard.len());
    let name = self.server.leaderboard[idx].username.clone();
    info!(target: "dashboard", username = %name, "Highlighted random player");
    self.ui.highlighted = Some(name);
    self.ui.highlighted.as_deref()
  }

  #[cfg(test)]
  pub fn highlighted(&self) -> Option<&str> {
    self.ui.highlighted.as_deref()
  }

  pub fn set_search(&mut self, term: String) {
    self.ui.search = term;
  }

  pub fn overlay(&self) -> OverlayState {
    self.ui.overlay
  }

  pub fn set_overlay(&mut self, overlay: OverlayState) {
    self.ui.overlay = overlay;
  }

  /// Prepend a feed line, keeping at most `feed_limit`. Returns the new line's id.
  pub fn push_feed(&mut self, payload: FinaleFeedPayload) -> Uuid {
    let id = Uuid::new_v4();
    self.ui.feed.push_front(FeedEvent {
      id,
      username: payload.username,
      team: payload.team,
      question: payload.question,
      correct: payload.correct,
    });
    self.ui.feed.truncate(self.goals.feed_limit);
    id
  }

  pub fn expire_feed(&mut self, id: Uuid) -> bool {
    let before = self.ui.feed.len();
    self.ui.feed.retain(|e| e.id != id);
    before != self.ui.feed.len()
  }

  pub fn clear_feed(&mut self) {
    self.ui.feed.clear();
  }

  //
  // Screens
  //

  fn team_bars(scores: TeamScores, goal: f64) -> (TeamBar, TeamBar) {
    (
      TeamBar { label: "FBI / RA", score: scores.blue, percent: percent_of_goal(scores.blue, goal) },
      TeamBar { label: "MCUT MAFIA", score: scores.red, percent: percent_of_goal(scores.red, goal) },
    )
  }

  pub fn leaderboard_screen(&self) -> LeaderboardScreen {
    let (blue, red) = Self::team_bars(self.server.team_scores, self.goals.leaderboard);
    let needle = self.ui.search.to_lowercase();
    let rows = self
      .server
      .leaderboard
      .iter()
      .filter(|p| p.username.to_lowercase().contains(&needle))
      .enumerate()
      .map(|(i, p)| LeaderboardRow {
        rank: i + 1,
        username: p.username.clone(),
        team: p.team,
        badge: p.team.badge(),
        score: p.score,
        highlighted: self.ui.highlighted.as_deref() == Some(p.username.as_str()),
      })
      .collect();
    LeaderboardScreen { blue, red, search: self.ui.search.clone(), rows }
  }

  pub fn finale_screen(&self) -> FinaleScreen {
    let (blue, red) = Self::team_bars(self.server.finale_scores, self.goals.finale);
    FinaleScreen { blue, red, feed: self.ui.feed.iter().cloned().collect() }
  }

  pub fn hosts_screen(&self) -> HostsScreen {
    HostsScreen { ratings: self.server.host_ratings.clone() }
  }
}
