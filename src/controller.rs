//! Display controller: the single task that owns every piece of mutable state.
//!
//! Inputs arrive on one queue:
//!   - push events (tagged with the mount that subscribed to them),
//!   - countdown ticks (tagged with the timer session),
//!   - streamer commands from the local server,
//!   - HTTP fetch replies (tagged with a sequence number).
//!
//! After each input the current screen is rendered and published on a
//! `watch` channel. HTTP calls never run inside the loop; they are spawned
//! and report back through the queue.
//!
//! A *mount* is the lifetime of one route on the display. It owns its
//! subscriptions, its countdown and its delayed tasks; replacing the mount
//! drops all of them, so nothing from a torn-down view can fire later.

use std::{future::Future, time::Duration};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, instrument, warn};

use crate::backend::{BackendClient, BackendError};
use crate::channel::{EventChannel, Subscription};
use crate::config::DisplayConfig;
use crate::dashboard::Dashboard;
use crate::domain::{HostBadge, HostRating, OverlayState, Player, Team, TeamScores};
use crate::protocol::{events, ChangeHost, EndQuestion, FinaleFeedPayload, PushEvent, QuestionStarted, ResultsPayload};
use crate::resolver::resolve;
use crate::scoring::{build_results, ResultsView};
use crate::state::AppState;
use crate::timer::{spawn_countdown, TimerSession};
use crate::util::{value_text, ScopedTask};
use crate::views::{ResponsesScreen, Route, Screen, ScreenBody, TimerScreen};

/// Mount id used for subscriptions that live as long as the controller.
const APP_MOUNT: u64 = 0;

/// Everything the controller reacts to.
#[derive(Debug)]
pub enum Input {
  Push { mount: u64, event: PushEvent },
  Tick { session: u64 },
  Command(Command),
  Fetched { seq: u64, fetched: Fetched },
  FeedExpired { mount: u64, id: uuid::Uuid },
  /// Refetch the leaderboard if it is on screen.
  Refresh,
  /// Tear down and mount the current path again.
  Remount,
}

/// Streamer actions, sent by the local HTTP/WS handlers.
#[derive(Debug)]
pub enum Command {
  Navigate { path: String, reply: Option<oneshot::Sender<Screen>> },
  EditScore { username: String, score: i64 },
  TriggerScriptedEvent { event_type: String },
  /// `None` toggles.
  SetOverlay(Option<OverlayState>),
  HighlightRandom,
  Search { term: String },
  SecretPoints { team: Team },
  Admin(AdminAction),
  ChangeHost,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdminAction {
  ResetQuestions,
  DeletePlayers,
  AssignTeams,
}

impl AdminAction {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::ResetQuestions => "reset_questions",
      Self::DeletePlayers => "delete_players",
      Self::AssignTeams => "assign_teams",
    }
  }
}

#[derive(Debug)]
pub enum Fetched {
  Leaderboard(Vec<Player>),
  TeamScores(TeamScores),
  HostScore(HostBadge),
  HostRatings(Vec<HostRating>),
}

/// Per-view state that does not outlive the mount.
#[derive(Debug)]
enum ViewScope {
  Questions,
  Timer(Option<TimerSession>),
  Responses(Option<ResultsView>),
  Leaderboard,
  Hosts,
  Finale,
  NotFound,
}

impl ViewScope {
  fn for_route(route: Option<Route>) -> Self {
    match route {
      Some(Route::Questions) => Self::Questions,
      Some(Route::Timer) => Self::Timer(None),
      Some(Route::Responses) => Self::Responses(None),
      Some(Route::Leaderboard) => Self::Leaderboard,
      Some(Route::Hosts) => Self::Hosts,
      Some(Route::Finale) => Self::Finale,
      None => Self::NotFound,
    }
  }
}

#[derive(Debug)]
struct Mount {
  id: u64,
  route: Option<Route>,
  path: String,
  scope: ViewScope,
  subscriptions: Vec<Subscription>,
  countdown: Option<ScopedTask>,
  tasks: Vec<ScopedTask>,
}

pub struct Controller {
  config: DisplayConfig,
  channel: EventChannel,
  backend: BackendClient,
  dashboard: Dashboard,

  inputs: mpsc::UnboundedReceiver<Input>,
  input_tx: mpsc::UnboundedSender<Input>,
  screens: watch::Sender<Screen>,

  mount: Option<Mount>,
  app_subscriptions: Vec<Subscription>,
  next_mount: u64,
  next_session: u64,
  next_seq: u64,
}

impl Controller {
  /// Build the controller and the handle the local server talks to.
  pub fn new(config: DisplayConfig, channel: EventChannel, backend: BackendClient) -> (Self, AppState) {
    let (input_tx, inputs) = mpsc::unbounded_channel();
    let (screens, screen_rx) = watch::channel(Screen::blank());
    let state = AppState::new(input_tx.clone(), screen_rx);
    let controller = Self {
      dashboard: Dashboard::new(config.goals()),
      config,
      channel,
      backend,
      inputs,
      input_tx,
      screens,
      mount: None,
      app_subscriptions: Vec::new(),
      next_mount: APP_MOUNT,
      next_session: 0,
      next_seq: 0,
    };
    (controller, state)
  }

  /// Run until the process exits.
  pub async fn run(mut self) {
    info!(target: "streamer_display", backend = %self.backend.base_url(), "Display controller started");
    self.start();
    while let Some(input) = self.inputs.recv().await {
      self.handle(input);
      self.publish();
    }
  }

  /// App-level subscriptions, the header fetch, and the initial screen.
  fn start(&mut self) {
    for event in [events::SCORE_UPDATED, events::HOST_CHANGED, events::SHOW_OVERLAY] {
      let sub = self.subscribe(APP_MOUNT, event);
      self.app_subscriptions.push(sub);
    }
    debug!(target: "streamer_display", count = self.app_subscriptions.len(), "App-level subscriptions registered");
    self.spawn_fetch(|b| async move { b.current_host_score().await.map(Fetched::HostScore) });
    self.navigate("/");
    self.publish();
  }

  fn handle(&mut self, input: Input) {
    match input {
      Input::Push { mount, event } => self.on_push(mount, event),
      Input::Tick { session } => self.on_tick(session),
      Input::Command(cmd) => self.on_command(cmd),
      Input::Fetched { seq, fetched } => self.on_fetched(seq, fetched),
      Input::FeedExpired { mount, id } => {
        if self.current_mount_id() == Some(mount) {
          self.dashboard.expire_feed(id);
        }
      }
      Input::Refresh => {
        if self.current_route() == Some(Route::Leaderboard) {
          self.refresh_board();
        }
      }
      Input::Remount => {
        let path = self.mount.as_ref().map_or_else(|| "/".to_string(), |m| m.path.clone());
        self.navigate(&path);
      }
    }
  }

  fn publish(&self) {
    let next = self.render();
    self.screens.send_if_modified(|current| {
      if *current == next {
        return false;
      }
      *current = next;
      true
    });
  }

  fn current_mount_id(&self) -> Option<u64> {
    self.mount.as_ref().map(|m| m.id)
  }

  fn current_route(&self) -> Option<Route> {
    self.mount.as_ref().and_then(|m| m.route)
  }

  //
  // Mounting
  //

  fn navigate(&mut self, path: &str) {
    let scope = ViewScope::for_route(Route::from_path(path));
    self.enter(path, scope);
  }

  #[instrument(level = "debug", skip(self, scope))]
  fn enter(&mut self, path: &str, scope: ViewScope) {
    if let Some(old) = self.mount.take() {
      debug!(target: "streamer_display", path = %old.path, mount = old.id, "Unmounting screen");
    }
    self.next_mount += 1;
    let id = self.next_mount;
    let mut mount = Mount {
      id,
      route: Route::from_path(path),
      path: path.to_string(),
      scope,
      subscriptions: Vec::new(),
      countdown: None,
      tasks: Vec::new(),
    };

    match &mount.scope {
      ViewScope::Questions => mount.subscriptions.push(self.subscribe(id, events::QUESTION_STARTED)),
      ViewScope::Timer(Some(session)) => {
        mount.subscriptions.push(self.subscribe(id, events::RESULTS));
        if session.is_running() {
          let tx = self.input_tx.clone();
          let session = session.id();
          mount.countdown = Some(spawn_countdown(move || tx.send(Input::Tick { session }).is_ok()));
        }
      }
      ViewScope::Timer(None) => warn!(target: "timer", "Timer screen entered without a question"),
      ViewScope::Responses(_) => mount.subscriptions.push(self.subscribe(id, events::RESULTS)),
      ViewScope::Leaderboard => {
        for event in [events::SCORE_UPDATED, events::TEAM_SCORE_UPDATE, events::RESULTS] {
          mount.subscriptions.push(self.subscribe_refresh(event));
        }
        self.refresh_board();
      }
      ViewScope::Hosts => {
        self.dashboard.clear_host_ratings();
        self.spawn_fetch(|b| async move { b.host_ratings().await.map(Fetched::HostRatings) });
      }
      ViewScope::Finale => {
        self.dashboard.clear_feed();
        self.dashboard.set_finale_scores(TeamScores::default());
        for event in [events::TEAM_SCORE_UPDATE, events::FINALE_FEED_EVENT] {
          mount.subscriptions.push(self.subscribe(id, event));
        }
      }
      ViewScope::NotFound => warn!(target: "streamer_display", %path, "No screen for path"),
    }

    info!(target: "streamer_display", %path, mount = id, subscriptions = mount.subscriptions.len(), "Mounted screen");
    self.mount = Some(mount);
  }

  /// Subscribe on behalf of `mount`. Payloads are decoded in the handler and
  /// queued; malformed ones are logged and dropped.
  fn subscribe(&self, mount: u64, event: &'static str) -> Subscription {
    let tx = self.input_tx.clone();
    self.channel.subscribe(event, move |data| match PushEvent::decode(event, data) {
      Ok(decoded) => {
        let _ = tx.send(Input::Push { mount, event: decoded });
      }
      Err(e) => warn!(target: "channel", error = %e, "Ignoring malformed push payload"),
    })
  }

  /// Any `event` refetches the leaderboard; its payload is not looked at.
  fn subscribe_refresh(&self, event: &'static str) -> Subscription {
    let tx = self.input_tx.clone();
    self.channel.subscribe(event, move |_| {
      let _ = tx.send(Input::Refresh);
    })
  }

  //
  // Push events
  //

  fn on_push(&mut self, mount: u64, event: PushEvent) {
    if mount == APP_MOUNT {
      return self.on_app_push(event);
    }
    if self.current_mount_id() != Some(mount) {
      debug!(target: "streamer_display", mount, "Dropping push queued for an unmounted view");
      return;
    }

    match (self.current_route(), event) {
      (Some(Route::Questions), PushEvent::QuestionStarted(started)) => self.start_question(started),
      (Some(Route::Timer), PushEvent::Results(results)) => self.close_question(results),
      (Some(Route::Responses), PushEvent::Results(results)) => {
        if let Some(Mount { scope: ViewScope::Responses(slot), .. }) = self.mount.as_mut() {
          *slot = Some(build_results(&results));
        }
      }
      (Some(Route::Finale), PushEvent::TeamScoreUpdate(scores)) => self.dashboard.set_finale_scores(scores),
      (Some(Route::Finale), PushEvent::FinaleFeed(item)) => self.push_feed(item),
      (route, other) => debug!(target: "streamer_display", ?route, event = ?other, "Push event not handled here"),
    }
  }

  fn on_app_push(&mut self, event: PushEvent) {
    match event {
      PushEvent::ScoreUpdated(update) => {
        self.dashboard.on_score_updated(value_text(&update.score), update.host_image);
      }
      PushEvent::HostChanged(changed) => {
        info!(target: "dashboard", host_image = ?changed.host_image, "Host changed");
        self.dashboard.on_host_changed(changed.host_image);
      }
      PushEvent::ShowOverlay(show) => match OverlayState::parse(&show.kind) {
        Some(overlay) => self.dashboard.set_overlay(overlay),
        None => warn!(target: "dashboard", kind = %show.kind, "Ignoring unknown overlay type"),
      },
      other => debug!(target: "streamer_display", event = ?other, "App-level push not handled"),
    }
  }

  //
  // Timer
  //

  fn start_question(&mut self, started: QuestionStarted) {
    self.next_session += 1;
    let (session, signal) =
      TimerSession::start(self.next_session, started.question, started.duration, started.question_number);
    info!(
      target: "timer",
      session = session.id(),
      question_number = session.question_number(),
      duration = session.duration(),
      "Question started"
    );
    if let Some(end) = signal {
      self.emit_end_question(end);
    }
    self.enter(Route::Timer.path(), ViewScope::Timer(Some(session)));
  }

  fn on_tick(&mut self, session_id: u64) {
    let Some(mount) = self.mount.as_mut() else { return };
    let ViewScope::Timer(Some(session)) = &mut mount.scope else {
      debug!(target: "timer", session = session_id, "Tick without a running timer");
      return;
    };
    if session.id() != session_id {
      debug!(target: "timer", session = session_id, current = session.id(), "Stale tick ignored");
      return;
    }
    let signal = session.tick();
    if !session.is_running() {
      mount.countdown = None;
    }
    if let Some(end) = signal {
      self.emit_end_question(end);
    }
  }

  fn emit_end_question(&self, end: EndQuestion) {
    self.channel.emit(events::END_QUESTION, &end);
    info!(target: "timer", question_number = end.question_number, "Time is up; end_question emitted");
  }

  /// Results arrived: close the session and move to the responses screen.
  fn close_question(&mut self, results: ResultsPayload) {
    if let Some(Mount { scope: ViewScope::Timer(Some(session)), .. }) = self.mount.as_mut() {
      let early = session.is_running();
      if session.close() {
        info!(target: "timer", question_number = session.question_number(), early, "Question closed");
      }
    }
    let view = build_results(&results);
    self.enter(Route::Responses.path(), ViewScope::Responses(Some(view)));
  }

  //
  // Dashboard
  //

  fn refresh_board(&mut self) {
    self.spawn_fetch(|b| async move { b.leaderboard().await.map(Fetched::Leaderboard) });
    self.spawn_fetch(|b| async move { b.team_scores().await.map(Fetched::TeamScores) });
  }

  fn push_feed(&mut self, item: FinaleFeedPayload) {
    let id = self.dashboard.push_feed(item);
    let Some(mount) = self.mount.as_mut() else { return };
    mount.tasks.retain(|t| !t.is_finished());

    let tx = self.input_tx.clone();
    let mount_id = mount.id;
    let ttl = Duration::from_millis(self.config.finale_feed_ttl_ms);
    mount.tasks.push(ScopedTask::spawn(async move {
      tokio::time::sleep(ttl).await;
      let _ = tx.send(Input::FeedExpired { mount: mount_id, id });
    }));
  }

  fn on_fetched(&mut self, seq: u64, fetched: Fetched) {
    let applied = match fetched {
      Fetched::Leaderboard(players) => self.dashboard.apply_leaderboard(seq, players),
      Fetched::TeamScores(scores) => self.dashboard.apply_team_scores(seq, scores),
      Fetched::HostScore(badge) => self.dashboard.apply_host_score(seq, badge),
      Fetched::HostRatings(ratings) => self.dashboard.apply_host_ratings(seq, ratings),
    };
    debug!(target: "dashboard", seq, applied, "Fetch reply");
  }

  //
  // Commands
  //

  fn on_command(&mut self, cmd: Command) {
    match cmd {
      Command::Navigate { path, reply } => {
        self.navigate(&path);
        if let Some(reply) = reply {
          // Publish first so a follow-up read of the screen sees this mount.
          self.publish();
          let _ = reply.send(self.render());
        }
      }
      Command::EditScore { username, score } => {
        let b = self.backend.clone();
        self.spawn_action("update_score", async move { b.update_score(&username, score).await }, None);
      }
      Command::TriggerScriptedEvent { event_type } => {
        let b = self.backend.clone();
        self.spawn_action(
          "trigger_scripted_event",
          async move { b.trigger_scripted_event(&event_type).await.map(drop) },
          Some(Input::Refresh),
        );
      }
      Command::SetOverlay(requested) => {
        let next = requested.unwrap_or_else(|| self.dashboard.overlay().toggled());
        self.dashboard.set_overlay(next);
        let b = self.backend.clone();
        self.spawn_action("trigger_overlay", async move { b.trigger_overlay(next).await }, None);
      }
      Command::HighlightRandom => {
        if self.dashboard.highlight_random(&mut rand::thread_rng()).is_none() {
          debug!(target: "dashboard", "Nobody to highlight");
        }
      }
      Command::Search { term } => self.dashboard.set_search(term),
      Command::SecretPoints { team } => {
        let b = self.backend.clone();
        let amount = self.config.secret_points_amount;
        self.spawn_action("secret_finale_points", async move { b.secret_finale_points(team, amount).await }, None);
      }
      Command::Admin(action) => {
        let b = self.backend.clone();
        let call = async move {
          let reply = match action {
            AdminAction::ResetQuestions => b.reset_questions().await,
            AdminAction::DeletePlayers => b.delete_players().await,
            AdminAction::AssignTeams => b.assign_teams().await,
          };
          reply.map(drop)
        };
        self.spawn_action(action.as_str(), call, Some(Input::Remount));
      }
      Command::ChangeHost => {
        self.channel.emit(events::CHANGE_HOST, &ChangeHost {});
        info!(target: "dashboard", "Requested host change");
      }
    }
  }

  //
  // Background I/O
  //

  fn spawn_fetch<F, Fut>(&mut self, call: F)
  where
    F: FnOnce(BackendClient) -> Fut,
    Fut: Future<Output = Result<Fetched, BackendError>> + Send + 'static,
  {
    self.next_seq += 1;
    let seq = self.next_seq;
    let tx = self.input_tx.clone();
    let fut = call(self.backend.clone());
    tokio::spawn(async move {
      match fut.await {
        Ok(fetched) => {
          let _ = tx.send(Input::Fetched { seq, fetched });
        }
        Err(e) => warn!(target: "backend", seq, error = %e, "Fetch failed"),
      }
    });
  }

  /// Fire-and-forget backend call; on success `then` is queued.
  fn spawn_action<Fut>(&self, action: &'static str, call: Fut, then: Option<Input>)
  where
    Fut: Future<Output = Result<(), BackendError>> + Send + 'static,
  {
    let tx = self.input_tx.clone();
    tokio::spawn(async move {
      match call.await {
        Ok(()) => {
          info!(target: "dashboard", action, "Streamer action acknowledged");
          if let Some(next) = then {
            let _ = tx.send(next);
          }
        }
        Err(e) => warn!(target: "dashboard", action, error = %e, "Streamer action failed"),
      }
    });
  }

  //
  // Rendering
  //

  fn render(&self) -> Screen {
    let Some(mount) = &self.mount else { return Screen::blank() };
    let body = match &mount.scope {
      ViewScope::Questions => ScreenBody::Questions,
      ViewScope::Timer(None) => ScreenBody::NoQuestion,
      ViewScope::Timer(Some(session)) => ScreenBody::Timer(TimerScreen {
        question_number: session.question_number(),
        countdown: session.countdown(),
        question: resolve(session.question()),
      }),
      ViewScope::Responses(results) => ScreenBody::Responses(ResponsesScreen { results: results.clone() }),
      ViewScope::Leaderboard => ScreenBody::Leaderboard(self.dashboard.leaderboard_screen()),
      ViewScope::Hosts => ScreenBody::Hosts(self.dashboard.hosts_screen()),
      ViewScope::Finale => ScreenBody::Finale(self.dashboard.finale_screen()),
      ViewScope::NotFound => ScreenBody::NotFound,
    };
    Screen {
      path: mount.path.clone(),
      route: mount.route,
      header: self.dashboard.host().clone(),
      overlay: self.dashboard.overlay(),
      body,
    }
  }
}
