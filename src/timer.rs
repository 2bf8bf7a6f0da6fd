//! Question countdown as an explicit state machine.
//!
//! `Running { remaining > 0 }` → `Expired` → `Closed`.
//!
//! The end-of-question signal is produced only by the Running → Expired
//! transition, so however often expiry is evaluated it comes out once.
//! Closing happens when the results arrive, not when the clock runs out.

use std::time::Duration;

use serde::Serialize;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::domain::Question;
use crate::protocol::EndQuestion;
use crate::util::ScopedTask;

pub const TICK: Duration = Duration::from_secs(1);

/// `MM:SS`, both fields zero-padded to two digits.
pub fn format_mm_ss(remaining: u32) -> String {
  format!("{:02}:{:02}", remaining / 60, remaining % 60)
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TimerPhase {
  Running { remaining: u32 },
  Expired,
  Closed,
}

#[derive(Clone, Debug)]
pub struct TimerSession {
  id: u64,
  duration: u32,
  question_number: u32,
  question: Question,
  phase: TimerPhase,
}

impl TimerSession {
  /// Start a session. A zero duration expires immediately, in which case the
  /// end signal is returned right away.
  pub fn start(id: u64, question: Question, duration: u32, question_number: u32) -> (Self, Option<EndQuestion>) {
    let mut session = Self {
      id,
      duration,
      question_number,
      question,
      phase: TimerPhase::Running { remaining: duration },
    };
    let signal = session.expire_if_due();
    (session, signal)
  }

  pub fn id(&self) -> u64 {
    self.id
  }

  pub fn duration(&self) -> u32 {
    self.duration
  }

  pub fn question_number(&self) -> u32 {
    self.question_number
  }

  pub fn question(&self) -> &Question {
    &self.question
  }

  #[cfg(test)]
  pub fn phase(&self) -> &TimerPhase {
    &self.phase
  }

  pub fn is_running(&self) -> bool {
    matches!(self.phase, TimerPhase::Running { .. })
  }

  #[cfg(test)]
  pub fn remaining(&self) -> u32 {
    match self.phase {
      TimerPhase::Running { remaining } => remaining,
      TimerPhase::Expired | TimerPhase::Closed => 0,
    }
  }

  /// One second elapsed. Returns the end signal if this tick expired the session.
  pub fn tick(&mut self) -> Option<EndQuestion> {
    if let TimerPhase::Running { remaining } = &mut self.phase {
      *remaining = remaining.saturating_sub(1);
    }
    self.expire_if_due()
  }

  /// Evaluate the expiry transition. Safe to call any number of times.
  pub fn expire_if_due(&mut self) -> Option<EndQuestion> {
    match self.phase {
      TimerPhase::Running { remaining: 0 } => {
        self.phase = TimerPhase::Expired;
        Some(EndQuestion { question_number: self.question_number })
      }
      _ => None,
    }
  }

  /// Results arrived. Returns false if the session was already closed.
  /// Closing a running session (question ended early) skips the end signal.
  pub fn close(&mut self) -> bool {
    if self.phase == TimerPhase::Closed {
      return false;
    }
    self.phase = TimerPhase::Closed;
    true
  }

  /// Countdown text while running; `None` once the countdown is removed.
  pub fn countdown(&self) -> Option<String> {
    match self.phase {
      TimerPhase::Running { remaining } => Some(format_mm_ss(remaining)),
      TimerPhase::Expired | TimerPhase::Closed => None,
    }
  }
}

/// Call `on_tick` once per second until it returns false or the guard drops.
/// The first call happens one full period after spawning.
pub fn spawn_countdown<F>(mut on_tick: F) -> ScopedTask
where
  F: FnMut() -> bool + Send + 'static,
{
  ScopedTask::spawn(async move {
    let mut ticker = interval_at(Instant::now() + TICK, TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      if !on_tick() {
        break;
      }
    }
  })
}
