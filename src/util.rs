//! Small utility helpers used across modules.

use std::future::Future;

use serde_json::Value;
use tokio::task::JoinHandle;

/// Split a comma-separated field ("Red,Blue") into its tokens.
/// Tokens are kept verbatim (no trimming); empty tokens are dropped so an empty
/// field never yields an "empty answer is correct" token.
pub fn split_tokens(csv: &str) -> Vec<String> {
  csv.split(',').filter(|t| !t.is_empty()).map(str::to_string).collect()
}

/// Text shown for a loosely typed JSON scalar (answers, ratings).
/// Strings are taken as-is, null becomes empty, everything else uses its JSON form.
pub fn value_text(v: &Value) -> String {
  match v {
    Value::String(s) => s.clone(),
    Value::Null => String::new(),
    other => other.to_string(),
  }
}

/// Numeric view of a loosely typed JSON scalar; numeric strings are accepted.
pub fn value_number(v: &Value) -> Option<f64> {
  match v {
    Value::Number(n) => n.as_f64(),
    Value::String(s) => s.trim().parse().ok(),
    _ => None,
  }
}

/// Progress towards a goal in percent, clamped to `0..=100`.
pub fn percent_of_goal(score: f64, goal: f64) -> f64 {
  if goal <= 0.0 || !score.is_finite() {
    return 0.0;
  }
  (score / goal * 100.0).clamp(0.0, 100.0)
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge push payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

/// A spawned task that is aborted when the guard is dropped.
/// Views own these so tickers and delayed callbacks die with the view.
#[derive(Debug)]
pub struct ScopedTask(JoinHandle<()>);

impl ScopedTask {
  pub fn spawn<F>(fut: F) -> Self
  where
    F: Future<Output = ()> + Send + 'static,
  {
    Self(tokio::spawn(fut))
  }

  pub fn is_finished(&self) -> bool {
    self.0.is_finished()
  }
}

impl Drop for ScopedTask {
  fn drop(&mut self) {
    self.0.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn split_tokens_keeps_order_and_drops_empties() {
    assert_eq!(split_tokens("Red,Blue"), vec!["Red", "Blue"]);
    assert_eq!(split_tokens(""), Vec::<String>::new());
    assert_eq!(split_tokens("A,,B"), vec!["A", "B"]);
    assert_eq!(split_tokens("A, B"), vec!["A", " B"]);
  }

  #[test]
  fn value_text_stringifies_scalars() {
    assert_eq!(value_text(&json!("x")), "x");
    assert_eq!(value_text(&json!(42)), "42");
    assert_eq!(value_text(&json!(true)), "true");
    assert_eq!(value_text(&Value::Null), "");
  }

  #[test]
  fn value_number_accepts_numeric_strings() {
    assert_eq!(value_number(&json!(4.5)), Some(4.5));
    assert_eq!(value_number(&json!(" 7 ")), Some(7.0));
    assert_eq!(value_number(&json!("seven")), None);
    assert_eq!(value_number(&json!([1])), None);
  }

  #[test]
  fn percent_is_clamped() {
    assert_eq!(percent_of_goal(2500.0, 5000.0), 50.0);
    assert_eq!(percent_of_goal(9000.0, 5000.0), 100.0);
    assert_eq!(percent_of_goal(-10.0, 5000.0), 0.0);
    assert_eq!(percent_of_goal(10.0, 0.0), 0.0);
  }

  #[test]
  fn trunc_respects_char_boundaries() {
    assert_eq!(trunc_for_log("short", 10), "short");
    let out = trunc_for_log("ééééé", 3);
    assert!(out.starts_with("é…"));
  }

  #[tokio::test]
  async fn scoped_task_aborts_on_drop() {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<()>();
    let task = ScopedTask::spawn(async move {
      tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
      let _ = tx.send(());
    });
    drop(task);
    // The sender was dropped with the aborted future.
    assert!(rx.recv().await.is_none());
  }
}
