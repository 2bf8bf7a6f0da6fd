//! Push-channel adapter: one WebSocket to the game server shared by every view.
//!
//! Views register handlers per event name and get back a `Subscription` guard;
//! dropping the guard unregisters the handler. `emit` queues a frame upstream.
//!
//! Delivery is best-effort. Transport failures are logged, never returned:
//! a view that subscribes late simply misses earlier events, and emits after
//! the socket closed are dropped with a warning.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::protocol::PushFrame;
use crate::util::trunc_for_log;

type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

#[derive(Default)]
struct Registry {
  next_id: u64,
  // Vec keeps subscription order, which is also dispatch order.
  handlers: HashMap<String, Vec<(u64, Handler)>>,
}

struct Inner {
  registry: Mutex<Registry>,
  outbound: mpsc::UnboundedSender<PushFrame>,
}

impl Inner {
  fn registry(&self) -> MutexGuard<'_, Registry> {
    self.registry.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn remove(&self, event: &str, id: u64) {
    let mut reg = self.registry();
    if let Some(list) = reg.handlers.get_mut(event) {
      list.retain(|(hid, _)| *hid != id);
      if list.is_empty() {
        reg.handlers.remove(event);
      }
    }
  }
}

/// Shared handle to the push channel. Cheap to clone; every clone talks to the
/// same connection and the same handler registry.
#[derive(Clone)]
pub struct EventChannel {
  inner: Arc<Inner>,
}

/// Registration of one handler. Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription {
  id: u64,
  event: String,
  channel: Weak<Inner>,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(inner) = self.channel.upgrade() {
      inner.remove(&self.event, self.id);
    }
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription").field("id", &self.id).field("event", &self.event).finish()
  }
}

impl EventChannel {
  /// A channel with no transport attached. Outbound frames land in the returned
  /// receiver; inbound events are injected with `dispatch`.
  pub fn detached() -> (Self, mpsc::UnboundedReceiver<PushFrame>) {
    let (outbound, rx) = mpsc::unbounded_channel();
    let inner = Arc::new(Inner { registry: Mutex::new(Registry::default()), outbound });
    (Self { inner }, rx)
  }

  /// Open the WebSocket at `url` in the background and return immediately.
  /// Frames emitted before the socket is up are queued and flushed once it connects.
  pub fn connect(url: impl Into<String>) -> Self {
    let url = url.into();
    let (channel, outbound_rx) = Self::detached();
    tokio::spawn(run_socket(url, channel.clone(), outbound_rx));
    channel
  }

  /// Register `handler` for `event`. All handlers of an event run, in the order
  /// they subscribed.
  pub fn subscribe<F>(&self, event: &str, handler: F) -> Subscription
  where
    F: Fn(&Value) + Send + Sync + 'static,
  {
    let mut reg = self.inner.registry();
    reg.next_id += 1;
    let id = reg.next_id;
    reg.handlers.entry(event.to_string()).or_default().push((id, Arc::new(handler)));
    debug!(target: "channel", event, id, "Subscribed");
    Subscription { id, event: event.to_string(), channel: Arc::downgrade(&self.inner) }
  }

  /// Explicit form of dropping the guard.
  #[cfg_attr(not(test), allow(dead_code))]
  pub fn unsubscribe(&self, subscription: Subscription) {
    debug!(target: "channel", event = %subscription.event, id = subscription.id, "Unsubscribed");
    drop(subscription);
  }

  /// Queue `payload` under `event` for the server.
  pub fn emit<T: Serialize>(&self, event: &str, payload: &T) {
    let data = match serde_json::to_value(payload) {
      Ok(v) => v,
      Err(e) => {
        error!(target: "channel", event, error = %e, "Could not serialize outbound payload");
        return;
      }
    };
    if self.inner.outbound.send(PushFrame { event: event.to_string(), data }).is_err() {
      warn!(target: "channel", event, "Push channel is closed; dropping outbound event");
    } else {
      debug!(target: "channel", event, "Queued outbound event");
    }
  }

  /// Invoke every handler registered for `event`. Returns how many ran.
  ///
  /// Handlers are collected first and called without holding the registry lock,
  /// so a handler may subscribe or unsubscribe freely.
  pub fn dispatch(&self, event: &str, payload: &Value) -> usize {
    let handlers: Vec<Handler> = {
      let reg = self.inner.registry();
      reg.handlers
        .get(event)
        .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
        .unwrap_or_default()
    };
    if handlers.is_empty() {
      debug!(target: "channel", event, "No subscribers; event dropped");
    }
    for handler in &handlers {
      handler(payload);
    }
    handlers.len()
  }

  #[cfg(test)]
  pub fn subscriber_count(&self, event: &str) -> usize {
    self.inner.registry().handlers.get(event).map_or(0, Vec::len)
  }
}

#[instrument(level = "info", skip(channel, outbound_rx))]
async fn run_socket(
  url: String,
  channel: EventChannel,
  mut outbound_rx: mpsc::UnboundedReceiver<PushFrame>,
) {
  let ws = match connect_async(url.as_str()).await {
    Ok((ws, _)) => ws,
    Err(e) => {
      error!(target: "channel", %url, error = %e, "Push channel connect failed; running without live events");
      return;
    }
  };
  info!(target: "channel", %url, "Push channel connected");
  let (mut sink, mut stream) = ws.split();

  let writer = tokio::spawn(async move {
    while let Some(frame) = outbound_rx.recv().await {
      let text = match serde_json::to_string(&frame) {
        Ok(t) => t,
        Err(e) => {
          error!(target: "channel", event = %frame.event, error = %e, "Outbound frame serialization failed");
          continue;
        }
      };
      if let Err(e) = sink.send(Message::Text(text)).await {
        error!(target: "channel", event = %frame.event, error = %e, "Push channel send failed");
        break;
      }
    }
  });

  while let Some(msg) = stream.next().await {
    match msg {
      Ok(Message::Text(txt)) => match serde_json::from_str::<PushFrame>(&txt) {
        Ok(frame) => {
          debug!(target: "channel", event = %frame.event, "Push event received");
          channel.dispatch(&frame.event, &frame.data);
        }
        Err(e) => {
          warn!(target: "channel", error = %e, frame = %trunc_for_log(&txt, 200), "Ignoring malformed push frame");
        }
      },
      Ok(Message::Close(_)) => break,
      Ok(_) => {}
      Err(e) => {
        error!(target: "channel", error = %e, "Push channel receive failed");
        break;
      }
    }
  }

  // Dropping the writer drops the outbound receiver, so later emits are reported as dropped.
  writer.abort();
  warn!(target: "channel", %url, "Push channel closed");
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn recorder(log: &Arc<Mutex<Vec<String>>>, tag: &'static str) -> impl Fn(&Value) + Send + Sync + 'static {
    let log = Arc::clone(log);
    move |payload: &Value| log.lock().unwrap().push(format!("{tag}:{payload}"))
  }

  #[test]
  fn all_subscribers_run_in_subscription_order() {
    let (channel, _rx) = EventChannel::detached();
    let log = Arc::new(Mutex::new(Vec::new()));
    let _a = channel.subscribe("results", recorder(&log, "a"));
    let _b = channel.subscribe("results", recorder(&log, "b"));
    let _other = channel.subscribe("host_changed", recorder(&log, "x"));

    assert_eq!(channel.dispatch("results", &json!(1)), 2);
    assert_eq!(*log.lock().unwrap(), vec!["a:1", "b:1"]);
  }

  #[test]
  fn dropping_or_unsubscribing_removes_handler() {
    let (channel, _rx) = EventChannel::detached();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let sub = channel.subscribe("score_updated", move |_| {
      h.fetch_add(1, Ordering::SeqCst);
    });
    let h = Arc::clone(&hits);
    let sub2 = channel.subscribe("score_updated", move |_| {
      h.fetch_add(10, Ordering::SeqCst);
    });

    channel.dispatch("score_updated", &Value::Null);
    drop(sub);
    channel.dispatch("score_updated", &Value::Null);
    channel.unsubscribe(sub2);
    assert_eq!(channel.dispatch("score_updated", &Value::Null), 0);

    assert_eq!(hits.load(Ordering::SeqCst), 21);
    assert_eq!(channel.subscriber_count("score_updated"), 0);
  }

  #[test]
  fn late_subscribers_miss_earlier_events() {
    let (channel, _rx) = EventChannel::detached();
    assert_eq!(channel.dispatch("results", &json!({})), 0);
    let log = Arc::new(Mutex::new(Vec::new()));
    let _s = channel.subscribe("results", recorder(&log, "late"));
    assert!(log.lock().unwrap().is_empty());
  }

  #[test]
  fn handler_may_unsubscribe_during_dispatch() {
    let (channel, _rx) = EventChannel::detached();
    let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
    let inner_slot = Arc::clone(&slot);
    let sub = channel.subscribe("results", move |_| {
      inner_slot.lock().unwrap().take();
    });
    *slot.lock().unwrap() = Some(sub);

    assert_eq!(channel.dispatch("results", &Value::Null), 1);
    assert_eq!(channel.subscriber_count("results"), 0);
  }

  #[test]
  fn emit_queues_frames_and_survives_closed_transport() {
    let (channel, mut rx) = EventChannel::detached();
    channel.emit("end_question", &json!({"question_number": 3}));
    let frame = rx.try_recv().unwrap();
    assert_eq!(frame.event, "end_question");
    assert_eq!(frame.data, json!({"question_number": 3}));

    drop(rx);
    // No panic, no error returned.
    channel.emit("change_host", &json!({}));
  }
}
