//! Shared handle for the local server.
//!
//! Handlers never touch display state. They read the latest published screen
//! and queue commands for the controller task.

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{instrument, warn};

use crate::controller::{Command, Input};
use crate::views::Screen;

#[derive(Clone)]
pub struct AppState {
    commands: mpsc::UnboundedSender<Input>,
    screens: watch::Receiver<Screen>,
}

impl AppState {
    pub fn new(commands: mpsc::UnboundedSender<Input>, screens: watch::Receiver<Screen>) -> Self {
        Self { commands, screens }
    }

    /// Queue a command. Returns false once the controller has stopped.
    pub fn send(&self, cmd: Command) -> bool {
        if self.commands.send(Input::Command(cmd)).is_err() {
            warn!(target: "streamer_display", "Controller is gone; command dropped");
            return false;
        }
        true
    }

    /// Navigate and wait for the freshly mounted screen.
    #[instrument(level = "info", skip(self))]
    pub async fn navigate(&self, path: &str) -> Option<Screen> {
        let (reply, rx) = oneshot::channel();
        if !self.send(Command::Navigate { path: path.to_string(), reply: Some(reply) }) {
            return None;
        }
        rx.await.ok()
    }

    /// Latest published screen.
    pub fn screen(&self) -> Screen {
        self.screens.borrow().clone()
    }

    /// A receiver that wakes on every published change.
    pub fn subscribe_screens(&self) -> watch::Receiver<Screen> {
        self.screens.clone()
    }
}
