//! Navigation dispatch.
//!
//! The synchronizer never drives the UI directly. It emits a [`Route`] intent
//! and the navigator decides how to show it.

use campus_session_types::Route;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Receives navigation intents.
///
/// Called while the session transition lock is held, so implementations must
/// return quickly and must not call back into the synchronizer.
pub trait Navigator: Send + Sync {
    /// Show `route`.
    fn navigate_to(&self, route: Route);
}

/// Navigator that records every intent (for tests).
#[derive(Debug, Clone, Default)]
pub struct RecordingNavigator {
    routes: Arc<Mutex<Vec<Route>>>,
}

impl RecordingNavigator {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// All intents received, oldest first.
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().expect("navigator lock poisoned").clone()
    }

    /// The most recent intent.
    pub fn last(&self) -> Option<Route> {
        self.routes
            .lock()
            .expect("navigator lock poisoned")
            .last()
            .copied()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, route: Route) {
        self.routes
            .lock()
            .expect("navigator lock poisoned")
            .push(route);
    }
}

/// Navigator that forwards intents to an unbounded channel.
///
/// Lets a UI task consume intents at its own pace.
#[derive(Debug, Clone)]
pub struct ChannelNavigator {
    tx: mpsc::UnboundedSender<Route>,
}

impl ChannelNavigator {
    /// Create a navigator and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Route>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Navigator for ChannelNavigator {
    fn navigate_to(&self, route: Route) {
        if self.tx.send(route).is_err() {
            tracing::debug!("Navigation receiver dropped, discarding {}", route.as_str());
        }
    }
}
