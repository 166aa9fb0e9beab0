use std::sync::atomic::{AtomicBool, Ordering};

/// Current network state, on demand.
pub trait NetworkStatus: Send + Sync {
    fn is_connected(&self) -> bool;
}

/// Tracks connected/disconnected events and spots Offline→Online transitions.
#[derive(Debug)]
pub struct ConnectivityWatcher {
    online: AtomicBool,
}

impl ConnectivityWatcher {
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        Self {
            online: AtomicBool::new(initially_online),
        }
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    /// Record a connectivity event. Returns true only when it moves the state
    /// from offline to online; repeated "connected" events return false.
    pub fn handle_change(&self, connected: bool) -> bool {
        let was_online = self.online.swap(connected, Ordering::SeqCst);
        let came_online = connected && !was_online;
        if came_online {
            tracing::info!("connectivity restored");
        } else if was_online && !connected {
            tracing::info!("connectivity lost");
        }
        came_online
    }
}

impl NetworkStatus for ConnectivityWatcher {
    fn is_connected(&self) -> bool {
        self.is_online()
    }
}
