//! Change notification for registry mutations.

use tokio::sync::broadcast;
use tracing::debug;

/// Addressable notification scopes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeScope {
    /// The set of form records changed.
    Forms,
    /// The latest-by-form-id view changed.
    LatestByFormId,
}

/// Fire-and-forget signal emitted after every successful mutation.
///
/// Carries no payload describing what changed; delivery is at-least-once
/// best-effort to any number of subscribers.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, scope: ChangeScope);
}

/// Broadcast-channel notifier. Subscribers receive one scope value per
/// emitted signal; lagging subscribers may miss signals.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<ChangeScope>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeScope> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn notify(&self, scope: ChangeScope) {
        // A send error just means nobody is listening right now.
        if self.tx.send(scope).is_err() {
            debug!(?scope, "change notification dropped: no subscribers");
        }
    }
}
