use crate::core::user::UserId;
use crate::market::Notifier;
use crate::multiswap::events::SwapNotification;
use parking_lot::Mutex;

/// Writes every notification to the log. The default dispatcher for the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, user: &UserId, notification: &SwapNotification) {
        log::info!("notify {}: {:?}", user, notification);
    }
}

/// Collects notifications in memory so tests can assert on them.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(UserId, SwapNotification)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(UserId, SwapNotification)> {
        self.sent.lock().clone()
    }

    /// Notifications addressed to one user, in send order.
    pub fn sent_to(&self, user: &UserId) -> Vec<SwapNotification> {
        self.sent
            .lock()
            .iter()
            .filter(|(u, _)| u == user)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, user: &UserId, notification: &SwapNotification) {
        self.sent.lock().push((user.clone(), notification.clone()));
    }
}
