//! Ephemeral user-visible status notifications

use std::fmt;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// What a notification is telling the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Loading,
    Success,
    Error,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Loading => write!(f, "..."),
            NotificationKind::Success => write!(f, "ok"),
            NotificationKind::Error => write!(f, "error"),
        }
    }
}

/// A notification to be shown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
    /// Persistent notifications stay until dismissed; others fade on their own
    pub persistent: bool,
}

impl Notification {
    pub fn loading(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Loading,
            message: message.into(),
            persistent: true,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            message: message.into(),
            persistent: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            message: message.into(),
            persistent: false,
        }
    }
}

/// Handle for dismissing a shown notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

/// Trait for showing and dismissing notifications
pub trait Notifier: Send + Sync + fmt::Debug {
    /// Show a notification and return its handle
    fn show(&self, notification: &Notification) -> NotificationId;

    /// Dismiss a previously shown notification; unknown handles are ignored
    fn dismiss(&self, id: NotificationId);
}

/// Writes notifications to stderr, one line each
#[derive(Debug, Default)]
pub struct TerminalNotifier {
    next_id: AtomicU64,
}

impl TerminalNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Notifier for TerminalNotifier {
    fn show(&self, notification: &Notification) -> NotificationId {
        let id = NotificationId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let mut stderr = std::io::stderr().lock();
        if let Err(e) = writeln!(stderr, "[{}] {}", notification.kind, notification.message) {
            tracing::debug!("Failed to write notification: {}", e);
        }
        id
    }

    fn dismiss(&self, id: NotificationId) {
        tracing::trace!("Dismissed notification {:?}", id);
    }
}
