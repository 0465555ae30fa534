//! User-activity signals that arm the wake-up monitor

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::monitor::WakeMonitor;

/// Something the user did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityEvent {
    PointerMove,
    PointerDown,
    TouchStart,
    /// The page or terminal became visible again
    Visible,
    Hidden,
}

impl ActivityEvent {
    /// Whether this event should ask the monitor for a health check
    pub fn triggers_check(&self) -> bool {
        !matches!(self, ActivityEvent::Hidden)
    }
}

impl fmt::Display for ActivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityEvent::PointerMove => write!(f, "move"),
            ActivityEvent::PointerDown => write!(f, "down"),
            ActivityEvent::TouchStart => write!(f, "touch"),
            ActivityEvent::Visible => write!(f, "visible"),
            ActivityEvent::Hidden => write!(f, "hidden"),
        }
    }
}

impl FromStr for ActivityEvent {
    type Err = crate::ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "move" | "mousemove" | "pointermove" => Ok(ActivityEvent::PointerMove),
            "down" | "mousedown" | "pointerdown" | "click" => Ok(ActivityEvent::PointerDown),
            "touch" | "touchstart" => Ok(ActivityEvent::TouchStart),
            "visible" | "focus" => Ok(ActivityEvent::Visible),
            "hidden" | "blur" => Ok(ActivityEvent::Hidden),
            other => Err(crate::ClientError::InvalidInput(format!(
                "unknown activity '{}'",
                other
            ))),
        }
    }
}

/// Forwards activity events to the monitor until the channel closes or the
/// token is cancelled
pub struct ActivityWatcher;

impl ActivityWatcher {
    pub fn spawn(
        monitor: WakeMonitor,
        mut events: mpsc::Receiver<ActivityEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<u64> {
        tokio::spawn(async move {
            let mut started = 0u64;
            loop {
                let event = tokio::select! {
                    event = events.recv() => event,
                    _ = cancel.cancelled() => {
                        tracing::debug!("Activity watcher cancelled");
                        break;
                    }
                };

                let Some(event) = event else {
                    tracing::debug!("Activity channel closed");
                    break;
                };

                if !event.triggers_check() {
                    tracing::trace!("Ignoring activity '{}'", event);
                    continue;
                }

                if monitor.request_check().await.is_some() {
                    started += 1;
                    tracing::debug!("Activity '{}' started a wake check", event);
                }
            }
            started
        })
    }
}
