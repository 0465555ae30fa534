//! BDD test world for the AutoML client

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use automl_client::chat::{Conversation, StructuredChunk};
use automl_client::config::WakeConfig;
use automl_client::io::{HttpClient, HttpResponse};
use automl_client::monitor::{CycleOutcome, WakeMonitor};
use automl_client::notifier::{Notification, NotificationId, Notifier};
use automl_client::session::SessionState;
use automl_client::ClientError;
use cucumber::World;
use tokio::task::JoinHandle;

/// Backend whose `/ping` fails a fixed number of times, then answers
#[derive(Debug)]
pub struct ScriptedBackend {
    failures: u32,
    latency: Duration,
    calls: AtomicU32,
}

impl ScriptedBackend {
    pub fn new(failures: u32, latency: Duration) -> Self {
        Self {
            failures,
            latency,
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HttpClient for ScriptedBackend {
    async fn get(&self, _url: &str, _query: &[(&str, &str)]) -> automl_client::Result<HttpResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if n < self.failures {
            Ok(HttpResponse {
                status: 503,
                body: b"Service Unavailable".to_vec(),
            })
        } else {
            Ok(HttpResponse {
                status: 200,
                body: br#"{"status":"ok"}"#.to_vec(),
            })
        }
    }

    async fn post_json(
        &self,
        url: &str,
        _body: &serde_json::Value,
    ) -> automl_client::Result<HttpResponse> {
        Err(ClientError::Http(format!("{} is not scripted", url)))
    }

    async fn post_multipart(
        &self,
        url: &str,
        _field: &str,
        _file_name: &str,
        _bytes: Vec<u8>,
    ) -> automl_client::Result<HttpResponse> {
        Err(ClientError::Http(format!("{} is not scripted", url)))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotifierEvent {
    Shown(NotificationId, Notification),
    Dismissed(NotificationId),
}

/// Notifier that records everything shown and dismissed
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotifierEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotifierEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show(&self, notification: &Notification) -> NotificationId {
        let mut events = self.events.lock().unwrap();
        let id = NotificationId(events.len() as u64);
        events.push(NotifierEvent::Shown(id, notification.clone()));
        id
    }

    fn dismiss(&self, id: NotificationId) {
        self.events.lock().unwrap().push(NotifierEvent::Dismissed(id));
    }
}

/// Timings short enough for real-time scenarios
pub fn fast_wake_config() -> WakeConfig {
    WakeConfig {
        freshness_seconds: 60,
        threshold_ms: 50,
        give_up_ms: 400,
        retry_delay_ms: 30,
    }
}

#[derive(Debug, Default, World)]
pub struct AutomlWorld {
    // Wake-up monitor
    pub backend: Option<Arc<ScriptedBackend>>,
    pub notifier: Option<Arc<RecordingNotifier>>,
    pub wake_config: Option<WakeConfig>,
    pub monitor: Option<WakeMonitor>,
    pub pending: Vec<JoinHandle<CycleOutcome>>,
    pub outcomes: Vec<CycleOutcome>,
    pub awaited: Option<CycleOutcome>,
    pub checks_after_cycle: Option<u32>,

    // Assistant
    pub answer: String,
    pub chunks: Vec<StructuredChunk>,
    pub conversation: Option<Conversation>,

    // Session
    pub session: Option<SessionState>,
    pub last_error: Option<String>,
}

impl AutomlWorld {
    /// The monitor under test, built on first use
    pub fn monitor(&mut self) -> WakeMonitor {
        if let Some(monitor) = &self.monitor {
            return monitor.clone();
        }
        let backend = self
            .backend
            .clone()
            .expect("no backend configured for this scenario");
        let notifier = Arc::clone(self.notifier.get_or_insert_with(Default::default));
        let config = self.wake_config.clone().unwrap_or_else(fast_wake_config);
        let monitor = WakeMonitor::new(backend, notifier, "http://backend.test/ping", config);
        self.monitor = Some(monitor.clone());
        monitor
    }
}
