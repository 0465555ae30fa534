//! Backend wake-up monitor
//!
//! Hosted backends go to sleep when idle and can take several seconds to
//! answer the first request. The monitor pings the cheap `/ping` endpoint when
//! the user shows signs of activity, so the backend is warm by the time a
//! pipeline call is made.
//!
//! A cycle runs as a single task that owns both of its timers:
//!
//! - the health check is issued immediately and retried after a fixed delay
//!   on every failure, one attempt at a time
//! - if no check has succeeded once the threshold elapses, a persistent
//!   "waking up" notification is shown and the give-up timer starts
//! - success dismisses the waking notification (replacing it with a success
//!   notification) and records the time of the healthy response
//! - the give-up timer dismisses the waking notification, shows one failure
//!   notification and drops the retry chain
//!
//! Only one cycle runs at a time, and no cycle starts while the last healthy
//! response is inside the freshness window.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WakeConfig;
use crate::io::HttpClient;
use crate::notifier::{Notification, NotificationId, Notifier};

pub const WAKING_MESSAGE: &str = "Waking up the backend, hang tight...";
pub const AWAKE_MESSAGE: &str = "Backend is awake";
pub const GAVE_UP_MESSAGE: &str = "Backend is not responding. Please try again in a moment.";

/// Where the current cycle is in its protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    /// No cycle in flight
    Idle,
    /// Health check in flight, nothing shown to the user yet
    PendingSilent,
    /// Health check in flight, "waking up" notification visible
    VisibleWaiting,
    /// Last check failed, waiting out the retry delay
    Retrying,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CyclePhase::Idle => write!(f, "Idle"),
            CyclePhase::PendingSilent => write!(f, "Pending"),
            CyclePhase::VisibleWaiting => write!(f, "Waking"),
            CyclePhase::Retrying => write!(f, "Retrying"),
        }
    }
}

/// How a request for a health check ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum CycleOutcome {
    /// A health check succeeded; `notified` is true if the user saw the
    /// waking notification
    Success { attempts: u32, notified: bool },
    /// The give-up timer fired before any health check succeeded
    TimedOut { attempts: u32 },
    /// The monitor was shut down while the cycle was running
    Cancelled,
    /// No cycle was needed: the backend answered within the freshness window
    Fresh,
}

impl CycleOutcome {
    pub fn is_awake(&self) -> bool {
        matches!(self, CycleOutcome::Success { .. } | CycleOutcome::Fresh)
    }
}

/// Point-in-time view of the monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorStatus {
    pub is_pinging: bool,
    pub gave_up: bool,
    pub phase: CyclePhase,
    pub last_ping_age: Option<Duration>,
    pub cycles_started: u64,
    pub health_checks: u64,
}

#[derive(Debug)]
struct MonitorState {
    last_ping: Option<Instant>,
    is_pinging: bool,
    gave_up: bool,
    phase: CyclePhase,
    visible: bool,
    cycles_started: u64,
    health_checks: u64,
    outcome: Option<watch::Receiver<Option<CycleOutcome>>>,
}

impl MonitorState {
    fn new() -> Self {
        Self {
            last_ping: None,
            is_pinging: false,
            gave_up: false,
            phase: CyclePhase::Idle,
            visible: false,
            cycles_started: 0,
            health_checks: 0,
            outcome: None,
        }
    }

    fn release(&mut self) {
        self.is_pinging = false;
        self.visible = false;
        self.phase = CyclePhase::Idle;
    }
}

struct Inner {
    http: Arc<dyn HttpClient>,
    notifier: Arc<dyn Notifier>,
    ping_url: String,
    config: WakeConfig,
    state: RwLock<MonitorState>,
    cancel: CancellationToken,
}

enum Start {
    Started(JoinHandle<CycleOutcome>, watch::Receiver<Option<CycleOutcome>>),
    InFlight(watch::Receiver<Option<CycleOutcome>>),
    Suppressed,
    Closed,
}

/// Owns the wake-up state for one application lifetime
#[derive(Clone)]
pub struct WakeMonitor {
    inner: Arc<Inner>,
}

impl fmt::Debug for WakeMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WakeMonitor")
            .field("ping_url", &self.inner.ping_url)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl WakeMonitor {
    pub fn new(
        http: Arc<dyn HttpClient>,
        notifier: Arc<dyn Notifier>,
        ping_url: impl Into<String>,
        config: WakeConfig,
    ) -> Self {
        let ping_url = ping_url.into();
        debug!("Created WakeMonitor for {} with {:?}", ping_url, config);
        Self {
            inner: Arc::new(Inner {
                http,
                notifier,
                ping_url,
                config,
                state: RwLock::new(MonitorState::new()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Start a cycle unless one is running or the backend answered recently.
    ///
    /// Returns the handle of the new cycle, or `None` when the request was a
    /// no-op.
    pub async fn request_check(&self) -> Option<JoinHandle<CycleOutcome>> {
        match self.start().await {
            Start::Started(handle, _) => Some(handle),
            Start::InFlight(_) | Start::Suppressed | Start::Closed => None,
        }
    }

    /// Make sure the backend is awake, joining an in-flight cycle if there is
    /// one, and wait for the result
    pub async fn ensure_awake(&self) -> CycleOutcome {
        let mut rx = match self.start().await {
            Start::Suppressed => return CycleOutcome::Fresh,
            Start::Closed => return CycleOutcome::Cancelled,
            Start::Started(_, rx) | Start::InFlight(rx) => rx,
        };

        let outcome = match rx.wait_for(Option::is_some).await {
            Ok(outcome) => (*outcome).unwrap_or(CycleOutcome::Cancelled),
            Err(_) => CycleOutcome::Cancelled,
        };
        outcome
    }

    pub async fn status(&self) -> MonitorStatus {
        let state = self.inner.state.read().await;
        MonitorStatus {
            is_pinging: state.is_pinging,
            gave_up: state.gave_up,
            phase: state.phase,
            last_ping_age: state.last_ping.map(|t| t.elapsed()),
            cycles_started: state.cycles_started,
            health_checks: state.health_checks,
        }
    }

    /// Cancel the active cycle and refuse new ones
    pub fn shutdown(&self) {
        debug!("Shutting down WakeMonitor");
        self.inner.cancel.cancel();
    }

    async fn start(&self) -> Start {
        if self.inner.cancel.is_cancelled() {
            return Start::Closed;
        }

        let mut state = self.inner.state.write().await;
        if state.is_pinging {
            debug!("Wake check already in flight");
            return match &state.outcome {
                Some(rx) => Start::InFlight(rx.clone()),
                None => Start::Suppressed,
            };
        }
        if let Some(last) = state.last_ping {
            let age = last.elapsed();
            if age < self.inner.config.freshness() {
                debug!("Backend answered {:?} ago, skipping wake check", age);
                return Start::Suppressed;
            }
        }

        state.is_pinging = true;
        state.gave_up = false;
        state.visible = false;
        state.phase = CyclePhase::PendingSilent;
        state.cycles_started += 1;
        let cycle = state.cycles_started;
        let (tx, rx) = watch::channel(None);
        state.outcome = Some(rx.clone());
        drop(state);

        debug!("Starting wake cycle {}", cycle);
        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            let outcome = inner.run_cycle(cycle).await;
            let _ = tx.send(Some(outcome));
            outcome
        });
        Start::Started(handle, rx)
    }
}

impl Inner {
    async fn run_cycle(&self, cycle: u64) -> CycleOutcome {
        let attempts = AtomicU32::new(0);
        let mut waking: Option<NotificationId> = None;

        let chain = self.retry_chain(cycle, &attempts);
        tokio::pin!(chain);
        let threshold = tokio::time::sleep(self.config.threshold());
        tokio::pin!(threshold);
        // Armed when the threshold fires
        let give_up = tokio::time::sleep(Duration::ZERO);
        tokio::pin!(give_up);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    if let Some(id) = waking {
                        self.notifier.dismiss(id);
                    }
                    self.state.write().await.release();
                    debug!("Wake cycle {} cancelled", cycle);
                    return CycleOutcome::Cancelled;
                }
                () = &mut chain => {
                    let notified = waking.is_some();
                    if let Some(id) = waking {
                        self.notifier.dismiss(id);
                        self.notifier.show(&Notification::success(AWAKE_MESSAGE));
                    }
                    let attempts = attempts.load(Ordering::SeqCst);
                    {
                        let mut state = self.state.write().await;
                        state.last_ping = Some(Instant::now());
                        state.release();
                    }
                    info!(
                        "Backend awake after {} health check(s) (cycle {})",
                        attempts, cycle
                    );
                    return CycleOutcome::Success { attempts, notified };
                }
                () = &mut threshold, if waking.is_none() => {
                    waking = Some(self.notifier.show(&Notification::loading(WAKING_MESSAGE)));
                    give_up.as_mut().reset(Instant::now() + self.config.give_up());
                    let mut state = self.state.write().await;
                    state.visible = true;
                    if state.phase == CyclePhase::PendingSilent {
                        state.phase = CyclePhase::VisibleWaiting;
                    }
                    debug!("Wake cycle {} passed the silent threshold", cycle);
                }
                () = &mut give_up, if waking.is_some() => {
                    if let Some(id) = waking {
                        self.notifier.dismiss(id);
                    }
                    self.notifier.show(&Notification::error(GAVE_UP_MESSAGE));
                    let attempts = attempts.load(Ordering::SeqCst);
                    {
                        let mut state = self.state.write().await;
                        state.gave_up = true;
                        state.release();
                    }
                    warn!(
                        "Backend did not respond within {:?} ({} health check(s), cycle {})",
                        self.config.threshold() + self.config.give_up(),
                        attempts,
                        cycle
                    );
                    return CycleOutcome::TimedOut { attempts };
                }
            }
        }
    }

    /// Health checks one after another with a fixed delay, until one succeeds
    async fn retry_chain(&self, cycle: u64, attempts: &AtomicU32) {
        loop {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            {
                let mut state = self.state.write().await;
                state.health_checks += 1;
                state.phase = if state.visible {
                    CyclePhase::VisibleWaiting
                } else {
                    CyclePhase::PendingSilent
                };
            }

            match self.check().await {
                Ok(()) => return,
                Err(e) => {
                    debug!("Health check {} of cycle {} failed: {}", attempt, cycle, e);
                }
            }

            self.state.write().await.phase = CyclePhase::Retrying;
            tokio::time::sleep(self.config.retry_delay()).await;
        }
    }

    async fn check(&self) -> crate::Result<()> {
        let response = self.http.get(&self.ping_url, &[]).await?;
        if response.is_success() {
            Ok(())
        } else {
            Err(crate::ClientError::Api {
                status: response.status,
                detail: response.text(),
            })
        }
    }
}
