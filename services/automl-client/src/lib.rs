//! AutoML client - guided machine-learning workflow against a remote backend
//!
//! Wraps the backend's REST API, keeps the client-side session state and
//! wakes the (possibly sleeping) backend up before pipeline calls.

pub mod activity;
pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod io;
pub mod monitor;
pub mod notifier;
pub mod session;
pub mod types;

pub use config::{load_config, Config};
pub use error::{ClientError, Result};

use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::activity::{ActivityEvent, ActivityWatcher};
use crate::api::AutomlClient;
use crate::chat::Conversation;
use crate::io::{HttpClient, ReqwestHttpClient};
use crate::monitor::{MonitorStatus, WakeMonitor};
use crate::notifier::{Notifier, TerminalNotifier};
use crate::session::{PipelineStep, SessionState};
use crate::types::{ExportFormat, GraphKind, SessionId, TrainOptions, TransformOptions};

/// One CLI action
#[derive(Debug, Clone)]
pub enum Command {
    /// Wake the backend and report how long it took
    Ping,
    /// Read activity signals from stdin and keep the backend warm
    Watch,
    Upload {
        path: PathBuf,
    },
    Clean {
        fill_strategies: BTreeMap<String, String>,
        target_column: Option<String>,
    },
    Eda {
        target_column: Option<String>,
    },
    Transform {
        options: TransformOptions,
    },
    Train {
        options: TrainOptions,
    },
    Metrics,
    Explain {
        model_key: String,
    },
    Data,
    Graph {
        kind: GraphKind,
        params: Vec<(String, String)>,
        output: Option<PathBuf>,
    },
    Export {
        format: ExportFormat,
        output: Option<PathBuf>,
    },
    Ask {
        question: String,
        step: PipelineStep,
    },
    /// List the guided workflow steps
    Steps,
}

impl Command {
    /// Whether the backend should be woken before running this command
    fn needs_backend(&self) -> bool {
        !matches!(self, Command::Ping | Command::Watch | Command::Steps)
    }

    fn step(&self) -> Option<PipelineStep> {
        match self {
            Command::Upload { .. } => Some(PipelineStep::Upload),
            Command::Clean { .. } => Some(PipelineStep::Clean),
            Command::Eda { .. } | Command::Graph { .. } => Some(PipelineStep::Eda),
            Command::Transform { .. } => Some(PipelineStep::Transform),
            Command::Train { .. } | Command::Metrics | Command::Explain { .. } => {
                Some(PipelineStep::Train)
            }
            Command::Export { .. } => Some(PipelineStep::Export),
            Command::Ask { step, .. } => Some(*step),
            Command::Ping | Command::Watch | Command::Data | Command::Steps => None,
        }
    }
}

/// Per-invocation options that are not part of the config file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub session: Option<SessionId>,
    /// Skip waking the backend before pipeline calls
    pub no_wake: bool,
}

/// Client, monitor and session state for one run
pub struct App {
    client: AutomlClient,
    monitor: WakeMonitor,
    session: SessionState,
    wake: bool,
}

impl App {
    pub fn new(config: &Config, http: Arc<dyn HttpClient>, notifier: Arc<dyn Notifier>) -> Self {
        let client = AutomlClient::new(&config.backend.base_url, Arc::clone(&http));
        let monitor = WakeMonitor::new(http, notifier, client.ping_url(), config.wake.clone());
        Self {
            client,
            monitor,
            session: SessionState::new(),
            wake: true,
        }
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        if let Some(session) = options.session {
            self.session = SessionState::resume(session);
        }
        self.wake = !options.no_wake;
        self
    }

    pub fn monitor(&self) -> &WakeMonitor {
        &self.monitor
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    /// Run one command, writing its output to `out`
    pub async fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> Result<()> {
        if let Some(step) = command.step() {
            self.session.set_step(step);
        }
        if self.wake && command.needs_backend() {
            let outcome = self.monitor.ensure_awake().await;
            if !outcome.is_awake() {
                tracing::warn!("Backend may still be asleep ({:?}), trying anyway", outcome);
            }
        }

        match command {
            Command::Ping => self.ping(out).await,
            Command::Watch => {
                let cancel = CancellationToken::new();
                let signal = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("Shutdown signal received");
                        signal.cancel();
                    }
                });
                let lines = spawn_stdin_reader();
                watch(&self.monitor, lines, out, cancel).await.map(|_| ())
            }
            Command::Upload { path } => {
                let upload = self.client.upload_file(&path).await?;
                self.session.apply_upload(&upload);
                print_json(out, &upload)
            }
            Command::Clean {
                fill_strategies,
                target_column,
            } => {
                let session_id = self.session.require_session()?.clone();
                let response = self
                    .client
                    .clean(&types::CleanRequest {
                        session_id,
                        fill_strategies,
                        target_column: target_column.unwrap_or_default(),
                    })
                    .await?;
                self.session.set_preview(response.preview.clone());
                print_json(out, &response)
            }
            Command::Eda { target_column } => {
                let session_id = self.session.require_session()?;
                let response = self.client.eda(session_id, target_column).await?;
                print_json(out, &response)
            }
            Command::Transform { options } => {
                let session_id = self.session.require_session()?;
                let response = self.client.transform(session_id, options).await?;
                self.session.set_preview(response.transformed_preview.clone());
                print_json(out, &response)
            }
            Command::Train { options } => {
                let session_id = self.session.require_session()?;
                let response = self.client.train(session_id, options).await?;
                print_json(out, &response)
            }
            Command::Metrics => {
                let session_id = self.session.require_session()?;
                let response = self.client.metrics(session_id).await?;
                print_json(out, &response)
            }
            Command::Explain { model_key } => {
                let session_id = self.session.require_session()?;
                let response = self.client.explain(session_id, &model_key).await?;
                print_json(out, &response)
            }
            Command::Data => {
                let session_id = self.session.require_session()?;
                let response = self.client.session_data(session_id).await?;
                print_json(out, &response)
            }
            Command::Graph {
                kind,
                params,
                output,
            } => {
                let session_id = self.session.require_session()?;
                let bytes = self.client.graph(kind, session_id, &params).await?;
                let path = output
                    .unwrap_or_else(|| PathBuf::from(format!("{}_{}.png", session_id, kind.path())));
                write_artifact(out, &path, &bytes).await
            }
            Command::Export { format, output } => {
                let session_id = self.session.require_session()?;
                let bytes = self.client.export(format, session_id).await?;
                let path =
                    output.unwrap_or_else(|| PathBuf::from(format.default_file_name(session_id)));
                write_artifact(out, &path, &bytes).await
            }
            Command::Ask { question, step } => {
                let session_id = self.session.require_session()?;
                let mut conversation = Conversation::new();
                conversation.push_question(&question);
                let result = self.client.suggest(session_id, &question, step.key()).await;
                match &result {
                    Ok(response) => conversation.update_answer(&response.answer),
                    Err(_) => conversation.push_error(),
                }
                if let Some(answer) = conversation.messages().last() {
                    chat::render_chunks(out, &answer.chunks)?;
                }
                result.map(|_| ())
            }
            Command::Steps => {
                let current = self.session.current_step;
                for step in PipelineStep::ALL {
                    let marker = if step == current { '>' } else { ' ' };
                    writeln!(out, "{} {}. {} ({})", marker, step.index() + 1, step, step.key())?;
                }
                Ok(())
            }
        }
    }

    async fn ping<W: Write>(&self, out: &mut W) -> Result<()> {
        if !self.wake {
            self.client.ping().await?;
            writeln!(out, "Backend at {} is awake", self.client.base_url())?;
            return Ok(());
        }

        let outcome = self.monitor.ensure_awake().await;
        print_json(out, &outcome)?;
        if outcome.is_awake() {
            Ok(())
        } else {
            Err(ClientError::BackendAsleep(self.client.base_url().to_string()))
        }
    }
}

/// Read stdin lines on a dedicated thread
///
/// The thread is detached: it ends at end of input or once the receiver is
/// dropped, and never keeps the process alive after the runtime shuts down.
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(64);
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!("Failed to read stdin: {}", e);
                    break;
                }
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
        tracing::debug!("Stdin reader stopped");
    });
    rx
}

/// Feed activity lines to the monitor until `quit`, end of input or
/// cancellation; returns the number of cycles the activity started
pub async fn watch<W: Write>(
    monitor: &WakeMonitor,
    mut lines: mpsc::Receiver<String>,
    out: &mut W,
    cancel: CancellationToken,
) -> Result<u64> {
    let (tx, rx) = mpsc::channel(64);
    let watcher = ActivityWatcher::spawn(monitor.clone(), rx, cancel.clone());

    loop {
        let line = tokio::select! {
            line = lines.recv() => line,
            _ = cancel.cancelled() => break,
        };
        let Some(line) = line else {
            break;
        };

        match line.trim() {
            "quit" | "exit" => break,
            "status" => {
                let status = monitor.status().await;
                writeln!(out, "{}", format_status(&status))?;
            }
            other => match other.parse::<ActivityEvent>() {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(e) => writeln!(out, "{}", e)?,
            },
        }
    }

    drop(tx);
    match watcher.await {
        Ok(started) => Ok(started),
        Err(e) => {
            tracing::warn!("Activity watcher failed: {}", e);
            Ok(0)
        }
    }
}

/// One-line summary of the monitor for the `status` watch command
pub fn format_status(status: &MonitorStatus) -> String {
    let last_ping = match status.last_ping_age {
        Some(age) => format!("{:.1}s ago", age.as_secs_f64()),
        None => "never".to_string(),
    };
    format!(
        "phase={} pinging={} gave_up={} last_ping={} cycles={} checks={}",
        status.phase,
        status.is_pinging,
        status.gave_up,
        last_ping,
        status.cycles_started,
        status.health_checks
    )
}

fn print_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

async fn write_artifact<W: Write>(out: &mut W, path: &Path, bytes: &[u8]) -> Result<()> {
    tokio::fs::write(path, bytes).await?;
    tracing::info!("Wrote {} bytes to {:?}", bytes.len(), path);
    writeln!(out, "Wrote {} bytes to {}", bytes.len(), path.display())?;
    Ok(())
}

/// Run a single command against the configured backend
pub async fn run_command(config: Config, options: RunOptions, command: Command) -> Result<()> {
    config.validate()?;

    let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    let notifier: Arc<dyn Notifier> = Arc::new(TerminalNotifier::new());
    let mut app = App::new(&config, http, notifier).with_options(options);
    tracing::debug!("Running {:?} against {}", command, config.backend.base_url);

    let mut stdout = std::io::stdout();
    let result = app.execute(command, &mut stdout).await;
    app.monitor().shutdown();
    result
}
