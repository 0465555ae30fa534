//! BDD step definitions for the backend wake-up monitor

use std::sync::Arc;
use std::time::Duration;

use cucumber::{given, then, when};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use automl_client::activity::{ActivityEvent, ActivityWatcher};
use automl_client::monitor::{CycleOutcome, WakeMonitor};
use automl_client::notifier::NotificationKind;

use crate::world::{fast_wake_config, AutomlWorld, NotifierEvent, ScriptedBackend};

async fn wait_until_idle(monitor: &WakeMonitor) {
    for _ in 0..300 {
        if !monitor.status().await.is_pinging {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("wake cycle did not finish within 3 seconds");
}

async fn send_activity(world: &mut AutomlWorld, events: Vec<ActivityEvent>) -> u64 {
    let monitor = world.monitor();
    let (tx, rx) = mpsc::channel(events.len().max(1));
    let watcher = ActivityWatcher::spawn(monitor, rx, CancellationToken::new());
    for event in events {
        tx.send(event).await.expect("watcher stopped early");
    }
    drop(tx);
    watcher.await.expect("watcher task panicked")
}

fn shown_kinds(world: &AutomlWorld) -> Vec<NotificationKind> {
    let notifier = world.notifier.as_ref().expect("no notifier");
    notifier
        .events()
        .into_iter()
        .filter_map(|e| match e {
            NotifierEvent::Shown(_, n) => Some(n.kind),
            NotifierEvent::Dismissed(_) => None,
        })
        .collect()
}

#[given("a backend that answers immediately")]
fn backend_answers_immediately(world: &mut AutomlWorld) {
    world.backend = Some(Arc::new(ScriptedBackend::new(0, Duration::ZERO)));
}

#[given(expr = "a backend that answers after {int} milliseconds")]
fn backend_answers_after(world: &mut AutomlWorld, millis: u64) {
    world.backend = Some(Arc::new(ScriptedBackend::new(
        0,
        Duration::from_millis(millis),
    )));
}

#[given(expr = "a backend that fails {int} times before answering")]
fn backend_fails_then_answers(world: &mut AutomlWorld, failures: u32) {
    world.backend = Some(Arc::new(ScriptedBackend::new(failures, Duration::ZERO)));
}

#[given("a backend that never answers successfully")]
fn backend_never_answers(world: &mut AutomlWorld) {
    world.backend = Some(Arc::new(ScriptedBackend::new(u32::MAX, Duration::ZERO)));
}

#[given(expr = "a freshness window of {int} seconds")]
fn freshness_window(world: &mut AutomlWorld, seconds: u64) {
    let mut config = fast_wake_config();
    config.freshness_seconds = seconds;
    world.wake_config = Some(config);
}

#[when("the user moves the pointer")]
async fn user_moves_pointer(world: &mut AutomlWorld) {
    let monitor = world.monitor();
    if let Some(handle) = monitor.request_check().await {
        world.pending.push(handle);
    }
}

#[when(expr = "the user produces {int} activity signals")]
async fn user_produces_signals(world: &mut AutomlWorld, count: usize) {
    let events = [
        ActivityEvent::PointerMove,
        ActivityEvent::PointerDown,
        ActivityEvent::TouchStart,
        ActivityEvent::Visible,
    ]
    .into_iter()
    .cycle()
    .take(count)
    .collect();
    let started = send_activity(world, events).await;
    assert_eq!(started, 1, "expected the burst to start exactly one cycle");
}

#[when("the page is hidden")]
async fn page_hidden(world: &mut AutomlWorld) {
    let started = send_activity(world, vec![ActivityEvent::Hidden]).await;
    assert_eq!(started, 0);
}

#[when("the wake cycle finishes")]
async fn wake_cycle_finishes(world: &mut AutomlWorld) {
    let monitor = world.monitor();
    for handle in std::mem::take(&mut world.pending) {
        world.outcomes.push(handle.await.expect("cycle task panicked"));
    }
    wait_until_idle(&monitor).await;
    world.checks_after_cycle = world.backend.as_ref().map(|b| b.calls());
}

#[when("a pipeline call waits for the backend")]
async fn pipeline_call_waits(world: &mut AutomlWorld) {
    let monitor = world.monitor();
    world.awaited = Some(monitor.ensure_awake().await);
}

#[then(expr = "the cycle should succeed after {int} health check(s)")]
fn cycle_succeeds_after(world: &mut AutomlWorld, checks: u32) {
    match world.outcomes.last() {
        Some(CycleOutcome::Success { attempts, .. }) => assert_eq!(*attempts, checks),
        other => panic!("expected a successful cycle, got {:?}", other),
    }
}

#[then("the cycle should time out")]
fn cycle_times_out(world: &mut AutomlWorld) {
    assert!(
        matches!(world.outcomes.last(), Some(CycleOutcome::TimedOut { .. })),
        "expected a timed-out cycle, got {:?}",
        world.outcomes.last()
    );
}

#[then("no notification should have been shown")]
fn no_notification(world: &mut AutomlWorld) {
    assert!(shown_kinds(world).is_empty());
}

#[then(expr = "the notifications should be {string}")]
fn notifications_should_be(world: &mut AutomlWorld, expected: String) {
    let shown: Vec<String> = shown_kinds(world)
        .into_iter()
        .map(|k| match serde_json::to_value(k) {
            Ok(serde_json::Value::String(name)) => name,
            other => panic!("unexpected kind encoding: {:?}", other),
        })
        .collect();
    assert_eq!(shown.join(", "), expected);
}

#[then("the waking notification should have been dismissed")]
fn waking_dismissed(world: &mut AutomlWorld) {
    let events = world.notifier.as_ref().expect("no notifier").events();
    let waking = events
        .iter()
        .find_map(|e| match e {
            NotifierEvent::Shown(id, n) if n.kind == NotificationKind::Loading => Some(*id),
            _ => None,
        })
        .expect("waking notification was never shown");
    assert!(events.contains(&NotifierEvent::Dismissed(waking)));
}

#[then("no further health checks should be issued")]
async fn no_further_checks(world: &mut AutomlWorld) {
    let before = world.checks_after_cycle.expect("cycle has not finished");
    tokio::time::sleep(Duration::from_millis(200)).await;
    let backend = world.backend.as_ref().expect("no backend");
    assert_eq!(backend.calls(), before);
}

#[then(expr = "{int} cycle(s) should have been started")]
async fn cycles_started(world: &mut AutomlWorld, expected: u64) {
    let monitor = world.monitor();
    assert_eq!(monitor.status().await.cycles_started, expected);
}

#[then(expr = "{int} health check(s) should have been issued")]
async fn health_checks_issued(world: &mut AutomlWorld, expected: u32) {
    let backend = world.backend.as_ref().expect("no backend");
    assert_eq!(backend.calls(), expected);
    let monitor = world.monitor();
    assert_eq!(monitor.status().await.health_checks, u64::from(expected));
}

#[then("the pipeline call should see the backend awake")]
fn pipeline_sees_awake(world: &mut AutomlWorld) {
    let outcome = world.awaited.expect("no pipeline call was made");
    assert!(outcome.is_awake(), "backend not awake: {:?}", outcome);
}

#[then("the monitor should report that it gave up")]
async fn monitor_gave_up(world: &mut AutomlWorld) {
    let monitor = world.monitor();
    let status = monitor.status().await;
    assert!(status.gave_up);
    assert!(!status.is_pinging);
    assert!(status.last_ping_age.is_none());
}
