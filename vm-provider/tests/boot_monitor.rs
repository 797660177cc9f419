mod common;

use std::time::Duration;

use common::{FakeOpener, FakeRuntime};
use tokio_util::sync::CancellationToken;
use vm_config::RetryPolicy;
use vm_core::error::VmError;
use vm_provider::boot::{BootMonitor, BootState};
use vm_provider::docker::ContainerRuntime;
use vm_provider::session::{SessionTarget, SshAuth, SshTarget};

fn guest() -> SessionTarget {
    SessionTarget::Ssh(SshTarget {
        host: "localhost".into(),
        port: 10022,
        user: "daytona".into(),
        auth: SshAuth::Password("daytona".into()),
        connect_timeout: Duration::from_secs(10),
    })
}

fn policy(interval: u64, max: u64) -> RetryPolicy {
    RetryPolicy::new(Duration::from_secs(interval), Some(Duration::from_secs(max)))
}

#[tokio::test(start_paused = true)]
async fn test_reaches_guest_ready_after_retries() {
    let runtime = FakeRuntime::new();
    runtime.state.lock().unwrap().polls_before_running = 3;
    runtime.create(&dummy_spec(), "c").await.unwrap();
    runtime.start("c").await.unwrap();

    let opener = FakeOpener::new();
    opener.state.lock().unwrap().failing_opens = 4;
    let cancel = CancellationToken::new();
    let mut monitor = BootMonitor::new(&runtime, &opener, &cancel, policy(1, 300), policy(10, 3600));

    assert_eq!(monitor.state(), BootState::ContainerStarting);
    monitor.wait_until_running("c").await.unwrap();
    assert_eq!(monitor.state(), BootState::ContainerRunning);
    assert_eq!(runtime.calls_named("inspect"), 4);

    let _session = monitor.wait_for_guest(&guest()).await.unwrap();
    assert_eq!(monitor.state(), BootState::GuestReady);
    assert_eq!(opener.opens(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_guest_probe_gives_up_with_connectivity_error() {
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::unreachable();
    let cancel = CancellationToken::new();
    let mut monitor = BootMonitor::new(&runtime, &opener, &cancel, policy(1, 300), policy(10, 55));

    let err = monitor.wait_for_guest(&guest()).await.err().unwrap();
    assert!(matches!(err, VmError::Connectivity(ref m) if m.contains("connection refused")), "{err}");
    assert_eq!(monitor.state(), BootState::Failed);
    // Attempts at t = 0, 10, ..., 60.
    assert_eq!(opener.opens(), 7);
}

#[tokio::test(start_paused = true)]
async fn test_missing_ssh_tool_fails_without_retrying() {
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::missing_sshpass();
    let cancel = CancellationToken::new();
    let mut monitor = BootMonitor::new(&runtime, &opener, &cancel, policy(1, 300), policy(10, 3600));

    let started = tokio::time::Instant::now();
    let err = monitor.wait_for_guest(&guest()).await.err().unwrap();
    assert!(matches!(err, VmError::Dependency(ref m) if m.contains("sshpass")), "{err}");
    assert_eq!(opener.opens(), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(monitor.state(), BootState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_guest_wait() {
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::unreachable();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(25)).await;
        trigger.cancel();
    });
    let mut monitor = BootMonitor::new(&runtime, &opener, &cancel, policy(1, 300), RetryPolicy::new(Duration::from_secs(10), None));

    let err = monitor.wait_for_guest(&guest()).await.err().unwrap();
    assert!(err.is_cancelled());
    assert_eq!(monitor.state(), BootState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_vanished_container_fails() {
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::new();
    let cancel = CancellationToken::new();
    let mut monitor = BootMonitor::new(&runtime, &opener, &cancel, policy(1, 300), policy(10, 60));

    let err = monitor.wait_until_running("missing").await.unwrap_err();
    assert!(matches!(err, VmError::Runtime { .. }));
    assert_eq!(monitor.state(), BootState::Failed);
}

fn dummy_spec() -> vm_provider::docker::ContainerSpec {
    vm_provider::docker::build_container_spec(
        &Default::default(),
        &Default::default(),
        None,
        &Default::default(),
        120,
    )
}
