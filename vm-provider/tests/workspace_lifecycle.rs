//! Create/start/stop/destroy flows against recording fakes.

mod common;

use common::*;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;
use vm_core::error::VmError;
use vm_ports::AllocationRegistry;
use vm_provider::docker::spec::{GUEST_CONTROL_PORT, GUEST_SSH_PORT, GUEST_TOOLBOX_PORT, GUEST_UI_PORT};
use vm_provider::session::SessionTarget;
use vm_provider::Provider;

#[tokio::test(start_paused = true)]
async fn test_local_fresh_create_runs_full_sequence() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    runtime.state.lock().unwrap().polls_before_running = 2;
    let opener = FakeOpener::new();
    let probe = FakeProbe {
        occupied: vec![8006, 8007, 8008],
        ephemeral: Some(45000),
    };
    let provider = provider(dir.path(), &runtime, &opener, probe);
    let request = workspace_request(LOCAL_OPTIONS, &[("FOO", "1"), ("BAR", "two words")]);

    provider
        .create_workspace(&request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(runtime.calls_named("pull"), 1);
    assert_eq!(runtime.calls_named("create"), 1);
    assert_eq!(runtime.calls_named("start"), 1);
    assert_eq!(runtime.closes(), 1);

    let created = runtime.created();
    let (name, spec) = &created[0];
    assert_eq!(name, "t1-ws1");
    let host_port = |container: u16| {
        spec.port_bindings
            .iter()
            .find(|b| b.container_port == container)
            .map(|b| b.host_port)
    };
    assert_eq!(host_port(GUEST_SSH_PORT), Some(10022));
    assert_eq!(host_port(GUEST_CONTROL_PORT), Some(2222));
    assert_eq!(host_port(GUEST_UI_PORT), Some(8009));
    assert_eq!(host_port(GUEST_TOOLBOX_PORT), Some(45000));

    // One session: 5 bootstrap commands, 2 exports, 1 final reload.
    assert_eq!(opener.opens(), 1);
    assert_eq!(opener.closes(), 1);
    let commands = opener.commands();
    assert_eq!(commands.len(), 8);
    assert_eq!(
        commands.iter().filter(|c| c.starts_with("echo 'export ")).count(),
        2
    );
    assert_eq!(commands.last().unwrap(), "source ~/.zshrc");

    let lines = workspace_log_lines(dir.path());
    assert!(lines.iter().any(|l| l == "Visit http://localhost:8009 and Set up MacOS"));
    assert!(lines.iter().any(|l| l == "Set USERNAME \"daytona\" and PASSWORD \"daytona\""));
    assert!(lines.iter().any(|l| l.contains("Remote Login")));

    let registry = AllocationRegistry::open(&dir.path().join("port-allocations.json")).unwrap();
    let entry = registry.get("ws1").unwrap();
    assert_eq!(entry.ui_port, 8009);
    assert_eq!(entry.api_port, Some(45000));
}

#[tokio::test(start_paused = true)]
async fn test_remote_unreachable_guest_never_bootstraps() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::unreachable();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());
    let request = workspace_request(REMOTE_OPTIONS, &[]);

    let err = provider
        .create_workspace(&request, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, VmError::Connectivity(_)), "{err}");
    assert_eq!(runtime.calls_named("create"), 1);
    assert!(opener.commands().is_empty());
    assert!(opener.opens() > 1);
    assert_eq!(runtime.closes(), 1);

    // Remote targets get no toolbox binding, and the guest is reached
    // through the remote host.
    let (_, spec) = &runtime.created()[0];
    assert_eq!(spec.port_bindings.len(), 3);
    let state = opener.state.lock().unwrap();
    let SessionTarget::Ssh(target) = &state.opened[0] else {
        panic!("guest sessions are ssh");
    };
    assert_eq!(target.host, "mac.lan");
    assert_eq!(target.port, 10022);
}

#[tokio::test(start_paused = true)]
async fn test_bootstrap_stops_at_first_failure() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::failing_command(3);
    let provider = provider(dir.path(), &runtime, &opener, free_ports());

    let err = provider
        .create_workspace(&workspace_request(LOCAL_OPTIONS, &[("A", "1")]), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, VmError::Command { status: Some(1), .. }), "{err}");
    assert_eq!(opener.commands().len(), 3);
    assert_eq!(opener.closes(), 1, "session is released on failure");
    assert!(workspace_log_lines(dir.path())
        .iter()
        .any(|l| l.starts_with("failed to execute command")));
}

#[tokio::test(start_paused = true)]
async fn test_one_export_per_variable() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());
    let env: Vec<(String, String)> = (0..6).map(|i| (format!("VAR_{i}"), format!("v{i}"))).collect();
    let pairs: Vec<(&str, &str)> = env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

    provider
        .create_workspace(&workspace_request(LOCAL_OPTIONS, &pairs), &CancellationToken::new())
        .await
        .unwrap();

    let exports: Vec<String> = opener
        .commands()
        .into_iter()
        .filter(|c| c.starts_with("echo 'export "))
        .collect();
    assert_eq!(exports.len(), 6);
    for (name, _) in &env {
        assert_eq!(
            exports.iter().filter(|e| e.contains(&format!("export {name}="))).count(),
            1
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_invalid_env_name_fails_before_guest_commands() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());

    let err = provider
        .create_workspace(&workspace_request(LOCAL_OPTIONS, &[("BAD-NAME", "x")]), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, VmError::Config(_)));
    assert!(opener.commands().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_existing_container_is_reused() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::with_container(false);
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());

    provider
        .create_workspace(&workspace_request(LOCAL_OPTIONS, &[]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(runtime.calls_named("create"), 0);
    assert_eq!(runtime.calls_named("pull"), 0);
    assert_eq!(runtime.calls_named("start"), 1);
    assert!(workspace_log_lines(dir.path())
        .iter()
        .any(|l| l == "Reusing existing container t1-ws1"));
}

#[tokio::test(start_paused = true)]
async fn test_container_that_never_runs_times_out() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    runtime.state.lock().unwrap().never_runs = true;
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());

    let err = provider
        .create_workspace(&workspace_request(LOCAL_OPTIONS, &[]), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, VmError::Timeout(_)), "{err}");
    assert_eq!(opener.opens(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_start_on_running_container_only_relaunches_agent() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::with_container(true);
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());

    provider
        .start_workspace(&workspace_request(LOCAL_OPTIONS, &[]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(runtime.calls(), vec!["inspect"]);
    let commands = opener.commands();
    assert_eq!(commands.len(), 1);
    assert!(commands[0].contains("daytona agent"));
    assert!(workspace_log_lines(dir.path())
        .iter()
        .any(|l| l == "Daytona agent started"));
}

#[tokio::test(start_paused = true)]
async fn test_agent_launch_failure_is_not_fatal() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::with_container(true);
    let opener = FakeOpener::failing_command(1);
    let provider = provider(dir.path(), &runtime, &opener, free_ports());

    provider
        .start_workspace(&workspace_request(LOCAL_OPTIONS, &[]), &CancellationToken::new())
        .await
        .unwrap();

    let lines = workspace_log_lines(dir.path());
    assert!(lines.iter().any(|l| l.starts_with("failed to execute command")));
    assert!(!lines.iter().any(|l| l == "Daytona agent started"));
}

#[tokio::test(start_paused = true)]
async fn test_start_on_stopped_container_waits_for_guest() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::with_container(false);
    let opener = FakeOpener::new();
    opener.state.lock().unwrap().failing_opens = 2;
    let provider = provider(dir.path(), &runtime, &opener, free_ports());

    provider
        .start_workspace(&workspace_request(LOCAL_OPTIONS, &[]), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(runtime.calls(), vec!["inspect", "start", "inspect"]);
    assert_eq!(opener.opens(), 3);
    assert_eq!(opener.commands().len(), 1);
}

#[tokio::test]
async fn test_start_missing_container_is_an_error() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());

    let err = provider
        .start_workspace(&workspace_request(LOCAL_OPTIONS, &[]), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, VmError::Runtime { .. }));
    assert_eq!(runtime.closes(), 1);
}

#[tokio::test]
async fn test_stop_and_destroy_tolerate_missing_container() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());
    let request = workspace_request(LOCAL_OPTIONS, &[]);
    let cancel = CancellationToken::new();

    provider.stop_workspace(&request, &cancel).await.unwrap();
    provider.destroy_workspace(&request, &cancel).await.unwrap();

    assert_eq!(runtime.calls(), vec!["inspect", "inspect"]);
    assert_eq!(runtime.closes(), 2);
    assert!(workspace_log_lines(dir.path())
        .iter()
        .all(|l| l == "Container t1-ws1 not found, nothing to do"));
}

#[tokio::test(start_paused = true)]
async fn test_destroy_releases_ports() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());
    let request = workspace_request(LOCAL_OPTIONS, &[]);
    let cancel = CancellationToken::new();

    provider.create_workspace(&request, &cancel).await.unwrap();
    provider.stop_workspace(&request, &cancel).await.unwrap();
    assert_eq!(runtime.calls_named("stop"), 1);

    let registry_path = dir.path().join("port-allocations.json");
    assert!(AllocationRegistry::open(&registry_path).unwrap().get("ws1").is_some());

    provider.destroy_workspace(&request, &cancel).await.unwrap();
    assert_eq!(runtime.calls_named("remove"), 1);
    assert!(AllocationRegistry::open(&registry_path).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_create_skips_ports_held_by_other_workspaces() {
    let dir = tempdir().unwrap();
    let registry_path = dir.path().join("port-allocations.json");
    AllocationRegistry::open(&registry_path)
        .unwrap()
        .record("ws0", vm_ports::AllocationEntry::new(8006, Some(45001)))
        .unwrap();

    let runtime = FakeRuntime::new();
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());
    provider
        .create_workspace(&workspace_request(LOCAL_OPTIONS, &[]), &CancellationToken::new())
        .await
        .unwrap();

    let (_, spec) = &runtime.created()[0];
    let ui = spec
        .port_bindings
        .iter()
        .find(|b| b.container_port == GUEST_UI_PORT)
        .map(|b| b.host_port);
    assert_eq!(ui, Some(8007));

    let registry = AllocationRegistry::open(&registry_path).unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("ws1").map(|e| e.ui_port), Some(8007));
}

#[tokio::test(start_paused = true)]
async fn test_workspace_metadata_reports_ports() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());
    let request = workspace_request(LOCAL_OPTIONS, &[]);
    let cancel = CancellationToken::new();

    provider.create_workspace(&request, &cancel).await.unwrap();
    let metadata: serde_json::Value =
        serde_json::from_str(&provider.workspace_metadata(&request, &cancel).await.unwrap()).unwrap();

    assert_eq!(metadata["containerName"], "t1-ws1");
    assert_eq!(metadata["running"], true);
    assert_eq!(metadata["uiUrl"], "http://localhost:8006");
    assert_eq!(metadata["apiPort"], 45000);
    assert_eq!(runtime.closes(), 2);
}

#[tokio::test]
async fn test_cancelled_operation_reports_cancelled() {
    let dir = tempdir().unwrap();
    let runtime = FakeRuntime::new();
    let opener = FakeOpener::new();
    let provider = provider(dir.path(), &runtime, &opener, free_ports());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = provider
        .create_workspace(&workspace_request(LOCAL_OPTIONS, &[]), &cancel)
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(runtime.calls_named("create"), 0);
}

#[tokio::test]
async fn test_uninitialized_provider_refuses_workspace_ops() {
    let provider = vm_provider::GuestVmProvider::default();
    let err = provider
        .stop_workspace(&workspace_request(LOCAL_OPTIONS, &[]), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, VmError::Config(_)));
}
