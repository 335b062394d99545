//! Scenario tests for the supervisor loop, driven by real child
//! processes (`/bin/sh` scripts) and a real run directory.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use mudhost_common::ProcessName;
use mudhost_runfiles::{FileIntentStore, IntentStore, PidRegistry, RunPaths};
use mudhost_supervisor::{
    ManagedProcessSpec, OutputTarget, Supervisor, SupervisorReport, SYNTHETIC_FAILURE_CODE,
};
use tempfile::tempdir;

fn sh_spec(dir: &Path, name: ProcessName, script: &str, monitored: bool) -> ManagedProcessSpec {
    ManagedProcessSpec {
        name,
        executable: "/bin/sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        working_directory: None,
        log_file: dir.join(format!("{}.log", name)),
        output: OutputTarget::LogFile,
        monitored,
    }
}

fn supervisor_for(dir: &Path) -> Supervisor {
    let paths = RunPaths::new(dir);
    Supervisor::new(
        Arc::new(FileIntentStore::new(paths.clone())),
        PidRegistry::new(paths),
    )
}

async fn run_with_timeout(supervisor: Supervisor) -> SupervisorReport {
    tokio::time::timeout(Duration::from_secs(10), supervisor.run())
        .await
        .expect("supervisor loop did not drain in time")
}

#[tokio::test]
async fn clean_exit_with_shutdown_intent_stops_for_good() {
    let dir = tempdir().unwrap();
    // The supervised process rewrites its flag to false before a clean
    // exit, the way the command layer signals "shutdown".
    let script = format!(
        "printf false > {}/server.restart; exit 0",
        dir.path().display()
    );
    let mut supervisor = supervisor_for(dir.path());
    supervisor
        .start_monitored(sh_spec(dir.path(), ProcessName::Server, &script, true))
        .await;

    let report = run_with_timeout(supervisor).await;

    let outcome = report.outcome(ProcessName::Server).unwrap();
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.relaunch_count, 0);
}

#[tokio::test]
async fn clean_exit_with_absent_flag_stops_for_good() {
    let dir = tempdir().unwrap();
    let script = format!("rm -f {}/server.restart; exit 0", dir.path().display());
    let mut supervisor = supervisor_for(dir.path());
    supervisor
        .start_monitored(sh_spec(dir.path(), ProcessName::Server, &script, true))
        .await;

    let report = run_with_timeout(supervisor).await;

    let outcome = report.outcome(ProcessName::Server).unwrap();
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(outcome.relaunch_count, 0);
}

#[tokio::test]
async fn crash_is_never_relaunched_even_with_reload_intent() {
    let dir = tempdir().unwrap();
    let mut supervisor = supervisor_for(dir.path());
    supervisor
        .start_monitored(sh_spec(dir.path(), ProcessName::Server, "exit 7", true))
        .await;

    // Launch initialized the intent to true ...
    let raw = std::fs::read_to_string(dir.path().join("server.restart")).unwrap();
    assert_eq!(raw, "true");

    let report = run_with_timeout(supervisor).await;

    // ... and the crash stopped the process anyway, flag untouched.
    let outcome = report.outcome(ProcessName::Server).unwrap();
    assert_eq!(outcome.exit_code, 7);
    assert_eq!(outcome.relaunch_count, 0);
    let raw = std::fs::read_to_string(dir.path().join("server.restart")).unwrap();
    assert_eq!(raw, "true");
}

#[tokio::test]
async fn reload_intent_relaunches_exactly_once_until_crash() {
    let dir = tempdir().unwrap();
    // First incarnation exits cleanly with the reload flag in place; the
    // second finds the marker and crashes, ending supervision. Each
    // incarnation appends its own pid for the pid-record check below.
    let script = format!(
        "echo $$ >> {dir}/incarnations.txt; \
         if [ -f {dir}/marker ]; then exit 1; else touch {dir}/marker; exit 0; fi",
        dir = dir.path().display()
    );
    let mut supervisor = supervisor_for(dir.path());
    supervisor
        .start_monitored(sh_spec(dir.path(), ProcessName::Server, &script, true))
        .await;

    let report = run_with_timeout(supervisor).await;

    let outcome = report.outcome(ProcessName::Server).unwrap();
    assert_eq!(outcome.relaunch_count, 1);
    assert_eq!(outcome.exit_code, 1);

    // The pid record is written on first launch only; the relaunch must
    // not overwrite it.
    let incarnations = std::fs::read_to_string(dir.path().join("incarnations.txt")).unwrap();
    let first_pid = incarnations.lines().next().unwrap().trim();
    assert_eq!(incarnations.lines().count(), 2);
    let recorded = std::fs::read_to_string(dir.path().join("server.pid")).unwrap();
    assert_eq!(recorded.trim(), first_pid);
}

#[tokio::test]
async fn spawn_failure_surfaces_as_synthetic_crash() {
    let dir = tempdir().unwrap();
    let mut supervisor = supervisor_for(dir.path());
    let mut spec = sh_spec(dir.path(), ProcessName::Server, "exit 0", true);
    spec.executable = "/nonexistent/mudhost-server".to_string();
    supervisor.start_monitored(spec).await;

    let report = run_with_timeout(supervisor).await;

    let outcome = report.outcome(ProcessName::Server).unwrap();
    assert_eq!(outcome.exit_code, SYNTHETIC_FAILURE_CODE);
    assert_eq!(outcome.relaunch_count, 0);
}

#[tokio::test]
async fn nothing_monitored_returns_without_blocking() {
    let dir = tempdir().unwrap();
    let supervisor = supervisor_for(dir.path());
    assert_eq!(supervisor.active_count(), 0);

    let report = tokio::time::timeout(Duration::from_secs(1), supervisor.run())
        .await
        .expect("loop should not block with nothing monitored");
    assert!(report.outcomes.is_empty());
}

#[tokio::test]
async fn detached_portal_is_never_waited_on() {
    let dir = tempdir().unwrap();
    let mut supervisor = supervisor_for(dir.path());

    // Portal outlives the whole test; the loop must not care.
    supervisor
        .start_detached(sh_spec(dir.path(), ProcessName::Portal, "sleep 30", false))
        .await
        .unwrap();

    let script = format!(
        "printf false > {}/server.restart; exit 0",
        dir.path().display()
    );
    supervisor
        .start_monitored(sh_spec(dir.path(), ProcessName::Server, &script, true))
        .await;

    let report = run_with_timeout(supervisor).await;

    // Only the monitored Server shows up in the accounting.
    assert!(report.outcome(ProcessName::Server).is_some());
    assert!(report.outcome(ProcessName::Portal).is_none());
    // The daemon's pid was still recorded and its intent pinned to false.
    assert!(dir.path().join("portal.pid").exists());
    let store = FileIntentStore::new(RunPaths::new(dir.path()));
    assert!(!store.get_intent(ProcessName::Portal).await.unwrap());
}

#[tokio::test]
async fn cancellation_drains_the_loop() {
    let dir = tempdir().unwrap();
    let mut supervisor = supervisor_for(dir.path());
    supervisor
        .start_monitored(sh_spec(dir.path(), ProcessName::Server, "sleep 30", true))
        .await;

    let cancel = supervisor.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel.cancel();
    });

    let report = run_with_timeout(supervisor).await;

    let outcome = report.outcome(ProcessName::Server).unwrap();
    assert_eq!(outcome.exit_code, SYNTHETIC_FAILURE_CODE);
    assert_eq!(outcome.relaunch_count, 0);
}

#[tokio::test]
async fn monitor_started_after_cancellation_is_still_killed() {
    let dir = tempdir().unwrap();
    let mut supervisor = supervisor_for(dir.path());

    // Cancel before any monitor exists; a monitor spawned afterwards
    // (the relaunch path does exactly this) must still observe it.
    supervisor.cancel_handle().cancel();
    supervisor
        .start_monitored(sh_spec(dir.path(), ProcessName::Server, "sleep 30", true))
        .await;

    let report = tokio::time::timeout(Duration::from_secs(3), supervisor.run())
        .await
        .expect("cancelled supervisor should drain promptly");

    let outcome = report.outcome(ProcessName::Server).unwrap();
    assert_eq!(outcome.exit_code, SYNTHETIC_FAILURE_CODE);
}

#[tokio::test]
async fn first_launch_rotates_logs_but_relaunch_does_not() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("server.log");
    std::fs::write(&log, "from a previous invocation\n").unwrap();

    // Two incarnations, both logging; rotation must happen exactly once,
    // before the first launch.
    let script = format!(
        "echo alive; \
         if [ -f {dir}/marker ]; then printf false > {dir}/server.restart; fi; \
         touch {dir}/marker; exit 0",
        dir = dir.path().display()
    );
    let mut supervisor = supervisor_for(dir.path());
    supervisor
        .start_monitored(sh_spec(dir.path(), ProcessName::Server, &script, true))
        .await;

    let report = run_with_timeout(supervisor).await;
    assert_eq!(
        report.outcome(ProcessName::Server).unwrap().relaunch_count,
        1
    );

    let old = std::fs::read_to_string(dir.path().join("server.log.old")).unwrap();
    assert_eq!(old, "from a previous invocation\n");
    // Both incarnations appended to the same fresh active log.
    let active = std::fs::read_to_string(&log).unwrap();
    assert_eq!(active.matches("alive").count(), 2);
}
