// tests/supervisor_lifecycle.rs

mod common;
use crate::common::builders::SettingsBuilder;
use crate::common::{fake_supervisor, init_tracing, read_stamp, with_timeout};

use std::time::Duration;

use webext_supervisor::engine::WATCH_FILE_NAME;
use webext_supervisor::errors::SupervisorError;
use webext_supervisor::exec::RunnerMode;

fn settings(dir: &std::path::Path) -> webext_supervisor::config::Settings {
    SettingsBuilder::new(dir)
        .devtools(true)
        .target("firefox-desktop")
        .build()
}

#[tokio::test]
async fn first_update_creates_session_and_spawns_runner() {
    init_tracing();
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();

    with_timeout(sup.update(settings(src.path()))).await.unwrap();

    let session_dir = sup.session_dir().await.expect("session dir exists");
    assert!(session_dir.is_dir());

    let entries: Vec<_> = std::fs::read_dir(&session_dir)
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from(WATCH_FILE_NAME)]);

    let watch_file = session_dir.join(WATCH_FILE_NAME);
    assert!(read_stamp(&watch_file) > 0);

    let invocations = launcher.invocations();
    assert_eq!(invocations.len(), 1);
    let run = &invocations[0];
    assert_eq!(run.mode, RunnerMode::Run);
    assert_eq!(run.program, "web-ext");

    let args = run.args_lossy();
    assert_eq!(args[0], "run");
    assert_eq!(args[1], "--watch-file");
    assert_eq!(args[2], watch_file.to_string_lossy());
    assert!(args.contains(&"--devtools".to_string()));
    assert!(sup.has_process().await);
}

#[tokio::test]
async fn later_updates_only_rewrite_the_watch_file() {
    init_tracing();
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();

    with_timeout(sup.update(settings(src.path()))).await.unwrap();
    let watch_file = sup.session_dir().await.unwrap().join(WATCH_FILE_NAME);
    let first = read_stamp(&watch_file);

    with_timeout(sup.update(settings(src.path()))).await.unwrap();
    let second = read_stamp(&watch_file);

    with_timeout(sup.update(settings(src.path()))).await.unwrap();
    let third = read_stamp(&watch_file);

    assert!(second > first);
    assert!(third > second);
    assert_eq!(launcher.launch_count(), 1);
}

#[tokio::test]
async fn burst_of_updates_spawns_exactly_one_runner() {
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();

    // Submitted back-to-back without awaiting in between.
    let handles: Vec<_> = (0..5).map(|_| sup.update(settings(src.path()))).collect();
    for handle in handles {
        with_timeout(handle).await.unwrap();
    }

    assert_eq!(launcher.launch_count(), 1);
}

#[tokio::test]
async fn kill_removes_dir_and_terminates_runner_once() {
    init_tracing();
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();

    with_timeout(sup.update(settings(src.path()))).await.unwrap();
    let session_dir = sup.session_dir().await.unwrap();

    with_timeout(sup.kill()).await.unwrap();

    assert!(!session_dir.exists());
    assert_eq!(launcher.terminate_count(), 1);
    assert_eq!(
        *launcher.process(0).last_grace.lock().unwrap(),
        Some(Duration::ZERO)
    );
    assert!(sup.is_killed());
    assert!(sup.session_dir().await.is_none());
    assert!(!sup.has_process().await);
    assert!(sup.teardown_errors().is_empty());
}

#[tokio::test]
async fn kill_before_any_update_is_fine() {
    let (sup, launcher) = fake_supervisor();

    with_timeout(sup.kill()).await.unwrap();

    assert_eq!(launcher.launch_count(), 0);
    assert_eq!(launcher.terminate_count(), 0);
}

#[tokio::test]
async fn second_kill_is_rejected() {
    let (sup, _launcher) = fake_supervisor();

    with_timeout(sup.kill()).await.unwrap();
    let err = with_timeout(sup.kill()).await.unwrap_err();

    assert!(matches!(err, SupervisorError::AlreadyKilled));
    assert_eq!(err.to_string(), "Cannot kill twice");
}

#[tokio::test]
async fn updates_after_kill_are_no_ops() {
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();

    with_timeout(sup.kill()).await.unwrap();
    with_timeout(sup.update(settings(src.path()))).await.unwrap();

    assert_eq!(launcher.launch_count(), 0);
    assert!(sup.session_dir().await.is_none());
}

#[tokio::test]
async fn updates_not_yet_started_when_kill_fires_do_nothing() {
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();

    let first = sup.update(settings(src.path()));
    let second = sup.update(settings(src.path()));
    with_timeout(sup.kill()).await.unwrap();

    // Both handles settle without touching the filesystem or the launcher.
    with_timeout(first).await.unwrap();
    with_timeout(second).await.unwrap();

    assert_eq!(launcher.launch_count(), 0);
    assert_eq!(launcher.terminate_count(), 0);
    assert!(sup.session_dir().await.is_none());
    assert!(!sup.has_process().await);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn kill_during_spawn_waits_for_it_and_tears_it_down() {
    init_tracing();
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();
    let gate = launcher.hold_next_launch();

    let update = sup.update(settings(src.path()));
    // The spawn now holds the session lock, with its directory created.
    with_timeout(gate.entered()).await;

    let killer = {
        let sup = sup.clone();
        tokio::spawn(async move { sup.kill().await })
    };
    with_timeout(async {
        while !sup.is_killed() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await;
    assert!(!killer.is_finished());

    gate.release();
    with_timeout(killer).await.unwrap().unwrap();
    with_timeout(update).await.unwrap();

    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(launcher.terminate_count(), 1);

    let watch_file = std::path::PathBuf::from(&launcher.invocations()[0].args[2]);
    let session_dir = watch_file.parent().unwrap();
    assert!(!session_dir.exists());
    assert!(sup.session_dir().await.is_none());
    assert!(!sup.has_process().await);
    assert!(sup.teardown_errors().is_empty());
}

#[tokio::test]
async fn failed_termination_still_clears_state() {
    init_tracing();
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();
    launcher.fail_terminations();

    with_timeout(sup.update(settings(src.path()))).await.unwrap();
    let session_dir = sup.session_dir().await.unwrap();

    let err = with_timeout(sup.kill()).await.unwrap_err();
    assert!(err.to_string().contains("fake terminate failure"));

    assert!(!session_dir.exists());
    assert!(!sup.has_process().await);
    let recorded = sup.teardown_errors();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].starts_with("terminate runner"));
}

#[tokio::test]
async fn launch_failure_is_reported_through_the_update_handle() {
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();
    launcher.fail_launches("runner binary not found");

    let err = with_timeout(sup.update(settings(src.path()))).await.unwrap_err();
    assert!(err.to_string().contains("runner binary not found"));
    assert!(!sup.has_process().await);

    // Teardown still removes the directory the failed spawn created.
    let session_dir = sup.session_dir().await;
    with_timeout(sup.kill()).await.unwrap();
    if let Some(dir) = session_dir {
        assert!(!dir.exists());
    }
}

#[tokio::test]
async fn update_without_dir_fails_and_spawns_nothing() {
    let (sup, launcher) = fake_supervisor();

    let err = with_timeout(sup.update(SettingsBuilder::without_dir().build()))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("Missing dir setting"));
    assert_eq!(launcher.launch_count(), 0);
    with_timeout(sup.kill()).await.unwrap();
}

#[tokio::test]
async fn build_is_detached_from_the_session() {
    let src = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();

    let build_settings = SettingsBuilder::new(src.path())
        .bundle_filename("ext.zip")
        .bundle_dir(&out.path().to_string_lossy())
        .build();

    let build = sup.build(&build_settings).unwrap().expect("build started");
    let summary = with_timeout(build.wait()).await.unwrap();
    assert!(summary.success);

    let invocations = launcher.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].mode, RunnerMode::Build);
    assert!(sup.session_dir().await.is_none());

    // Kill never touches the build process.
    with_timeout(sup.kill()).await.unwrap();
    assert_eq!(launcher.terminate_count(), 0);
}

#[tokio::test]
async fn build_reports_runner_exit_code() {
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();
    launcher.exit_with(2);

    let build = sup
        .build(&SettingsBuilder::new(src.path()).build())
        .unwrap()
        .expect("build started");
    let summary = with_timeout(build.wait()).await.unwrap();

    assert!(!summary.success);
    assert_eq!(summary.code, Some(2));
}

#[tokio::test]
async fn build_after_kill_starts_nothing() {
    let src = tempfile::tempdir().unwrap();
    let (sup, launcher) = fake_supervisor();

    with_timeout(sup.kill()).await.unwrap();
    let build = sup.build(&SettingsBuilder::new(src.path()).build()).unwrap();

    assert!(build.is_none());
    assert_eq!(launcher.launch_count(), 0);
}
