// ABOUTME: Integration tests for the deployment orchestrator.
// ABOUTME: Drives full runs against fake build and transport collaborators.

mod support;

use ferry::build::BuildError;
use ferry::deploy::{DeployError, DeployErrorKind, DeployState, Outcome};
use ferry::resolve::ResolutionErrorKind;
use ferry::transport::{Phase, TransportCause};
use std::time::Duration;
use support::{Call, FakeTransport, Harness, KEY_MATERIAL, fast_options, target};

use DeployState::*;

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn clean_run_emits_exact_state_sequence() {
    let h = Harness::new();

    let report = h.orchestrator.run(&target("prod"), &fast_options(3)).await;

    assert!(report.succeeded(), "unexpected error: {:?}", report.error);
    assert_eq!(
        h.events.states(),
        vec![Idle, Building, Resolving, Transferring, Restarting, Succeeded]
    );
    assert_eq!(report.state(), Succeeded);
    assert_eq!(report.exit_code(), 0);
}

#[tokio::test]
async fn prod_deploy_copies_twelve_files_and_restarts_apache() {
    let h = Harness::builder().files(12).build();

    let report = h.orchestrator.run(&target("prod"), &fast_options(3)).await;

    assert!(report.succeeded());
    assert_eq!(
        h.transport.calls(),
        vec![
            Call::Transfer {
                target: "prod".into(),
                remote_path: "/var/www/html".into(),
                files: 12,
            },
            Call::Exec {
                target: "prod".into(),
                command: "systemctl restart apache2".into(),
            },
        ]
    );
    assert_eq!(report.artifact.as_ref().unwrap().file_count, 12);
    assert_eq!(report.transfer.as_ref().unwrap().files, 12);
    assert!(report.restart.as_ref().unwrap().ok);

    let attempt = &report.attempt;
    assert_eq!(attempt.outcome, Outcome::Success);
    assert_eq!(attempt.transfer_attempts, 1);
    assert_eq!(attempt.restart_attempts, 1);
    assert!(attempt.finished_at.is_some());
    assert_eq!(
        attempt.artifact_hash.as_deref(),
        Some(report.artifact.as_ref().unwrap().hash.as_str())
    );
}

#[tokio::test]
async fn credential_reaches_transport_but_not_records() {
    let h = Harness::new();

    let report = h.orchestrator.run(&target("prod"), &fast_options(3)).await;

    assert!(h.transport.saw_credential(KEY_MATERIAL));
    let record = serde_json::to_string(&report.attempt).unwrap();
    assert!(!record.contains("fake-key-for-tests"));
    for event in h.events.events() {
        let json = serde_json::to_string(&event).unwrap();
        assert!(!json.contains("fake-key-for-tests"));
    }
}

#[tokio::test]
async fn rerun_with_same_artifact_is_idempotent() {
    let h = Harness::new();
    let prod = target("prod");

    let first = h.orchestrator.run(&prod, &fast_options(3)).await;
    let after_first = h.transport.remote_hash("prod");
    let second = h.orchestrator.run(&prod, &fast_options(3)).await;

    assert!(first.succeeded());
    assert!(second.succeeded());
    assert_eq!(after_first, h.transport.remote_hash("prod"));
    assert_eq!(first.attempt.artifact_hash, second.attempt.artifact_hash);
    assert_ne!(first.run_id(), second.run_id());
    assert_eq!(h.attempts.completed().len(), 2);
}

// =============================================================================
// Build and resolution failures
// =============================================================================

#[tokio::test]
async fn failing_test_step_stops_build_without_transfer() {
    let h = Harness::builder().failing_build_step("npm test").build();

    let report = h.orchestrator.run(&target("prod"), &fast_options(3)).await;

    assert_eq!(h.runner.calls(), vec!["npm install", "npm test"]);
    assert_eq!(h.transport.transfer_count(), 0);
    assert_eq!(h.events.states(), vec![Idle, Building, Failed]);
    assert_eq!(report.exit_code(), 10);
    assert_eq!(report.failed_at, Some(Building));

    match report.error {
        Some(DeployError::Build(BuildError::CommandFailed {
            ref stage,
            exit_code,
            ref output,
        })) => {
            assert_eq!(stage, "npm test");
            assert_eq!(exit_code, Some(1));
            assert!(output.contains("1 failed"));
        }
        other => panic!("expected build failure, got {other:?}"),
    }
    assert_eq!(report.attempt.error_kind, Some(DeployErrorKind::Build));
}

#[tokio::test]
async fn empty_artifact_fails_verification() {
    let h = Harness::builder().files(0).build();

    let report = h.orchestrator.run(&target("prod"), &fast_options(3)).await;

    match &report.error {
        Some(DeployError::Build(err)) => assert_eq!(err.stage(), "verify"),
        other => panic!("expected verify failure, got {other:?}"),
    }
    assert_eq!(h.transport.transfer_count(), 0);
}

#[tokio::test]
async fn missing_secret_fails_resolution() {
    let h = Harness::builder().without_secret().build();

    let report = h.orchestrator.run(&target("prod"), &fast_options(3)).await;

    match &report.error {
        Some(DeployError::Resolution(err)) => {
            assert_eq!(err.kind, ResolutionErrorKind::SecretUnavailable);
        }
        other => panic!("expected resolution failure, got {other:?}"),
    }
    assert_eq!(report.exit_code(), 11);
    assert_eq!(h.events.states(), vec![Idle, Building, Resolving, Failed]);
    assert_eq!(h.transport.transfer_count(), 0);
}

#[tokio::test]
async fn unknown_target_fails_resolution() {
    let h = Harness::new();

    let report = h.orchestrator.run(&target("qa"), &fast_options(3)).await;

    match &report.error {
        Some(DeployError::Resolution(err)) => {
            assert_eq!(err.kind, ResolutionErrorKind::UnknownTarget);
        }
        other => panic!("expected resolution failure, got {other:?}"),
    }
}

// =============================================================================
// Retry
// =============================================================================

#[tokio::test]
async fn copy_succeeds_when_attempts_needed_within_bound() {
    for needed in 1..=3u32 {
        let h = Harness::builder()
            .transport(FakeTransport::new().failing_copies(needed - 1))
            .build();

        let report = h.orchestrator.run(&target("prod"), &fast_options(3)).await;

        assert!(report.succeeded(), "needed {needed}: {:?}", report.error);
        assert_eq!(h.transport.transfer_count(), needed as usize);
        assert_eq!(report.attempt.transfer_attempts, needed);
        assert_eq!(h.transport.exec_count(), 1);
        assert_eq!(
            h.events.transitions(),
            vec![Idle, Building, Resolving, Transferring, Restarting, Succeeded]
        );
    }
}

#[tokio::test]
async fn copy_fails_after_exhausting_attempts() {
    let h = Harness::builder()
        .transport(FakeTransport::new().failing_copies(4))
        .build();

    let report = h.orchestrator.run(&target("prod"), &fast_options(3)).await;

    assert_eq!(h.transport.transfer_count(), 3);
    assert_eq!(h.transport.exec_count(), 0);
    assert_eq!(report.exit_code(), 12);
    match &report.error {
        Some(DeployError::Transport { source, attempts }) => {
            assert_eq!(*attempts, 3);
            assert_eq!(source.phase, Phase::Copy);
            assert!(matches!(source.cause, TransportCause::Connection(_)));
        }
        other => panic!("expected transport failure, got {other:?}"),
    }
    assert_eq!(
        h.events.states(),
        vec![
            Idle,
            Building,
            Resolving,
            Transferring,
            Transferring,
            Transferring,
            Failed
        ]
    );
}

#[tokio::test]
async fn retried_copies_carry_attempt_numbers() {
    let h = Harness::builder()
        .transport(FakeTransport::new().failing_copies(2))
        .build();

    h.orchestrator.run(&target("prod"), &fast_options(3)).await;

    let attempts: Vec<Option<u32>> = h
        .events
        .events()
        .iter()
        .filter(|e| e.state == Transferring)
        .map(|e| e.attempt)
        .collect();
    assert_eq!(attempts, vec![Some(1), Some(2), Some(3)]);
}

#[tokio::test]
async fn slow_copy_times_out() {
    let h = Harness::builder()
        .transport(FakeTransport::new().with_copy_delay(Duration::from_millis(500)))
        .build();
    let mut options = fast_options(1);
    options.timeout = Duration::from_millis(20);

    let report = h.orchestrator.run(&target("prod"), &options).await;

    match &report.error {
        Some(DeployError::Transport { source, attempts }) => {
            assert_eq!(source.cause, TransportCause::Timeout);
            assert_eq!(*attempts, 1);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn timeout_bounds_all_copy_attempts_together() {
    // Each copy fits the timeout on its own, but two of them do not.
    let h = Harness::builder()
        .transport(
            FakeTransport::new()
                .failing_copies(2)
                .with_copy_delay(Duration::from_millis(300)),
        )
        .build();
    let mut options = fast_options(3);
    options.timeout = Duration::from_millis(500);

    let report = h.orchestrator.run(&target("prod"), &options).await;

    assert_eq!(report.state(), Failed);
    assert_eq!(h.transport.exec_count(), 0);
    match &report.error {
        Some(DeployError::Transport { source, attempts }) => {
            assert_eq!(source.phase, Phase::Copy);
            assert_eq!(source.cause, TransportCause::Timeout);
            assert_eq!(*attempts, 2);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn restart_shares_the_copy_deadline() {
    let h = Harness::builder()
        .transport(
            FakeTransport::new()
                .with_copy_delay(Duration::from_millis(300))
                .with_restart_delay(Duration::from_millis(300)),
        )
        .build();
    let mut options = fast_options(3);
    options.timeout = Duration::from_millis(500);

    let report = h.orchestrator.run(&target("prod"), &options).await;

    assert_eq!(h.transport.transfer_count(), 1);
    assert_eq!(report.failed_at, Some(Restarting));
    match &report.error {
        Some(DeployError::Transport { source, .. }) => {
            assert_eq!(source.phase, Phase::Restart);
            assert_eq!(source.cause, TransportCause::Timeout);
        }
        other => panic!("expected restart timeout, got {other:?}"),
    }
}

// =============================================================================
// Restart
// =============================================================================

#[tokio::test]
async fn restart_failure_is_terminal_and_never_recopies() {
    let h = Harness::builder()
        .transport(
            FakeTransport::new().with_restart_exit(1, "Job for apache2.service failed"),
        )
        .build();

    let report = h.orchestrator.run(&target("prod"), &fast_options(3)).await;

    assert_eq!(h.transport.transfer_count(), 1);
    assert_eq!(h.transport.exec_count(), 1);
    assert_eq!(report.exit_code(), 13);
    assert_eq!(report.failed_at, Some(Restarting));
    match &report.error {
        Some(DeployError::Restart { exit_code, output }) => {
            assert_eq!(*exit_code, 1);
            assert!(output.contains("apache2.service"));
        }
        other => panic!("expected restart failure, got {other:?}"),
    }
    assert_eq!(
        h.events.states(),
        vec![Idle, Building, Resolving, Transferring, Restarting, Failed]
    );
}

// =============================================================================
// Dry run, cancellation, locking
// =============================================================================

#[tokio::test]
async fn dry_run_stops_after_resolving() {
    let h = Harness::new();
    let mut options = fast_options(3);
    options.dry_run = true;

    let report = h.orchestrator.run(&target("prod"), &options).await;

    assert!(report.succeeded());
    assert!(report.attempt.dry_run);
    assert!(h.transport.calls().is_empty());
    assert_eq!(h.events.states(), vec![Idle, Building, Resolving, Succeeded]);
}

#[tokio::test]
async fn cancelled_before_start_runs_nothing() {
    let h = Harness::new();
    let options = fast_options(3);
    options.cancel.cancel();

    let report = h.orchestrator.run(&target("prod"), &options).await;

    assert!(h.runner.calls().is_empty());
    assert_eq!(report.exit_code(), 15);
    assert!(matches!(
        report.error,
        Some(DeployError::Cancelled { state: Idle })
    ));
    assert_eq!(h.events.states(), vec![Idle, Failed]);
}

#[tokio::test]
async fn cancel_during_backoff_stops_retrying() {
    let h = Harness::builder()
        .transport(FakeTransport::new().failing_copies(10))
        .build();
    let mut options = fast_options(5);
    options.retry.base = Duration::from_secs(30);
    options.retry.cap = Duration::from_secs(30);
    options.timeout = Duration::from_secs(120);

    let cancel = options.cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        h.orchestrator.run(&target("prod"), &options),
    )
    .await
    .expect("cancellation should interrupt the backoff sleep");

    assert_eq!(h.transport.transfer_count(), 1);
    assert!(matches!(
        report.error,
        Some(DeployError::Cancelled {
            state: Transferring
        })
    ));
    assert_eq!(report.attempt.outcome, Outcome::Failure);
}

#[tokio::test]
async fn held_lock_fails_with_conflict() {
    let h = Harness::new();
    let prod = target("prod");
    let _held = h
        .locks
        .acquire(&prod, Duration::from_secs(1), false)
        .await
        .unwrap();
    let mut options = fast_options(3);
    options.lock_timeout = Duration::from_millis(50);

    let report = h.orchestrator.run(&prod, &options).await;

    assert_eq!(report.exit_code(), 14);
    assert!(matches!(report.error, Some(DeployError::Conflict(_))));
    assert_eq!(h.transport.transfer_count(), 0);
    assert_eq!(report.failed_at, Some(Resolving));
}

#[tokio::test]
async fn concurrent_runs_on_one_target_are_serialized() {
    let h = Harness::builder()
        .transport(FakeTransport::new().with_copy_delay(Duration::from_millis(100)))
        .build();

    let runs: Vec<_> = (0..3)
        .map(|_| {
            let orchestrator = h.orchestrator.clone();
            tokio::spawn(async move {
                orchestrator
                    .run(&target("prod"), &fast_options(3))
                    .await
            })
        })
        .collect();

    for run in runs {
        let report = run.await.unwrap();
        assert!(report.succeeded(), "{:?}", report.error);
    }
    assert_eq!(h.transport.transfer_count(), 3);
    assert_eq!(h.transport.max_in_flight(), 1);
}

#[tokio::test]
async fn runs_on_different_targets_proceed_independently() {
    let h = Harness::builder()
        .transport(FakeTransport::new().with_copy_delay(Duration::from_millis(200)))
        .build();
    let prod = h.orchestrator.clone();
    let staging = h.orchestrator.clone();

    let (a, b) = tokio::join!(
        async move { prod.run(&target("prod"), &fast_options(1)).await },
        async move { staging.run(&target("staging"), &fast_options(1)).await },
    );

    assert!(a.succeeded(), "{:?}", a.error);
    assert!(b.succeeded(), "{:?}", b.error);
    assert_eq!(h.transport.max_in_flight(), 2);
}

// =============================================================================
// Attempt log
// =============================================================================

#[tokio::test]
async fn terminal_attempts_are_appended_to_state_dir() {
    let h = Harness::builder()
        .persist_attempts()
        .transport(FakeTransport::new().with_restart_exit(3, "boom"))
        .build();

    h.orchestrator.run(&target("prod"), &fast_options(3)).await;
    h.orchestrator.run(&target("staging"), &fast_options(3)).await;

    let path = h.attempts.path().unwrap().to_path_buf();
    let recorded = ferry::deploy::AttemptLog::read_file(&path).unwrap();
    assert_eq!(recorded.len(), 2);
    assert!(recorded.iter().all(|a| a.outcome == Outcome::Failure));
    assert!(
        recorded
            .iter()
            .all(|a| a.error_kind == Some(DeployErrorKind::Restart))
    );
    assert_eq!(recorded[1].target_id.as_str(), "staging");
}
