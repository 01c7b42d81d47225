//! Refresh controller tests

mod support;

use std::sync::Arc;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use pipedash::cache::timed::TimedCache;
use pipedash::controller::{Options, PipelineController};
use pipedash::errors::GatewayError;
use pipedash::gateway::pipelines::EXECUTION_DETAILS_MISSING;
use pipedash::models::pipeline::{Artifact, Pipeline, Status};

use support::{artifact, definition, state, Calls, FakeGateway};

struct Fixture {
    gateway: Arc<FakeGateway>,
    pipelines: Arc<TimedCache<Pipeline>>,
    artifacts: Arc<TimedCache<Artifact>>,
    controller: Arc<PipelineController>,
}

fn fixture_with(build: Status, options: Options) -> Fixture {
    let gateway = Arc::new(FakeGateway::with_pipeline(definition("web"), state("web", build)));
    let pipelines = Arc::new(TimedCache::new(Duration::from_secs(1), 100));
    let artifacts = Arc::new(TimedCache::new(Duration::from_secs(1), 100));

    let controller = Arc::new(PipelineController::new(
        "web",
        "prod",
        gateway.clone(),
        pipelines.bucket("prod"),
        artifacts.bucket("prod"),
        options,
    ));

    Fixture {
        gateway,
        pipelines,
        artifacts,
        controller,
    }
}

fn fixture(build: Status) -> Fixture {
    fixture_with(build, Options::default())
}

#[tokio::test]
async fn test_fetch_within_ttl_issues_one_call_pair() {
    let f = fixture(Status::Succeeded);

    let first = assert_ok!(f.controller.fetch_once(false).await);
    let second = assert_ok!(f.controller.fetch_once(false).await);

    assert_eq!(first, second);
    assert_eq!(f.gateway.fetch_pairs(), 1);
    assert!(f.pipelines.bucket("prod").get("web").is_some());
}

#[tokio::test]
async fn test_forced_fetch_always_calls_upstream() {
    let f = fixture(Status::Succeeded);

    assert_ok!(f.controller.fetch_once(true).await);
    assert_ok!(f.controller.fetch_once(true).await);

    assert_eq!(f.gateway.fetch_pairs(), 2);
}

#[tokio::test]
async fn test_cached_snapshot_is_not_visible_to_other_environments() {
    let f = fixture(Status::Succeeded);

    assert_ok!(f.controller.fetch_once(false).await);

    assert!(f.pipelines.bucket("staging").get("web").is_none());
}

#[tokio::test]
async fn test_first_cycle_merges_and_speeds_up() {
    let f = fixture(Status::InProgress);
    assert!(f.controller.is_loading().await);
    assert_eq!(f.controller.refresh_interval().await, Duration::from_secs(60));

    let snapshot = f.controller.poll_once().await.unwrap();

    assert_eq!(snapshot.stages[0].status, Some(Status::Succeeded));
    assert_eq!(snapshot.stages[1].status, Some(Status::InProgress));
    assert_eq!(snapshot.stages[0].actions[0].repo.as_deref(), Some("web-app"));
    assert_eq!(f.controller.refresh_interval().await, Duration::from_millis(5_000));
    assert!(!f.controller.is_loading().await);
    assert_eq!(f.controller.snapshot().await, Some(snapshot));
}

#[tokio::test]
async fn test_interval_slows_down_when_activity_stops() {
    let f = fixture(Status::InProgress);
    f.controller.poll_once().await;
    assert_eq!(f.controller.refresh_interval().await, Duration::from_secs(5));

    f.gateway.set_state("web", Ok(state("web", Status::Succeeded)));
    f.controller.force_refresh().await;
    f.controller.poll_once().await;

    assert_eq!(f.controller.refresh_interval().await, Duration::from_secs(60));
    assert!(!f.controller.is_force_pending().await);
}

#[tokio::test]
async fn test_restart_forces_next_cycle_past_fresh_cache() {
    let f = fixture(Status::Succeeded);
    f.controller.poll_once().await;
    assert_eq!(f.gateway.fetch_pairs(), 1);

    assert_ok!(f.controller.restart().await);
    assert!(f.controller.is_force_pending().await);
    assert!(f.pipelines.bucket("prod").get("web").is_some());

    f.controller.poll_once().await;

    assert_eq!(Calls::get(&f.gateway.calls.start), 1);
    assert_eq!(f.gateway.fetch_pairs(), 2);
    assert!(!f.controller.is_force_pending().await);
}

#[tokio::test]
async fn test_failed_restart_still_forces_refresh() {
    let f = fixture(Status::Succeeded);
    f.gateway.set_start_result(Err(GatewayError::Service {
        kind: Some("PipelineNotFoundException".to_string()),
        message: "pipeline web does not exist".to_string(),
    }));

    let err = assert_err!(f.controller.restart().await);

    assert_eq!(err.message(), "pipeline web does not exist");
    assert!(f.controller.is_force_pending().await);
}

#[tokio::test]
async fn test_failed_refresh_keeps_snapshot() {
    let f = fixture(Status::InProgress);
    let good = f.controller.poll_once().await;
    assert!(good.is_some());

    f.gateway
        .set_state("web", Err(GatewayError::Transport("connection reset".to_string())));
    f.controller.force_refresh().await;
    assert!(f.controller.poll_once().await.is_none());

    let status = f.controller.status().await;
    assert_eq!(status.snapshot, good);
    assert!(status.stale_since.is_some());
    assert_eq!(status.last_error.as_deref(), Some("connection reset"));
    // interval stays where the last good snapshot put it
    assert_eq!(status.refresh_interval_ms, 5_000);
    // the forced fetch did not happen, so it is still owed
    assert!(f.controller.is_force_pending().await);

    f.gateway.set_state("web", Ok(state("web", Status::Succeeded)));
    f.controller.poll_once().await;

    let status = f.controller.status().await;
    assert!(status.stale_since.is_none());
    assert!(status.last_error.is_none());
}

#[tokio::test]
async fn test_failure_before_first_snapshot_clears_loading() {
    let f = fixture(Status::Succeeded);
    f.gateway.set_definition("web", Err(GatewayError::missing("no pipeline")));

    assert!(f.controller.poll_once().await.is_none());

    let status = f.controller.status().await;
    assert!(!status.is_loading);
    assert!(status.snapshot.is_none());
    assert!(status.stale_since.is_none());
    assert_eq!(status.last_error.as_deref(), Some("no pipeline"));
}

#[tokio::test]
async fn test_shutdown_discards_in_flight_result() {
    let f = fixture_with(
        Status::InProgress,
        Options {
            fetch_timeout: None,
            ..Options::default()
        },
    );
    let gate = f.gateway.gate_states();

    let controller = f.controller.clone();
    let cycle = tokio::spawn(async move { controller.poll_once().await });

    while Calls::get(&f.gateway.calls.state) == 0 {
        tokio::task::yield_now().await;
    }
    f.controller.shutdown();
    gate.notify_one();

    assert!(cycle.await.unwrap().is_none());
    assert!(f.controller.snapshot().await.is_none());
    assert!(f.controller.is_loading().await);
    assert!(f.pipelines.bucket("prod").get("web").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_slow_fetch_times_out() {
    let f = fixture_with(
        Status::Succeeded,
        Options {
            fetch_timeout: Some(Duration::from_secs(30)),
            ..Options::default()
        },
    );
    // never released: paused time jumps straight to the deadline
    let _gate = f.gateway.gate_states();

    let err = assert_err!(f.controller.fetch_once(true).await);

    assert_eq!(err, GatewayError::Timeout(Duration::from_secs(30)));
}

#[tokio::test(start_paused = true)]
async fn test_run_loop_polls_until_shutdown() {
    let f = fixture(Status::InProgress);
    let handle = f.controller.spawn();

    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(f.gateway.fetch_pairs(), 1);

    // cache TTL (10s) outlives the 5s interval, so the second cycle is a hit
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(f.gateway.fetch_pairs(), 1);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(f.gateway.fetch_pairs(), 2);

    f.controller.force_refresh().await;
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(f.gateway.fetch_pairs(), 3);

    f.controller.shutdown();
    handle.await.unwrap();
    assert!(f.controller.is_cancelled());
}

#[tokio::test]
async fn test_retry_stage_uses_snapshot_execution() {
    let f = fixture(Status::Failed);
    f.controller.poll_once().await;

    assert_ok!(f.controller.retry_stage("Build").await);

    let retries = f.gateway.retries.lock().unwrap().clone();
    assert_eq!(
        retries,
        vec![("web".to_string(), "exec-1".to_string(), "Build".to_string())]
    );
    assert!(f.controller.is_force_pending().await);
}

#[tokio::test]
async fn test_retry_unknown_stage_fails_without_refresh() {
    let f = fixture(Status::Failed);
    f.controller.poll_once().await;

    let err = assert_err!(f.controller.retry_stage("Deploy").await);

    assert!(err.is_missing_data());
    assert!(f.gateway.retries.lock().unwrap().is_empty());
    assert!(!f.controller.is_force_pending().await);
}

#[tokio::test]
async fn test_retry_of_stage_that_has_not_failed_is_refused() {
    let f = fixture(Status::InProgress);
    f.controller.poll_once().await;

    let err = assert_err!(f.controller.retry_stage("Source").await);
    assert!(err.is_missing_data());
    assert_eq!(err.message(), "stage Source has not failed");

    assert_err!(f.controller.retry_stage("Build").await);
    assert!(f.gateway.retries.lock().unwrap().is_empty());
    assert!(!f.controller.is_force_pending().await);
}

#[tokio::test]
async fn test_missing_artifact_is_not_cached() {
    let f = fixture(Status::Succeeded);
    f.controller.poll_once().await;
    f.gateway
        .set_artifact("exec-1", Err(GatewayError::missing(EXECUTION_DETAILS_MISSING)));

    let err = assert_err!(f.controller.stage_artifact("Source").await);
    assert_eq!(err.message(), "could not find execution details");
    assert!(f.artifacts.bucket("prod").get("exec-1").is_none());

    f.gateway.set_artifact("exec-1", Ok(artifact("abc123")));
    let found = assert_ok!(f.controller.stage_artifact("Source").await);
    assert_eq!(found.id, "abc123");

    // served from the cache now
    assert_ok!(f.controller.stage_artifact("Source").await);
    assert_eq!(Calls::get(&f.gateway.calls.artifact), 2);
}
