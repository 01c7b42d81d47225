//! Environment dashboard tests

mod support;

use std::sync::Arc;

use tokio_test::{assert_err, assert_ok};

use pipedash::app::options::CacheOptions;
use pipedash::app::state::AppState;
use pipedash::controller::Options;
use pipedash::errors::{DashboardError, GatewayError};
use pipedash::gateway::PipelineGateway;
use pipedash::models::pipeline::{LogBundle, LogLocation, Pipeline, Status};

use support::{definition, environment, state, Calls, FakeGateway};

fn listing(names: &[&str]) -> Vec<Pipeline> {
    names.iter().map(|name| Pipeline::summary(*name, 1)).collect()
}

fn app_state(gateway: Arc<FakeGateway>) -> AppState {
    let gateway: Arc<dyn PipelineGateway> = gateway;
    AppState::with_gateways(
        vec![(environment("prod"), gateway)],
        &Options::default(),
        CacheOptions::default(),
        false,
    )
}

#[tokio::test]
async fn test_load_mounts_a_controller_per_pipeline() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.set_listed(Ok(listing(&["web", "api", "worker"])));
    let state = app_state(gateway.clone());
    let dashboard = assert_ok!(state.dashboard("prod"));

    let listed = assert_ok!(dashboard.load().await);

    assert_eq!(listed.len(), 3);
    assert!(!dashboard.is_loading());
    let names: Vec<String> = dashboard
        .controllers()
        .await
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(names, vec!["api", "web", "worker"]);
    assert_eq!(
        dashboard.controller("web").await.unwrap().environment(),
        "prod"
    );
}

#[tokio::test]
async fn test_reload_drops_vanished_pipelines() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.set_listed(Ok(listing(&["web", "api"])));
    let state = app_state(gateway.clone());
    let dashboard = assert_ok!(state.dashboard("prod"));
    assert_ok!(dashboard.load().await);
    let old_web = dashboard.controller("web").await.unwrap();

    gateway.set_listed(Ok(listing(&["web", "batch"])));
    assert_ok!(dashboard.load().await);

    assert!(dashboard.controller("api").await.is_none());
    assert!(dashboard.controller("batch").await.is_some());
    // surviving controllers are kept as they are
    assert!(Arc::ptr_eq(&old_web, &dashboard.controller("web").await.unwrap()));
}

#[tokio::test]
async fn test_failed_listing_keeps_previous_list() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.set_listed(Ok(listing(&["web"])));
    let state = app_state(gateway.clone());
    let dashboard = assert_ok!(state.dashboard("prod"));
    assert_ok!(dashboard.load().await);

    gateway.set_listed(Err(GatewayError::Transport("unreachable".to_string())));
    assert_err!(dashboard.load().await);

    assert_eq!(dashboard.search("").await.len(), 1);
    assert!(dashboard.controller("web").await.is_some());
}

#[tokio::test]
async fn test_search_is_name_containment() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.set_listed(Ok(listing(&["web-frontend", "web-backend", "billing"])));
    let state = app_state(gateway);
    let dashboard = assert_ok!(state.dashboard("prod"));
    assert_ok!(dashboard.load().await);

    assert_eq!(dashboard.search("").await.len(), 3);
    assert_eq!(dashboard.search("web").await.len(), 2);
    assert_eq!(dashboard.search("end").await.len(), 2);
    assert_eq!(dashboard.search("bill").await[0].name, "billing");
    assert!(dashboard.search("Web").await.is_empty());
}

#[tokio::test]
async fn test_unmount_shuts_controller_down() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.set_listed(Ok(listing(&["web"])));
    let state = app_state(gateway);
    let dashboard = assert_ok!(state.dashboard("prod"));
    assert_ok!(dashboard.load().await);
    let controller = dashboard.controller("web").await.unwrap();

    assert!(dashboard.unmount("web").await);

    assert!(controller.is_cancelled());
    assert!(dashboard.controller("web").await.is_none());
    assert!(!dashboard.unmount("web").await);
}

#[tokio::test]
async fn test_reload_resets_adaptive_state() {
    let gateway = Arc::new(FakeGateway::with_pipeline(
        definition("web"),
        state("web", Status::InProgress),
    ));
    let app = app_state(gateway.clone());
    let dashboard = assert_ok!(app.dashboard("prod"));
    assert_ok!(dashboard.load().await);
    dashboard.poll_all().await;

    let before = dashboard.controller("web").await.unwrap();
    assert_eq!(before.status().await.refresh_interval_ms, 5_000);

    assert_ok!(dashboard.reload().await);

    let after = dashboard.controller("web").await.unwrap();
    assert!(before.is_cancelled());
    assert!(!Arc::ptr_eq(&before, &after));
    let status = after.status().await;
    assert!(status.snapshot.is_none());
    assert!(status.is_loading);
    assert_eq!(status.refresh_interval_ms, 60_000);
    assert_eq!(Calls::get(&gateway.calls.list), 2);
}

#[tokio::test]
async fn test_build_logs() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.log_locations.lock().unwrap().insert(
        "build-1".to_string(),
        Ok(LogLocation {
            log_group: "/aws/codebuild/web".to_string(),
            log_stream: "build-1".to_string(),
        }),
    );
    *gateway.log_lines.lock().unwrap() = Some(Ok(LogBundle {
        lines: vec![
            "2024-03-01, 2:05 PM: npm install\n".to_string(),
            "2024-03-01, 2:06 PM: npm test\n".to_string(),
        ],
        log_group: "/aws/codebuild/web".to_string(),
        log_stream: "build-1".to_string(),
    }));
    let state = app_state(gateway.clone());
    let dashboard = assert_ok!(state.dashboard("prod"));

    let bundle = dashboard.build_logs("build-1").await.unwrap();
    assert_eq!(
        bundle.to_preformatted(),
        "2024-03-01, 2:05 PM: npm install\n2024-03-01, 2:06 PM: npm test\n"
    );

    // unknown build: the location lookup fails and no log fetch is made
    assert!(dashboard.build_logs("build-2").await.is_none());
    assert_eq!(Calls::get(&gateway.calls.log_location), 2);
    assert_eq!(Calls::get(&gateway.calls.log_lines), 1);
}

#[tokio::test]
async fn test_unknown_environment() {
    let state = app_state(Arc::new(FakeGateway::new()));

    let err = state.dashboard("staging").err().unwrap();
    assert!(matches!(err, DashboardError::UnknownEnvironment(name) if name == "staging"));
}

#[tokio::test]
async fn test_shutdown_stops_every_controller() {
    let gateway = Arc::new(FakeGateway::new());
    gateway.set_listed(Ok(listing(&["web", "api"])));
    let state = app_state(gateway);
    state.load_all().await;
    let dashboard = assert_ok!(state.dashboard("prod")).clone();
    let controllers = dashboard.controllers().await;
    assert_eq!(controllers.len(), 2);

    assert_ok!(state.shutdown().await);

    assert!(controllers.iter().all(|c| c.is_cancelled()));
    assert!(dashboard.controllers().await.is_empty());
}
