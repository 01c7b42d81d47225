//! HTTP gateway tests against a local stand-in for the upstream services

mod support;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Router,
};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

use pipedash::cache::timed::TimedCache;
use pipedash::controller::build_logs::fetch_build_logs;
use pipedash::controller::{Options, PipelineController};
use pipedash::gateway::pipelines::MAX_LIST_PAGES;
use pipedash::gateway::{HttpGateway, PipelineGateway};
use pipedash::models::environment::Endpoints;
use pipedash::models::pipeline::Status;

use support::environment;

/// One request as seen by the stand-in
#[derive(Debug, Clone)]
struct Recorded {
    target: String,
    content_type: String,
    authorization: String,
    body: Value,
}

type Recorder = Arc<Mutex<Vec<Recorded>>>;

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn definition_body() -> Value {
    json!({
        "pipeline": {
            "name": "web",
            "version": 3,
            "stages": [
                {
                    "name": "Source",
                    "actions": [{
                        "name": "Checkout",
                        "actionTypeId": {"category": "Source", "owner": "ThirdParty", "provider": "GitHub", "version": "1"},
                        "configuration": {"Repo": "web-app", "Branch": "main"}
                    }]
                },
                {
                    "name": "Build",
                    "actions": [{
                        "name": "Compile",
                        "actionTypeId": {"category": "Build", "owner": "AWS", "provider": "CodeBuild", "version": "1"},
                        "configuration": {"ProjectName": "web"}
                    }]
                }
            ]
        }
    })
}

fn state_body() -> Value {
    // stages deliberately listed in reverse
    json!({
        "pipelineName": "web",
        "pipelineVersion": 3,
        "stageStates": [
            {
                "stageName": "Build",
                "latestExecution": {"pipelineExecutionId": "exec-9", "status": "Failed"},
                "actionStates": [{
                    "actionName": "Compile",
                    "latestExecution": {
                        "status": "Failed",
                        "summary": "Tests failed",
                        "lastStatusChange": 1709301900.0,
                        "externalExecutionId": "web:build-1"
                    }
                }]
            },
            {
                "stageName": "Source",
                "latestExecution": {"pipelineExecutionId": "exec-9", "status": "Succeeded"},
                "actionStates": [{
                    "actionName": "Checkout",
                    "latestExecution": {"status": "Succeeded", "summary": "Merge pull request #7"}
                }]
            }
        ]
    })
}

async fn upstream(
    State(recorder): State<Recorder>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let target = header_value(&headers, "x-amz-target");
    let body: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    recorder.lock().unwrap().push(Recorded {
        target: target.clone(),
        content_type: header_value(&headers, "content-type"),
        authorization: header_value(&headers, "authorization"),
        body: body.clone(),
    });

    let (status, reply) = match target.as_str() {
        "CodePipeline_20150709.ListPipelines" => match body.get("nextToken") {
            None => (
                StatusCode::OK,
                json!({"pipelines": [{"name": "web", "version": 3}], "nextToken": "page-2"}),
            ),
            Some(_) => (
                StatusCode::OK,
                json!({"pipelines": [{"name": "api", "version": 1}, {"version": 9}]}),
            ),
        },
        "CodePipeline_20150709.GetPipeline" => (StatusCode::OK, definition_body()),
        "CodePipeline_20150709.GetPipelineState" => (StatusCode::OK, state_body()),
        "CodePipeline_20150709.StartPipelineExecution" => (
            StatusCode::BAD_REQUEST,
            json!({
                "__type": "com.amazonaws.codepipeline#ConflictException",
                "message": "An execution is already in progress"
            }),
        ),
        "CodePipeline_20150709.RetryStageExecution" => {
            (StatusCode::OK, json!({"pipelineExecutionId": "exec-9"}))
        }
        "CodePipeline_20150709.GetPipelineExecution" => (
            StatusCode::OK,
            json!({"pipelineExecution": {"pipelineExecutionId": "exec-9", "artifactRevisions": []}}),
        ),
        "CodeBuild_20161006.BatchGetBuilds" => (
            StatusCode::OK,
            json!({"builds": [{
                "id": "web:build-1",
                "logs": {"groupName": "/aws/codebuild/web", "streamName": "build-1"}
            }]}),
        ),
        "Logs_20140328.GetLogEvents" => (
            StatusCode::OK,
            json!({"events": [
                {"timestamp": 1709301900000i64, "message": "npm install\n"},
                {"timestamp": 1709301960000i64, "message": "npm test\n"}
            ]}),
        ),
        _ => (
            StatusCode::BAD_REQUEST,
            json!({"__type": "UnknownOperationException"}),
        ),
    };

    (
        status,
        [(header::CONTENT_TYPE, "application/x-amz-json-1.1")],
        reply.to_string(),
    )
}

async fn start_upstream() -> (String, Recorder) {
    let recorder: Recorder = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/", post(upstream))
        .with_state(recorder.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), recorder)
}

async fn gateway() -> (Arc<HttpGateway>, Recorder) {
    let (endpoint, recorder) = start_upstream().await;
    let mut env = environment("prod");
    env.endpoints = Endpoints {
        pipelines: endpoint.clone(),
        builds: endpoint.clone(),
        logs: format!("{}/", endpoint),
    };
    let gateway = HttpGateway::new(&env, Duration::from_secs(5)).unwrap();
    (Arc::new(gateway), recorder)
}

async fn gateway_for(app: Router) -> Arc<HttpGateway> {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let mut env = environment("prod");
    env.endpoints.pipelines = endpoint;
    Arc::new(HttpGateway::new(&env, Duration::from_secs(5)).unwrap())
}

fn targets(recorder: &Recorder) -> Vec<String> {
    recorder
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.target.clone())
        .collect()
}

#[tokio::test]
async fn test_list_follows_pagination() {
    let (gateway, recorder) = gateway().await;

    let pipelines = assert_ok!(gateway.list_pipelines().await);

    let names: Vec<&str> = pipelines.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["web", "api"]);
    assert!(pipelines.iter().all(|p| p.stages.is_empty()));

    let recorded = recorder.lock().unwrap().clone();
    assert_eq!(recorded.len(), 2);
    assert_eq!(recorded[1].body["nextToken"], "page-2");
    assert_eq!(recorded[0].content_type, "application/x-amz-json-1.1");
    assert_eq!(recorded[0].authorization, "Bearer opaque");
}

#[tokio::test]
async fn test_list_stops_on_repeated_token() {
    let calls = Arc::new(Mutex::new(0usize));
    let app = Router::new()
        .route(
            "/",
            post(|State(calls): State<Arc<Mutex<usize>>>| async move {
                *calls.lock().unwrap() += 1;
                json!({"pipelines": [{"name": "web", "version": 1}], "nextToken": "same"})
                    .to_string()
            }),
        )
        .with_state(calls.clone());
    let gateway = gateway_for(app).await;

    let pipelines = tokio::time::timeout(Duration::from_secs(5), gateway.list_pipelines())
        .await
        .unwrap();

    assert_eq!(assert_ok!(pipelines).len(), 2);
    assert_eq!(*calls.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_list_is_capped_when_tokens_never_end() {
    let calls = Arc::new(Mutex::new(0usize));
    let app = Router::new()
        .route(
            "/",
            post(|State(calls): State<Arc<Mutex<usize>>>| async move {
                let page = {
                    let mut calls = calls.lock().unwrap();
                    *calls += 1;
                    *calls
                };
                json!({"pipelines": [], "nextToken": format!("page-{page}")}).to_string()
            }),
        )
        .with_state(calls.clone());
    let gateway = gateway_for(app).await;

    let pipelines = tokio::time::timeout(Duration::from_secs(30), gateway.list_pipelines())
        .await
        .unwrap();

    assert!(assert_ok!(pipelines).is_empty());
    assert_eq!(*calls.lock().unwrap(), MAX_LIST_PAGES);
}

#[tokio::test]
async fn test_definition_and_state_mapping() {
    let (gateway, _recorder) = gateway().await;

    let definition = assert_ok!(gateway.get_pipeline_definition("web").await);
    assert_eq!(definition.version, 3);
    let checkout = &definition.stages[0].actions[0];
    assert_eq!(checkout.action_type.as_deref(), Some("GitHub"));
    assert_eq!(checkout.repo.as_deref(), Some("web-app"));
    assert_eq!(checkout.branch.as_deref(), Some("main"));
    assert!(definition.stages[0].status.is_none());

    let state = assert_ok!(gateway.get_pipeline_state("web").await);
    let build = state.stage("Build").unwrap();
    assert_eq!(build.id.as_deref(), Some("exec-9"));
    let compile = &build.actions[0];
    assert_eq!(compile.id.as_deref(), Some("web:build-1"));
    assert_eq!(compile.details.as_deref(), Some("Tests failed"));
    assert_eq!(
        compile.status_time,
        Some(Utc.with_ymd_and_hms(2024, 3, 1, 14, 5, 0).unwrap())
    );
}

#[tokio::test]
async fn test_controller_over_http() {
    let (gateway, recorder) = gateway().await;
    let pipelines = Arc::new(TimedCache::new(Duration::from_secs(1), 10));
    let artifacts = Arc::new(TimedCache::new(Duration::from_secs(1), 10));
    let controller = PipelineController::new(
        "web",
        "prod",
        gateway.clone(),
        pipelines.bucket("prod"),
        artifacts.bucket("prod"),
        Options::default(),
    );

    let snapshot = controller.poll_once().await.unwrap();

    assert_eq!(snapshot.stages[0].name, "Source");
    assert_eq!(snapshot.stages[0].status, Some(Status::Succeeded));
    assert_eq!(snapshot.stages[1].status, Some(Status::Failed));
    assert!(snapshot.stages[1].actions[0].has_build_logs());
    assert_eq!(controller.refresh_interval().await, Duration::from_secs(60));

    let mut seen = targets(&recorder);
    seen.sort();
    assert_eq!(
        seen,
        vec![
            "CodePipeline_20150709.GetPipeline",
            "CodePipeline_20150709.GetPipelineState",
        ]
    );

    // provider message surfaces as is, and the refresh is still forced
    let err = assert_err!(controller.restart().await);
    assert_eq!(err.message(), "An execution is already in progress");
    assert!(controller.is_force_pending().await);

    // only failed stages go upstream
    assert_err!(controller.retry_stage("Source").await);
    assert!(!targets(&recorder)
        .iter()
        .any(|t| t.ends_with(".RetryStageExecution")));

    assert_ok!(controller.retry_stage("Build").await);
    let retry = recorder
        .lock()
        .unwrap()
        .iter()
        .find(|r| r.target.ends_with(".RetryStageExecution"))
        .map(|r| r.body.clone())
        .unwrap();
    assert_eq!(
        retry,
        json!({
            "pipelineName": "web",
            "stageName": "Build",
            "pipelineExecutionId": "exec-9",
            "retryMode": "FAILED_ACTIONS"
        })
    );

    // no artifact revisions: reported and not cached
    let err = assert_err!(controller.stage_artifact("Source").await);
    assert_eq!(err.message(), "could not find execution details");
    assert!(artifacts.bucket("prod").get("exec-9").is_none());
}

#[tokio::test]
async fn test_build_logs_over_http() {
    let (gateway, recorder) = gateway().await;

    let bundle = fetch_build_logs(gateway.as_ref(), "web:build-1").await.unwrap();

    assert_eq!(bundle.log_group, "/aws/codebuild/web");
    assert_eq!(bundle.log_stream, "build-1");
    assert_eq!(bundle.lines.len(), 2);
    assert!(bundle.lines[0].ends_with(": npm install\n"));
    assert!(bundle.to_preformatted().ends_with(": npm test\n"));

    let recorded = recorder.lock().unwrap().clone();
    assert_eq!(recorded[0].body, json!({"ids": ["web:build-1"]}));
    assert_eq!(
        recorded[1].body,
        json!({"logGroupName": "/aws/codebuild/web", "logStreamName": "build-1"})
    );
}

#[tokio::test]
async fn test_unreachable_service_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let mut env = environment("prod");
    env.endpoints.pipelines = endpoint;
    let gateway = HttpGateway::new(&env, Duration::from_secs(2)).unwrap();

    let err = assert_err!(gateway.list_pipelines().await);
    assert!(!err.is_missing_data());
    assert!(!err.message().is_empty());
}
