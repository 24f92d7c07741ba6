//! HTTP surface for the extraction service.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /events` – Accept an object-created notification (`detail.bucket.name`,
//!   `detail.object.key`) and run the workflow for it. Returns the terminal outcome: `200` on
//!   success, `202` when the key is outside the raw prefix, and an error status derived from
//!   the failure class otherwise.
//! - `GET /metrics` – Observe workflow counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery by tools/hosts.

use crate::pipeline::{ErrorClass, ObjectCreatedNotification, TriggerOutcome, WorkflowApi};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

/// Build the HTTP router exposing the workflow API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: WorkflowApi + 'static,
{
    Router::new()
        .route("/events", post(handle_event::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .route("/commands", get(get_commands))
        .with_state(service)
}

/// HTTP status reported for a trigger outcome.
pub fn outcome_status(outcome: &TriggerOutcome) -> StatusCode {
    match outcome {
        TriggerOutcome::Succeeded(_) => StatusCode::OK,
        TriggerOutcome::Ignored { .. } => StatusCode::ACCEPTED,
        TriggerOutcome::Failed(failure) => match failure.error_class {
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::ContractViolation | ErrorClass::Validation => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorClass::TransientInfrastructure => StatusCode::BAD_GATEWAY,
            ErrorClass::Timeout => StatusCode::GATEWAY_TIMEOUT,
        },
    }
}

/// Run the workflow for an object-created notification.
async fn handle_event<S>(
    State(service): State<Arc<S>>,
    Json(notification): Json<ObjectCreatedNotification>,
) -> (StatusCode, Json<TriggerOutcome>)
where
    S: WorkflowApi,
{
    let key = notification.detail.object.key.clone();
    let outcome = service.handle_notification(notification).await;
    let status = outcome_status(&outcome);
    tracing::info!(key = %key, status = status.as_u16(), "Event handled");
    (status, Json(outcome))
}

/// Return the workflow counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsResponse>
where
    S: WorkflowApi,
{
    let snapshot = service.metrics_snapshot();
    Json(MetricsResponse {
        workflows_started: snapshot.workflows_started,
        workflows_succeeded: snapshot.workflows_succeeded,
        workflows_failed: snapshot.workflows_failed,
        triggers_ignored: snapshot.triggers_ignored,
        terms_persisted: snapshot.terms_persisted,
    })
}

/// Response body for `GET /metrics`.
#[derive(Serialize)]
struct MetricsResponse {
    workflows_started: u64,
    workflows_succeeded: u64,
    workflows_failed: u64,
    triggers_ignored: u64,
    terms_persisted: u64,
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "events",
                method: "POST",
                path: "/events",
                description: "Run the extraction workflow for an object-created notification. Keys outside the raw prefix are acknowledged with 202 and ignored.",
                request_example: Some(json!({
                    "detail-type": "Object Created",
                    "detail": {
                        "bucket": { "name": "uploads" },
                        "object": { "key": "raw/user123/list.txt" }
                    }
                })),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Return workflow counters useful for observability dashboards.",
                request_example: None,
            },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::{create_router, get_commands};
    use crate::metrics::MetricsSnapshot;
    use crate::pipeline::{
        Classification, ErrorClass, FailureReason, ObjectCreatedNotification, TriggerOutcome,
        WorkflowApi, WorkflowFailure, WorkflowState, WorkflowSuccess,
    };
    use crate::store::PersistAck;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    #[tokio::test]
    async fn commands_catalog_exposes_events_endpoint() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let events = commands
            .iter()
            .find(|cmd| cmd.name == "events")
            .expect("events command present");

        assert_eq!(events.method, "POST");
        assert_eq!(events.path, "/events");
        assert!(commands.iter().any(|cmd| cmd.path == "/metrics"));
    }

    #[tokio::test]
    async fn successful_workflow_returns_ok_with_result() {
        let service = Arc::new(StubWorkflowService::new(TriggerOutcome::Succeeded(
            WorkflowSuccess {
                document_ref: "raw/user123/list.txt".into(),
                owner_id: Some("user123".into()),
                classification: Classification::VocabList,
                result: "ebullient,laconic".into(),
                persist_ack: PersistAck {
                    pk: "raw/user123/list.txt".into(),
                    updated_at: "2025-01-01T00:00:00Z".into(),
                    replaced: false,
                },
                visited: vec![WorkflowState::Fetch, WorkflowState::Succeed],
            },
        )));
        let app = create_router(service.clone());

        let (status, json) = post_event(app, "raw/user123/list.txt").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "succeeded");
        assert_eq!(json["result"], "ebullient,laconic");
        assert_eq!(json["classification"], "VOCAB_LIST");
        assert_eq!(json["persistAck"]["pk"], "raw/user123/list.txt");

        let keys = service.recorded_keys().await;
        assert_eq!(keys, vec!["raw/user123/list.txt".to_string()]);
    }

    #[tokio::test]
    async fn ignored_trigger_is_accepted() {
        let service = Arc::new(StubWorkflowService::new(TriggerOutcome::Ignored {
            key: "processed/a.txt".into(),
        }));
        let (status, json) = post_event(create_router(service), "processed/a.txt").await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(json["status"], "ignored");
    }

    #[tokio::test]
    async fn failures_map_to_status_by_class() {
        let cases = [
            (ErrorClass::NotFound, StatusCode::NOT_FOUND),
            (ErrorClass::ContractViolation, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorClass::Validation, StatusCode::UNPROCESSABLE_ENTITY),
            (ErrorClass::TransientInfrastructure, StatusCode::BAD_GATEWAY),
            (ErrorClass::Timeout, StatusCode::GATEWAY_TIMEOUT),
        ];
        for (error_class, expected) in cases {
            let service = Arc::new(StubWorkflowService::new(TriggerOutcome::Failed(
                WorkflowFailure {
                    document_ref: "raw/u/a.txt".into(),
                    failed_in: WorkflowState::Fetch,
                    reason: FailureReason::StageFailed,
                    error_class,
                    message: "boom".into(),
                    visited: vec![WorkflowState::Fetch],
                },
            )));
            let (status, json) = post_event(create_router(service), "raw/u/a.txt").await;
            assert_eq!(status, expected, "{error_class:?}");
            assert_eq!(json["status"], "failed");
            assert_eq!(json["failedIn"]["state"], "Fetch");
        }
    }

    #[tokio::test]
    async fn metrics_route_reports_counters() {
        let service = Arc::new(StubWorkflowService::new(TriggerOutcome::Ignored {
            key: String::new(),
        }));
        let response = create_router(service)
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        let json: serde_json::Value = serde_json::from_slice(&body).expect("json body");
        assert_eq!(json["workflows_started"], 3);
        assert_eq!(json["terms_persisted"], 7);
    }

    async fn post_event(app: axum::Router, key: &str) -> (StatusCode, serde_json::Value) {
        let payload = json!({
            "detail-type": "Object Created",
            "detail": {
                "bucket": { "name": "uploads" },
                "object": { "key": key }
            }
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/events")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .expect("request"),
            )
            .await
            .expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        (status, serde_json::from_slice(&body).expect("json body"))
    }

    struct StubWorkflowService {
        keys: Mutex<Vec<String>>,
        outcome: TriggerOutcome,
    }

    impl StubWorkflowService {
        fn new(outcome: TriggerOutcome) -> Self {
            Self {
                keys: Mutex::new(Vec::new()),
                outcome,
            }
        }

        async fn recorded_keys(&self) -> Vec<String> {
            self.keys.lock().await.clone()
        }
    }

    #[async_trait]
    impl WorkflowApi for StubWorkflowService {
        async fn handle_notification(
            &self,
            notification: ObjectCreatedNotification,
        ) -> TriggerOutcome {
            self.keys.lock().await.push(notification.detail.object.key);
            self.outcome.clone()
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                workflows_started: 3,
                workflows_succeeded: 2,
                workflows_failed: 1,
                triggers_ignored: 0,
                terms_persisted: 7,
            }
        }
    }
}
