//! HTTP entry point for the scheduled run (one post per invocation).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use x_client::Publisher;

use crate::pipeline::Pipeline;
use crate::topics::TopicChoice;

pub struct CronState {
    pub pipeline: Pipeline,
    pub publisher: Arc<dyn Publisher>,
    /// When set, callers must send `Authorization: Bearer <secret>`.
    pub cron_secret: Option<String>,
    pub topic: TopicChoice,
}

pub fn router(state: Arc<CronState>) -> Router {
    Router::new()
        .route("/api/cron", get(run_cron).post(run_cron))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn run_cron(State(state): State<Arc<CronState>>, headers: HeaderMap) -> (StatusCode, Json<Value>) {
    if !authorized(&headers, state.cron_secret.as_deref()) {
        warn!("Rejected cron request with missing or wrong secret");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "ok": false, "error": "Unauthorized" })),
        );
    }

    let topic = state.topic.resolve(state.pipeline.selector());
    info!(topic = %topic, "Cron run started");

    match state.pipeline.run(topic, state.publisher.as_ref()).await {
        Ok(published) => (
            StatusCode::OK,
            Json(json!({
                "ok": true,
                "topic": topic,
                "id": published.id,
                "text": published.text,
                "link": published.url(),
            })),
        ),
        Err(e) => {
            error!(topic = %topic, error = %e, "Cron run failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "ok": false, "error": e.to_string() })),
            )
        }
    }
}

fn authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == secret)
}
