//! Serve command handler.
//!
//! Exposes the orchestrator over HTTP:
//! `POST /v1/query` answers a question, `GET /health` reports readiness.

use advisor_compliance::ComplianceFinding;
use advisor_core::{config::AppConfig, AppError};
use advisor_orchestrator::AdvisorContext;
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Serve the assistant over HTTP
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    pub addr: String,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> anyhow::Result<()> {
        let context = Arc::new(AdvisorContext::build(config).await?);

        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        tracing::info!("Listening on {}", self.addr);

        axum::serve(listener, router(context)).await?;
        Ok(())
    }
}

pub fn router(context: Arc<AdvisorContext>) -> Router {
    Router::new()
        .route("/v1/query", post(query_handler))
        .route("/health", get(health_handler))
        .with_state(context)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub query_id: String,
    pub response: String,
    pub citations: Vec<String>,
    pub compliance_approved: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outstanding_findings: Vec<ComplianceFinding>,
}

/// Error body: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug)]
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            AppError::CapabilityTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::warn!(code = self.0.code(), "Request failed: {}", self.0);

        let body = serde_json::json!({
            "error": {
                "code": self.0.code(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

async fn query_handler(
    State(context): State<Arc<AdvisorContext>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) =
        payload.map_err(|rejection| AppError::SchemaViolation(rejection.body_text()))?;
    let outcome = context
        .ask(request.session_id.as_deref(), &request.query)
        .await?;

    Ok(Json(QueryResponse {
        query_id: outcome.query_id,
        response: outcome.response,
        citations: outcome.citations,
        compliance_approved: outcome.compliance_approved,
        outstanding_findings: outcome.outstanding,
    }))
}

async fn health_handler(State(context): State<Arc<AdvisorContext>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "capabilities": context.orchestrator().registry().names(),
        "router": context.orchestrator().engine_name(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn context(temp: &TempDir) -> Arc<AdvisorContext> {
        let config = AppConfig {
            workspace: temp.path().to_path_buf(),
            ..AppConfig::default()
        };
        Arc::new(AdvisorContext::build(&config).await.unwrap())
    }

    #[tokio::test]
    async fn test_empty_query_is_bad_request() {
        let temp = TempDir::new().unwrap();
        let result = query_handler(
            State(context(&temp).await),
            Ok(Json(QueryRequest {
                query: "  ".to_string(),
                session_id: None,
            })),
        )
        .await;

        let response = result.unwrap_err().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_query_returns_answer_shape() {
        let temp = TempDir::new().unwrap();
        let context = context(&temp).await;
        let Json(body) = query_handler(
            State(context.clone()),
            Ok(Json(QueryRequest {
                query: "What are the custody fees?".to_string(),
                session_id: Some("web-1".to_string()),
            })),
        )
        .await
        .unwrap();

        assert!(!body.query_id.is_empty());
        assert!(body.response.contains("custody fees"));
        assert!(body.citations.is_empty());

        let value = serde_json::to_value(&body).unwrap();
        assert!(value.get("complianceApproved").is_some());
        assert_eq!(context.sessions().load_context("web-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_malformed_body_gets_error_envelope() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::Request;

        let temp = TempDir::new().unwrap();
        let request = Request::builder()
            .method("POST")
            .uri("/v1/query")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"query": "fees?""#))
            .unwrap();
        let payload = Json::<QueryRequest>::from_request(request, &()).await;
        assert!(payload.is_err());

        let response = query_handler(State(context(&temp).await), payload)
            .await
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], AppError::SchemaViolation(String::new()).code());
        assert!(!body["error"]["message"].as_str().unwrap().is_empty());
    }

    #[test]
    fn test_internal_errors_map_to_server_error() {
        let response = ApiError(AppError::Knowledge("index missing".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError(AppError::CapabilityTimeout {
            capability: "web_research".into(),
            timeout_secs: 30,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
