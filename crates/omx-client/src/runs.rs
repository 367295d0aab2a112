//! HTTP implementation of the run-control service.
//!
//! Throttle classification lives here: HTTP 429, and error bodies carrying
//! a throttling code, surface as `LaunchError::Throttled` so the launcher
//! above can retry them. Everything else is fatal for the job.

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use omx_core::service::{LaunchError, RunDetails, RunService, StartRunRequest, StartedRun};

/// Structured error body some providers return alongside a non-2xx status.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: Option<String>,
    message: Option<String>,
}

fn is_throttle_code(code: &str) -> bool {
    matches!(code, "ThrottlingException" | "TooManyRequestsException")
}

pub struct HttpRunService {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpRunService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl RunService for HttpRunService {
    async fn start_run(&self, request: &StartRunRequest) -> Result<StartedRun, LaunchError> {
        let url = self.url("runs");
        debug!("Starting run {} via {}", request.run_name, url);

        let response = self
            .authorized(self.client.post(&url))
            .json(request)
            .send()
            .await
            .context("failed to send start-run request")
            .map_err(LaunchError::Fatal)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let text = response.text().await.unwrap_or_default();
            return Err(LaunchError::Throttled(format!("HTTP 429: {text}")));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if let Ok(body) = serde_json::from_str::<ApiErrorBody>(&text) {
                if body.code.as_deref().is_some_and(is_throttle_code) {
                    return Err(LaunchError::Throttled(
                        body.message.unwrap_or_else(|| text.clone()),
                    ));
                }
            }
            return Err(LaunchError::Fatal(anyhow::anyhow!(
                "start run failed with status {status}: {text}"
            )));
        }

        let started: StartedRun = response
            .json()
            .await
            .context("failed to parse start-run response")
            .map_err(LaunchError::Fatal)?;
        info!("Started run {} as {}", request.run_name, started.job_id);
        Ok(started)
    }

    async fn get_run(&self, job_id: &str) -> anyhow::Result<RunDetails> {
        let url = self.url(&format!("runs/{job_id}"));

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .context("failed to send run status request")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("run status query failed with status {status}: {text}");
        }

        response
            .json()
            .await
            .context("failed to parse run status response")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use indexmap::IndexMap;
    use serde_json::json;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    async fn spawn_router(app: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind listener");
        let addr = listener.local_addr().expect("listener addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve app");
        });
        addr
    }

    async fn spawn_json_server(status: u16, body: serde_json::Value) -> SocketAddr {
        let handler = move || {
            let body = body.clone();
            async move {
                (
                    axum::http::StatusCode::from_u16(status).expect("valid status"),
                    Json(body),
                )
            }
        };
        let app = Router::new()
            .route("/runs", post(handler.clone()))
            .route("/runs/:id", get(handler));
        spawn_router(app).await
    }

    fn sample_request() -> StartRunRequest {
        StartRunRequest {
            job_definition_ref: "arn:workflows/mag".to_string(),
            run_name: "mag-batch42-20240301120000".to_string(),
            parameters: IndexMap::new(),
            output_locator: "s3://out/batch42/mag/".to_string(),
            execution_role: "arn:role/omx".to_string(),
            resource_group: "group-1".to_string(),
            tags: IndexMap::new(),
        }
    }

    #[tokio::test]
    async fn test_start_run_parses_started_run() {
        let addr = spawn_json_server(
            200,
            json!({"job_id": "1234", "job_arn": "arn:runs/1234"}),
        )
        .await;
        let service = HttpRunService::new(format!("http://{addr}"));

        let started = service.start_run(&sample_request()).await.expect("starts");
        assert_eq!(started.job_id, "1234");
        assert_eq!(started.job_arn, "arn:runs/1234");
    }

    #[tokio::test]
    async fn test_http_429_classifies_as_throttled() {
        let addr = spawn_json_server(429, json!({"message": "slow down"})).await;
        let service = HttpRunService::new(format!("http://{addr}"));

        let err = service
            .start_run(&sample_request())
            .await
            .expect_err("throttled");
        assert!(matches!(err, LaunchError::Throttled(_)));
    }

    #[tokio::test]
    async fn test_throttling_error_code_classifies_as_throttled() {
        let addr = spawn_json_server(
            400,
            json!({"code": "ThrottlingException", "message": "Rate exceeded"}),
        )
        .await;
        let service = HttpRunService::new(format!("http://{addr}"));

        let err = service
            .start_run(&sample_request())
            .await
            .expect_err("throttled");
        match err {
            LaunchError::Throttled(message) => assert!(message.contains("Rate exceeded")),
            other => panic!("expected throttled, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_failures_are_fatal() {
        let addr = spawn_json_server(
            500,
            json!({"code": "InternalServerException", "message": "boom"}),
        )
        .await;
        let service = HttpRunService::new(format!("http://{addr}"));

        let err = service
            .start_run(&sample_request())
            .await
            .expect_err("fatal");
        match err {
            LaunchError::Fatal(e) => assert!(e.to_string().contains("500")),
            other => panic!("expected fatal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_run_parses_details() {
        let addr = spawn_json_server(
            200,
            json!({
                "status": "RUNNING",
                "started_at": "2024-03-01T08:00:00Z",
                "stopped_at": null,
                "message": null
            }),
        )
        .await;
        let service = HttpRunService::new(format!("http://{addr}"));

        let details = service.get_run("1234").await.expect("details");
        assert_eq!(details.status, "RUNNING");
        assert!(details.started_at.is_some());
        assert!(details.stopped_at.is_none());
    }

    #[tokio::test]
    async fn test_get_run_failure_surfaces_status() {
        let addr = spawn_json_server(404, json!({"message": "no such run"})).await;
        let service = HttpRunService::new(format!("http://{addr}"));

        let err = service.get_run("missing").await.expect_err("fails");
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_bearer_token_sent_when_configured() {
        let app = Router::new().route(
            "/runs/:id",
            get(|headers: axum::http::HeaderMap| async move {
                let authorized = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v == "Bearer secret")
                    .unwrap_or(false);
                let status = if authorized { "COMPLETED" } else { "FAILED" };
                Json(json!({"status": status}))
            }),
        );
        let addr = spawn_router(app).await;
        let service = HttpRunService::new(format!("http://{addr}")).with_token("secret");

        let details = service.get_run("1234").await.expect("details");
        assert_eq!(details.status, "COMPLETED");
    }
}
