//! HTTP API over the candidate resolver.

use crate::candidates::{OutcomeReport, OutcomeStatus, QueueResponse, ResolveError, Resolver};
use crate::search::SearchProvider;
use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ResolveError> for ApiError {
    fn from(err: ResolveError) -> Self {
        tracing::warn!("resolve failed: {err}");
        match err {
            ResolveError::ProviderTransport(_) => Self {
                status: StatusCode::BAD_GATEWAY,
                message: "YouTube API Error".into(),
            },
            ResolveError::MissingApiKey => Self::internal("YouTube API key missing"),
            ResolveError::Store(_) => Self::internal("Internal Server Error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoQuery {
    artist: Option<String>,
    track: Option<String>,
    user_id: Option<String>,
}

/// Report body as sent by clients; validated into an [`OutcomeReport`].
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportBody {
    artist: Option<String>,
    track: Option<String>,
    video_id: Option<String>,
    user_id: Option<String>,
    status: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl ReportBody {
    fn validate(self) -> Option<OutcomeReport> {
        Some(OutcomeReport {
            artist: non_blank(self.artist)?,
            track: non_blank(self.track)?,
            video_id: non_blank(self.video_id)?,
            user_id: non_blank(self.user_id),
            // Anything other than "failed" counts as success.
            status: (self.status.as_deref() == Some("failed")).then_some(OutcomeStatus::Failed),
        })
    }
}

pub fn router<P: SearchProvider + 'static>(resolver: Arc<Resolver<P>>) -> Router {
    Router::new()
        .route("/api/video", get(get_video::<P>).post(post_video::<P>))
        .with_state(resolver)
}

pub async fn serve<P: SearchProvider + 'static>(
    resolver: Arc<Resolver<P>>,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    tracing::info!("API server listening on http://{addr}");

    axum::serve(listener, router(resolver))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!("failed to install Ctrl+C handler: {err}");
    }
}

async fn get_video<P: SearchProvider + 'static>(
    State(resolver): State<Arc<Resolver<P>>>,
    Query(query): Query<VideoQuery>,
) -> ApiResult<Json<QueueResponse>> {
    let (Some(artist), Some(track)) = (non_blank(query.artist), non_blank(query.track)) else {
        return Err(ApiError::bad_request("Missing artist or track"));
    };
    let request = crate::candidates::QueueRequest {
        artist,
        track,
        user_id: non_blank(query.user_id),
    };
    let response = resolver.resolve(&request).await?;
    Ok(Json(response))
}

async fn post_video<P: SearchProvider + 'static>(
    State(resolver): State<Arc<Resolver<P>>>,
    body: Result<Json<ReportBody>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let report = body
        .ok()
        .and_then(|Json(b)| b.validate())
        .ok_or_else(|| ApiError::bad_request("Missing required fields"))?;

    resolver.record(report).await.map_err(|e| {
        tracing::warn!("recording outcome failed: {e}");
        ApiError::internal("Internal Error")
    })?;
    Ok(Json(serde_json::json!({ "success": true })))
}
