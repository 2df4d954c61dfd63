use crate::candidates::{OutcomeReport, QueueRequest, QueueResponse, ResolveError, Resolver};
use crate::search::SearchProvider;
use crate::store::StoreError;
use anyhow::Context;
use serde::Deserialize;
use std::future::Future;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("queue server request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("queue server returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// Where the player gets candidate queues from and sends outcomes to.
pub trait QueueSource: Send + Sync + 'static {
    fn fetch_queue(
        &self,
        request: &QueueRequest,
    ) -> impl Future<Output = Result<QueueResponse, SourceError>> + Send;

    fn report(
        &self,
        report: &OutcomeReport,
    ) -> impl Future<Output = Result<(), SourceError>> + Send;
}

impl<P: SearchProvider + 'static> QueueSource for Resolver<P> {
    async fn fetch_queue(&self, request: &QueueRequest) -> Result<QueueResponse, SourceError> {
        Ok(self.resolve(request).await?)
    }

    async fn report(&self, report: &OutcomeReport) -> Result<(), SourceError> {
        Ok(self.record(report.clone()).await?)
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// Talks to a `backdrop serve` instance.
#[derive(Debug, Clone)]
pub struct HttpQueueSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpQueueSource {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("build reqwest client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn video_url(&self) -> String {
        format!("{}/api/video", self.base_url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => status.canonical_reason().unwrap_or("unknown").to_string(),
        };
        Err(SourceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl QueueSource for HttpQueueSource {
    async fn fetch_queue(&self, request: &QueueRequest) -> Result<QueueResponse, SourceError> {
        let mut url = format!(
            "{}?artist={}&track={}",
            self.video_url(),
            urlencoding::encode(&request.artist),
            urlencoding::encode(&request.track)
        );
        if let Some(user) = &request.user_id {
            url.push_str(&format!("&userId={}", urlencoding::encode(user)));
        }

        let response = self.client.get(&url).send().await?;
        let response = Self::check(response).await?;
        Ok(response.json().await?)
    }

    async fn report(&self, report: &OutcomeReport) -> Result<(), SourceError> {
        let response = self.client.post(self.video_url()).json(report).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}
