use std::time::Duration;

use analysis_logging::{analysis_debug, analysis_warn};
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};

use crate::wire::{decode_check_body, decode_json, is_json_content_type, ScrapeBody, StartReply};
use crate::{AnalysisRequest, ApiError, Article, CheckResponse, FailureKind, TaskId};

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_artifact_bytes: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            max_artifact_bytes: 50 * 1024 * 1024,
        }
    }
}

/// The three calls the remote analysis service exposes.
#[async_trait::async_trait]
pub trait AnalysisApi: Send + Sync {
    async fn scrape_articles(&self, prompt: &str) -> Result<Vec<Article>, ApiError>;

    async fn start_analysis(&self, request: &AnalysisRequest) -> Result<TaskId, ApiError>;

    async fn check_analysis(&self, task_id: &TaskId) -> Result<CheckResponse, ApiError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestAnalysisApi {
    client: reqwest::Client,
    base_url: Url,
    max_artifact_bytes: u64,
}

impl ReqwestAnalysisApi {
    pub fn new(settings: ClientSettings) -> Result<Self, ApiError> {
        let base_url = Url::parse(settings.base_url.trim())
            .map_err(|err| ApiError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::new(
                FailureKind::InvalidUrl,
                format!("{base_url} cannot be used as a base url"),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ApiError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self {
            client,
            base_url,
            max_artifact_bytes: settings.max_artifact_bytes,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::new(FailureKind::InvalidUrl, "base url has no path"))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: Url,
        body: &T,
    ) -> Result<Vec<u8>, ApiError> {
        let payload = serde_json::to_vec(body)
            .map_err(|err| ApiError::new(FailureKind::Decode, err.to_string()))?;
        analysis_debug!("POST {} ({} bytes)", url, payload.len());

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(payload)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        read_limited(response, self.max_artifact_bytes).await
    }
}

#[async_trait::async_trait]
impl AnalysisApi for ReqwestAnalysisApi {
    async fn scrape_articles(&self, prompt: &str) -> Result<Vec<Article>, ApiError> {
        let url = self.endpoint(&["scrape-articles"])?;
        let body = self.post_json(url, &ScrapeBody { prompt }).await?;
        let articles: Vec<Article> = decode_json(&body)?;

        // The service reports missing links with placeholders such as "No URL".
        let total = articles.len();
        let usable = articles
            .into_iter()
            .filter(|article| Url::parse(&article.url).is_ok())
            .collect::<Vec<_>>();
        if usable.len() < total {
            analysis_warn!(
                "Dropped {} article(s) without a usable url",
                total - usable.len()
            );
        }
        Ok(usable)
    }

    async fn start_analysis(&self, request: &AnalysisRequest) -> Result<TaskId, ApiError> {
        let url = self.endpoint(&["start-analysis"])?;
        let body = self.post_json(url, request).await?;
        let reply: StartReply = decode_json(&body)?;
        reply.into_task_id()
    }

    async fn check_analysis(&self, task_id: &TaskId) -> Result<CheckResponse, ApiError> {
        let url = self.endpoint(&["check-analysis", task_id.as_str()])?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(CheckResponse::NotReady);
        }
        if !status.is_success() {
            return Err(ApiError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        if !is_json_content_type(content_type.as_deref()) {
            analysis_debug!(
                "Task {} returned a document ({:?}, {:?} bytes)",
                task_id,
                content_type,
                response.content_length()
            );
        }
        let body = read_limited(response, self.max_artifact_bytes).await?;
        decode_check_body(content_type.as_deref(), body)
    }
}

async fn read_limited(response: reqwest::Response, max_bytes: u64) -> Result<Vec<u8>, ApiError> {
    if let Some(content_len) = response.content_length() {
        if content_len > max_bytes {
            return Err(ApiError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(content_len),
                },
                "response too large",
            ));
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let next_len = bytes.len() as u64 + chunk.len() as u64;
        if next_len > max_bytes {
            return Err(ApiError::new(
                FailureKind::TooLarge {
                    max_bytes,
                    actual: Some(next_len),
                },
                "response too large",
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError::new(FailureKind::Timeout, err.to_string());
    }
    ApiError::new(FailureKind::Network, err.to_string())
}
