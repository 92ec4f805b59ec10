use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub type SessionId = u64;

/// Opaque identifier of one server-side job, returned by the start call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Article links to analyze. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnalysisRequest {
    article_links: Vec<String>,
}

impl AnalysisRequest {
    /// Trims every link, drops blanks and exact duplicates; fails when nothing is left.
    pub fn new<I, S>(links: I) -> Result<Self, ApiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut article_links: Vec<String> = Vec::new();
        for link in links {
            let link = link.as_ref().trim();
            if link.is_empty() || article_links.iter().any(|known| known == link) {
                continue;
            }
            article_links.push(link.to_string());
        }
        if article_links.is_empty() {
            return Err(ApiError::new(
                FailureKind::EmptyRequest,
                "no article links to analyze",
            ));
        }
        Ok(Self { article_links })
    }

    pub fn article_links(&self) -> &[String] {
        &self.article_links
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub doi: Option<String>,
}

/// Server-reported state of a job. Progress is clamped to 0..=100.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending { progress: u8, message: String },
    Complete { progress: u8, message: String },
    Failed {
        progress: u8,
        message: String,
        error: String,
    },
}

impl JobStatus {
    pub fn progress(&self) -> u8 {
        match self {
            JobStatus::Pending { progress, .. }
            | JobStatus::Complete { progress, .. }
            | JobStatus::Failed { progress, .. } => *progress,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            JobStatus::Pending { message, .. }
            | JobStatus::Complete { message, .. }
            | JobStatus::Failed { message, .. } => message,
        }
    }
}

/// Finished document as delivered by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// One status check, decoded once at the transport boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckResponse {
    /// 404: the job is not visible yet. Not an error.
    NotReady,
    Status(JobStatus),
    Artifact(Artifact),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: FailureKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    EmptyRequest,
    HttpStatus(u16),
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Decode,
    Network,
    /// The task making the request panicked.
    Aborted,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::EmptyRequest => write!(f, "empty request"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Decode => write!(f, "malformed response"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Aborted => write!(f, "request aborted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("could not start analysis: {0}")]
    Start(ApiError),
    #[error("status check failed: {0}")]
    Poll(ApiError),
    #[error("no result after {}s", .elapsed.as_secs())]
    Timeout { elapsed: Duration },
    #[error("analysis failed: {message}")]
    JobFailed { message: String },
    #[error("polling stopped unexpectedly: {message}")]
    Aborted { message: String },
}

/// Terminal result of one polling session. Produced exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    Completed(Artifact),
    Failed(SessionError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollEvent {
    Started {
        session_id: SessionId,
        task_id: TaskId,
    },
    Progress {
        session_id: SessionId,
        status: JobStatus,
    },
    Finished {
        session_id: SessionId,
        outcome: SessionOutcome,
    },
}
