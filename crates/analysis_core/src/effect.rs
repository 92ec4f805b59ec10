use crate::{Artifact, HistoryEntry, SessionId};

/// Side effects requested by `update`; executed by the platform layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SearchArticles {
        prompt: String,
    },
    StartAnalysis {
        session_id: SessionId,
        links: Vec<String>,
    },
    /// Client-side only: stop polling, nothing is sent to the service.
    CancelAnalysis {
        session_id: SessionId,
    },
    SaveArtifact {
        session_id: SessionId,
        file_name: String,
        artifact: Artifact,
    },
    RecordHistory(HistoryEntry),
}
