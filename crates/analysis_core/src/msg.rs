use crate::{AnalysisOutcome, Article, HistoryEntry, SessionId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the research question.
    PromptChanged(String),
    /// User submitted the research question for an article search.
    PromptSubmitted,
    /// Article search returned candidates.
    ArticlesLoaded(Vec<Article>),
    /// Article search failed.
    ArticlesFailed(String),
    /// User toggled the selection of one article row.
    ArticleToggled(usize),
    /// User toggled every row at once.
    AllArticlesToggled,
    /// User supplied article links directly, bypassing the search.
    LinksAdded(Vec<String>),
    /// User confirmed the selection and asked for an analysis.
    AnalysisRequested,
    /// The service accepted the job.
    AnalysisStarted {
        session_id: SessionId,
        task_id: String,
    },
    /// One status check reported progress.
    AnalysisProgress {
        session_id: SessionId,
        progress: u8,
        message: String,
    },
    /// The polling session reached its terminal outcome.
    AnalysisFinished {
        session_id: SessionId,
        outcome: AnalysisOutcome,
    },
    /// User cancelled the running analysis.
    CancelClicked,
    /// The artifact was written to disk.
    ArtifactSaved {
        session_id: SessionId,
        path: String,
        saved_at: String,
    },
    /// Writing the artifact failed.
    ArtifactSaveFailed {
        session_id: SessionId,
        message: String,
    },
    /// User confirmed "clear all".
    ClearAll,
    /// Restore previously saved analyses from persisted state.
    RestoreHistory(Vec<HistoryEntry>),
    /// UI/render tick to coalesce rendering.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
