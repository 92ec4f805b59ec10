use crate::{HistoryEntry, Phase, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub phase: Phase,
    pub prompt: String,
    pub articles: Vec<ArticleRowView>,
    pub selected_count: usize,
    pub session: Option<SessionView>,
    pub input_error: Option<String>,
    pub error: Option<String>,
    pub saved_path: Option<String>,
    pub history: Vec<HistoryEntry>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleRowView {
    pub index: usize,
    pub title: String,
    pub url: String,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionView {
    pub session_id: SessionId,
    pub task_id: Option<String>,
    pub progress: u8,
    pub status_message: String,
}
