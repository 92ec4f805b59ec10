use std::fmt;

use url::Url;

use crate::view_model::{AppViewModel, ArticleRowView, SessionView};

pub type SessionId = u64;

/// File name offered for every finished analysis document.
pub const ARTIFACT_FILE_NAME: &str = "research_analysis.pdf";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub doi: Option<String>,
}

impl Article {
    /// An article known only by its link.
    pub fn from_link(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            title: url.clone(),
            url,
            doi: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    Search(String),
    Start(String),
    Poll(String),
    Timeout { elapsed_secs: u64 },
    JobFailed(String),
    Save(String),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Search(detail) => {
                write!(f, "Error fetching articles. Please try again. ({detail})")
            }
            SessionError::Start(detail) => write!(f, "could not start analysis: {detail}"),
            SessionError::Poll(detail) => write!(f, "status check failed: {detail}"),
            SessionError::Timeout { elapsed_secs } => {
                write!(f, "analysis timed out after {elapsed_secs}s")
            }
            SessionError::JobFailed(detail) => write!(f, "analysis failed: {detail}"),
            SessionError::Save(detail) => write!(f, "could not save document: {detail}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Delivered(Artifact),
    Failed(SessionError),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub prompt: String,
    pub article_count: usize,
    pub saved_path: String,
    pub saved_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Searching,
    Selecting,
    Starting,
    Polling,
    Saving,
    Saved,
    Failed(SessionError),
    Cancelled,
}

impl Phase {
    /// A job is in flight on the service side.
    pub fn is_polling(&self) -> bool {
        matches!(self, Phase::Starting | Phase::Polling)
    }

    /// Some request is outstanding and new work must wait.
    pub fn is_busy(&self) -> bool {
        matches!(self, Phase::Searching | Phase::Saving) || self.is_polling()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Saved | Phase::Failed(_) | Phase::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ArticleRow {
    article: Article,
    selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveSession {
    id: SessionId,
    prompt: String,
    article_count: usize,
    task_id: Option<String>,
    progress: u8,
    status_message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppState {
    prompt: String,
    submitted_prompt: Option<String>,
    articles: Vec<ArticleRow>,
    phase: Phase,
    active: Option<ActiveSession>,
    last_session_id: SessionId,
    input_error: Option<String>,
    saved_path: Option<String>,
    history: Vec<HistoryEntry>,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        let articles = self
            .articles
            .iter()
            .enumerate()
            .map(|(index, row)| ArticleRowView {
                index,
                title: row.article.title.clone(),
                url: row.article.url.clone(),
                selected: row.selected,
            })
            .collect::<Vec<_>>();
        let selected_count = articles.iter().filter(|row| row.selected).count();
        let error = match &self.phase {
            Phase::Failed(err) => Some(err.to_string()),
            _ => None,
        };

        AppViewModel {
            phase: self.phase.clone(),
            prompt: self.prompt.clone(),
            articles,
            selected_count,
            session: self.active.as_ref().map(|session| SessionView {
                session_id: session.id,
                task_id: session.task_id.clone(),
                progress: session.progress,
                status_message: session.status_message.clone(),
            }),
            input_error: self.input_error.clone(),
            error,
            saved_path: self.saved_path.clone(),
            history: self.history.clone(),
            dirty: self.dirty,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Id of the session whose messages are currently accepted.
    pub fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(|session| session.id)
    }

    /// Returns whether the view changed since the last call and clears the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_prompt(&mut self, prompt: String) {
        if self.prompt != prompt {
            self.prompt = prompt;
            self.mark_dirty();
        }
    }

    pub(crate) fn prompt(&self) -> &str {
        &self.prompt
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        if self.phase != phase {
            self.phase = phase;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_input_error(&mut self, error: Option<String>) {
        if self.input_error != error {
            self.input_error = error;
            self.mark_dirty();
        }
    }

    pub(crate) fn begin_search(&mut self, prompt: String) {
        self.submitted_prompt = Some(prompt);
        self.articles.clear();
        self.saved_path = None;
        self.set_phase(Phase::Searching);
        self.mark_dirty();
    }

    pub(crate) fn set_articles(&mut self, articles: Vec<Article>) {
        self.articles = articles
            .into_iter()
            .map(|article| ArticleRow {
                article,
                selected: false,
            })
            .collect();
        self.mark_dirty();
    }

    /// Appends links as pre-selected rows; returns how many were new.
    pub(crate) fn add_links(&mut self, links: Vec<String>) -> usize {
        let mut added = 0;
        for link in links {
            let link = link.trim();
            if link.is_empty() {
                continue;
            }
            let key = normalize_url_for_dedupe(link);
            let known = self
                .articles
                .iter()
                .any(|row| normalize_url_for_dedupe(&row.article.url) == key);
            if known {
                continue;
            }
            self.articles.push(ArticleRow {
                article: Article::from_link(link),
                selected: true,
            });
            added += 1;
        }
        if added > 0 {
            self.mark_dirty();
        }
        added
    }

    pub(crate) fn toggle_article(&mut self, index: usize) -> bool {
        match self.articles.get_mut(index) {
            Some(row) => {
                row.selected = !row.selected;
                self.mark_dirty();
                true
            }
            None => false,
        }
    }

    pub(crate) fn toggle_all_articles(&mut self) {
        if self.articles.is_empty() {
            return;
        }
        let select = !self.articles.iter().all(|row| row.selected);
        for row in &mut self.articles {
            row.selected = select;
        }
        self.mark_dirty();
    }

    pub(crate) fn has_articles(&self) -> bool {
        !self.articles.is_empty()
    }

    pub(crate) fn selected_links(&self) -> Vec<String> {
        self.articles
            .iter()
            .filter(|row| row.selected)
            .map(|row| row.article.url.clone())
            .collect()
    }

    /// Opens a new session, replacing any active one. Returns the new id.
    pub(crate) fn open_session(&mut self, article_count: usize) -> SessionId {
        self.last_session_id += 1;
        let prompt = self
            .submitted_prompt
            .clone()
            .unwrap_or_else(|| self.prompt.trim().to_string());
        self.active = Some(ActiveSession {
            id: self.last_session_id,
            prompt,
            article_count,
            task_id: None,
            progress: 0,
            status_message: String::new(),
        });
        self.saved_path = None;
        self.set_phase(Phase::Starting);
        self.mark_dirty();
        self.last_session_id
    }

    pub(crate) fn is_active(&self, session_id: SessionId) -> bool {
        self.active_session() == Some(session_id)
    }

    pub(crate) fn set_task_id(&mut self, task_id: String) {
        if let Some(session) = self.active.as_mut() {
            session.task_id = Some(task_id);
            self.mark_dirty();
        }
    }

    pub(crate) fn apply_progress(&mut self, progress: u8, message: String) {
        if let Some(session) = self.active.as_mut() {
            session.progress = progress.min(100);
            session.status_message = message;
            self.mark_dirty();
        }
    }

    /// Drops the active session; later messages tagged with its id are stale.
    pub(crate) fn close_session(&mut self) -> Option<SessionId> {
        let closed = self.active.take().map(|session| session.id);
        if closed.is_some() {
            self.mark_dirty();
        }
        closed
    }

    pub(crate) fn record_saved(&mut self, path: String, saved_at: String) -> Option<HistoryEntry> {
        let session = self.active.take()?;
        let entry = HistoryEntry {
            prompt: session.prompt,
            article_count: session.article_count,
            saved_path: path.clone(),
            saved_at,
        };
        self.saved_path = Some(path);
        self.history.push(entry.clone());
        self.set_phase(Phase::Saved);
        self.mark_dirty();
        Some(entry)
    }

    pub(crate) fn restore_history(&mut self, entries: Vec<HistoryEntry>) {
        self.history = entries;
        self.mark_dirty();
    }

    /// Resets everything except the saved history.
    pub(crate) fn clear(&mut self) {
        let history = std::mem::take(&mut self.history);
        let last_session_id = self.last_session_id;
        *self = Self {
            history,
            last_session_id,
            ..Self::default()
        };
        self.mark_dirty();
    }
}

/// Normalizes a link so trivially different spellings compare equal.
pub fn normalize_url_for_dedupe(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut normalized = url.to_string();
            if url.path() == "/" && url.query().is_none() {
                normalized.pop();
            }
            normalized
        }
        Err(_) => trimmed.trim_end_matches('/').to_ascii_lowercase(),
    }
}
