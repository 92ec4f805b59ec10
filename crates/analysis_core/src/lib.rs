//! Analysis core: pure state machine and view-model helpers.
mod effect;
mod msg;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use msg::Msg;
pub use state::{
    normalize_url_for_dedupe, AnalysisOutcome, AppState, Article, Artifact, HistoryEntry, Phase,
    SessionError, SessionId, ARTIFACT_FILE_NAME,
};
pub use update::update;
pub use view_model::{AppViewModel, ArticleRowView, SessionView};
