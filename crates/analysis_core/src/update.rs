use crate::{AnalysisOutcome, AppState, Effect, Msg, Phase, ARTIFACT_FILE_NAME};

const EMPTY_PROMPT: &str = "Input cannot be empty.";
const EMPTY_SELECTION: &str = "Select at least one article.";

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::PromptChanged(text) => {
            state.set_prompt(text);
            Vec::new()
        }
        Msg::PromptSubmitted => {
            if state.phase().is_busy() {
                return (state, Vec::new());
            }
            let prompt = state.prompt().trim().to_string();
            if prompt.is_empty() {
                state.set_input_error(Some(EMPTY_PROMPT.to_string()));
                return (state, Vec::new());
            }
            state.set_input_error(None);
            state.begin_search(prompt.clone());
            vec![Effect::SearchArticles { prompt }]
        }
        Msg::ArticlesLoaded(articles) => {
            if *state.phase() == Phase::Searching {
                state.set_articles(articles);
                state.set_phase(Phase::Selecting);
            }
            Vec::new()
        }
        Msg::ArticlesFailed(message) => {
            if *state.phase() == Phase::Searching {
                state.set_phase(Phase::Failed(crate::SessionError::Search(message)));
            }
            Vec::new()
        }
        Msg::ArticleToggled(index) => {
            if !state.phase().is_busy() && state.toggle_article(index) {
                state.set_input_error(None);
            }
            Vec::new()
        }
        Msg::AllArticlesToggled => {
            if !state.phase().is_busy() {
                state.toggle_all_articles();
            }
            Vec::new()
        }
        Msg::LinksAdded(links) => {
            if state.phase().is_busy() {
                return (state, Vec::new());
            }
            state.add_links(links);
            if *state.phase() == Phase::Idle && state.has_articles() {
                state.set_phase(Phase::Selecting);
            }
            Vec::new()
        }
        Msg::AnalysisRequested => {
            if matches!(state.phase(), Phase::Searching | Phase::Saving) {
                return (state, Vec::new());
            }
            let links = state.selected_links();
            if links.is_empty() {
                state.set_input_error(Some(EMPTY_SELECTION.to_string()));
                return (state, Vec::new());
            }
            state.set_input_error(None);

            // A new request replaces the running session; the old one stops polling.
            let mut effects = Vec::with_capacity(2);
            if state.phase().is_polling() {
                if let Some(previous) = state.close_session() {
                    effects.push(Effect::CancelAnalysis {
                        session_id: previous,
                    });
                }
            }
            let session_id = state.open_session(links.len());
            effects.push(Effect::StartAnalysis { session_id, links });
            effects
        }
        Msg::AnalysisStarted {
            session_id,
            task_id,
        } => {
            if state.is_active(session_id) && *state.phase() == Phase::Starting {
                state.set_task_id(task_id);
                state.set_phase(Phase::Polling);
            }
            Vec::new()
        }
        Msg::AnalysisProgress {
            session_id,
            progress,
            message,
        } => {
            if state.is_active(session_id) && state.phase().is_polling() {
                state.apply_progress(progress, message);
                state.set_phase(Phase::Polling);
            }
            Vec::new()
        }
        Msg::AnalysisFinished {
            session_id,
            outcome,
        } => {
            if !state.is_active(session_id) || !state.phase().is_polling() {
                return (state, Vec::new());
            }
            match outcome {
                AnalysisOutcome::Delivered(artifact) => {
                    state.apply_progress(100, "Analysis complete".to_string());
                    state.set_phase(Phase::Saving);
                    vec![Effect::SaveArtifact {
                        session_id,
                        file_name: ARTIFACT_FILE_NAME.to_string(),
                        artifact,
                    }]
                }
                AnalysisOutcome::Failed(error) => {
                    state.close_session();
                    state.set_phase(Phase::Failed(error));
                    Vec::new()
                }
                AnalysisOutcome::Cancelled => {
                    state.close_session();
                    state.set_phase(Phase::Cancelled);
                    Vec::new()
                }
            }
        }
        Msg::CancelClicked => {
            if !state.phase().is_polling() {
                return (state, Vec::new());
            }
            let effects = state
                .close_session()
                .map(|session_id| vec![Effect::CancelAnalysis { session_id }])
                .unwrap_or_default();
            state.set_phase(Phase::Cancelled);
            effects
        }
        Msg::ArtifactSaved {
            session_id,
            path,
            saved_at,
        } => {
            if !state.is_active(session_id) || *state.phase() != Phase::Saving {
                return (state, Vec::new());
            }
            state
                .record_saved(path, saved_at)
                .map(|entry| vec![Effect::RecordHistory(entry)])
                .unwrap_or_default()
        }
        Msg::ArtifactSaveFailed {
            session_id,
            message,
        } => {
            if state.is_active(session_id) && *state.phase() == Phase::Saving {
                state.close_session();
                state.set_phase(Phase::Failed(crate::SessionError::Save(message)));
            }
            Vec::new()
        }
        Msg::ClearAll => {
            let mut effects = Vec::new();
            if state.phase().is_polling() {
                if let Some(session_id) = state.active_session() {
                    effects.push(Effect::CancelAnalysis { session_id });
                }
            }
            state.clear();
            effects
        }
        Msg::RestoreHistory(entries) => {
            state.restore_history(entries);
            Vec::new()
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}
