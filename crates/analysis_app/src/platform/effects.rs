use std::path::PathBuf;
use std::sync::mpsc;

use analysis_core::{AnalysisOutcome, Article, Artifact, Effect, Msg, SessionError, SessionId};
use analysis_engine::{EngineEvent, EngineHandle, EngineStopped, PollEvent, SessionOutcome};
use analysis_logging::{analysis_info, analysis_warn};
use chrono::Utc;

use super::persistence;

/// Executes core effects against the engine and the output directory.
///
/// Messages produced by effects go back through `msg_tx`; engine events are
/// drained with [`EffectRunner::drain_engine_events`].
pub struct EffectRunner {
    engine: EngineHandle,
    output_dir: PathBuf,
    msg_tx: mpsc::Sender<Msg>,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, output_dir: PathBuf, msg_tx: mpsc::Sender<Msg>) -> Self {
        Self {
            engine,
            output_dir,
            msg_tx,
        }
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::SearchArticles { prompt } => {
                    analysis_info!("SearchArticles prompt_len={}", prompt.len());
                    self.engine.search(prompt);
                }
                Effect::StartAnalysis { session_id, links } => {
                    analysis_info!(
                        "StartAnalysis session_id={} links={}",
                        session_id,
                        links.len()
                    );
                    self.engine.start_analysis(session_id, links);
                }
                Effect::CancelAnalysis { session_id } => {
                    self.engine.cancel(session_id);
                }
                Effect::SaveArtifact {
                    session_id,
                    file_name,
                    artifact,
                } => {
                    let msg = self.save(session_id, &file_name, artifact);
                    let _ = self.msg_tx.send(msg);
                }
                Effect::RecordHistory(entry) => {
                    persistence::append_history(&self.output_dir, entry);
                }
            }
        }
    }

    /// Forwards every pending engine event as a core message.
    pub fn drain_engine_events(&self) -> Result<(), EngineStopped> {
        while let Some(event) = self.engine.try_recv()? {
            let _ = self.msg_tx.send(map_event(event));
        }
        Ok(())
    }

    fn save(&self, session_id: SessionId, file_name: &str, artifact: Artifact) -> Msg {
        let artifact = analysis_engine::Artifact {
            bytes: artifact.bytes,
            content_type: artifact.content_type,
        };
        match analysis_engine::save_artifact(&self.output_dir, file_name, &artifact) {
            Ok(path) => Msg::ArtifactSaved {
                session_id,
                path: path.display().to_string(),
                saved_at: Utc::now().to_rfc3339(),
            },
            Err(err) => {
                analysis_warn!("Saving session {} failed: {}", session_id, err);
                Msg::ArtifactSaveFailed {
                    session_id,
                    message: err.to_string(),
                }
            }
        }
    }
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::ArticlesFound(articles) => {
            Msg::ArticlesLoaded(articles.into_iter().map(map_article).collect())
        }
        EngineEvent::SearchFailed(err) => Msg::ArticlesFailed(err.to_string()),
        EngineEvent::Poll(PollEvent::Started {
            session_id,
            task_id,
        }) => Msg::AnalysisStarted {
            session_id,
            task_id: task_id.to_string(),
        },
        EngineEvent::Poll(PollEvent::Progress { session_id, status }) => Msg::AnalysisProgress {
            session_id,
            progress: status.progress(),
            message: status.message().to_string(),
        },
        EngineEvent::Poll(PollEvent::Finished {
            session_id,
            outcome,
        }) => Msg::AnalysisFinished {
            session_id,
            outcome: map_outcome(outcome),
        },
    }
}

fn map_article(article: analysis_engine::Article) -> Article {
    let title = article.title.trim();
    Article {
        title: if title.is_empty() {
            "No Title".to_string()
        } else {
            title.to_string()
        },
        url: article.url,
        doi: article.doi.filter(|doi| !doi.trim().is_empty()),
    }
}

fn map_outcome(outcome: SessionOutcome) -> AnalysisOutcome {
    match outcome {
        SessionOutcome::Completed(artifact) => AnalysisOutcome::Delivered(Artifact {
            bytes: artifact.bytes,
            content_type: artifact.content_type,
        }),
        SessionOutcome::Failed(err) => AnalysisOutcome::Failed(map_error(err)),
        SessionOutcome::Cancelled => AnalysisOutcome::Cancelled,
    }
}

fn map_error(err: analysis_engine::SessionError) -> SessionError {
    use analysis_engine::SessionError as Engine;
    match err {
        Engine::Start(api) => SessionError::Start(api.to_string()),
        Engine::Poll(api) => SessionError::Poll(api.to_string()),
        Engine::Timeout { elapsed } => SessionError::Timeout {
            elapsed_secs: elapsed.as_secs(),
        },
        Engine::JobFailed { message } => SessionError::JobFailed(message),
        Engine::Aborted { message } => SessionError::Poll(message),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use analysis_engine::{ApiError, FailureKind, JobStatus, TaskId};

    use super::*;

    #[test]
    fn progress_event_carries_clamped_progress_and_message() {
        let msg = map_event(EngineEvent::Poll(PollEvent::Progress {
            session_id: 4,
            status: JobStatus::Pending {
                progress: 40,
                message: "Reading articles".to_string(),
            },
        }));
        assert_eq!(
            msg,
            Msg::AnalysisProgress {
                session_id: 4,
                progress: 40,
                message: "Reading articles".to_string(),
            }
        );
    }

    #[test]
    fn started_event_keeps_task_id() {
        let msg = map_event(EngineEvent::Poll(PollEvent::Started {
            session_id: 1,
            task_id: TaskId::new("abc"),
        }));
        assert_eq!(
            msg,
            Msg::AnalysisStarted {
                session_id: 1,
                task_id: "abc".to_string(),
            }
        );
    }

    #[test]
    fn timeout_maps_to_whole_seconds() {
        let outcome = map_outcome(SessionOutcome::Failed(
            analysis_engine::SessionError::Timeout {
                elapsed: Duration::from_millis(600_400),
            },
        ));
        assert_eq!(
            outcome,
            AnalysisOutcome::Failed(SessionError::Timeout { elapsed_secs: 600 })
        );
    }

    #[test]
    fn start_failure_keeps_transport_detail() {
        let outcome = map_outcome(SessionOutcome::Failed(analysis_engine::SessionError::Start(
            ApiError::new(FailureKind::HttpStatus(500), "500 Internal Server Error"),
        )));
        match outcome {
            AnalysisOutcome::Failed(SessionError::Start(detail)) => {
                assert!(detail.contains("500"), "{detail}")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn aborted_session_is_a_failed_poll() {
        let outcome = map_outcome(SessionOutcome::Failed(
            analysis_engine::SessionError::Aborted {
                message: "task 7 panicked".to_string(),
            },
        ));
        assert_eq!(
            outcome,
            AnalysisOutcome::Failed(SessionError::Poll("task 7 panicked".to_string()))
        );
    }

    #[test]
    fn blank_titles_get_a_placeholder() {
        let msg = map_event(EngineEvent::ArticlesFound(vec![analysis_engine::Article {
            title: "  ".to_string(),
            url: "https://example.org/a".to_string(),
            doi: Some(String::new()),
        }]));
        assert_eq!(
            msg,
            Msg::ArticlesLoaded(vec![Article {
                title: "No Title".to_string(),
                url: "https://example.org/a".to_string(),
                doi: None,
            }])
        );
    }
}
