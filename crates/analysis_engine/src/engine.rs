use std::sync::mpsc::{self, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use analysis_logging::{analysis_debug, analysis_warn};

use crate::poller::{ChannelProgressSink, JobPoller, PollSettings, ProgressSink};
use crate::{
    AnalysisApi, AnalysisRequest, ApiError, Article, ClientSettings, FailureKind, PollEvent,
    ReqwestAnalysisApi, SessionError, SessionId, SessionOutcome,
};

enum EngineCommand {
    Search { prompt: String },
    StartAnalysis { session_id: SessionId, links: Vec<String> },
    Cancel { session_id: SessionId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    ArticlesFound(Vec<Article>),
    SearchFailed(ApiError),
    Poll(PollEvent),
}

impl From<PollEvent> for EngineEvent {
    fn from(event: PollEvent) -> Self {
        EngineEvent::Poll(event)
    }
}

/// The engine thread is gone; no further events will arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("engine thread stopped")]
pub struct EngineStopped;

/// Runs searches and polling sessions on a background runtime.
///
/// Commands go in over a channel; [`EngineEvent`]s come back over another.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(client: ClientSettings, poll: PollSettings) -> Result<Self, ApiError> {
        let api = ReqwestAnalysisApi::new(client)?;
        Ok(Self::with_api(Arc::new(api), poll))
    }

    pub fn with_api(api: Arc<dyn AnalysisApi>, poll: PollSettings) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            let guard = runtime.enter();
            let mut poller = JobPoller::new(api.clone(), poll);
            let sink: Arc<dyn ProgressSink> = Arc::new(ChannelProgressSink::new(event_tx.clone()));

            while let Ok(command) = cmd_rx.recv() {
                handle_command(&runtime, api.clone(), &mut poller, &sink, &event_tx, command);
            }
            poller.cancel();
            drop(guard);
            runtime.shutdown_timeout(Duration::from_secs(1));
        });

        Self { cmd_tx, event_rx }
    }

    pub fn search(&self, prompt: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Search {
            prompt: prompt.into(),
        });
    }

    pub fn start_analysis(&self, session_id: SessionId, links: Vec<String>) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::StartAnalysis { session_id, links });
    }

    /// Stops polling `session_id` if it is still the active session.
    pub fn cancel(&self, session_id: SessionId) {
        let _ = self.cmd_tx.send(EngineCommand::Cancel { session_id });
    }

    pub fn try_recv(&self) -> Result<Option<EngineEvent>, EngineStopped> {
        match self.event_rx.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EngineStopped),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<EngineEvent>, EngineStopped> {
        match self.event_rx.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(EngineStopped),
        }
    }
}

fn handle_command(
    runtime: &tokio::runtime::Runtime,
    api: Arc<dyn AnalysisApi>,
    poller: &mut JobPoller,
    sink: &Arc<dyn ProgressSink>,
    event_tx: &mpsc::Sender<EngineEvent>,
    command: EngineCommand,
) {
    match command {
        EngineCommand::Search { prompt } => {
            let event_tx = event_tx.clone();
            let search = runtime.spawn(async move { api.scrape_articles(&prompt).await });
            // Every search answers, even when the request task panics.
            runtime.spawn(async move {
                let result = search.await.unwrap_or_else(|err| {
                    Err(ApiError::new(FailureKind::Aborted, err.to_string()))
                });
                let event = match result {
                    Ok(articles) => EngineEvent::ArticlesFound(articles),
                    Err(err) => {
                        analysis_warn!("Article search failed: {}", err);
                        EngineEvent::SearchFailed(err)
                    }
                };
                let _ = event_tx.send(event);
            });
        }
        EngineCommand::StartAnalysis { session_id, links } => {
            match AnalysisRequest::new(&links) {
                Ok(request) => poller.spawn(session_id, request, sink.clone()),
                Err(err) => sink.emit(PollEvent::Finished {
                    session_id,
                    outcome: SessionOutcome::Failed(SessionError::Start(err)),
                }),
            }
        }
        EngineCommand::Cancel { session_id } => {
            if poller.active_session() == Some(session_id) {
                poller.cancel();
            } else {
                analysis_debug!("Cancel for inactive session {} ignored", session_id);
            }
        }
    }
}
