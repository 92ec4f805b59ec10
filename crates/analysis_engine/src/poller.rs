use std::sync::Arc;
use std::time::Duration;

use analysis_logging::{analysis_debug, analysis_error, analysis_info, analysis_warn};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    AnalysisApi, AnalysisRequest, CheckResponse, JobStatus, PollEvent, SessionError, SessionId,
    SessionOutcome, TaskId,
};

#[derive(Debug, Clone)]
pub struct PollSettings {
    /// Fixed delay between status checks. No backoff, no jitter.
    pub interval: Duration,
    /// Sessions still unfinished this long after `start` time out.
    pub ceiling: Duration,
}

impl PollSettings {
    /// A zero interval cannot drive a ticker; it falls back to the default.
    fn checked(mut self) -> Self {
        if self.interval.is_zero() {
            let interval = Self::default().interval;
            analysis_warn!("Poll interval of zero replaced by {:?}", interval);
            self.interval = interval;
        }
        self
    }
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            ceiling: Duration::from_secs(10 * 60),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: PollEvent);
}

pub struct ChannelProgressSink<E> {
    tx: std::sync::mpsc::Sender<E>,
}

impl<E> ChannelProgressSink<E> {
    pub fn new(tx: std::sync::mpsc::Sender<E>) -> Self {
        Self { tx }
    }
}

impl<E> ProgressSink for ChannelProgressSink<E>
where
    E: From<PollEvent> + Send,
{
    fn emit(&self, event: PollEvent) {
        let _ = self.tx.send(E::from(event));
    }
}

/// Owned handle to the scheduled polling of one session.
pub struct PollingTask {
    session_id: SessionId,
    cancel: CancellationToken,
    join: JoinHandle<SessionOutcome>,
}

impl PollingTask {
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Stops polling at the next suspension point. In-flight requests are dropped.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the terminal outcome of the session.
    pub async fn join(self) -> SessionOutcome {
        self.join.await.unwrap_or_else(aborted)
    }
}

/// Starts analysis jobs and polls them to a terminal outcome.
///
/// At most one session is active: spawning a new one cancels the previous.
pub struct JobPoller {
    api: Arc<dyn AnalysisApi>,
    settings: PollSettings,
    active: Option<PollingTask>,
}

impl JobPoller {
    pub fn new(api: Arc<dyn AnalysisApi>, settings: PollSettings) -> Self {
        Self {
            api,
            settings: settings.checked(),
            active: None,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// Creates the server-side job.
    pub async fn start(&self, request: &AnalysisRequest) -> Result<TaskId, SessionError> {
        self.api
            .start_analysis(request)
            .await
            .map_err(SessionError::Start)
    }

    /// Issues exactly one status check.
    pub async fn poll(&self, task_id: &TaskId) -> Result<CheckResponse, SessionError> {
        self.api
            .check_analysis(task_id)
            .await
            .map_err(SessionError::Poll)
    }

    /// Runs one session to completion on the current task.
    ///
    /// Emits `Started`, zero or more `Progress`, then exactly one `Finished`.
    pub async fn run(
        &self,
        session_id: SessionId,
        request: AnalysisRequest,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> SessionOutcome {
        let outcome = run_session(
            self.api.as_ref(),
            &self.settings,
            session_id,
            &request,
            sink,
            cancel,
        )
        .await;
        log_outcome(session_id, &outcome);
        sink.emit(PollEvent::Finished {
            session_id,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Spawns a session on the ambient tokio runtime, replacing any active one.
    pub fn spawn(
        &mut self,
        session_id: SessionId,
        request: AnalysisRequest,
        sink: Arc<dyn ProgressSink>,
    ) {
        if let Some(previous) = self.cancel() {
            analysis_info!(
                "Session {} replaced by session {}",
                previous,
                session_id
            );
        }

        let cancel = CancellationToken::new();
        let poller = JobPoller::new(self.api.clone(), self.settings.clone());
        let token = cancel.clone();
        let run_sink = sink.clone();
        let run = tokio::spawn(async move {
            poller
                .run(session_id, request, run_sink.as_ref(), &token)
                .await
        });

        // A panicking session still reports exactly one `Finished`.
        let join = tokio::spawn(async move {
            match run.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let outcome = aborted(err);
                    analysis_error!("Session {} aborted: {:?}", session_id, outcome);
                    sink.emit(PollEvent::Finished {
                        session_id,
                        outcome: outcome.clone(),
                    });
                    outcome
                }
            }
        });

        self.active = Some(PollingTask {
            session_id,
            cancel,
            join,
        });
    }

    /// Session currently being polled, if any.
    pub fn active_session(&self) -> Option<SessionId> {
        self.active
            .as_ref()
            .filter(|task| !task.is_finished())
            .map(PollingTask::session_id)
    }

    /// Stops scheduled polling and forgets the handle. Nothing is sent to the service.
    pub fn cancel(&mut self) -> Option<SessionId> {
        let task = self.active.take()?;
        task.cancel();
        if task.is_finished() {
            return None;
        }
        analysis_info!("Cancelled session {}", task.session_id);
        Some(task.session_id)
    }

    /// Hands out the active task so a caller can await it.
    pub fn take_active(&mut self) -> Option<PollingTask> {
        self.active.take()
    }
}

async fn run_session(
    api: &dyn AnalysisApi,
    settings: &PollSettings,
    session_id: SessionId,
    request: &AnalysisRequest,
    sink: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> SessionOutcome {
    let started_at = Instant::now();

    let task_id = tokio::select! {
        biased;
        _ = cancel.cancelled() => return SessionOutcome::Cancelled,
        result = api.start_analysis(request) => match result {
            Ok(task_id) => task_id,
            Err(err) => return SessionOutcome::Failed(SessionError::Start(err)),
        },
    };
    analysis_info!(
        "Session {} started task {} with {} article(s)",
        session_id,
        task_id,
        request.article_links().len()
    );
    sink.emit(PollEvent::Started {
        session_id,
        task_id: task_id.clone(),
    });

    // Checks run one after another; a slow response delays the next tick.
    let mut ticker = interval_at(Instant::now() + settings.interval, settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionOutcome::Cancelled,
            _ = ticker.tick() => {}
        }

        let elapsed = started_at.elapsed();
        if elapsed > settings.ceiling {
            return SessionOutcome::Failed(SessionError::Timeout { elapsed });
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return SessionOutcome::Cancelled,
            response = api.check_analysis(&task_id) => response,
        };

        match response {
            Err(err) => return SessionOutcome::Failed(SessionError::Poll(err)),
            Ok(CheckResponse::NotReady) => {
                analysis_debug!("Session {} task {} not ready", session_id, task_id);
            }
            Ok(CheckResponse::Artifact(artifact)) => {
                return SessionOutcome::Completed(artifact);
            }
            Ok(CheckResponse::Status(JobStatus::Failed { error, .. })) => {
                return SessionOutcome::Failed(SessionError::JobFailed { message: error });
            }
            Ok(CheckResponse::Status(status)) => {
                analysis_debug!(
                    "Session {} progress {}% {}",
                    session_id,
                    status.progress(),
                    status.message()
                );
                sink.emit(PollEvent::Progress { session_id, status });
            }
        }
    }
}

fn aborted(err: tokio::task::JoinError) -> SessionOutcome {
    SessionOutcome::Failed(SessionError::Aborted {
        message: err.to_string(),
    })
}

fn log_outcome(session_id: SessionId, outcome: &SessionOutcome) {
    match outcome {
        SessionOutcome::Completed(artifact) => analysis_info!(
            "Session {} delivered {} bytes",
            session_id,
            artifact.bytes.len()
        ),
        SessionOutcome::Failed(err) => analysis_warn!("Session {} failed: {}", session_id, err),
        SessionOutcome::Cancelled => analysis_info!("Session {} cancelled", session_id),
    }
}
