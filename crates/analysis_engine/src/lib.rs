//! Analysis engine: service transport, job polling and artifact persistence.
mod api;
mod engine;
mod persist;
mod poller;
mod types;
mod wire;

pub use api::{AnalysisApi, ClientSettings, ReqwestAnalysisApi};
pub use engine::{EngineEvent, EngineHandle, EngineStopped};
pub use persist::{ensure_output_dir, save_artifact, AtomicFileWriter, PersistError};
pub use poller::{ChannelProgressSink, JobPoller, PollSettings, PollingTask, ProgressSink};
pub use types::{
    AnalysisRequest, ApiError, Article, Artifact, CheckResponse, FailureKind, JobStatus,
    PollEvent, SessionError, SessionId, SessionOutcome, TaskId,
};
pub use wire::decode_check_body;
