pub mod orchestrator;
pub mod publisher;

pub use orchestrator::{ItemError, Pipeline, RunPhase, RunSummary};
pub use publisher::{Publication, PublishOutcome, Publisher};

pub mod prelude {
    pub use super::orchestrator::{Pipeline, RunSummary};
    pub use super::publisher::{Publication, PublishOutcome, Publisher};
    pub use dp_core::config::PipelineConfig;
    pub use dp_core::{ContentKind, Error, Result};
    pub use tokio_util::sync::CancellationToken;
}
