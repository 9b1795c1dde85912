pub mod agents;
pub mod json;
pub mod responders;

pub use agents::{EditorAgent, SummarizerAgent};
pub use responders::create_responder;

pub mod prelude {
    pub use super::agents::{EditorAgent, SummarizerAgent};
    pub use super::responders::{create_responder, LocalResponder, RemoteResponder};
    pub use dp_core::{Constraints, Draft, Error, FinalizedArticle, Responder, Result};
}
