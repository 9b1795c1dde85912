use std::sync::Arc;

use dp_core::config::{ProviderKind, ResponderConfig};
use dp_core::{Responder, Result};
use tracing::info;

pub mod local;
pub mod remote;

pub use local::LocalResponder;
pub use remote::RemoteResponder;

/// Build the responder selected by `config.provider`.
pub fn create_responder(config: &ResponderConfig) -> Result<Arc<dyn Responder>> {
    let responder: Arc<dyn Responder> = match config.provider {
        ProviderKind::Local => Arc::new(LocalResponder::new()),
        ProviderKind::Remote => Arc::new(RemoteResponder::new(config)?),
    };
    info!("🤖 Using {} responder", responder.name());
    Ok(responder)
}
