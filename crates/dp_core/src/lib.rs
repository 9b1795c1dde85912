pub mod config;
pub mod error;
pub mod responder;
pub mod storage;
pub mod text;
pub mod types;

pub use error::{Error, Result};
pub use responder::{Constraints, Responder};
pub use storage::ContentStore;
pub use types::{
    AggregatedItem, ContentKind, Draft, DuplicatePolicy, FeedSource, FinalizedArticle, StoredRecord,
};
