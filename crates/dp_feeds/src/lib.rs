pub mod aggregator;
pub mod parse;
pub mod transport;

pub use aggregator::{AggregationResult, FeedAggregator, FetchFailure};
pub use transport::{FeedTransport, HttpTransport};

pub mod prelude {
    pub use super::aggregator::{AggregationResult, FeedAggregator, FetchFailure};
    pub use super::transport::{FeedTransport, HttpTransport};
    pub use dp_core::{AggregatedItem, Error, FeedSource, Result};
}
