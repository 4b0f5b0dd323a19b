pub mod feed_error;
pub mod price_feed;
pub mod quote;
pub mod sorting;
pub mod ticker;

// Re-exports for convenient access (e.g. `use crate::market_data::Quote`).
pub use price_feed::{FeedEvent, PriceFeed};
pub use quote::Quote;
pub use sorting::sort_quotes;
