//! Feed side of the pipeline.
//!
//! - [`registry`]: loads the keyword → feed URL mapping at startup
//! - [`reader`]: retrieves a feed and turns its entries into alerts
//!
//! | Failure | Effect |
//! |---------|--------|
//! | registry missing or malformed | fatal, run aborts |
//! | feed unreachable or malformed | that feed yields no alerts |
//! | entry link without destination | that entry is dropped |

pub mod reader;
pub mod registry;

pub use reader::{FeedReader, FeedSource};
pub use registry::load_feeds;
