//! Batch validation of candidate RSS/Atom feeds.
//!
//! Reads `<url>;<comment>` lines, fetches every URL once, classifies the
//! response, and writes `<link>;<comment>` rows for each feed whose
//! home-page link could be extracted.
//!
//! - [`source`] - Input list reader
//! - [`feed`] - Fetching, format detection, and link extraction
//! - [`pipeline`] - Per-request state machine and the concurrent run loop
//! - [`sink`] - Output table writer
//! - [`report`] - Run summary and report rendering
//! - [`config`] - Optional TOML configuration

pub mod config;
pub mod feed;
pub mod pipeline;
pub mod report;
pub mod sink;
pub mod source;

pub use pipeline::{classify, Category, Pipeline, ResultRecord};
pub use report::RunSummary;
pub use source::FeedRequest;
