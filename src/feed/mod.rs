//! Feed retrieval and classification.
//!
//! This module covers the network-facing half of the pipeline:
//!
//! - **Fetching**: one HTTP GET per URL, folded into a tri-state [`FetchOutcome`]
//! - **Detection**: well-formedness check plus root-element classification
//!   into RSS, Atom, or unrecognised ([`ParsedFeed`])
//! - **Extraction**: locating the feed-level home-page link with alternate-link
//!   disambiguation ([`ExtractResult`])
//!
//! # Architecture
//!
//! - [`xml`] - Namespace-aware element tree on top of `quick-xml`
//! - [`fetcher`] - HTTP retrieval with timeout and size limits
//! - [`detect`] - Format detection
//! - [`extract`] - Per-format link extraction behind the [`FeedDocument`] trait
//!
//! # Example
//!
//! ```ignore
//! use feedsift::feed::{detect, extract, fetch, FetchOutcome, ParsedFeed};
//!
//! if let FetchOutcome::Body(bytes) = fetch(&client, url, &settings).await {
//!     if let ParsedFeed::Rss(feed) = detect(&bytes) {
//!         let result = extract(&feed);
//!     }
//! }
//! ```

pub mod detect;
pub mod extract;
pub mod fetcher;
pub mod xml;

pub use detect::{detect, AtomFeed, ParsedFeed, RssFeed, ATOM_NAMESPACE, PREVIEW_CHARS};
pub use extract::{extract, ExtractResult, FeedDocument, LinkCandidate};
pub use fetcher::{build_client, fetch, FetchOutcome, FetchSettings};
pub use xml::XmlError;
