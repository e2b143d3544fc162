//! Fetch → detect → extract orchestration.
//!
//! [`Pipeline::process`] resolves one [`FeedRequest`] to exactly one
//! [`ResultRecord`]. [`Pipeline::run`] drives a whole input list through a
//! bounded pool of concurrent requests, writes successful rows to the sink in
//! input order, and folds every record into a [`RunSummary`].
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use tokio::io::AsyncWrite;

use crate::feed::{
    build_client, detect, extract, ExtractResult, FeedDocument, FetchOutcome, FetchSettings,
    LinkCandidate, ParsedFeed, XmlError,
};
use crate::report::RunSummary;
use crate::sink::{LinkSink, SinkError};
use crate::source::FeedRequest;

/// Why a successful link still needs a human to look at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "count")]
pub enum ReviewReason {
    /// Feed-level links exist but none is an alternate link.
    NoAlternateLink,
    /// More than one alternate link; holds how many.
    MultipleAlternateLinks(usize),
    /// The feed has entries but no feed-level link element at all.
    NoFeedLevelLink,
    /// The single alternate link carried no text or `href`.
    EmptyLink,
}

impl fmt::Display for ReviewReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewReason::NoAlternateLink => write!(f, "no alternate link"),
            ReviewReason::MultipleAlternateLinks(n) => write!(f, "{} alternate links", n),
            ReviewReason::NoFeedLevelLink => write!(f, "no feed-level link"),
            ReviewReason::EmptyLink => write!(f, "empty link"),
        }
    }
}

/// Marker attached to records whose link is a best-effort fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewFlag {
    pub reason: ReviewReason,
    /// Every feed-level link, unfiltered, in document order.
    pub candidates: Vec<LinkCandidate>,
}

/// Terminal classification of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultRecord {
    /// A home-page link was found. `review` is set when the link is the
    /// first-candidate fallback for an ambiguous feed, or is empty.
    Success {
        link: String,
        comment: String,
        review: Option<ReviewFlag>,
    },
    /// Recognised feed with zero items/entries.
    EmptyFeed,
    /// Well-formed XML that is not a usable feed. `detail` is either a body
    /// preview or a short explanation.
    BadFeedType {
        detail: String,
        review: Option<ReviewFlag>,
    },
    /// Body is not well-formed XML.
    MalformedXml(XmlError),
    /// Final HTTP status was not 200.
    BadHttpStatus(u16),
    /// Transport could not complete the request.
    ConnectionFailure(String),
}

/// The six mutually exclusive outcome buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Success,
    EmptyFeed,
    BadFeedType,
    MalformedXml,
    BadHttpStatus,
    ConnectionFailure,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Success,
        Category::EmptyFeed,
        Category::BadFeedType,
        Category::MalformedXml,
        Category::BadHttpStatus,
        Category::ConnectionFailure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Success => "success",
            Category::EmptyFeed => "empty_feed",
            Category::BadFeedType => "bad_feed_type",
            Category::MalformedXml => "malformed_xml",
            Category::BadHttpStatus => "bad_http_status",
            Category::ConnectionFailure => "connection_failure",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ResultRecord {
    pub fn category(&self) -> Category {
        match self {
            ResultRecord::Success { .. } => Category::Success,
            ResultRecord::EmptyFeed => Category::EmptyFeed,
            ResultRecord::BadFeedType { .. } => Category::BadFeedType,
            ResultRecord::MalformedXml(_) => Category::MalformedXml,
            ResultRecord::BadHttpStatus(_) => Category::BadHttpStatus,
            ResultRecord::ConnectionFailure(_) => Category::ConnectionFailure,
        }
    }

    /// Short human-readable diagnostic for the report, if any.
    pub fn detail(&self) -> Option<String> {
        match self {
            ResultRecord::Success { link, .. } => Some(link.clone()),
            ResultRecord::EmptyFeed => None,
            ResultRecord::BadFeedType { detail, .. } => Some(detail.clone()),
            ResultRecord::MalformedXml(e) => Some(e.to_string()),
            ResultRecord::BadHttpStatus(status) => Some(status.to_string()),
            ResultRecord::ConnectionFailure(message) => Some(message.clone()),
        }
    }

    pub fn review(&self) -> Option<&ReviewFlag> {
        match self {
            ResultRecord::Success { review, .. } | ResultRecord::BadFeedType { review, .. } => {
                review.as_ref()
            }
            _ => None,
        }
    }
}

/// Maps a fetch outcome to its final classification.
///
/// Pure and network-free: this is the whole decision logic of the pipeline.
pub fn classify(outcome: FetchOutcome, comment: &str) -> ResultRecord {
    let body = match outcome {
        FetchOutcome::TransportError(message) => return ResultRecord::ConnectionFailure(message),
        FetchOutcome::HttpError(status) => return ResultRecord::BadHttpStatus(status),
        FetchOutcome::Body(body) => body,
    };

    let parsed = detect(&body);
    let document = match &parsed {
        ParsedFeed::MalformedXml(e) => return ResultRecord::MalformedXml(e.clone()),
        ParsedFeed::Unrecognized { root, preview } => {
            return ResultRecord::BadFeedType {
                detail: format!("root <{}>: {}", root, preview),
                review: None,
            }
        }
        ParsedFeed::Rss(feed) => feed as &dyn FeedDocument,
        ParsedFeed::Atom(feed) => feed as &dyn FeedDocument,
    };

    match extract(document) {
        ExtractResult::EntriesAbsent => ResultRecord::EmptyFeed,
        ExtractResult::LinkFound(link) => {
            let review = link.is_empty().then(|| ReviewFlag {
                reason: ReviewReason::EmptyLink,
                candidates: document.candidate_links(),
            });
            ResultRecord::Success {
                link,
                comment: comment.to_owned(),
                review,
            }
        }
        ExtractResult::AmbiguousLinks(candidates) => {
            let alternates = candidates.iter().filter(|c| c.is_alternate()).count();
            if candidates.is_empty() {
                return ResultRecord::BadFeedType {
                    detail: ReviewReason::NoFeedLevelLink.to_string(),
                    review: Some(ReviewFlag {
                        reason: ReviewReason::NoFeedLevelLink,
                        candidates,
                    }),
                };
            }
            let link = candidates[0].href.clone();
            let reason = if alternates == 0 {
                ReviewReason::NoAlternateLink
            } else {
                ReviewReason::MultipleAlternateLinks(alternates)
            };
            ResultRecord::Success {
                link,
                comment: comment.to_owned(),
                review: Some(ReviewFlag { reason, candidates }),
            }
        }
    }
}

/// Shared state for processing requests: one HTTP client and its limits.
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: reqwest::Client,
    settings: FetchSettings,
    concurrency: usize,
}

impl Pipeline {
    /// Creates a pipeline with its own HTTP client.
    ///
    /// `concurrency` is clamped to at least 1; `1` processes requests strictly
    /// one after another.
    pub fn new(settings: FetchSettings, concurrency: usize) -> reqwest::Result<Self> {
        let client = build_client(&settings)?;
        Ok(Self {
            client,
            settings,
            concurrency: concurrency.max(1),
        })
    }

    /// Resolves one request. Never fails: every problem is a classification.
    pub async fn process(&self, request: &FeedRequest) -> ResultRecord {
        let outcome = crate::feed::fetch(&self.client, &request.url, &self.settings).await;
        classify(outcome, &request.comment)
    }

    /// Processes every request and writes successful rows to `sink`.
    ///
    /// Up to `concurrency` requests are in flight at once, but records are
    /// consumed in input order, so the output rows and the summary lists
    /// follow the input regardless of completion order.
    ///
    /// # Errors
    ///
    /// Only a failure to write the sink aborts the run.
    pub async fn run<W: AsyncWrite + Unpin>(
        &self,
        requests: Vec<FeedRequest>,
        sink: &mut LinkSink<W>,
    ) -> Result<RunSummary, SinkError> {
        let total = requests.len();
        let mut summary = RunSummary::default();

        let mut records = stream::iter(requests)
            .map(|request| async move {
                let record = self.process(&request).await;
                (request, record)
            })
            .buffered(self.concurrency);

        let mut done = 0usize;
        while let Some((request, record)) = records.next().await {
            done += 1;
            log_record(done, total, &request, &record);

            if let ResultRecord::Success { link, comment, .. } = &record {
                sink.append(link, comment).await?;
            }
            summary.record(&request, &record);
        }

        Ok(summary)
    }
}

fn log_record(done: usize, total: usize, request: &FeedRequest, record: &ResultRecord) {
    match record {
        ResultRecord::Success { link, review: None, .. } => {
            tracing::info!(done, total, url = %request.url, link = %link, "Success");
        }
        ResultRecord::Success {
            link,
            review: Some(flag),
            ..
        } => {
            tracing::warn!(
                done,
                total,
                url = %request.url,
                link = %link,
                reason = %flag.reason,
                candidates = flag.candidates.len(),
                "Feed link needs review"
            );
        }
        other => {
            tracing::warn!(
                done,
                total,
                url = %request.url,
                category = %other.category(),
                detail = other.detail().as_deref().unwrap_or(""),
                "Feed rejected"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn body(s: &str) -> FetchOutcome {
        FetchOutcome::Body(s.as_bytes().to_vec())
    }

    #[test]
    fn test_transport_error_is_connection_failure() {
        assert_eq!(
            classify(FetchOutcome::TransportError("dns".into()), ""),
            ResultRecord::ConnectionFailure("dns".into())
        );
    }

    #[test]
    fn test_http_error_is_bad_status() {
        assert_eq!(
            classify(FetchOutcome::HttpError(404), ""),
            ResultRecord::BadHttpStatus(404)
        );
    }

    #[test]
    fn test_malformed_body() {
        assert_eq!(
            classify(body("<rss><channel>"), "").category(),
            Category::MalformedXml
        );
    }

    #[test]
    fn test_unrecognized_root_is_bad_feed() {
        let record = classify(body("<html><body/></html>"), "c");
        assert_eq!(record.category(), Category::BadFeedType);
        assert!(record.review().is_none());
    }

    #[test]
    fn test_rss_success_keeps_comment() {
        let record = classify(
            body("<rss><channel><link>home</link><item/></channel></rss>"),
            "5 posts",
        );
        assert_eq!(
            record,
            ResultRecord::Success {
                link: "home".into(),
                comment: "5 posts".into(),
                review: None,
            }
        );
    }

    #[test]
    fn test_empty_rss() {
        assert_eq!(
            classify(body("<rss><channel><link>home</link></channel></rss>"), ""),
            ResultRecord::EmptyFeed
        );
    }

    #[test]
    fn test_ambiguous_atom_falls_back_to_first_and_flags() {
        let record = classify(
            body(
                r#"<feed xmlns="http://www.w3.org/2005/Atom">
                <link rel="alternate" href="one"/>
                <link rel="alternate" href="two"/>
                <entry/></feed>"#,
            ),
            "",
        );
        match record {
            ResultRecord::Success {
                link,
                review: Some(flag),
                ..
            } => {
                assert_eq!(link, "one");
                assert_eq!(flag.reason, ReviewReason::MultipleAlternateLinks(2));
                assert_eq!(flag.candidates.len(), 2);
            }
            other => panic!("Expected flagged Success, got {:?}", other),
        }
    }

    #[test]
    fn test_only_self_link_falls_back_to_it() {
        let record = classify(
            body(
                r#"<feed xmlns="http://www.w3.org/2005/Atom">
                <link rel="self" href="api"/><entry/></feed>"#,
            ),
            "",
        );
        match record {
            ResultRecord::Success {
                link,
                review: Some(flag),
                ..
            } => {
                assert_eq!(link, "api");
                assert_eq!(flag.reason, ReviewReason::NoAlternateLink);
            }
            other => panic!("Expected flagged Success, got {:?}", other),
        }
    }

    #[test]
    fn test_no_feed_level_link_is_bad_feed_and_flagged() {
        let record = classify(body("<rss><channel><item/></channel></rss>"), "");
        assert_eq!(record.category(), Category::BadFeedType);
        assert_eq!(
            record.review().map(|r| r.reason.clone()),
            Some(ReviewReason::NoFeedLevelLink)
        );
    }

    #[test]
    fn test_empty_atom_href_is_flagged() {
        let record = classify(
            body(
                r#"<feed xmlns="http://www.w3.org/2005/Atom">
                <link rel="alternate"/><entry/></feed>"#,
            ),
            "c",
        );
        assert_eq!(
            record,
            ResultRecord::Success {
                link: String::new(),
                comment: "c".into(),
                review: Some(ReviewFlag {
                    reason: ReviewReason::EmptyLink,
                    candidates: vec![LinkCandidate {
                        href: String::new(),
                        rel: Some("alternate".into()),
                    }],
                }),
            }
        );
    }

    #[test]
    fn test_blank_rss_link_is_flagged() {
        let record = classify(
            body("<rss><channel><link>  </link><item/></channel></rss>"),
            "",
        );
        assert_eq!(record.category(), Category::Success);
        assert_eq!(
            record.review().map(|r| r.reason.clone()),
            Some(ReviewReason::EmptyLink)
        );
    }

    #[test]
    fn test_latin1_feed_succeeds() {
        let record = classify(
            FetchOutcome::Body(
                b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>\
                  <rss version=\"2.0\"><channel><title>Caf\xE9</title>\
                  <link>http://cafe.example/</link><item/></channel></rss>"
                    .to_vec(),
            ),
            "",
        );
        assert_eq!(record.category(), Category::Success);
        assert_eq!(record.detail().as_deref(), Some("http://cafe.example/"));
        assert!(record.review().is_none());
    }

    #[test]
    fn test_category_names() {
        let names: Vec<_> = Category::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "success",
                "empty_feed",
                "bad_feed_type",
                "malformed_xml",
                "bad_http_status",
                "connection_failure"
            ]
        );
    }
}
