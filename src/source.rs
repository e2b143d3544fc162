//! Input list reader.
//!
//! The input is a line-oriented UTF-8 file where every non-blank line is
//! `<url>;<comment>`. The comment may be empty but the separator is
//! mandatory; a line without it is rejected rather than guessed at.
use std::path::Path;
use thiserror::Error;

/// Separator between URL and comment on an input line.
pub const FIELD_SEPARATOR: char = ';';

/// Errors that abort a run before any feed is fetched.
#[derive(Debug, Error)]
pub enum SourceError {
    /// A non-blank line has no `;`.
    #[error("line {line}: missing ';' separator in {content:?}")]
    MissingSeparator { line: usize, content: String },

    /// The URL part before `;` is empty.
    #[error("line {line}: empty URL")]
    EmptyUrl { line: usize },

    #[error("Failed to read input file: {0}")]
    Io(#[from] std::io::Error),
}

/// One candidate feed from the input list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub url: String,
    /// Free-text comment carried through to the output. Possibly empty.
    pub comment: String,
    /// 1-based line number in the input file.
    pub line: usize,
}

/// Reads and parses the input list at `path`.
///
/// The whole file is validated before it is returned, so a malformed line
/// aborts the run before the first request goes out.
pub async fn read_requests(path: &Path) -> Result<Vec<FeedRequest>, SourceError> {
    let content = tokio::fs::read_to_string(path).await?;
    let requests = parse_requests(&content)?;
    tracing::info!(path = %path.display(), count = requests.len(), "Loaded feed requests");
    Ok(requests)
}

/// Parses input text into requests, preserving line order.
///
/// Lines are trimmed and blank lines skipped. Each remaining line is split at
/// its first `;`, so a comment may itself contain `;`.
pub fn parse_requests(content: &str) -> Result<Vec<FeedRequest>, SourceError> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then(|| parse_line(idx + 1, trimmed))
        })
        .collect()
}

fn parse_line(line: usize, trimmed: &str) -> Result<FeedRequest, SourceError> {
    let (url, comment) =
        trimmed
            .split_once(FIELD_SEPARATOR)
            .ok_or_else(|| SourceError::MissingSeparator {
                line,
                content: trimmed.to_owned(),
            })?;

    let url = url.trim();
    if url.is_empty() {
        return Err(SourceError::EmptyUrl { line });
    }

    Ok(FeedRequest {
        url: url.to_owned(),
        comment: comment.to_owned(),
        line,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_parse_url_and_comment() {
        let requests = parse_requests("https://a.com/feed;3 posts\n").unwrap();
        assert_eq!(
            requests,
            vec![FeedRequest {
                url: "https://a.com/feed".into(),
                comment: "3 posts".into(),
                line: 1,
            }]
        );
    }

    #[test]
    fn test_empty_comment_is_kept() {
        let requests = parse_requests("https://a.com/feed;").unwrap();
        assert_eq!(requests[0].comment, "");
    }

    #[test]
    fn test_blank_lines_skipped_but_counted() {
        let requests = parse_requests("\nhttps://a.com;x\n   \r\nhttps://b.com;\n").unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].line, 2);
        assert_eq!(requests[1].line, 4);
        assert_eq!(requests[1].url, "https://b.com");
    }

    #[test]
    fn test_crlf_line_endings() {
        let requests = parse_requests("https://a.com;one\r\nhttps://b.com;two\r\n").unwrap();
        assert_eq!(requests[0].comment, "one");
        assert_eq!(requests[1].comment, "two");
    }

    #[test]
    fn test_split_at_first_separator() {
        let requests = parse_requests("https://a.com;Inactive; 4 posts").unwrap();
        assert_eq!(requests[0].url, "https://a.com");
        assert_eq!(requests[0].comment, "Inactive; 4 posts");
    }

    #[test]
    fn test_missing_separator_is_error() {
        let err = parse_requests("https://a.com;ok\nhttps://b.com\n").unwrap_err();
        match err {
            SourceError::MissingSeparator { line, content } => {
                assert_eq!(line, 2);
                assert_eq!(content, "https://b.com");
            }
            other => panic!("Expected MissingSeparator, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_url_is_error() {
        assert!(matches!(
            parse_requests(";comment"),
            Err(SourceError::EmptyUrl { line: 1 })
        ));
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let result = read_requests(Path::new("/tmp/feedsift_test_nonexistent_input.csv")).await;
        assert!(matches!(result, Err(SourceError::Io(_))));
    }

    proptest! {
        #[test]
        fn prop_well_formed_lines_round_trip(
            rows in prop::collection::vec(("[a-z]{1,12}", "[a-zA-Z0-9 ,;]{0,20}"), 0..20)
        ) {
            let content: String = rows
                .iter()
                .map(|(host, comment)| format!("https://{}.com/feed;{}\n", host, comment))
                .collect();
            let requests = parse_requests(&content).unwrap();
            prop_assert_eq!(requests.len(), rows.len());
            for (request, (host, comment)) in requests.iter().zip(&rows) {
                prop_assert_eq!(&request.url, &format!("https://{}.com/feed", host));
                prop_assert_eq!(&request.comment, &comment.trim_end().to_string());
            }
        }
    }
}
