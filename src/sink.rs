//! Output table writer.
//!
//! Each successful record becomes one `<link>;<comment>\n` row. The file is
//! truncated when the sink is opened, so every run rewrites it from scratch.
use std::path::Path;
use thiserror::Error;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};

use crate::source::FIELD_SEPARATOR;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only writer of `(link, comment)` rows.
pub struct LinkSink<W: AsyncWrite + Unpin> {
    writer: BufWriter<W>,
    rows: usize,
}

impl LinkSink<tokio::fs::File> {
    /// Creates (or truncates) the output file at `path`.
    pub async fn create(path: &Path) -> Result<Self, SinkError> {
        let file = tokio::fs::File::create(path).await?;
        tracing::debug!(path = %path.display(), "Opened output file");
        Ok(Self::new(file))
    }
}

impl<W: AsyncWrite + Unpin> LinkSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            rows: 0,
        }
    }

    /// Appends one row.
    pub async fn append(&mut self, link: &str, comment: &str) -> Result<(), SinkError> {
        let row = format!("{}{}{}\n", link, FIELD_SEPARATOR, comment);
        self.writer.write_all(row.as_bytes()).await?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Flushes buffered rows and returns the underlying writer.
    pub async fn finish(mut self) -> Result<W, SinkError> {
        self.writer.flush().await?;
        Ok(self.writer.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rows_are_separated_and_terminated() {
        let mut sink = LinkSink::new(Vec::new());
        sink.append("https://a.com/", "3 posts").await.unwrap();
        sink.append("https://b.com/", "").await.unwrap();
        assert_eq!(sink.rows(), 2);

        let bytes = sink.finish().await.unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "https://a.com/;3 posts\nhttps://b.com/;\n"
        );
    }

    #[tokio::test]
    async fn test_create_truncates_existing_file() {
        let dir = std::env::temp_dir().join("feedsift_sink_test_truncate");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("links.csv");
        std::fs::write(&path, "stale;row\nstale;row\n").unwrap();

        let mut sink = LinkSink::create(&path).await.unwrap();
        sink.append("https://fresh.com/", "new").await.unwrap();
        sink.finish().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "https://fresh.com/;new\n"
        );

        std::fs::remove_dir_all(&dir).ok();
    }
}
