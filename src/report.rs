//! Run-level summary and report rendering.
//!
//! A [`RunSummary`] is folded from `(request, record)` pairs in input order by
//! the orchestrator and never mutated from anywhere else. It renders as a
//! human-readable report via [`std::fmt::Display`] and serialises to JSON for
//! batch review of flagged links.
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::feed::LinkCandidate;
use crate::pipeline::{Category, ResultRecord, ReviewReason};
use crate::source::FeedRequest;

/// Accounting invariant violations detected at the end of a run.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SummaryError {
    #[error("incoming count {incoming} does not match category total {categorised}")]
    CountMismatch { incoming: usize, categorised: usize },

    #[error("success count {counted} does not match success list length {listed}")]
    SuccessMismatch { counted: usize, listed: usize },
}

/// One URL in a category list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub url: String,
    pub line: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// A link that needs manual review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlaggedLink {
    pub url: String,
    pub line: usize,
    pub category: Category,
    /// The fallback link written to the output, if one was.
    pub chosen: Option<String>,
    pub reason: ReviewReason,
    pub candidates: Vec<LinkCandidate>,
}

/// Totals and per-category URL lists for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub incoming_count: usize,
    pub success_count: usize,
    /// Every category is always present, possibly with an empty list.
    pub categories: BTreeMap<Category, Vec<ReportEntry>>,
    pub flagged: Vec<FlaggedLink>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            incoming_count: 0,
            success_count: 0,
            categories: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
            flagged: Vec::new(),
        }
    }
}

impl RunSummary {
    /// Folds a sequence of records into a summary.
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = (&'a FeedRequest, &'a ResultRecord)>,
    {
        records
            .into_iter()
            .fold(Self::default(), |mut summary, (request, record)| {
                summary.record(request, record);
                summary
            })
    }

    /// Adds one resolved request.
    pub fn record(&mut self, request: &FeedRequest, record: &ResultRecord) {
        let category = record.category();
        self.incoming_count += 1;
        if category == Category::Success {
            self.success_count += 1;
        }

        self.categories
            .entry(category)
            .or_default()
            .push(ReportEntry {
                url: request.url.clone(),
                line: request.line,
                detail: record.detail(),
            });

        if let Some(flag) = record.review() {
            let chosen = match record {
                ResultRecord::Success { link, .. } => Some(link.clone()),
                _ => None,
            };
            self.flagged.push(FlaggedLink {
                url: request.url.clone(),
                line: request.line,
                category,
                chosen,
                reason: flag.reason.clone(),
                candidates: flag.candidates.clone(),
            });
        }
    }

    pub fn count(&self, category: Category) -> usize {
        self.categories.get(&category).map_or(0, Vec::len)
    }

    /// URLs recorded under `category`, in input order.
    pub fn urls(&self, category: Category) -> Vec<&str> {
        self.categories
            .get(&category)
            .map(|entries| entries.iter().map(|e| e.url.as_str()).collect())
            .unwrap_or_default()
    }

    /// Checks that every request landed in exactly one category.
    pub fn check(&self) -> Result<(), SummaryError> {
        let categorised: usize = self.categories.values().map(Vec::len).sum();
        if categorised != self.incoming_count {
            return Err(SummaryError::CountMismatch {
                incoming: self.incoming_count,
                categorised,
            });
        }
        let listed = self.count(Category::Success);
        if listed != self.success_count {
            return Err(SummaryError::SuccessMismatch {
                counted: self.success_count,
                listed,
            });
        }
        Ok(())
    }

    /// Writes the summary as pretty-printed JSON.
    pub async fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Failures first, successes last
        for category in Category::ALL.iter().rev() {
            let entries = self
                .categories
                .get(category)
                .map(Vec::as_slice)
                .unwrap_or_default();
            writeln!(f, "{}: {}", category, entries.len())?;
            for entry in entries {
                match &entry.detail {
                    Some(detail) => writeln!(f, "  {} ({})", entry.url, first_line(detail))?,
                    None => writeln!(f, "  {}", entry.url)?,
                }
            }
        }

        writeln!(f, "flagged_for_review: {}", self.flagged.len())?;
        for flag in &self.flagged {
            match &flag.chosen {
                Some(chosen) => writeln!(f, "  {} -> {} ({})", flag.url, chosen, flag.reason)?,
                None => writeln!(f, "  {} ({})", flag.url, flag.reason)?,
            }
            for candidate in &flag.candidates {
                writeln!(
                    f,
                    "    rel={} href={}",
                    candidate.rel.as_deref().unwrap_or("-"),
                    candidate.href
                )?;
            }
        }

        writeln!(f, "incoming_count: {}", self.incoming_count)?;
        write!(f, "success_count: {}", self.success_count)
    }
}

/// Previews can span lines; the report keeps one line per URL.
fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("")
}
