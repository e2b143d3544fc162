use crate::feed::detect::{AtomFeed, RssFeed, ATOM_NAMESPACE};
use crate::feed::xml::Element;
use serde::Serialize;

/// One feed-level `<link>` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkCandidate {
    /// Text content (RSS) or `href` attribute (Atom), trimmed and stripped of
    /// control characters. Empty when the element carried nothing.
    pub href: String,
    /// The `rel` attribute, if present.
    pub rel: Option<String>,
}

impl LinkCandidate {
    /// A candidate is an alternate link when `rel` is absent or `alternate`.
    pub fn is_alternate(&self) -> bool {
        matches!(self.rel.as_deref(), None | Some("alternate"))
    }
}

/// Result of looking for a feed's home-page link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractResult {
    /// The feed has no items/entries.
    EntriesAbsent,
    /// Exactly one alternate link was found.
    LinkFound(String),
    /// Zero or several alternate links. Holds every feed-level link in
    /// document order, unfiltered, so a caller can fall back to the first.
    AmbiguousLinks(Vec<LinkCandidate>),
}

/// Format-specific traversal of a recognised feed document.
pub trait FeedDocument {
    /// Number of posts (`item` or `entry` elements) the feed carries.
    fn entries(&self) -> usize;

    /// Feed-level link elements in document order.
    fn candidate_links(&self) -> Vec<LinkCandidate>;
}

impl FeedDocument for RssFeed {
    fn entries(&self) -> usize {
        self.0
            .root
            .children_named(None, "channel")
            .map(|channel| channel.children_named(None, "item").count())
            .sum()
    }

    fn candidate_links(&self) -> Vec<LinkCandidate> {
        self.0
            .root
            .children_named(None, "channel")
            .flat_map(|channel| channel.children_named(None, "link"))
            .map(|link| candidate(link, &link.text))
            .collect()
    }
}

impl FeedDocument for AtomFeed {
    fn entries(&self) -> usize {
        self.0
            .root
            .descendants_named(Some(ATOM_NAMESPACE), "entry")
            .len()
    }

    fn candidate_links(&self) -> Vec<LinkCandidate> {
        self.0
            .root
            .children_named(Some(ATOM_NAMESPACE), "link")
            .map(|link| candidate(link, link.attr("href").unwrap_or_default()))
            .collect()
    }
}

fn candidate(link: &Element, raw_href: &str) -> LinkCandidate {
    LinkCandidate {
        href: clean_href(raw_href),
        rel: link.attr("rel").map(str::to_owned),
    }
}

/// Trims surrounding whitespace and drops control characters so one link
/// always occupies exactly one output line. No URL normalisation.
fn clean_href(raw: &str) -> String {
    raw.trim().chars().filter(|c| !c.is_control()).collect()
}

/// Finds the home-page link of a recognised feed.
///
/// A feed without entries is reported as [`ExtractResult::EntriesAbsent`]
/// before links are looked at. Otherwise the candidates are filtered to
/// alternate links; exactly one survivor is the answer, anything else is
/// [`ExtractResult::AmbiguousLinks`] carrying the unfiltered candidates.
pub fn extract(feed: &dyn FeedDocument) -> ExtractResult {
    if feed.entries() == 0 {
        return ExtractResult::EntriesAbsent;
    }

    let candidates = feed.candidate_links();
    let mut alternates = candidates.iter().filter(|c| c.is_alternate());

    match (alternates.next(), alternates.next()) {
        (Some(only), None) => ExtractResult::LinkFound(only.href.clone()),
        _ => ExtractResult::AmbiguousLinks(candidates),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::detect::{detect, ParsedFeed};
    use pretty_assertions::assert_eq;

    fn extract_body(body: &str) -> ExtractResult {
        match detect(body.as_bytes()) {
            ParsedFeed::Rss(feed) => extract(&feed),
            ParsedFeed::Atom(feed) => extract(&feed),
            other => panic!("Expected a feed, got {:?}", other),
        }
    }

    #[test]
    fn test_rss_single_link() {
        let body = r#"<rss version="2.0"><channel>
            <title>Blog</title>
            <link>home</link>
            <item><title>Post</title><link>home/post</link></item>
        </channel></rss>"#;
        assert_eq!(extract_body(body), ExtractResult::LinkFound("home".into()));
    }

    #[test]
    fn test_rss_ignores_atom_self_link() {
        let body = r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom"><channel>
            <atom:link href="https://example.com/feed" rel="self"/>
            <link>https://example.com/</link>
            <item><title>Post</title></item>
        </channel></rss>"#;
        assert_eq!(
            extract_body(body),
            ExtractResult::LinkFound("https://example.com/".into())
        );
    }

    #[test]
    fn test_rss_link_text_is_trimmed() {
        let body = "<rss><channel>\n  <link>\n    https://example.com/\n  </link>\n  <item/>\n</channel></rss>";
        assert_eq!(
            extract_body(body),
            ExtractResult::LinkFound("https://example.com/".into())
        );
    }

    #[test]
    fn test_rss_relative_link_kept_verbatim() {
        let body = "<rss><channel><link>//ldirer.com/</link><item/></channel></rss>";
        assert_eq!(
            extract_body(body),
            ExtractResult::LinkFound("//ldirer.com/".into())
        );
    }

    #[test]
    fn test_rss_empty_channel() {
        let body = "<rss><channel><link>home</link></channel></rss>";
        assert_eq!(extract_body(body), ExtractResult::EntriesAbsent);
    }

    #[test]
    fn test_rss_items_outside_channel_do_not_count() {
        let body = "<rss><channel><link>home</link></channel><item/></rss>";
        assert_eq!(extract_body(body), ExtractResult::EntriesAbsent);
    }

    #[test]
    fn test_rss_without_link_is_ambiguous() {
        let body = "<rss><channel><item/></channel></rss>";
        assert_eq!(extract_body(body), ExtractResult::AmbiguousLinks(vec![]));
    }

    #[test]
    fn test_rss_two_links_is_ambiguous() {
        let body = "<rss><channel><link>a</link><link>b</link><item/></channel></rss>";
        assert_eq!(
            extract_body(body),
            ExtractResult::AmbiguousLinks(vec![
                LinkCandidate {
                    href: "a".into(),
                    rel: None
                },
                LinkCandidate {
                    href: "b".into(),
                    rel: None
                },
            ])
        );
    }

    #[test]
    fn test_atom_alternate_beats_self() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <link rel="alternate" href="home"/>
            <link rel="self" href="api"/>
            <entry><id>1</id></entry>
        </feed>"#;
        assert_eq!(extract_body(body), ExtractResult::LinkFound("home".into()));
    }

    #[test]
    fn test_atom_link_without_rel_is_alternate() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <link rel="self" href="api"/>
            <link href="home"/>
            <entry/>
        </feed>"#;
        assert_eq!(extract_body(body), ExtractResult::LinkFound("home".into()));
    }

    #[test]
    fn test_atom_entry_links_are_not_candidates() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <link rel="alternate" href="home"/>
            <entry><link rel="alternate" href="home/post"/></entry>
        </feed>"#;
        assert_eq!(extract_body(body), ExtractResult::LinkFound("home".into()));
    }

    #[test]
    fn test_atom_nested_entries_count() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <link href="home"/>
            <wrapper><entry/></wrapper>
        </feed>"#;
        assert_eq!(extract_body(body), ExtractResult::LinkFound("home".into()));
    }

    #[test]
    fn test_atom_no_entries() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom"><link href="home"/></feed>"#;
        assert_eq!(extract_body(body), ExtractResult::EntriesAbsent);
    }

    #[test]
    fn test_atom_unqualified_entries_do_not_count() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom"><link href="home"/><entry xmlns=""/></feed>"#;
        assert_eq!(extract_body(body), ExtractResult::EntriesAbsent);
    }

    #[test]
    fn test_atom_two_alternates_is_ambiguous() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <link rel="self" href="api"/>
            <link rel="alternate" href="first"/>
            <link rel="alternate" href="second"/>
            <entry/>
        </feed>"#;
        match extract_body(body) {
            ExtractResult::AmbiguousLinks(candidates) => {
                let hrefs: Vec<_> = candidates.iter().map(|c| c.href.as_str()).collect();
                assert_eq!(hrefs, vec!["api", "first", "second"]);
            }
            other => panic!("Expected AmbiguousLinks, got {:?}", other),
        }
    }

    #[test]
    fn test_atom_only_self_link_is_ambiguous() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom">
            <link rel="self" href="api"/>
            <entry/>
        </feed>"#;
        assert_eq!(
            extract_body(body),
            ExtractResult::AmbiguousLinks(vec![LinkCandidate {
                href: "api".into(),
                rel: Some("self".into())
            }])
        );
    }

    #[test]
    fn test_atom_missing_href_is_empty() {
        let body = r#"<feed xmlns="http://www.w3.org/2005/Atom"><link rel="alternate"/><entry/></feed>"#;
        assert_eq!(extract_body(body), ExtractResult::LinkFound(String::new()));
    }
}
