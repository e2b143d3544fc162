use encoding_rs::Encoding;

use crate::feed::xml::{self, Document};

/// Namespace URI that qualifies an Atom `<feed>` root.
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";

/// Number of body characters retained for diagnostics when the root is not a
/// feed.
pub const PREVIEW_CHARS: usize = 250;

/// A fetched body classified by its root element.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedFeed {
    /// Unqualified `<rss>` root.
    Rss(RssFeed),
    /// `<feed>` root in the Atom namespace.
    Atom(AtomFeed),
    /// Well-formed XML with any other root. Only a bounded preview of the
    /// body is kept.
    Unrecognized {
        root: String,
        preview: String,
    },
    /// The body is not well-formed XML.
    MalformedXml(xml::XmlError),
}

/// RSS 2.0 document (root `<rss>`).
#[derive(Debug, Clone, PartialEq)]
pub struct RssFeed(pub Document);

/// Atom 1.0 document (root `{http://www.w3.org/2005/Atom}feed`).
#[derive(Debug, Clone, PartialEq)]
pub struct AtomFeed(pub Document);

/// Classifies a response body.
///
/// Well-formedness is checked first; a body that fails to parse is
/// [`ParsedFeed::MalformedXml`] regardless of what its root looks like.
/// Root comparison is exact: a `<feed>` in any namespace other than Atom's,
/// or an `<rss>` carrying a default namespace, is [`ParsedFeed::Unrecognized`].
pub fn detect(body: &[u8]) -> ParsedFeed {
    let document = match xml::parse(body) {
        Ok(document) => document,
        Err(e) => return ParsedFeed::MalformedXml(e),
    };

    if document.root.is(None, "rss") {
        ParsedFeed::Rss(RssFeed(document))
    } else if document.root.is(Some(ATOM_NAMESPACE), "feed") {
        ParsedFeed::Atom(AtomFeed(document))
    } else {
        ParsedFeed::Unrecognized {
            root: qualified_name(&document),
            preview: preview(body, document.encoding),
        }
    }
}

/// `{namespace}local` in Clark notation, or just `local` when unqualified.
fn qualified_name(document: &Document) -> String {
    match &document.root.namespace {
        Some(ns) => format!("{{{}}}{}", ns, document.root.name),
        None => document.root.name.clone(),
    }
}

/// First [`PREVIEW_CHARS`] characters of the body. A BOM overrides
/// `encoding`; undecodable bytes become U+FFFD.
pub fn preview(body: &[u8], encoding: &'static Encoding) -> String {
    let (text, _, _) = encoding.decode(body);
    text.chars().take(PREVIEW_CHARS).collect()
}
