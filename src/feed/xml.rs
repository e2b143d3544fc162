//! Minimal namespace-aware XML element tree.
//!
//! Feed classification needs three things a streaming reader makes awkward:
//! the root element's resolved namespace, scoped child lookups
//! (`channel/item`), and document-wide searches (`//atom:entry`). This module
//! reads the whole body once with `quick-xml`'s [`NsReader`] and keeps only
//! elements, attributes, and direct text.
//!
//! Well-formedness is strict: anything `quick-xml` rejects, plus unclosed
//! elements, missing or repeated roots, and stray text outside the root, is
//! reported as an [`XmlError`].
//!
//! Names, text, and attribute values are decoded with the encoding taken from
//! the BOM or the `<?xml encoding="..."?>` declaration, UTF-8 otherwise.
//! Only ASCII-compatible encodings can be parsed.
use encoding_rs::Encoding;
use quick_xml::encoding::Decoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use std::borrow::Cow;
use thiserror::Error;

/// SEC-003: Maximum element nesting depth accepted while building the tree.
/// Prevents unbounded memory growth from maliciously deep documents.
pub const MAX_XML_DEPTH: usize = 256;

/// Reasons a body is not a well-formed XML document.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum XmlError {
    /// Tokenizer-level failure reported by `quick-xml`.
    #[error("syntax error at byte {position}: {message}")]
    Syntax { position: u64, message: String },

    /// Input ended while an element was still open.
    #[error("unexpected end of document: <{0}> is not closed")]
    Unclosed(String),

    /// No element at all.
    #[error("document has no root element")]
    NoRoot,

    /// A second top-level element followed the root.
    #[error("extra content after the root element: <{0}>")]
    MultipleRoots(String),

    /// Non-whitespace character data outside the root element.
    #[error("text outside the root element")]
    TextOutsideRoot,

    /// SEC-003: Nesting exceeded [`MAX_XML_DEPTH`].
    #[error("element nesting exceeds maximum of {0} levels")]
    TooDeep(usize),

    /// Names or text could not be decoded with the document's encoding.
    #[error("undecodable text: {0}")]
    Encoding(String),
}

/// One XML element with its resolved namespace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    /// Resolved namespace URI, `None` when the element is unqualified.
    pub namespace: Option<String>,
    /// Local name without any prefix.
    pub name: String,
    /// Attributes in document order, keyed by their qualified name.
    pub attributes: Vec<(String, String)>,
    /// Concatenated character data that appears directly inside this element.
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// Returns true when the element has the given namespace and local name.
    pub fn is(&self, namespace: Option<&str>, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == namespace
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Direct children matching namespace and local name, in document order.
    pub fn children_named<'a>(
        &'a self,
        namespace: Option<&'a str>,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.children
            .iter()
            .filter(move |child| child.is(namespace, name))
    }

    /// All descendants (excluding `self`) matching namespace and local name,
    /// in document order.
    pub fn descendants_named<'a>(
        &'a self,
        namespace: Option<&str>,
        name: &str,
    ) -> Vec<&'a Element> {
        let mut found = Vec::new();
        let mut stack: Vec<&Element> = self.children.iter().rev().collect();
        while let Some(element) = stack.pop() {
            if element.is(namespace, name) {
                found.push(element);
            }
            stack.extend(element.children.iter().rev());
        }
        found
    }
}

/// A parsed XML document. Holds only the root element; prolog content
/// (declaration, doctype, comments) is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub root: Element,
    /// Encoding the body was decoded with.
    pub encoding: &'static Encoding,
}

/// Parses `bytes` into a [`Document`].
///
/// # Errors
///
/// Returns [`XmlError`] for any well-formedness failure, and
/// [`XmlError::Encoding`] when text is not valid in the detected encoding.
pub fn parse(bytes: &[u8]) -> Result<Document, XmlError> {
    // SEC-002: quick-xml never expands <!ENTITY> declarations; unknown entity
    // references fail in `unescape()` and surface as Syntax errors.
    let mut reader = NsReader::from_reader(bytes);
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut open: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        // Refreshed every event: the declaration can switch the encoding.
        let decoder = reader.decoder();
        let (namespace, event) = match reader.read_resolved_event_into(&mut buf) {
            Ok((ns, event)) => (resolve_namespace(ns, decoder)?, event),
            Err(e) => {
                return Err(XmlError::Syntax {
                    position: reader.buffer_position() as u64,
                    message: e.to_string(),
                })
            }
        };

        match event {
            Event::Start(e) => {
                if open.len() >= MAX_XML_DEPTH {
                    return Err(XmlError::TooDeep(MAX_XML_DEPTH));
                }
                let element = start_element(&e, namespace, &reader)?;
                if open.is_empty() && root.is_some() {
                    return Err(XmlError::MultipleRoots(element.name));
                }
                open.push(element);
            }
            Event::Empty(e) => {
                let element = start_element(&e, namespace, &reader)?;
                attach(&mut open, &mut root, element)?;
            }
            Event::End(_) => {
                // quick-xml has already verified the end name matches.
                if let Some(element) = open.pop() {
                    attach(&mut open, &mut root, element)?;
                }
            }
            Event::Text(t) => {
                if let Some(current) = open.last_mut() {
                    let raw = decode(reader.decoder(), &t)?;
                    let text = quick_xml::escape::unescape(&raw).map_err(|e| XmlError::Syntax {
                        position: reader.buffer_position() as u64,
                        message: e.to_string(),
                    })?;
                    current.text.push_str(&text);
                } else if !t.iter().all(u8::is_ascii_whitespace) {
                    return Err(XmlError::TextOutsideRoot);
                }
            }
            Event::CData(c) => {
                let Some(current) = open.last_mut() else {
                    return Err(XmlError::TextOutsideRoot);
                };
                let text = decode(reader.decoder(), &c)?;
                current.text.push_str(&text);
            }
            Event::Eof => break,
            // Declaration, doctype, comments, processing instructions
            _ => {}
        }
        buf.clear();
    }

    if let Some(unclosed) = open.pop() {
        return Err(XmlError::Unclosed(unclosed.name));
    }

    let encoding = reader.decoder().encoding();
    root.map(|root| Document { root, encoding })
        .ok_or(XmlError::NoRoot)
}

fn decode<'b>(decoder: Decoder, bytes: &'b [u8]) -> Result<Cow<'b, str>, XmlError> {
    decoder
        .decode(bytes)
        .map_err(|e| XmlError::Encoding(e.to_string()))
}

fn resolve_namespace(ns: ResolveResult<'_>, decoder: Decoder) -> Result<Option<String>, XmlError> {
    match ns {
        ResolveResult::Bound(namespace) => {
            decode(decoder, namespace.as_ref()).map(|s| Some(s.into_owned()))
        }
        // Undeclared prefixes are kept as unqualified names rather than rejected.
        ResolveResult::Unbound | ResolveResult::Unknown(_) => Ok(None),
    }
}

fn start_element(
    e: &BytesStart<'_>,
    namespace: Option<String>,
    reader: &NsReader<&[u8]>,
) -> Result<Element, XmlError> {
    let name = decode(reader.decoder(), e.local_name().as_ref())?.into_owned();

    let mut attributes = Vec::new();
    for attr_result in e.attributes() {
        let attr = attr_result.map_err(|err| XmlError::Syntax {
            position: reader.buffer_position() as u64,
            message: err.to_string(),
        })?;
        let key = decode(reader.decoder(), attr.key.as_ref())?.into_owned();
        let value = attr
            .decode_and_unescape_value(reader.decoder())
            .map_err(|err| XmlError::Syntax {
                position: reader.buffer_position() as u64,
                message: err.to_string(),
            })?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        namespace,
        name,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

/// Attaches a finished element to its parent, or makes it the root.
fn attach(
    open: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), XmlError> {
    if let Some(parent) = open.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if root.is_some() {
        return Err(XmlError::MultipleRoots(element.name));
    }
    *root = Some(element);
    Ok(())
}
