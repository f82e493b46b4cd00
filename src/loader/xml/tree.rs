//! Generic owned document tree built from `quick-xml` events.

use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::isa::diagnostic::SourcePosition;
use crate::isa::error::InstError;

/// One element of a parsed document: tag, attributes in document order, child elements, and
/// the concatenated character data directly inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlElement>,
    pub text: String,
    pub position: SourcePosition,
}

impl XmlElement {
    fn open(
        start: &BytesStart<'_>,
        path: &Path,
        src: &str,
        offset: usize,
    ) -> Result<Self, InstError> {
        let position = SourcePosition::from_offset(src, offset);
        let tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|err| {
                InstError::parse(path, Some(position), format!("<{tag}>: {err}"))
            })?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(|err| {
                InstError::parse(path, Some(position), format!("<{tag}> attribute '{key}': {err}"))
            })?;
            attributes.push((key, value.into_owned()));
        }
        Ok(Self {
            tag,
            attributes,
            children: Vec::new(),
            text: String::new(),
            position,
        })
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Child elements with the given tag, in document order.
    pub fn children_named<'a>(
        &'a self,
        tag: &'a str,
    ) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |child| child.tag == tag)
    }
}

/// Parses `src` (the contents of `path`) into its root element.
///
/// Mismatched or unclosed tags, duplicate attributes, stray top-level text and a missing or
/// repeated root element are all parse errors carrying the offending position.
pub fn parse_document(path: &Path, src: &str) -> Result<XmlElement, InstError> {
    let mut reader = Reader::from_str(src);
    let mut buf = Vec::new();
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;

    loop {
        let offset = reader.buffer_position();
        let event = reader.read_event_into(&mut buf).map_err(|err| {
            let at = SourcePosition::from_offset(src, reader.buffer_position());
            InstError::parse(path, Some(at), err.to_string())
        })?;
        match event {
            Event::Start(start) => {
                stack.push(XmlElement::open(&start, path, src, offset)?);
            }
            Event::Empty(start) => {
                let element = XmlElement::open(&start, path, src, offset)?;
                attach(path, src, offset, element, &mut stack, &mut root)?;
            }
            Event::End(end) => {
                let Some(element) = stack.pop() else {
                    let name = String::from_utf8_lossy(end.name().as_ref()).into_owned();
                    return Err(InstError::parse(
                        path,
                        Some(SourcePosition::from_offset(src, offset)),
                        format!("closing tag </{name}> has no matching opening tag"),
                    ));
                };
                attach(path, src, offset, element, &mut stack, &mut root)?;
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|err| {
                    let position = SourcePosition::from_offset(src, offset);
                    InstError::parse(path, Some(position), err.to_string())
                })?;
                push_text(path, src, offset, &text, &mut stack)?;
            }
            Event::CData(data) => {
                let data = data.into_inner();
                let text = String::from_utf8_lossy(&data);
                push_text(path, src, offset, &text, &mut stack)?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions and doctypes carry no content.
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(InstError::parse(
            path,
            Some(open.position),
            format!("unexpected end of document: <{}> is never closed", open.tag),
        ));
    }
    root.ok_or_else(|| {
        InstError::parse(
            path,
            Some(SourcePosition::from_offset(src, src.len())),
            "document has no root element",
        )
    })
}

fn attach(
    path: &Path,
    src: &str,
    offset: usize,
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<(), InstError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
        return Ok(());
    }
    if let Some(existing) = root {
        return Err(InstError::parse(
            path,
            Some(SourcePosition::from_offset(src, offset)),
            format!(
                "second top-level element <{}> after root <{}>",
                element.tag, existing.tag
            ),
        ));
    }
    *root = Some(element);
    Ok(())
}

fn push_text(
    path: &Path,
    src: &str,
    offset: usize,
    text: &str,
    stack: &mut [XmlElement],
) -> Result<(), InstError> {
    match stack.last_mut() {
        Some(current) => {
            current.text.push_str(text);
            Ok(())
        }
        None if text.trim().is_empty() => Ok(()),
        None => Err(InstError::parse(
            path,
            Some(SourcePosition::from_offset(src, offset)),
            "text outside the root element",
        )),
    }
}
