//! Typed pull events over table content XML.

use std::io::BufRead;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::Result;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Element names that carry meaning in table content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tag {
    Table,
    Row,
    /// `c<k>`, 1-based column number.
    Column(usize),
    /// `a<k>`, 1-based position within one array dimension.
    Array(u32),
    Other(String),
}

impl Tag {
    pub fn parse(name: &str) -> Tag {
        match name {
            "table" => Tag::Table,
            "row" => Tag::Row,
            _ => {
                let numbered = |prefix: char| {
                    name.strip_prefix(prefix)
                        .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
                };
                if let Some(k) = numbered('c').and_then(|k| k.parse().ok()) {
                    Tag::Column(k)
                } else if let Some(k) = numbered('a').and_then(|k| k.parse().ok()) {
                    Tag::Array(k)
                } else {
                    Tag::Other(name.to_string())
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlEvent {
    Open {
        tag: Tag,
        attributes: Vec<(String, String)>,
    },
    Text(String),
    Close {
        tag: Tag,
    },
}

impl XmlEvent {
    pub fn open(tag: Tag) -> Self {
        XmlEvent::Open {
            tag,
            attributes: Vec::new(),
        }
    }
}

/// Streams [`XmlEvent`]s out of a content document.
///
/// Self-closing elements are reported as an open immediately followed by a
/// close. Comments, processing instructions and the declaration are skipped.
pub struct EventReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
}

impl<R: BufRead> EventReader<R> {
    pub fn new(mut input: R) -> Result<Self> {
        if input.fill_buf()?.starts_with(UTF8_BOM) {
            input.consume(UTF8_BOM.len());
        }
        let mut reader = Reader::from_reader(input);
        let config = reader.config_mut();
        config.expand_empty_elements = true;
        config.trim_text(false);
        Ok(Self {
            reader,
            buf: Vec::new(),
        })
    }

    /// Next event, or `None` at end of document.
    pub fn next_event(&mut self) -> Result<Option<XmlEvent>> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf)? {
                Event::Start(start) => XmlEvent::Open {
                    tag: tag_of(&start),
                    attributes: attributes_of(&start)?,
                },
                Event::End(end) => XmlEvent::Close {
                    tag: Tag::parse(&String::from_utf8_lossy(end.local_name().as_ref())),
                },
                Event::Text(text) => XmlEvent::Text(text.unescape()?.into_owned()),
                Event::CData(data) => XmlEvent::Text(String::from_utf8_lossy(&data).into_owned()),
                Event::Eof => return Ok(None),
                _ => continue,
            };
            return Ok(Some(event));
        }
    }
}

fn tag_of(start: &BytesStart<'_>) -> Tag {
    Tag::parse(&String::from_utf8_lossy(start.local_name().as_ref()))
}

fn attributes_of(start: &BytesStart<'_>) -> Result<Vec<(String, String)>> {
    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute.unescape_value()?.into_owned();
        attributes.push((key, value));
    }
    Ok(attributes)
}
