//! Column names declared by a table's companion `.xsd`.

use std::collections::BTreeSet;
use std::io::BufRead;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::error::Result;

/// Numbers `k` of every `<xs:element name="c<k>">` in the schema.
pub fn declared_columns(input: &mut dyn BufRead) -> Result<BTreeSet<usize>> {
    let mut reader = Reader::from_reader(input);
    let mut buf = Vec::new();
    let mut columns = BTreeSet::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"element" => {
                for attribute in e.attributes() {
                    let attribute = attribute.map_err(quick_xml::Error::from)?;
                    if attribute.key.as_ref() != b"name" {
                        continue;
                    }
                    let name = attribute.unescape_value()?;
                    if let Some(k) = name
                        .strip_prefix('c')
                        .and_then(|k| k.parse::<usize>().ok())
                    {
                        columns.insert(k);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(columns)
}
