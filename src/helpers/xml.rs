//! XML utilities for Office Open XML presentation parts
//! Provides a reader wrapper, helper traits for attribute and text processing,
//! and a small owned-event builder used to emit and splice markup

use crate::error::RustyDeckError;
use quick_xml::escape::resolve_xml_entity;
use quick_xml::events::attributes::Attribute;
use quick_xml::events::BytesDecl;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesRef;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;
use quick_xml::Reader;
use quick_xml::Writer;
use std::borrow::Cow;
use std::io::BufRead;
use std::str::FromStr;
use thiserror::Error;

/// Errors specific to XML parsing operations
#[derive(Error, Debug)]
pub enum XmlError {
    #[error("Parse entity '{0}' failed")]
    ParseEntityError(String),

    #[error("Parse attribute value '{0}' failed")]
    ParseAttributeValueError(String),
}

/// XML reader wrapper with a configuration suited to package parts
pub(crate) struct XmlReader<R: BufRead> {
    reader: Reader<R>,
    buffer: Vec<u8>,
}

impl<R: BufRead> XmlReader<R> {
    /// Creates a reader that expands empty elements into start/end pairs
    pub(crate) fn new(buf_reader: R) -> XmlReader<R> {
        Self::with_expansion(buf_reader, true)
    }

    /// Creates a reader that reports events exactly as written, so they can be written back unchanged
    pub(crate) fn verbatim(buf_reader: R) -> XmlReader<R> {
        Self::with_expansion(buf_reader, false)
    }

    fn with_expansion(buf_reader: R, expand_empty_elements: bool) -> XmlReader<R> {
        let mut reader = Reader::from_reader(buf_reader);
        let config = reader.config_mut();
        config.check_comments = false;
        config.check_end_names = false;
        config.expand_empty_elements = expand_empty_elements;
        config.trim_text(false);

        let buffer = Vec::with_capacity(1024);
        XmlReader { reader, buffer }
    }

    /// Reads the next XML event from the reader
    pub(crate) fn next(&'_ mut self) -> Result<Option<Event<'_>>, RustyDeckError> {
        self.buffer.clear();
        match self.reader.read_event_into(&mut self.buffer) {
            Ok(Event::Eof) => Ok(None),
            Ok(event) => Ok(Some(event)),
            Err(error) => Err(RustyDeckError::XmlError(error)),
        }
    }
}

/// Parses a whole part into owned events, keeping empty elements and whitespace intact
pub(crate) fn parse_events(bytes: &[u8]) -> Result<Vec<Event<'static>>, RustyDeckError> {
    let mut reader = XmlReader::verbatim(bytes);
    let mut events = Vec::new();
    while let Some(event) = reader.next()? {
        events.push(event.into_owned());
    }
    Ok(events)
}

/// Serializes events back into bytes
pub(crate) fn write_events<'a, I>(events: I) -> Result<Vec<u8>, RustyDeckError>
where
    I: IntoIterator<Item = &'a Event<'static>>,
{
    let mut writer = Writer::new(Vec::with_capacity(4096));
    for event in events {
        writer.write_event(event.borrow())?;
    }
    Ok(writer.into_inner())
}

/// Returns the local name of a start, empty or end event
pub(crate) fn local_name<'a>(event: &'a Event<'_>) -> Option<&'a [u8]> {
    match event {
        Event::Start(start) | Event::Empty(start) => Some(local_part(start.name().into_inner())),
        Event::End(end) => Some(local_part(end.name().into_inner())),
        _ => None,
    }
}

fn local_part(name: &[u8]) -> &[u8] {
    match name.iter().position(|byte| *byte == b':') {
        Some(index) => &name[index + 1..],
        None => name,
    }
}

/// Finds the index of the end event that closes the start event at `start`
pub(crate) fn matching_end(events: &[Event<'static>], start: usize) -> Option<usize> {
    if let Some(Event::Empty(_)) = events.get(start) {
        return Some(start);
    }
    let mut depth = 0usize;
    for (index, event) in events.iter().enumerate().skip(start) {
        match event {
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    return Some(index);
                }
            }
            _ => (),
        }
    }
    None
}

/// Rebuilds a start tag with one attribute replaced or appended
pub(crate) fn with_attribute(start: &BytesStart<'_>, key: &str, value: &str) -> Result<BytesStart<'static>, RustyDeckError> {
    let name = std::str::from_utf8(start.name().into_inner())?.to_owned();
    let mut rebuilt = BytesStart::new(name);
    let mut replaced = false;
    for attribute in start.attributes() {
        let attribute = attribute?;
        if attribute.key.into_inner() == key.as_bytes() {
            rebuilt.push_attribute((key, value));
            replaced = true;
        } else {
            rebuilt.push_attribute(attribute);
        }
    }
    if !replaced {
        rebuilt.push_attribute((key, value));
    }
    Ok(rebuilt)
}

/// Helper trait for XML attributes providing convenient value extraction and parsing
pub(crate) trait XmlAttributeHelper<'a> {
    /// Gets the unescaped attribute value as a string
    fn get_value(&self) -> Result<Cow<'a, str>, RustyDeckError>;

    /// Parses the attribute value to the specified type
    fn parse_value<T: FromStr>(&self) -> Result<T, RustyDeckError>;
}

impl<'a> XmlAttributeHelper<'a> for Attribute<'a> {
    fn get_value(&self) -> Result<Cow<'a, str>, RustyDeckError> {
        Ok(self.unescape_value()?)
    }

    fn parse_value<T: FromStr>(&self) -> Result<T, RustyDeckError> {
        self.get_value()?
            .parse()
            .map_err(|_| match std::str::from_utf8(&self.value) {
                Ok(value) => RustyDeckError::XmlHelperError(XmlError::ParseAttributeValueError(value.to_string())),
                Err(error) => RustyDeckError::StringEncodingError(error),
            })
    }
}

/// Helper trait for XML nodes providing attribute access methods
pub(crate) trait XmlNodeHelper {
    /// Gets an attribute value by name
    fn get_attribute_value(&self, name: &str) -> Result<Option<Cow<'_, str>>, RustyDeckError>;

    /// Parses an attribute value to the specified type
    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, RustyDeckError>;
}

impl XmlNodeHelper for BytesStart<'_> {
    fn get_attribute_value(&self, name: &str) -> Result<Option<Cow<'_, str>>, RustyDeckError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.get_value())
            .transpose()
    }

    fn parse_attribute_value<T: FromStr>(&self, name: &str) -> Result<Option<T>, RustyDeckError> {
        self.try_get_attribute(name)?
            .map(|attribute| attribute.parse_value())
            .transpose()
    }
}

/// Helper trait for building text content from XML events
pub(crate) trait XmlTextContextHelper {
    /// Appends text content from BytesText event
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyDeckError>;

    /// Appends text content from BytesRef event (handles entities and character references)
    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyDeckError>;
}

impl XmlTextContextHelper for String {
    fn push_bytes_text(&mut self, text: &BytesText) -> Result<(), RustyDeckError> {
        self.push_str(&text.xml_content()?);
        Ok(())
    }

    fn push_bytes_ref(&mut self, bytes: &BytesRef) -> Result<(), RustyDeckError> {
        let raw = bytes.xml_content()?;
        if let Some(number) = raw.strip_prefix('#') {
            let code = if let Some(hex) = number.strip_prefix('x') {
                u32::from_str_radix(hex, 16)?
            } else {
                number.parse::<u32>()?
            };
            if let Some(character) = std::char::from_u32(code) {
                self.push_str(character.encode_utf8(&mut [0u8; 4]));
            }
        } else if let Some(entity) = resolve_xml_entity(&raw) {
            self.push_str(entity);
        } else {
            Err(XmlError::ParseEntityError(raw.to_string()))?;
        }

        Ok(())
    }
}

/// Owned event sequence builder for new markup fragments
#[derive(Debug, Default)]
pub(crate) struct XmlFragment {
    events: Vec<Event<'static>>,
}

impl XmlFragment {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Standalone UTF-8 declaration used by every package part
    pub(crate) fn declaration(&mut self) -> &mut Self {
        self.events.push(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))));
        self
    }

    pub(crate) fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> &mut Self {
        self.events.push(Event::Start(start_tag(name, attributes)));
        self
    }

    pub(crate) fn close(&mut self, name: &str) -> &mut Self {
        self.events.push(Event::End(BytesEnd::new(name.to_owned())));
        self
    }

    pub(crate) fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> &mut Self {
        self.events.push(Event::Empty(start_tag(name, attributes)));
        self
    }

    pub(crate) fn text(&mut self, text: &str) -> &mut Self {
        self.events.push(Event::Text(BytesText::new(text).into_owned()));
        self
    }

    /// Wraps `text` in a start and end tag
    pub(crate) fn leaf(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> &mut Self {
        self.open(name, attributes).text(text).close(name)
    }

    pub(crate) fn into_events(self) -> Vec<Event<'static>> {
        self.events
    }
}

fn start_tag(name: &str, attributes: &[(&str, &str)]) -> BytesStart<'static> {
    let mut start = BytesStart::new(name.to_owned());
    for attribute in attributes {
        start.push_attribute(*attribute);
    }
    start
}

#[macro_export]
macro_rules! match_xml_events {
    ($reader:expr => { $($arms:tt)* }) => {
        while let Some(result) = $reader.next()? {
            match result {
                Event::Eof => break,
                $($arms)*
                _ => (),
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_verbatim_markup() {
        let source = br#"<?xml version="1.0"?><p:sp><p:cNvPr id="2" name="a &amp; b"/><a:t>x &lt; y</a:t></p:sp>"#;
        let events = parse_events(source).unwrap();
        let written = write_events(events.iter()).unwrap();
        assert_eq!(written, source.to_vec());
    }

    #[test]
    fn finds_matching_end_and_local_names() {
        let events = parse_events(b"<a:p><a:r><a:t>x</a:t></a:r><a:endParaRPr/></a:p>").unwrap();
        assert_eq!(local_name(&events[0]), Some(&b"p"[..]));
        assert_eq!(matching_end(&events, 0), Some(events.len() - 1));
        assert_eq!(matching_end(&events, 1), Some(5));
        assert_eq!(matching_end(&events, 6), Some(6));
    }

    #[test]
    fn replaces_attribute_values() {
        let events = parse_events(br#"<p:cNvPr id="4" name="old"/>"#).unwrap();
        let Event::Empty(start) = &events[0] else { panic!("expected empty element") };
        let renamed = with_attribute(start, "name", "new & improved").unwrap();
        assert_eq!(renamed.get_attribute_value("name").unwrap().as_deref(), Some("new & improved"));
        assert_eq!(renamed.parse_attribute_value::<u32>("id").unwrap(), Some(4));
    }

    #[test]
    fn collects_text_with_entities() {
        let mut reader = XmlReader::new(&b"<a:t>R&amp;D &#x41;</a:t>"[..]);
        let mut text = String::new();
        let result: Result<(), RustyDeckError> = (|| {
            match_xml_events!(reader => {
                Event::Text(event) => text.push_bytes_text(&event)?,
                Event::GeneralRef(event) => text.push_bytes_ref(&event)?,
            });
            Ok(())
        })();
        result.unwrap();
        assert_eq!(text, "R&D A");
    }

    #[test]
    fn builds_fragments() {
        let mut fragment = XmlFragment::new();
        fragment.open("a:p", &[]).leaf("a:t", &[], "1 < 2").empty("a:endParaRPr", &[("lang", "en-US")]).close("a:p");
        let written = write_events(fragment.into_events().iter()).unwrap();
        assert_eq!(String::from_utf8(written).unwrap(), r#"<a:p><a:t>1 &lt; 2</a:t><a:endParaRPr lang="en-US"/></a:p>"#);
    }
}
