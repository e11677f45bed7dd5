//! Package-level parts: relationships, content types and part-name arithmetic.
use crate::error::RustyDeckError;
use crate::helpers::xml::write_events;
use crate::helpers::xml::XmlFragment;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlReader;
use crate::match_xml_events;
use quick_xml::events::Event;
use std::io::BufRead;

pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const ROOT_RELATIONSHIPS_PART: &str = "_rels/.rels";

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";

pub(crate) const REL_OFFICE_DOCUMENT: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub(crate) const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";
pub(crate) const REL_IMAGE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
pub(crate) const REL_NOTES_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/notesSlide";

pub(crate) const SLIDE_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Relationship {
    pub id: String,
    pub kind: String,
    pub target: String,
    pub external: bool,
}

/// Contents of a `.rels` part.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub(crate) fn read<R: BufRead>(reader: &mut XmlReader<R>) -> Result<Self, RustyDeckError> {
        let mut items = Vec::new();
        match_xml_events!(reader => {
            Event::Start(event) if event.local_name().as_ref() == b"Relationship" => {
                let attribute = |name: &str| -> Result<String, RustyDeckError> {
                    Ok(event.get_attribute_value(name)?.unwrap_or_default().into_owned())
                };
                items.push(Relationship {
                    id: attribute("Id")?,
                    kind: attribute("Type")?,
                    target: attribute("Target")?,
                    external: attribute("TargetMode")?.eq_ignore_ascii_case("External"),
                });
            },
        });
        Ok(Relationships { items })
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, RustyDeckError> {
        Self::read(&mut XmlReader::new(bytes))
    }

    pub(crate) fn to_xml(&self) -> Result<Vec<u8>, RustyDeckError> {
        let mut fragment = XmlFragment::new();
        fragment.declaration().open("Relationships", &[("xmlns", RELATIONSHIPS_NS)]);
        for item in &self.items {
            let mut attributes = vec![("Id", item.id.as_str()), ("Type", item.kind.as_str()), ("Target", item.target.as_str())];
            if item.external {
                attributes.push(("TargetMode", "External"));
            }
            fragment.empty("Relationship", &attributes);
        }
        fragment.close("Relationships");
        write_events(fragment.into_events().iter())
    }

    pub(crate) fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|item| item.id == id)
    }

    pub(crate) fn first_of_kind(&self, kind: &str) -> Option<&Relationship> {
        self.items.iter().find(|item| item.kind == kind)
    }

    /// Appends an internal relationship and returns its new id.
    pub(crate) fn add(&mut self, kind: &str, target: &str) -> String {
        let next = self
            .items
            .iter()
            .filter_map(|item| item.id.strip_prefix("rId").and_then(|number| number.parse::<u32>().ok()))
            .max()
            .unwrap_or(0)
            + 1;
        let id = format!("rId{}", next);
        self.items.push(Relationship { id: id.clone(), kind: kind.to_owned(), target: target.to_owned(), external: false });
        id
    }

    pub(crate) fn retain<F: FnMut(&Relationship) -> bool>(&mut self, keep: F) {
        self.items.retain(keep);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }
}

/// Contents of `[Content_Types].xml`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct ContentTypes {
    defaults: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
}

impl ContentTypes {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, RustyDeckError> {
        let mut content_types = ContentTypes::default();
        let mut reader = XmlReader::new(bytes);
        match_xml_events!(reader => {
            Event::Start(event) => {
                let content_type = event.get_attribute_value("ContentType")?.unwrap_or_default().into_owned();
                match event.local_name().as_ref() {
                    b"Default" => {
                        let extension = event.get_attribute_value("Extension")?.unwrap_or_default().into_owned();
                        content_types.defaults.push((extension, content_type));
                    }
                    b"Override" => {
                        let part = event.get_attribute_value("PartName")?.unwrap_or_default().into_owned();
                        content_types.overrides.push((part, content_type));
                    }
                    _ => (),
                }
            },
        });
        Ok(content_types)
    }

    pub(crate) fn to_xml(&self) -> Result<Vec<u8>, RustyDeckError> {
        let mut fragment = XmlFragment::new();
        fragment.declaration().open("Types", &[("xmlns", CONTENT_TYPES_NS)]);
        for (extension, content_type) in &self.defaults {
            fragment.empty("Default", &[("Extension", extension.as_str()), ("ContentType", content_type.as_str())]);
        }
        for (part, content_type) in &self.overrides {
            fragment.empty("Override", &[("PartName", part.as_str()), ("ContentType", content_type.as_str())]);
        }
        fragment.close("Types");
        write_events(fragment.into_events().iter())
    }

    /// Registers an extension unless it is already known.
    pub(crate) fn ensure_default(&mut self, extension: &str, content_type: &str) {
        if !self.defaults.iter().any(|(known, _)| known.eq_ignore_ascii_case(extension)) {
            self.defaults.push((extension.to_owned(), content_type.to_owned()));
        }
    }

    /// Sets the content type of a part, given without its leading slash.
    pub(crate) fn set_override(&mut self, part: &str, content_type: &str) {
        let part_name = format!("/{}", part);
        self.overrides.retain(|(known, _)| !known.eq_ignore_ascii_case(&part_name));
        self.overrides.push((part_name, content_type.to_owned()));
    }

    pub(crate) fn content_type_of(&self, part: &str) -> Option<&str> {
        let part_name = format!("/{}", part);
        if let Some((_, content_type)) = self.overrides.iter().find(|(known, _)| known.eq_ignore_ascii_case(&part_name)) {
            return Some(content_type.as_str());
        }
        let extension = part.rsplit('.').next()?;
        self.defaults
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(extension))
            .map(|(_, content_type)| content_type.as_str())
    }
}

/// `ppt/slides/slide1.xml` becomes `ppt/slides/_rels/slide1.xml.rels`.
pub(crate) fn rels_path(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((directory, file)) => format!("{}/_rels/{}.rels", directory, file),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolves a relationship target against the part that owns the relationship.
pub(crate) fn resolve(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_owned();
    }
    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((directory, _)) => directory.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => (),
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    segments.join("/")
}

/// Relative target from `source_part` to `target_part`.
pub(crate) fn relative(source_part: &str, target_part: &str) -> String {
    let source: Vec<&str> = match source_part.rsplit_once('/') {
        Some((directory, _)) => directory.split('/').collect(),
        None => Vec::new(),
    };
    let target: Vec<&str> = target_part.split('/').collect();
    let common = source
        .iter()
        .zip(target.iter())
        .take(target.len().saturating_sub(1))
        .take_while(|(left, right)| left == right)
        .count();
    let mut segments = vec![".."; source.len() - common];
    segments.extend(&target[common..]);
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn part_paths() {
        assert_eq!(rels_path("ppt/slides/slide3.xml"), "ppt/slides/_rels/slide3.xml.rels");
        assert_eq!(rels_path("ppt/presentation.xml"), "ppt/_rels/presentation.xml.rels");
        assert_eq!(resolve("ppt/slides/slide1.xml", "../media/image2.png"), "ppt/media/image2.png");
        assert_eq!(resolve("ppt/presentation.xml", "slides/slide1.xml"), "ppt/slides/slide1.xml");
        assert_eq!(resolve("", "ppt/presentation.xml"), "ppt/presentation.xml");
        assert_eq!(resolve("ppt/slides/slide1.xml", "/ppt/media/a.png"), "ppt/media/a.png");
        assert_eq!(relative("ppt/slides/slide1.xml", "ppt/media/image2.png"), "../media/image2.png");
        assert_eq!(relative("ppt/presentation.xml", "ppt/slides/slide9.xml"), "slides/slide9.xml");
    }

    #[test]
    fn relationships_round_trip_and_grow() {
        let source = br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout" Target="../slideLayouts/slideLayout2.xml"/>
<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink" Target="https://example.com/?a=1&amp;b=2" TargetMode="External"/>
</Relationships>"#;
        let mut relationships = Relationships::parse(source).unwrap();
        assert_eq!(relationships.len(), 2);
        assert!(relationships.get("rId7").unwrap().external);
        assert_eq!(relationships.get("rId7").unwrap().target, "https://example.com/?a=1&b=2");

        let id = relationships.add(REL_IMAGE, "../media/image1.png");
        assert_eq!(id, "rId8");
        let reparsed = Relationships::parse(&relationships.to_xml().unwrap()).unwrap();
        assert_eq!(reparsed, relationships);
        assert_eq!(reparsed.first_of_kind(REL_IMAGE).unwrap().target, "../media/image1.png");
    }

    #[test]
    fn content_types_defaults_and_overrides() {
        let source = br#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/><Override PartName="/ppt/slides/slide1.xml" ContentType="application/vnd.openxmlformats-officedocument.presentationml.slide+xml"/></Types>"#;
        let mut content_types = ContentTypes::parse(source).unwrap();
        content_types.ensure_default("png", "image/png");
        content_types.ensure_default("PNG", "image/other");
        content_types.set_override("ppt/slides/slide2.xml", SLIDE_CONTENT_TYPE);

        let reparsed = ContentTypes::parse(&content_types.to_xml().unwrap()).unwrap();
        assert_eq!(reparsed.content_type_of("ppt/media/image1.png"), Some("image/png"));
        assert_eq!(reparsed.content_type_of("ppt/slides/slide2.xml"), Some(SLIDE_CONTENT_TYPE));
        assert_eq!(reparsed.content_type_of("docProps/app.xml"), Some("application/xml"));
        assert_eq!(reparsed.content_type_of("ppt/media/a.emf"), None);
    }
}
