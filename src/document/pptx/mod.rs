//! # PowerPoint Package Backend
//!
//! [`PptxDeck`] loads every part of a `.pptx` into memory, parses the presentation
//! and slide parts it edits, and writes the package back with untouched parts
//! byte-for-byte identical.
mod markup;
mod parts;
mod presentation;
mod slide;

use crate::document::DeckError;
use crate::document::Picture;
use crate::document::Shape;
use crate::document::SlideDeck;
use crate::document::TextBox;
use crate::error::ResultMessage;
use crate::error::RustyDeckError;
use crate::helpers::zip::write_entries;
use crate::helpers::zip::ZipHelper;
use crate::table::native::NativeTable;
use crate::transform::Rect;
use log::debug;
use once_cell::sync::Lazy;
use parts::ContentTypes;
use parts::Relationships;
use presentation::PresentationPart;
use presentation::SlideId;
use regex::Regex;
use slide::SlideXml;
use std::collections::HashMap;
use std::fs::File;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use zip::ZipArchive;

static SLIDE_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^ppt/slides/slide(\d+)\.xml$").expect("Hardcode regex pattern"));
static MEDIA_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^ppt/media/image(\d+)\.[a-z0-9]+$").expect("Hardcode regex pattern"));

const DEFAULT_PRESENTATION_PART: &str = "ppt/presentation.xml";

#[derive(Clone, Debug)]
struct SlidePart {
    path: String,
    id: SlideId,
    xml: SlideXml,
    relationships: Relationships,
}

/// An editable `.pptx` presentation.
#[derive(Clone, Debug)]
pub struct PptxDeck {
    entries: Vec<(String, Vec<u8>)>,
    content_types: ContentTypes,
    presentation_path: String,
    presentation: PresentationPart,
    presentation_relationships: Relationships,
    slides: Vec<SlidePart>,
}

impl PptxDeck {
    /// Opens a presentation file.
    ///
    /// # Arguments
    /// * `path` - Location of the `.pptx` template
    ///
    /// # Returns
    /// * `Result<PptxDeck, RustyDeckError>` - The parsed deck or an error if the package is unreadable
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RustyDeckError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(RustyDeckError::from).with_prefix(&format!("Failed to open '{}'", path.display()))?;
        Self::load(file).with_prefix(&format!("Failed to load '{}'", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RustyDeckError> {
        Self::load(Cursor::new(bytes))
    }

    fn load<RS: Read + Seek>(reader: RS) -> Result<Self, RustyDeckError> {
        let mut zip = ZipArchive::new(reader)?;
        if zip.file(parts::CONTENT_TYPES_PART)?.is_none() {
            Err(DeckError::MissingPart(parts::CONTENT_TYPES_PART.to_owned()))?;
        }
        let root = match zip.xml_reader(parts::ROOT_RELATIONSHIPS_PART)? {
            Some(mut reader) => Relationships::read(&mut reader)?,
            None => Err(DeckError::MissingPart(parts::ROOT_RELATIONSHIPS_PART.to_owned()))?,
        };
        let presentation_path = root
            .first_of_kind(parts::REL_OFFICE_DOCUMENT)
            .map(|relationship| parts::resolve("", &relationship.target))
            .unwrap_or_else(|| DEFAULT_PRESENTATION_PART.to_owned());

        let entries = zip.read_entries()?;
        let content_types = ContentTypes::parse(entry(&entries, parts::CONTENT_TYPES_PART)?)?;
        let (presentation, slide_ids) = PresentationPart::parse(entry(&entries, &presentation_path)?)?;
        let presentation_relationships = relationships_in(&entries, &presentation_path)?;

        let mut slides = Vec::with_capacity(slide_ids.len());
        for id in slide_ids {
            let relationship = presentation_relationships
                .get(&id.rel_id)
                .ok_or_else(|| DeckError::InvalidPackage(format!("slide relationship '{}' is missing", id.rel_id)))?;
            let path = parts::resolve(&presentation_path, &relationship.target);
            let xml = SlideXml::parse(entry(&entries, &path)?).with_prefix(&format!("Failed to parse '{}'", path))?;
            let relationships = relationships_in(&entries, &path)?;
            slides.push(SlidePart { path, id, xml, relationships });
        }
        let deck = PptxDeck { entries, content_types, presentation_path, presentation, presentation_relationships, slides };
        debug!("Loaded presentation with {} slides", deck.slides.len());
        Ok(deck)
    }

    /// Writes the presentation to `path`, replacing any existing file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), RustyDeckError> {
        let path = path.as_ref();
        let file = File::create(path).map_err(RustyDeckError::from).with_prefix(&format!("Failed to create '{}'", path.display()))?;
        self.write(file)?.flush()?;
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RustyDeckError> {
        Ok(self.write(Cursor::new(Vec::new()))?.into_inner())
    }

    /// Package path of a slide part, e.g. `ppt/slides/slide3.xml`.
    pub fn slide_path(&self, slide: usize) -> Option<&str> {
        self.slides.get(slide).map(|part| part.path.as_str())
    }

    fn write<W: Write + Seek>(&self, writer: W) -> Result<W, RustyDeckError> {
        let mut regenerated: Vec<(String, Vec<u8>)> = vec![
            (parts::CONTENT_TYPES_PART.to_owned(), self.content_types.to_xml()?),
            (self.presentation_path.clone(), self.presentation.to_xml(&self.slide_ids())?),
            (parts::rels_path(&self.presentation_path), self.presentation_relationships.to_xml()?),
        ];
        for slide in &self.slides {
            regenerated.push((slide.path.clone(), slide.xml.to_xml()?));
            regenerated.push((parts::rels_path(&slide.path), slide.relationships.to_xml()?));
        }

        let mut replacements: HashMap<String, Vec<u8>> =
            regenerated.into_iter().map(|(name, bytes)| (name.to_ascii_lowercase(), bytes)).collect();
        let mut entries: Vec<(String, Vec<u8>)> = Vec::with_capacity(self.entries.len() + replacements.len());
        for (name, bytes) in &self.entries {
            match replacements.remove(&name.to_ascii_lowercase()) {
                Some(replacement) => entries.push((name.clone(), replacement)),
                None => entries.push((name.clone(), bytes.clone())),
            }
        }
        let mut added: Vec<(String, Vec<u8>)> = replacements.into_iter().collect();
        added.sort();
        entries.extend(added);
        write_entries(writer, entries)
    }

    fn slide_ids(&self) -> Vec<SlideId> {
        self.slides.iter().map(|slide| slide.id.clone()).collect()
    }

    fn find_entry(&self, name: &str) -> Option<usize> {
        position(&self.entries, name)
    }

    fn set_entry(&mut self, name: &str, bytes: Vec<u8>) {
        match self.find_entry(name) {
            Some(index) => self.entries[index].1 = bytes,
            None => self.entries.push((name.to_owned(), bytes)),
        }
    }

    /// Next free number for parts matching `pattern`.
    fn next_part_number(&self, pattern: &Regex) -> u32 {
        self.entries
            .iter()
            .filter_map(|(name, _)| pattern.captures(name))
            .filter_map(|captures| captures.get(1).and_then(|number| number.as_str().parse::<u32>().ok()))
            .max()
            .unwrap_or(0)
            + 1
    }

    fn slide_mut(&mut self, slide: usize) -> Result<&mut SlidePart, RustyDeckError> {
        self.check_slide(slide)?;
        Ok(&mut self.slides[slide])
    }

    fn add_shape(&mut self, slide: usize, build: impl FnOnce(u32) -> Vec<quick_xml::events::Event<'static>>) -> Result<u32, RustyDeckError> {
        let part = self.slide_mut(slide)?;
        let id = part.xml.next_shape_id()?;
        part.xml.push(build(id));
        Ok(id)
    }
}

fn position(entries: &[(String, Vec<u8>)], name: &str) -> Option<usize> {
    entries.iter().position(|(entry, _)| entry.eq_ignore_ascii_case(name))
}

fn entry<'a>(entries: &'a [(String, Vec<u8>)], name: &str) -> Result<&'a [u8], RustyDeckError> {
    match position(entries, name) {
        Some(index) => Ok(&entries[index].1),
        None => Err(DeckError::MissingPart(name.to_owned()))?,
    }
}

fn relationships_in(entries: &[(String, Vec<u8>)], part: &str) -> Result<Relationships, RustyDeckError> {
    match position(entries, &parts::rels_path(part)) {
        Some(index) => Relationships::parse(&entries[index].1),
        None => Ok(Relationships::default()),
    }
}

impl SlideDeck for PptxDeck {
    fn slide_count(&self) -> usize {
        self.slides.len()
    }

    fn shapes(&self, slide: usize) -> Result<Vec<Shape>, RustyDeckError> {
        self.check_slide(slide)?;
        self.slides[slide].xml.shapes()
    }

    fn remove_shape(&mut self, slide: usize, id: u32) -> Result<(), RustyDeckError> {
        if !self.slide_mut(slide)?.xml.remove(id)? {
            Err(DeckError::ShapeNotFound { slide, id })?;
        }
        Ok(())
    }

    fn rename_shape(&mut self, slide: usize, id: u32, name: &str) -> Result<(), RustyDeckError> {
        match self.slide_mut(slide)?.xml.shape_mut(id)? {
            Some(shape) => shape.rename(name),
            None => Err(DeckError::ShapeNotFound { slide, id })?,
        }
    }

    fn replace_text(&mut self, slide: usize, id: u32, text: &str) -> Result<bool, RustyDeckError> {
        match self.slide_mut(slide)?.xml.shape_mut(id)? {
            Some(shape) => shape.replace_text(text),
            None => Err(DeckError::ShapeNotFound { slide, id })?,
        }
    }

    fn add_picture(&mut self, slide: usize, picture: &Picture, bounds: Rect, name: &str) -> Result<u32, RustyDeckError> {
        self.check_slide(slide)?;
        let media = format!("ppt/media/image{}.{}", self.next_part_number(&MEDIA_PART), picture.format.extension());
        self.set_entry(&media, picture.bytes.clone());
        self.content_types.ensure_default(picture.format.extension(), picture.format.content_type());

        let part = &mut self.slides[slide];
        let relationship = part.relationships.add(parts::REL_IMAGE, &parts::relative(&part.path, &media));
        debug!("Embedded {} as {} on '{}'", media, relationship, part.path);
        self.add_shape(slide, |id| markup::picture(id, name, &relationship, bounds))
    }

    fn add_table(&mut self, slide: usize, table: &NativeTable, name: &str) -> Result<u32, RustyDeckError> {
        self.add_shape(slide, |id| markup::table(id, name, table))
    }

    fn add_text_box(&mut self, slide: usize, text_box: &TextBox) -> Result<u32, RustyDeckError> {
        self.add_shape(slide, |id| markup::text_box(id, text_box))
    }

    fn duplicate_slide(&mut self, source: usize, position: usize) -> Result<(), RustyDeckError> {
        self.check_slide(source)?;
        if position > self.slides.len() {
            Err(DeckError::SlideOutOfRange { index: position, count: self.slides.len() })?;
        }
        let original = &self.slides[source];
        let directory = original.path.rsplit_once('/').map(|(directory, _)| directory).unwrap_or("ppt/slides");
        let path = format!("{}/slide{}.xml", directory, self.next_part_number(&SLIDE_PART));

        let mut relationships = original.relationships.clone();
        relationships.retain(|relationship| relationship.kind != parts::REL_NOTES_SLIDE);
        let xml = original.xml.clone();

        let target = parts::relative(&self.presentation_path, &path);
        let rel_id = self.presentation_relationships.add(parts::REL_SLIDE, &target);
        let id = SlideId { id: presentation::next_slide_id(&self.slide_ids()), rel_id };
        self.content_types.set_override(&path, parts::SLIDE_CONTENT_TYPE);
        // Reserve the part name; the content is written on save
        self.set_entry(&path, Vec::new());
        debug!("Duplicated slide {} into '{}' at position {}", source, path, position);
        self.slides.insert(position, SlidePart { path, id, xml, relationships });
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::fixture::*;
    use super::*;
    use crate::table::native::NativeRow;
    use crate::table::style;

    fn deck() -> PptxDeck {
        let box_a = Rect { x: 914_400, y: 914_400, width: 6_000_000, height: 3_000_000 };
        let slides = vec![
            vec![text_shape(2, "slide_title", "Overview", Rect::default())],
            vec![
                text_shape(2, "slide_title", "Rare Ports", Rect::default()),
                table_shape(3, "ndr_table", box_a),
                text_shape(4, "page_number", "2", Rect::default()),
            ],
            vec![plain_shape(2, "chart_placeholder", box_a)],
        ];
        PptxDeck::from_bytes(template(&slides)).unwrap()
    }

    fn png(width: u32, height: u32) -> Picture {
        let image = image::RgbImage::new(width, height);
        let mut bytes = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(image).write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        Picture::from_bytes(bytes.into_inner()).unwrap()
    }

    #[test]
    fn reads_slides_in_presentation_order() {
        let deck = deck();
        assert_eq!(deck.slide_count(), 3);
        assert_eq!(deck.slide_path(1), Some("ppt/slides/slide2.xml"));
        let shapes = deck.shapes(1).unwrap();
        assert_eq!(shapes.iter().map(|shape| shape.name.as_str()).collect::<Vec<_>>(), vec!["slide_title", "ndr_table", "page_number"]);
        assert!(shapes[1].has_table);
        assert_eq!(deck.shape_text(1, "slide_title").unwrap().as_deref(), Some("Rare Ports"));
        assert!(deck.shapes(3).is_err());
    }

    #[test]
    fn duplicated_slides_survive_a_save() {
        let mut deck = deck();
        deck.duplicate_slide(1, 2).unwrap();
        deck.duplicate_slide(1, 3).unwrap();
        let title = deck.find_shape(2, "slide_title").unwrap().unwrap();
        deck.replace_text(2, title.id, "Rare Ports (cont.)").unwrap();

        let reopened = PptxDeck::from_bytes(deck.to_bytes().unwrap()).unwrap();
        assert_eq!(reopened.slide_count(), 5);
        assert_eq!(reopened.slide_path(2), Some("ppt/slides/slide4.xml"));
        assert_eq!(reopened.slide_path(3), Some("ppt/slides/slide5.xml"));
        assert_eq!(reopened.slide_path(4), Some("ppt/slides/slide3.xml"));
        assert_eq!(reopened.shape_text(1, "slide_title").unwrap().as_deref(), Some("Rare Ports"));
        assert_eq!(reopened.shape_text(2, "slide_title").unwrap().as_deref(), Some("Rare Ports (cont.)"));
        assert!(reopened.find_shape(3, "ndr_table").unwrap().is_some());
        assert_eq!(reopened.content_types.content_type_of("ppt/slides/slide5.xml"), Some(parts::SLIDE_CONTENT_TYPE));
        let ids: Vec<u32> = reopened.slides.iter().map(|slide| slide.id.id).collect();
        assert_eq!(ids, vec![256, 257, 259, 260, 258]);
    }

    #[test]
    fn duplicates_drop_speaker_notes() {
        let mut deck = deck();
        deck.duplicate_slide(0, 1).unwrap();
        assert!(deck.slides[0].relationships.first_of_kind(parts::REL_NOTES_SLIDE).is_some());
        assert!(deck.slides[1].relationships.first_of_kind(parts::REL_NOTES_SLIDE).is_none());
        assert_eq!(deck.slides[1].relationships.len(), 1);
    }

    #[test]
    fn pictures_are_embedded_as_media() {
        let mut deck = deck();
        let bounds = Rect { x: 10, y: 20, width: 300, height: 150 };
        let first = deck.add_picture(2, &png(4, 2), bounds, "chart").unwrap();
        let second = deck.add_picture(2, &png(2, 2), bounds, "chart_2").unwrap();
        assert_eq!((first, second), (3, 4));

        let bytes = deck.to_bytes().unwrap();
        let mut zip = ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
        assert!(zip.file("ppt/media/image1.png").unwrap().is_some());
        assert!(zip.file("ppt/media/image2.png").unwrap().is_some());

        let reopened = PptxDeck::from_bytes(bytes).unwrap();
        let chart = reopened.find_shape(2, "chart").unwrap().unwrap();
        assert!(chart.has_picture);
        assert_eq!(chart.bounds, Some(bounds));
        assert_eq!(reopened.content_types.content_type_of("ppt/media/image1.png"), Some("image/png"));
        let target = &reopened.slides[2].relationships.first_of_kind(parts::REL_IMAGE).unwrap().target;
        assert_eq!(target, "../media/image1.png");
    }

    #[test]
    fn tables_and_text_boxes_are_added() {
        let mut deck = deck();
        let table = NativeTable {
            bounds: Rect { x: 0, y: 0, width: 100, height: 40 },
            column_widths: vec![100],
            row_height: 20,
            rows: vec![NativeRow { cells: vec!["Host".to_owned()], fill: style::BLACK, bold: true, font_pt: 9.0 }],
        };
        deck.add_table(1, &table, "ndr_table_1").unwrap();
        deck.add_text_box(1, &TextBox::no_data("no_data", Rect { x: 0, y: 0, width: 100, height: 100 })).unwrap();
        let ndr = deck.find_shape(1, "ndr_table").unwrap().unwrap();
        deck.remove_shape(1, ndr.id).unwrap();

        let reopened = PptxDeck::from_bytes(deck.to_bytes().unwrap()).unwrap();
        let names: Vec<String> = reopened.shapes(1).unwrap().into_iter().map(|shape| shape.name).collect();
        assert_eq!(names, vec!["slide_title", "page_number", "ndr_table_1", "no_data"]);
        assert_eq!(reopened.shape_text(1, "no_data").unwrap().as_deref(), Some("No Data"));
        assert!(reopened.find_shape(1, "ndr_table_1").unwrap().unwrap().has_table);
    }

    #[test]
    fn rejects_non_presentations() {
        let archive = write_entries(Cursor::new(Vec::new()), [("hello.txt", b"hi".to_vec())]).unwrap().into_inner();
        assert!(matches!(PptxDeck::from_bytes(archive), Err(RustyDeckError::DeckError(DeckError::MissingPart(_)))));
        assert!(PptxDeck::from_bytes(b"not a zip".to_vec()).is_err());
    }

    #[test]
    fn open_and_save_files() {
        let directory = tempfile::tempdir().unwrap();
        let source = directory.path().join("template.pptx");
        std::fs::write(&source, template(&[vec![text_shape(2, "slide_title", "Only", Rect::default())]])).unwrap();
        let mut deck = PptxDeck::open(&source).unwrap();
        deck.set_text_by_name(0, "slide_title", "Changed").unwrap();
        let output = directory.path().join("out.pptx");
        deck.save(&output).unwrap();
        assert_eq!(PptxDeck::open(&output).unwrap().shape_text(0, "slide_title").unwrap().as_deref(), Some("Changed"));
        assert!(PptxDeck::open(directory.path().join("missing.pptx")).is_err());
    }
}
