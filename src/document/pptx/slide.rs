//! Slide parts split into the shape tree's children so shapes can be edited in place.
use crate::document::DeckError;
use crate::document::Shape;
use crate::error::RustyDeckError;
use crate::helpers::xml::local_name;
use crate::helpers::xml::matching_end;
use crate::helpers::xml::parse_events;
use crate::helpers::xml::with_attribute;
use crate::helpers::xml::write_events;
use crate::helpers::xml::XmlNodeHelper;
use crate::helpers::xml::XmlTextContextHelper;
use crate::transform::Rect;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;

/// Shape-tree children that describe the tree itself
const TREE_PROPERTIES: [&[u8]; 2] = [b"nvGrpSpPr", b"grpSpPr"];

enum Section {
    Head,
    Shape,
    Tail,
    Loose,
}

/// One child of `spTree`, kept as raw events.
#[derive(Clone, Debug)]
pub(crate) struct ShapeXml {
    events: Vec<Event<'static>>,
}

/// A slide part.
///
/// `head` runs up to and including the tree properties, `tail` starts at the
/// tree's extension list or its end tag.
#[derive(Clone, Debug)]
pub(crate) struct SlideXml {
    head: Vec<Event<'static>>,
    shapes: Vec<ShapeXml>,
    tail: Vec<Event<'static>>,
}

impl SlideXml {
    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, RustyDeckError> {
        let mut head = parse_events(bytes)?;
        let tree = head
            .iter()
            .position(|event| matches!(event, Event::Start(_)) && local_name(event) == Some(&b"spTree"[..]))
            .ok_or_else(|| DeckError::InvalidPackage("slide has no shape tree".to_owned()))?;
        let tree_end = matching_end(&head, tree).ok_or_else(|| DeckError::InvalidPackage("unterminated shape tree".to_owned()))?;
        let mut tail = head.split_off(tree_end);
        let children = head.split_off(tree + 1);

        let mut segments = Vec::new();
        let mut index = 0;
        while index < children.len() {
            let (end, section) = match &children[index] {
                event @ (Event::Start(_) | Event::Empty(_)) => {
                    let end = matching_end(&children, index)
                        .ok_or_else(|| DeckError::InvalidPackage("unterminated shape".to_owned()))?;
                    let name = local_name(event).unwrap_or_default();
                    let section = if TREE_PROPERTIES.contains(&name) {
                        Section::Head
                    } else if name == b"extLst" {
                        Section::Tail
                    } else {
                        Section::Shape
                    };
                    (end, section)
                }
                _ => (index, Section::Loose),
            };
            segments.push((end + 1 - index, section));
            index = end + 1;
        }

        let mut shapes: Vec<ShapeXml> = Vec::new();
        let mut trailing = Vec::new();
        let mut events = children.into_iter();
        for (count, section) in segments {
            let chunk: Vec<Event<'static>> = events.by_ref().take(count).collect();
            match section {
                Section::Head => head.extend(chunk),
                Section::Shape => shapes.push(ShapeXml { events: chunk }),
                Section::Tail => trailing.extend(chunk),
                Section::Loose if !trailing.is_empty() => trailing.extend(chunk),
                Section::Loose => match shapes.last_mut() {
                    Some(shape) => shape.events.extend(chunk),
                    None => head.extend(chunk),
                },
            }
        }
        trailing.append(&mut tail);
        Ok(SlideXml { head, shapes, tail: trailing })
    }

    pub(crate) fn to_xml(&self) -> Result<Vec<u8>, RustyDeckError> {
        let shapes = self.shapes.iter().flat_map(|shape| shape.events.iter());
        write_events(self.head.iter().chain(shapes).chain(self.tail.iter()))
    }

    pub(crate) fn shapes(&self) -> Result<Vec<Shape>, RustyDeckError> {
        self.shapes.iter().map(ShapeXml::describe).collect()
    }

    pub(crate) fn shape_mut(&mut self, id: u32) -> Result<Option<&mut ShapeXml>, RustyDeckError> {
        for shape in self.shapes.iter_mut() {
            if shape.id()? == Some(id) {
                return Ok(Some(shape));
            }
        }
        Ok(None)
    }

    /// Removes a shape; returns false when no shape has `id`.
    pub(crate) fn remove(&mut self, id: u32) -> Result<bool, RustyDeckError> {
        let mut position = None;
        for (index, shape) in self.shapes.iter().enumerate() {
            if shape.id()? == Some(id) {
                position = Some(index);
                break;
            }
        }
        Ok(position.map(|index| self.shapes.remove(index)).is_some())
    }

    /// Appends a shape on top of the z-order.
    pub(crate) fn push(&mut self, events: Vec<Event<'static>>) {
        self.shapes.push(ShapeXml { events });
    }

    /// Id one above every drawing id on the slide.
    pub(crate) fn next_shape_id(&self) -> Result<u32, RustyDeckError> {
        let events = self.head.iter().chain(self.shapes.iter().flat_map(|shape| shape.events.iter()));
        let mut highest = 0;
        for event in events {
            if let Event::Start(start) | Event::Empty(start) = event {
                if start.local_name().as_ref() == b"cNvPr" {
                    highest = highest.max(start.parse_attribute_value::<u32>("id")?.unwrap_or(0));
                }
            }
        }
        Ok(highest + 1)
    }
}

impl ShapeXml {
    fn kind(&self) -> &[u8] {
        self.events.first().and_then(local_name).unwrap_or_default()
    }

    fn non_visual(&self) -> Option<usize> {
        self.events
            .iter()
            .position(|event| matches!(event, Event::Start(_) | Event::Empty(_)) && local_name(event) == Some(&b"cNvPr"[..]))
    }

    pub(crate) fn id(&self) -> Result<Option<u32>, RustyDeckError> {
        match self.non_visual().map(|index| &self.events[index]) {
            Some(Event::Start(start) | Event::Empty(start)) => start.parse_attribute_value("id"),
            _ => Ok(None),
        }
    }

    pub(crate) fn describe(&self) -> Result<Shape, RustyDeckError> {
        let text_shape = self.kind() == b"sp";
        let mut shape = Shape { has_picture: self.kind() == b"pic", ..Default::default() };
        let mut paragraphs: Vec<String> = Vec::new();
        let (mut named, mut in_text) = (false, false);
        // 0 before the first transform, 1 inside it, 2 after it
        let mut transform = 0;
        let (mut offset, mut extent) = (None, None);

        for event in &self.events {
            match event {
                Event::Start(start) | Event::Empty(start) => {
                    let empty = matches!(event, Event::Empty(_));
                    match start.local_name().as_ref() {
                        b"cNvPr" if !named => {
                            named = true;
                            shape.id = start.parse_attribute_value("id")?.unwrap_or(0);
                            shape.name = start.get_attribute_value("name")?.unwrap_or_default().into_owned();
                        }
                        b"xfrm" if transform == 0 => transform = if empty { 2 } else { 1 },
                        b"off" if transform == 1 => {
                            offset = Some((start.parse_attribute_value::<i64>("x")?, start.parse_attribute_value::<i64>("y")?));
                        }
                        b"ext" if transform == 1 => {
                            extent = Some((start.parse_attribute_value::<i64>("cx")?, start.parse_attribute_value::<i64>("cy")?));
                        }
                        b"tbl" => shape.has_table = true,
                        b"txBody" if text_shape => shape.has_text = true,
                        b"p" if shape.has_text || shape.has_table => paragraphs.push(String::new()),
                        b"t" if (shape.has_text || shape.has_table) && !empty => in_text = true,
                        _ => (),
                    }
                }
                Event::End(end) => match end.local_name().as_ref() {
                    b"xfrm" if transform == 1 => transform = 2,
                    b"t" => in_text = false,
                    _ => (),
                },
                Event::Text(text) if in_text => current(&mut paragraphs).push_bytes_text(text)?,
                Event::GeneralRef(reference) if in_text => current(&mut paragraphs).push_bytes_ref(reference)?,
                _ => (),
            }
        }

        shape.text = paragraphs.join("\n");
        shape.bounds = match (offset, extent) {
            (Some((Some(x), Some(y))), Some((Some(width), Some(height)))) => Rect::new(x, y, width, height).ok(),
            _ => None,
        };
        Ok(shape)
    }

    pub(crate) fn rename(&mut self, name: &str) -> Result<(), RustyDeckError> {
        let Some(index) = self.non_visual() else { return Ok(()) };
        self.events[index] = match &self.events[index] {
            Event::Start(start) => Event::Start(with_attribute(start, "name", name)?),
            Event::Empty(start) => Event::Empty(with_attribute(start, "name", name)?),
            other => other.clone(),
        };
        Ok(())
    }

    /// Puts `text` in the first run and clears the others, or creates a run when the
    /// body has none. Returns false for shapes without a text body.
    pub(crate) fn replace_text(&mut self, text: &str) -> Result<bool, RustyDeckError> {
        if self.kind() != b"sp" {
            return Ok(false);
        }
        let Some(body) = self.find(0, self.events.len(), b"txBody", true) else { return Ok(false) };
        let body_end = matching_end(&self.events, body).unwrap_or(body);

        let runs: Vec<usize> = (body..body_end).filter(|index| self.is_open(*index, b"t")).collect();
        if let Some(first) = runs.first().copied() {
            for index in runs.into_iter().rev() {
                self.set_run_text(index, if index == first { text } else { "" });
            }
            return Ok(true);
        }

        let Some(paragraph) = self.find(body, body_end, b"p", false) else { return Ok(false) };
        let paragraph_tag = qualified_name(&self.events[paragraph]);
        let prefix = paragraph_tag.split_once(':').map(|(prefix, _)| format!("{}:", prefix)).unwrap_or_default();

        if let Event::Empty(start) = &self.events[paragraph] {
            let open = Event::Start(start.clone());
            let mut replacement = vec![open];
            replacement.extend(run(&prefix, &[], text));
            replacement.push(Event::End(BytesEnd::new(paragraph_tag)));
            self.events.splice(paragraph..=paragraph, replacement);
            return Ok(true);
        }

        let paragraph_end = matching_end(&self.events, paragraph).unwrap_or(paragraph);
        let (insert_at, properties) = match self.find(paragraph, paragraph_end, b"endParaRPr", false) {
            Some(index) => {
                let end = matching_end(&self.events, index).unwrap_or(index);
                (index, run_properties(&self.events[index..=end], &prefix))
            }
            None => (paragraph_end, Vec::new()),
        };
        let inserted = run(&prefix, &properties, text);
        self.events.splice(insert_at..insert_at, inserted);
        Ok(true)
    }

    fn is_open(&self, index: usize, name: &[u8]) -> bool {
        let event = &self.events[index];
        matches!(event, Event::Start(_) | Event::Empty(_)) && local_name(event) == Some(name)
    }

    fn find(&self, from: usize, to: usize, name: &[u8], start_only: bool) -> Option<usize> {
        (from..to.min(self.events.len()))
            .find(|index| self.is_open(*index, name) && (!start_only || matches!(self.events[*index], Event::Start(_))))
    }

    fn set_run_text(&mut self, index: usize, text: &str) {
        match &self.events[index] {
            Event::Empty(start) if !text.is_empty() => {
                let tag = qualified_name(&self.events[index]);
                let replacement = vec![Event::Start(start.clone()), text_event(text), Event::End(BytesEnd::new(tag))];
                self.events.splice(index..=index, replacement);
            }
            Event::Start(_) => {
                let end = matching_end(&self.events, index).unwrap_or(index + 1);
                let replacement = if text.is_empty() { Vec::new() } else { vec![text_event(text)] };
                self.events.splice(index + 1..end, replacement);
            }
            _ => (),
        }
    }
}

fn current(paragraphs: &mut Vec<String>) -> &mut String {
    if paragraphs.is_empty() {
        paragraphs.push(String::new());
    }
    let last = paragraphs.len() - 1;
    &mut paragraphs[last]
}

fn qualified_name(event: &Event<'_>) -> String {
    match event {
        Event::Start(start) | Event::Empty(start) => String::from_utf8_lossy(start.name().as_ref()).into_owned(),
        Event::End(end) => String::from_utf8_lossy(end.name().as_ref()).into_owned(),
        _ => String::new(),
    }
}

fn text_event(text: &str) -> Event<'static> {
    Event::Text(BytesText::new(text).into_owned())
}

/// Copies paragraph-end properties into run properties so new text keeps the formatting.
fn run_properties(end_properties: &[Event<'static>], prefix: &str) -> Vec<Event<'static>> {
    let tag = format!("{}rPr", prefix);
    let last = end_properties.len().saturating_sub(1);
    end_properties
        .iter()
        .enumerate()
        .map(|(index, event)| match event {
            Event::Start(start) if index == 0 => Event::Start(renamed(start, &tag)),
            Event::Empty(start) if index == 0 => Event::Empty(renamed(start, &tag)),
            Event::End(_) if index == last => Event::End(BytesEnd::new(tag.clone())),
            other => other.clone(),
        })
        .collect()
}

fn renamed(start: &BytesStart<'_>, name: &str) -> BytesStart<'static> {
    let mut tag = BytesStart::new(name.to_owned());
    tag.extend_attributes(start.attributes().filter_map(Result::ok));
    tag.into_owned()
}

fn run(prefix: &str, properties: &[Event<'static>], text: &str) -> Vec<Event<'static>> {
    let (run_tag, text_tag) = (format!("{}r", prefix), format!("{}t", prefix));
    let mut events = vec![Event::Start(BytesStart::new(run_tag.clone()))];
    events.extend(properties.iter().cloned());
    events.push(Event::Start(BytesStart::new(text_tag.clone())));
    events.push(text_event(text));
    events.push(Event::End(BytesEnd::new(text_tag)));
    events.push(Event::End(BytesEnd::new(run_tag)));
    events
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide_xml(shapes: &str) -> Vec<u8> {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<p:sld xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/>
{}
<p:extLst><p:ext uri="{{BB962C8B-B14F-4D97-AF65-F5344CB8AC3E}}"/></p:extLst></p:spTree></p:cSld></p:sld>"#,
            shapes
        )
        .into_bytes()
    }

    const TITLE: &str = r#"<p:sp><p:nvSpPr><p:cNvPr id="2" name="slide_title"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr><a:xfrm><a:off x="100" y="200"/><a:ext cx="3000" cy="400"/></a:xfrm></p:spPr><p:txBody><a:bodyPr/><a:p><a:r><a:rPr b="1"/><a:t>Rare &amp; Odd</a:t></a:r><a:r><a:t> Ports</a:t></a:r></a:p><a:p><a:r><a:t>Second</a:t></a:r></a:p></p:txBody></p:sp>"#;
    const TABLE: &str = r#"<p:graphicFrame><p:nvGraphicFramePr><p:cNvPr id="7" name="ndr_table"/><p:cNvGraphicFramePr/><p:nvPr/></p:nvGraphicFramePr><p:xfrm><a:off x="10" y="20"/><a:ext cx="30" cy="40"/></p:xfrm><a:graphic><a:graphicData uri="http://schemas.openxmlformats.org/drawingml/2006/table"><a:tbl><a:tr h="10"><a:tc><a:txBody><a:bodyPr/><a:p><a:r><a:t>cell</a:t></a:r></a:p></a:txBody></a:tc></a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame>"#;
    const PAGE: &str = r#"<p:sp><p:nvSpPr><p:cNvPr id="4" name="page_number"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:endParaRPr lang="en-US" sz="900"/></a:p></p:txBody></p:sp>"#;

    #[test]
    fn describes_shapes() {
        let slide = SlideXml::parse(&slide_xml(&[TITLE, TABLE, PAGE].join("\n"))).unwrap();
        let shapes = slide.shapes().unwrap();
        assert_eq!(shapes.len(), 3);
        assert_eq!(shapes[0].name, "slide_title");
        assert_eq!(shapes[0].text, "Rare & Odd Ports\nSecond");
        assert_eq!(shapes[0].bounds, Some(Rect { x: 100, y: 200, width: 3000, height: 400 }));
        assert!(shapes[1].has_table && !shapes[1].has_text);
        assert_eq!(shapes[1].text, "cell");
        assert_eq!(shapes[1].id, 7);
        assert_eq!(shapes[2].bounds, None);
        assert!(shapes[2].has_text);
        assert_eq!(slide.next_shape_id().unwrap(), 8);
    }

    #[test]
    fn untouched_slides_serialize_verbatim() {
        let source = slide_xml(&[TITLE, TABLE].join("\n"));
        let parsed = SlideXml::parse(&source).unwrap();
        assert_eq!(parsed.to_xml().unwrap(), source);
    }

    #[test]
    fn replaces_text_in_existing_runs() {
        let mut slide = SlideXml::parse(&slide_xml(TITLE)).unwrap();
        assert!(slide.shape_mut(2).unwrap().unwrap().replace_text("Rare & Odd Ports (cont.)").unwrap());
        let shape = &slide.shapes().unwrap()[0];
        assert_eq!(shape.text, "Rare & Odd Ports (cont.)\n");
        let xml = String::from_utf8(slide.to_xml().unwrap()).unwrap();
        assert!(xml.contains(r#"<a:rPr b="1"/><a:t>Rare &amp; Odd Ports (cont.)</a:t>"#));
    }

    #[test]
    fn creates_a_run_with_paragraph_formatting() {
        let mut slide = SlideXml::parse(&slide_xml(PAGE)).unwrap();
        assert!(slide.shape_mut(4).unwrap().unwrap().replace_text("12").unwrap());
        let xml = String::from_utf8(slide.to_xml().unwrap()).unwrap();
        assert!(xml.contains(r#"<a:p><a:r><a:rPr lang="en-US" sz="900"/><a:t>12</a:t></a:r><a:endParaRPr lang="en-US" sz="900"/></a:p>"#));
        assert_eq!(slide.shapes().unwrap()[0].text, "12");
    }

    #[test]
    fn tables_have_no_replaceable_text() {
        let mut slide = SlideXml::parse(&slide_xml(TABLE)).unwrap();
        assert!(!slide.shape_mut(7).unwrap().unwrap().replace_text("x").unwrap());
    }

    #[test]
    fn removes_renames_and_appends() {
        let mut slide = SlideXml::parse(&slide_xml(&[TITLE, TABLE].join(""))).unwrap();
        slide.shape_mut(7).unwrap().unwrap().rename("ndr_table_old").unwrap();
        assert_eq!(slide.shapes().unwrap()[1].name, "ndr_table_old");
        assert!(slide.remove(2).unwrap());
        assert!(!slide.remove(2).unwrap());
        slide.push(SlideXml::parse(&slide_xml(PAGE)).unwrap().shapes[0].events.clone());
        let names: Vec<String> = slide.shapes().unwrap().into_iter().map(|shape| shape.name).collect();
        assert_eq!(names, vec!["ndr_table_old".to_owned(), "page_number".to_owned()]);
        let xml = String::from_utf8(slide.to_xml().unwrap()).unwrap();
        assert!(xml.ends_with("</p:extLst></p:spTree></p:cSld></p:sld>"));
    }
}
