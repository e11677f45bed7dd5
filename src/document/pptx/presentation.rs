//! The presentation part: everything is passed through untouched except the slide list.
use crate::document::DeckError;
use crate::error::RustyDeckError;
use crate::helpers::xml::local_name;
use crate::helpers::xml::matching_end;
use crate::helpers::xml::parse_events;
use crate::helpers::xml::write_events;
use crate::helpers::xml::XmlAttributeHelper;
use crate::helpers::xml::XmlFragment;
use quick_xml::events::BytesEnd;
use quick_xml::events::BytesStart;
use quick_xml::events::Event;

/// Smallest id PowerPoint accepts for a slide
const FIRST_SLIDE_ID: u32 = 256;

/// An entry of `sldIdLst`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SlideId {
    pub id: u32,
    pub rel_id: String,
}

#[derive(Clone, Debug)]
pub(crate) struct PresentationPart {
    events: Vec<Event<'static>>,
    /// First and last event of the slide list
    list: (usize, usize),
    list_tag: String,
    item_tag: String,
    relationship_attribute: String,
}

impl PresentationPart {
    /// Parses the part and returns it with its slides in presentation order.
    pub(crate) fn parse(bytes: &[u8]) -> Result<(Self, Vec<SlideId>), RustyDeckError> {
        let mut events = parse_events(bytes)?;
        let prefix = events
            .iter()
            .find_map(|event| match event {
                Event::Start(start) => Some(qualified_prefix(start)),
                _ => None,
            })
            .unwrap_or_default();

        let list = match position_of(&events, b"sldIdLst") {
            Some(start) => {
                let end = matching_end(&events, start).ok_or_else(|| invalid("unterminated slide list"))?;
                (start, end)
            }
            None => {
                // Decks without slides have no list; it goes right after the master list
                let masters = position_of(&events, b"sldMasterIdLst").ok_or_else(|| invalid("no slide master list"))?;
                let after = matching_end(&events, masters).ok_or_else(|| invalid("unterminated master list"))? + 1;
                let tag = format!("{}sldIdLst", prefix);
                events.insert(after, Event::End(BytesEnd::new(tag.clone())));
                events.insert(after, Event::Start(BytesStart::new(tag)));
                (after, after + 1)
            }
        };

        let mut slides = Vec::new();
        let mut item_tag = format!("{}sldId", prefix);
        let mut relationship_attribute = "r:id".to_owned();
        for event in events.get(list.0 + 1..list.1).unwrap_or(&[]) {
            let (Event::Start(start) | Event::Empty(start)) = event else { continue };
            if start.local_name().as_ref() != b"sldId" {
                continue;
            }
            item_tag = String::from_utf8_lossy(start.name().as_ref()).into_owned();
            let mut slide = SlideId { id: 0, rel_id: String::new() };
            for attribute in start.attributes() {
                let attribute = attribute?;
                let key = attribute.key.as_ref();
                if key == b"id" {
                    slide.id = attribute.parse_value()?;
                } else if key.ends_with(b":id") {
                    relationship_attribute = String::from_utf8_lossy(key).into_owned();
                    slide.rel_id = attribute.get_value()?.into_owned();
                }
            }
            slides.push(slide);
        }

        let list_tag = match &events[list.0] {
            Event::Start(start) | Event::Empty(start) => String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            _ => format!("{}sldIdLst", prefix),
        };
        Ok((PresentationPart { events, list, list_tag, item_tag, relationship_attribute }, slides))
    }

    /// Serializes the part with `slides` as its slide list.
    pub(crate) fn to_xml(&self, slides: &[SlideId]) -> Result<Vec<u8>, RustyDeckError> {
        let mut fragment = XmlFragment::new();
        fragment.open(&self.list_tag, &[]);
        for slide in slides {
            let id = slide.id.to_string();
            fragment.empty(&self.item_tag, &[("id", id.as_str()), (self.relationship_attribute.as_str(), slide.rel_id.as_str())]);
        }
        fragment.close(&self.list_tag);
        let list = fragment.into_events();

        let (start, end) = self.list;
        write_events(self.events[..start].iter().chain(list.iter()).chain(self.events[end + 1..].iter()))
    }
}

/// Id for a new slide, above every id in use.
pub(crate) fn next_slide_id(slides: &[SlideId]) -> u32 {
    slides.iter().map(|slide| slide.id + 1).max().unwrap_or(FIRST_SLIDE_ID).max(FIRST_SLIDE_ID)
}

fn position_of(events: &[Event<'static>], name: &[u8]) -> Option<usize> {
    events
        .iter()
        .position(|event| matches!(event, Event::Start(_) | Event::Empty(_)) && local_name(event) == Some(name))
}

/// `p:` for `p:presentation`, empty when unprefixed.
fn qualified_prefix(start: &BytesStart<'_>) -> String {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    match name.split_once(':') {
        Some((prefix, _)) => format!("{}:", prefix),
        None => String::new(),
    }
}

fn invalid(reason: &str) -> DeckError {
    DeckError::InvalidPackage(format!("presentation part has {}", reason))
}
