//! In-memory slide deck, useful for planning runs and for exercising the orchestrator.
use crate::document::DeckError;
use crate::document::Picture;
use crate::document::Shape;
use crate::document::SlideDeck;
use crate::document::TextBox;
use crate::error::RustyDeckError;
use crate::table::native::NativeTable;
use crate::transform::Rect;

/// What a memory shape carries besides its text.
#[derive(Clone, Debug, PartialEq)]
pub enum MemoryContent {
    Plain,
    Picture(Picture),
    Table(NativeTable),
    TextBox(TextBox),
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemoryShape {
    pub shape: Shape,
    pub content: MemoryContent,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemorySlide {
    pub shapes: Vec<MemoryShape>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryDeck {
    slides: Vec<MemorySlide>,
}

impl MemoryDeck {
    /// Deck with `count` empty slides.
    pub fn new(count: usize) -> Self {
        MemoryDeck { slides: vec![MemorySlide::default(); count] }
    }

    pub fn slide(&self, index: usize) -> Option<&MemorySlide> {
        self.slides.get(index)
    }

    /// Adds a text-bearing shape such as a title or page number.
    pub fn add_text_shape(&mut self, slide: usize, name: &str, text: &str, bounds: Rect) -> Result<u32, RustyDeckError> {
        let shape = Shape { name: name.to_owned(), bounds: Some(bounds), has_text: true, text: text.to_owned(), ..Default::default() };
        self.push(slide, shape, MemoryContent::Plain)
    }

    /// Adds an empty table placeholder.
    pub fn add_table_placeholder(&mut self, slide: usize, name: &str, bounds: Rect) -> Result<u32, RustyDeckError> {
        let shape = Shape { name: name.to_owned(), bounds: Some(bounds), has_table: true, ..Default::default() };
        self.push(slide, shape, MemoryContent::Plain)
    }

    /// Adds a shape that carries neither text nor a table.
    pub fn add_plain_shape(&mut self, slide: usize, name: &str, bounds: Option<Rect>) -> Result<u32, RustyDeckError> {
        let shape = Shape { name: name.to_owned(), bounds, ..Default::default() };
        self.push(slide, shape, MemoryContent::Plain)
    }

    /// Pictures on a slide with their bounds.
    pub fn pictures(&self, slide: usize) -> Vec<(&Picture, Rect)> {
        self.contents(slide)
            .filter_map(|(shape, content)| match (content, shape.bounds) {
                (MemoryContent::Picture(picture), Some(bounds)) => Some((picture, bounds)),
                _ => None,
            })
            .collect()
    }

    pub fn tables(&self, slide: usize) -> Vec<&NativeTable> {
        self.contents(slide)
            .filter_map(|(_, content)| match content {
                MemoryContent::Table(table) => Some(table),
                _ => None,
            })
            .collect()
    }

    pub fn text_boxes(&self, slide: usize) -> Vec<&TextBox> {
        self.contents(slide)
            .filter_map(|(_, content)| match content {
                MemoryContent::TextBox(text_box) => Some(text_box),
                _ => None,
            })
            .collect()
    }

    fn contents(&self, slide: usize) -> impl Iterator<Item = (&Shape, &MemoryContent)> {
        self.slides
            .get(slide)
            .into_iter()
            .flat_map(|slide| slide.shapes.iter().map(|shape| (&shape.shape, &shape.content)))
    }

    fn push(&mut self, slide: usize, mut shape: Shape, content: MemoryContent) -> Result<u32, RustyDeckError> {
        self.check_slide(slide)?;
        let shapes = &mut self.slides[slide].shapes;
        shape.id = shapes.iter().map(|existing| existing.shape.id).max().unwrap_or(1) + 1;
        let id = shape.id;
        shapes.push(MemoryShape { shape, content });
        Ok(id)
    }

    fn shape_mut(&mut self, slide: usize, id: u32) -> Result<&mut MemoryShape, RustyDeckError> {
        self.check_slide(slide)?;
        let shape = self.slides[slide].shapes.iter_mut().find(|shape| shape.shape.id == id);
        Ok(shape.ok_or(DeckError::ShapeNotFound { slide, id })?)
    }
}

impl SlideDeck for MemoryDeck {
    fn slide_count(&self) -> usize {
        self.slides.len()
    }

    fn shapes(&self, slide: usize) -> Result<Vec<Shape>, RustyDeckError> {
        self.check_slide(slide)?;
        Ok(self.slides[slide].shapes.iter().map(|shape| shape.shape.clone()).collect())
    }

    fn remove_shape(&mut self, slide: usize, id: u32) -> Result<(), RustyDeckError> {
        self.check_slide(slide)?;
        let shapes = &mut self.slides[slide].shapes;
        let before = shapes.len();
        shapes.retain(|shape| shape.shape.id != id);
        if shapes.len() == before {
            Err(DeckError::ShapeNotFound { slide, id })?;
        }
        Ok(())
    }

    fn rename_shape(&mut self, slide: usize, id: u32, name: &str) -> Result<(), RustyDeckError> {
        self.shape_mut(slide, id)?.shape.name = name.to_owned();
        Ok(())
    }

    fn replace_text(&mut self, slide: usize, id: u32, text: &str) -> Result<bool, RustyDeckError> {
        let shape = &mut self.shape_mut(slide, id)?.shape;
        if shape.has_text {
            shape.text = text.to_owned();
        }
        Ok(shape.has_text)
    }

    fn add_picture(&mut self, slide: usize, picture: &Picture, bounds: Rect, name: &str) -> Result<u32, RustyDeckError> {
        let shape = Shape { name: name.to_owned(), bounds: Some(bounds), has_picture: true, ..Default::default() };
        self.push(slide, shape, MemoryContent::Picture(picture.clone()))
    }

    fn add_table(&mut self, slide: usize, table: &NativeTable, name: &str) -> Result<u32, RustyDeckError> {
        let text = table.rows.iter().flat_map(|row| row.cells.iter()).map(String::as_str).collect::<Vec<_>>().join("\n");
        let shape = Shape { name: name.to_owned(), bounds: Some(table.bounds), has_table: true, text, ..Default::default() };
        self.push(slide, shape, MemoryContent::Table(table.clone()))
    }

    fn add_text_box(&mut self, slide: usize, text_box: &TextBox) -> Result<u32, RustyDeckError> {
        let shape = Shape {
            name: text_box.name.clone(),
            bounds: Some(text_box.bounds),
            has_text: true,
            text: text_box.paragraphs.join("\n"),
            ..Default::default()
        };
        self.push(slide, shape, MemoryContent::TextBox(text_box.clone()))
    }

    fn duplicate_slide(&mut self, source: usize, position: usize) -> Result<(), RustyDeckError> {
        self.check_slide(source)?;
        if position > self.slides.len() {
            Err(DeckError::SlideOutOfRange { index: position, count: self.slides.len() })?;
        }
        let copy = self.slides[source].clone();
        self.slides.insert(position, copy);
        Ok(())
    }
}
