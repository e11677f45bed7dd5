//! Font resolution and the shared glyph-metrics cache.
//!
//! A [`FontStrategy`] ranks TrueType candidates; when none loads, handles fall back
//! to the built-in bitmap font, so rendering never fails for lack of fonts.
//! Handles are cached by `(size, weight)` and are immutable once inserted.
use crate::config::FontStrategy;
use crate::table::bitmap;
use crate::table::style::Rgb;
use log::debug;
use log::warn;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use tiny_skia::FillRule;
use tiny_skia::Paint;
use tiny_skia::PathBuilder;
use tiny_skia::Pixmap;
use tiny_skia::Transform;
use ttf_parser::Face;
use ttf_parser::GlyphId;
use ttf_parser::OutlineBuilder;

/// Process-wide cache for the default strategy
static GLOBAL: Lazy<Arc<FontCache>> = Lazy::new(|| Arc::new(FontCache::new(FontStrategy::default())));

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FontWeight {
    Regular,
    Bold,
}

/// A loaded TrueType file.
#[derive(Debug)]
struct FontFile {
    path: PathBuf,
    data: Vec<u8>,
}

impl FontFile {
    fn load(path: &Path) -> Option<FontFile> {
        let data = std::fs::read(path).ok()?;
        match Face::parse(&data, 0) {
            Ok(_) => Some(FontFile { path: path.to_owned(), data }),
            Err(error) => {
                warn!("Skipping unusable font '{}': {}", path.display(), error);
                None
            }
        }
    }

    fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }
}

/// Opaque handle to a font at a pixel size.
#[derive(Clone, Debug)]
pub struct FontHandle {
    size: u32,
    weight: FontWeight,
    file: Option<Arc<FontFile>>,
}

impl FontHandle {
    /// Built-in bitmap font at the given size.
    pub fn builtin(size: u32, weight: FontWeight) -> Self {
        FontHandle { size, weight, file: None }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn weight(&self) -> FontWeight {
        self.weight
    }

    pub fn is_builtin(&self) -> bool {
        self.file.is_none()
    }

    /// Path of the TrueType file backing this handle.
    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|file| file.path.as_path())
    }

    /// Advance width of a single line of text in pixels, rounded up.
    pub fn text_width(&self, text: &str) -> u32 {
        let width = match self.file.as_ref().and_then(|file| file.face()) {
            Some(face) => {
                let scale = self.size as f32 / face.units_per_em() as f32;
                text.chars()
                    .map(|ch| {
                        let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
                        face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale
                    })
                    .sum::<f32>()
            }
            None => text.chars().count() as f32 * self.builtin_pixel() * bitmap::CELL_WIDTH as f32,
        };
        width.ceil() as u32
    }

    /// Draws a line of text whose top edge sits at `y`.
    pub(crate) fn draw_text(&self, pixmap: &mut Pixmap, text: &str, x: f32, y: f32, color: Rgb) {
        let mut paint = Paint::default();
        paint.set_color_rgba8(color.0, color.1, color.2, 255);
        paint.anti_alias = true;

        match self.file.as_ref().and_then(|file| file.face()) {
            Some(face) => {
                let scale = self.size as f32 / face.units_per_em() as f32;
                let baseline = y + face.ascender() as f32 * scale;
                let mut pen = x;
                for ch in text.chars() {
                    let glyph = face.glyph_index(ch).unwrap_or(GlyphId(0));
                    let mut outline = GlyphOutline(PathBuilder::new());
                    if face.outline_glyph(glyph, &mut outline).is_some() {
                        if let Some(path) = outline.0.finish() {
                            let transform = Transform::from_row(scale, 0.0, 0.0, -scale, pen, baseline);
                            pixmap.fill_path(&path, &paint, FillRule::Winding, transform, None);
                        }
                    }
                    pen += face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
                }
            }
            None => {
                paint.anti_alias = false;
                let pixel = self.builtin_pixel();
                let advance = pixel * bitmap::CELL_WIDTH as f32;
                for (index, ch) in text.chars().enumerate() {
                    let origin = x + index as f32 * advance;
                    for (column, row) in bitmap::lit_pixels(ch) {
                        let dot = tiny_skia::Rect::from_xywh(origin + column as f32 * pixel, y + row as f32 * pixel, pixel, pixel);
                        if let Some(dot) = dot {
                            pixmap.fill_rect(dot, &paint, Transform::identity(), None);
                        }
                    }
                }
            }
        }
    }

    fn builtin_pixel(&self) -> f32 {
        (self.size as f32 / bitmap::CELL_HEIGHT as f32).max(1.0)
    }
}

/// Feeds TrueType outlines into a tiny-skia path.
struct GlyphOutline(PathBuilder);

impl OutlineBuilder for GlyphOutline {
    fn move_to(&mut self, x: f32, y: f32) {
        self.0.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.0.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        self.0.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        self.0.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.0.close();
    }
}

/// Lazily populated, read-mostly cache of font handles.
#[derive(Debug)]
pub struct FontCache {
    strategy: FontStrategy,
    files: RwLock<HashMap<FontWeight, Option<Arc<FontFile>>>>,
    handles: RwLock<HashMap<(u32, FontWeight), FontHandle>>,
}

impl FontCache {
    pub fn new(strategy: FontStrategy) -> Self {
        FontCache {
            strategy,
            files: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Shared cache for the default strategy.
    pub fn global() -> Arc<FontCache> {
        GLOBAL.clone()
    }

    /// Shared cache when `strategy` is the default one, a private cache otherwise.
    pub fn for_strategy(strategy: &FontStrategy) -> Arc<FontCache> {
        if *strategy == FontStrategy::default() {
            Self::global()
        } else {
            Arc::new(FontCache::new(strategy.clone()))
        }
    }

    pub fn strategy(&self) -> &FontStrategy {
        &self.strategy
    }

    /// Handle for a size and weight, resolving the face on first use.
    pub fn font(&self, size: u32, weight: FontWeight) -> FontHandle {
        if let Some(handle) = self.handles.read().get(&(size, weight)) {
            return handle.clone();
        }
        let handle = FontHandle { size, weight, file: self.file(weight) };
        self.handles.write().entry((size, weight)).or_insert(handle).clone()
    }

    fn file(&self, weight: FontWeight) -> Option<Arc<FontFile>> {
        if let Some(file) = self.files.read().get(&weight) {
            return file.clone();
        }
        let resolved = self.resolve(weight);
        self.files.write().entry(weight).or_insert(resolved).clone()
    }

    fn resolve(&self, weight: FontWeight) -> Option<Arc<FontFile>> {
        let candidates = match weight {
            FontWeight::Regular => &self.strategy.regular,
            FontWeight::Bold => &self.strategy.bold,
        };
        for candidate in candidates {
            if let Some(file) = self.locate(candidate).and_then(|path| FontFile::load(&path)) {
                debug!("Resolved {:?} font to '{}'", weight, file.path.display());
                return Some(Arc::new(file));
            }
        }
        if weight == FontWeight::Bold && !self.strategy.regular.is_empty() {
            debug!("No bold font found, using the regular face");
            return self.file(FontWeight::Regular);
        }
        if !candidates.is_empty() {
            warn!("No {:?} font could be loaded, using the built-in bitmap font", weight);
        }
        None
    }

    fn locate(&self, candidate: &str) -> Option<PathBuf> {
        let direct = Path::new(candidate);
        if direct.is_absolute() {
            return direct.is_file().then(|| direct.to_owned());
        }
        for directory in &self.strategy.search_dirs {
            let joined = directory.join(candidate);
            if joined.is_file() {
                return Some(joined);
            }
        }
        for directory in self.strategy.search_dirs.iter().filter(|directory| directory.is_dir()) {
            let pattern = format!("{}/**/{}", glob::Pattern::escape(&directory.to_string_lossy()), glob::Pattern::escape(candidate));
            if let Some(found) = glob::glob(&pattern).ok().and_then(|paths| paths.filter_map(Result::ok).next()) {
                return Some(found);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_strategy_uses_builtin_font() {
        let cache = FontCache::new(FontStrategy::builtin_only());
        let font = cache.font(16, FontWeight::Regular);
        assert!(font.is_builtin());
        assert_eq!(font.size(), 16);
        // 16 px tall cells are 2 font pixels per dot, 12 px per character
        assert_eq!(font.text_width("No data"), 84);
        assert_eq!(font.text_width(""), 0);
    }

    #[test]
    fn handles_are_cached_per_size_and_weight() {
        let cache = FontCache::new(FontStrategy::builtin_only());
        cache.font(10, FontWeight::Bold);
        cache.font(10, FontWeight::Bold);
        cache.font(11, FontWeight::Bold);
        cache.font(10, FontWeight::Regular);
        assert_eq!(cache.handles.read().len(), 3);
        assert_eq!(cache.files.read().len(), 2);
    }

    #[test]
    fn missing_candidates_fall_back() {
        let directory = tempfile::tempdir().unwrap();
        std::fs::write(directory.path().join("Broken.ttf"), b"not a font").unwrap();
        let strategy = FontStrategy {
            regular: vec!["Broken.ttf".to_owned(), "/definitely/missing.ttf".to_owned()],
            bold: Vec::new(),
            search_dirs: vec![directory.path().to_owned()],
        };
        let cache = FontCache::new(strategy);
        assert!(cache.font(12, FontWeight::Regular).is_builtin());
        assert!(cache.font(12, FontWeight::Bold).is_builtin());
    }

    #[test]
    fn builtin_text_is_drawn() {
        let mut pixmap = Pixmap::new(40, 20).unwrap();
        FontHandle::builtin(8, FontWeight::Regular).draw_text(&mut pixmap, "I", 2.0, 2.0, Rgb(255, 255, 255));
        assert!(pixmap.pixels().iter().any(|pixel| pixel.alpha() == 255));
    }

    #[test]
    fn default_strategy_shares_the_global_cache() {
        let first = FontCache::for_strategy(&FontStrategy::default());
        assert!(Arc::ptr_eq(&first, &FontCache::global()));
        assert!(!Arc::ptr_eq(&FontCache::for_strategy(&FontStrategy::builtin_only()), &first));
    }
}
