//! Table palette and typography shared by the raster and native renderers.
use serde::Deserialize;
use serde::Serialize;

/// An opaque sRGB color.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const fn from_hex(value: u32) -> Self {
        Rgb((value >> 16) as u8, (value >> 8) as u8, value as u8)
    }

    /// Six upper-case hex digits, as used by DrawingML `srgbClr`.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

pub const WHITE: Rgb = Rgb::from_hex(0xFFFFFF);
pub const BLACK: Rgb = Rgb::from_hex(0x000000);
/// Title bar above the header row
pub const TITLE_BACKGROUND: Rgb = Rgb::from_hex(0x073B6B);
pub const HEADER_BACKGROUND: Rgb = BLACK;
pub const DARK_ROW: Rgb = Rgb::from_hex(0x0B5394);
pub const LIGHT_ROW: Rgb = Rgb::from_hex(0x3D85C6);
pub const TEXT: Rgb = WHITE;

/// Typeface used for native table cells and text boxes
pub const TYPEFACE: &str = "Calibri";

/// Placeholder row text for tables without data rows
pub const NO_DATA_ROW: &str = "No data";

/// Full-panel message for sources without any tabular content
pub const NO_DATA_PANEL: &str = "No Data";

/// Background of the n-th data row.
pub fn row_background(index: usize) -> Rgb {
    if index % 2 == 0 {
        DARK_ROW
    } else {
        LIGHT_ROW
    }
}
