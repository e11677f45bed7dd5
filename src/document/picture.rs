//! Image payloads for picture shapes: format detection, pixel size and embedded DPI.
use crate::error::ResultMessage;
use crate::error::RustyDeckError;
use crate::transform::EMU_PER_INCH;
use image::ImageFormat;
use image::ImageReader;
use log::debug;
use std::io::Cursor;
use std::path::Path;

/// Formats a slide can embed as-is.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PictureFormat {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
}

impl PictureFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PictureFormat::Png => "png",
            PictureFormat::Jpeg => "jpeg",
            PictureFormat::Gif => "gif",
            PictureFormat::Bmp => "bmp",
            PictureFormat::Tiff => "tiff",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            PictureFormat::Png => "image/png",
            PictureFormat::Jpeg => "image/jpeg",
            PictureFormat::Gif => "image/gif",
            PictureFormat::Bmp => "image/bmp",
            PictureFormat::Tiff => "image/tiff",
        }
    }

    fn from_image_format(format: ImageFormat) -> Option<PictureFormat> {
        match format {
            ImageFormat::Png => Some(PictureFormat::Png),
            ImageFormat::Jpeg => Some(PictureFormat::Jpeg),
            ImageFormat::Gif => Some(PictureFormat::Gif),
            ImageFormat::Bmp => Some(PictureFormat::Bmp),
            ImageFormat::Tiff => Some(PictureFormat::Tiff),
            _ => None,
        }
    }
}

/// An encoded image with its pixel size.
#[derive(Clone, Debug, PartialEq)]
pub struct Picture {
    pub bytes: Vec<u8>,
    pub format: PictureFormat,
    pub width_px: u32,
    pub height_px: u32,
    /// Horizontal and vertical resolution stored in the file, if any
    pub dpi: Option<(f64, f64)>,
}

impl Picture {
    /// Reads an image file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Picture, RustyDeckError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(RustyDeckError::from).with_prefix(&format!("Failed to read '{}'", path.display()))?;
        Picture::from_bytes(bytes).with_prefix(&format!("Failed to decode '{}'", path.display()))
    }

    /// Detects the format of encoded bytes. Formats a slide cannot embed are re-encoded as PNG.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Picture, RustyDeckError> {
        let format = image::guess_format(&bytes)?;
        match PictureFormat::from_image_format(format) {
            Some(picture_format) => {
                let (width_px, height_px) = ImageReader::with_format(Cursor::new(&bytes), format).into_dimensions()?;
                let dpi = embedded_dpi(&bytes, picture_format);
                Ok(Picture { bytes, format: picture_format, width_px, height_px, dpi })
            }
            None => {
                debug!("Re-encoding {:?} image as PNG", format);
                let decoded = image::load_from_memory_with_format(&bytes, format)?;
                let mut png = Cursor::new(Vec::new());
                decoded.write_to(&mut png, ImageFormat::Png)?;
                Ok(Picture {
                    bytes: png.into_inner(),
                    format: PictureFormat::Png,
                    width_px: decoded.width(),
                    height_px: decoded.height(),
                    dpi: None,
                })
            }
        }
    }

    /// Wraps PNG bytes whose size is already known.
    pub fn png(bytes: Vec<u8>, width_px: u32, height_px: u32) -> Picture {
        Picture { bytes, format: PictureFormat::Png, width_px, height_px, dpi: None }
    }

    /// Native size in EMU, using `default_dpi` when the file carries no usable resolution.
    pub fn size_emu(&self, default_dpi: f64) -> (i64, i64) {
        let (dpi_x, dpi_y) = self.dpi.unwrap_or((default_dpi, default_dpi));
        let to_emu = |pixels: u32, dpi: f64| {
            let dpi = if dpi > 0.0 { dpi } else { default_dpi };
            (pixels as f64 / dpi * EMU_PER_INCH as f64).round() as i64
        };
        (to_emu(self.width_px, dpi_x), to_emu(self.height_px, dpi_y))
    }
}

/// Resolution from a PNG `pHYs` chunk or a JPEG `JFIF` header.
fn embedded_dpi(bytes: &[u8], format: PictureFormat) -> Option<(f64, f64)> {
    let dpi = match format {
        PictureFormat::Png => png_dpi(bytes),
        PictureFormat::Jpeg => jfif_dpi(bytes),
        _ => None,
    };
    dpi.filter(|(x, y)| *x > 0.0 && *y > 0.0)
}

fn be_u32(bytes: &[u8], offset: usize) -> Option<u32> {
    let slice = bytes.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([slice[0], slice[1], slice[2], slice[3]]))
}

fn be_u16(bytes: &[u8], offset: usize) -> Option<u16> {
    let slice = bytes.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([slice[0], slice[1]]))
}

fn png_dpi(bytes: &[u8]) -> Option<(f64, f64)> {
    let mut offset = 8;
    while offset + 8 <= bytes.len() {
        let length = be_u32(bytes, offset)? as usize;
        let kind = bytes.get(offset + 4..offset + 8)?;
        match kind {
            b"pHYs" => {
                let data = offset + 8;
                let (x, y) = (be_u32(bytes, data)?, be_u32(bytes, data + 4)?);
                // unit 1 is pixels per metre
                return (*bytes.get(data + 8)? == 1).then(|| (x as f64 * 0.0254, y as f64 * 0.0254));
            }
            b"IDAT" | b"IEND" => return None,
            _ => offset += 12 + length,
        }
    }
    None
}

fn jfif_dpi(bytes: &[u8]) -> Option<(f64, f64)> {
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut offset = 2;
    while offset + 4 <= bytes.len() {
        if bytes[offset] != 0xFF {
            return None;
        }
        let marker = bytes[offset + 1];
        let length = be_u16(bytes, offset + 2)? as usize;
        if marker == 0xE0 && bytes.get(offset + 4..offset + 9)? == b"JFIF\0" {
            let data = offset + 9;
            let units = *bytes.get(data + 2)?;
            let (x, y) = (be_u16(bytes, data + 3)? as f64, be_u16(bytes, data + 5)? as f64);
            return match units {
                1 => Some((x, y)),
                2 => Some((x * 2.54, y * 2.54)),
                _ => None,
            };
        }
        if marker == 0xDA {
            return None;
        }
        offset += 2 + length;
    }
    None
}
