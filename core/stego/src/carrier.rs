//! Carrier image type.
//!
//! Any decodable raster is normalized to 8-bit RGB or RGBA so that the
//! embedder sees a fixed channel layout. Carriers are only ever encoded as
//! PNG; a lossy format would destroy the embedded bits.

use image::{DynamicImage, ImageFormat, ImageReader, RgbImage, RgbaImage};
use std::io::{Cursor, Seek, Write};
use std::path::Path;

use crate::capacity;
use aethervault_common::{Error, Result};

#[derive(Clone, PartialEq, Eq)]
enum Pixels {
    Rgb(RgbImage),
    Rgba(RgbaImage),
}

/// Raster image used to hold an embedded payload.
#[derive(Clone, PartialEq, Eq)]
pub struct CarrierImage {
    pixels: Pixels,
}

impl CarrierImage {
    /// Normalize a decoded image into a carrier.
    ///
    /// Images with an alpha channel keep it (as RGBA8), everything else
    /// becomes RGB8. Higher bit depths are reduced to 8 bits per channel.
    pub fn new(image: DynamicImage) -> Self {
        let pixels = match image {
            DynamicImage::ImageRgb8(buf) => Pixels::Rgb(buf),
            DynamicImage::ImageRgba8(buf) => Pixels::Rgba(buf),
            other if other.color().has_alpha() => Pixels::Rgba(other.to_rgba8()),
            other => Pixels::Rgb(other.to_rgb8()),
        };
        Self { pixels }
    }

    /// Wrap an RGB buffer.
    pub fn from_rgb(image: RgbImage) -> Self {
        Self {
            pixels: Pixels::Rgb(image),
        }
    }

    /// Wrap an RGBA buffer.
    pub fn from_rgba(image: RgbaImage) -> Self {
        Self {
            pixels: Pixels::Rgba(image),
        }
    }

    /// Load and decode an image file.
    ///
    /// # Errors
    /// - `SourceNotFound` if the file does not exist
    /// - `Io` for other read failures
    /// - `Carrier` if the content is not a decodable image
    pub fn load(path: &Path) -> Result<Self> {
        let reader = ImageReader::open(path)
            .map_err(|e| Error::from_source_io(e, path))?
            .with_guessed_format()?;
        let image = reader
            .decode()
            .map_err(|e| Error::Carrier(format!("{}: {}", path.display(), e)))?;
        Ok(Self::new(image))
    }

    /// Decode an in-memory image of any supported format.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes).map_err(|e| Error::Carrier(e.to_string()))?;
        Ok(Self::new(image))
    }

    /// Encode as PNG into a writer.
    pub fn write_png<W: Write + Seek>(&self, writer: &mut W) -> Result<()> {
        let encoded = match &self.pixels {
            Pixels::Rgb(buf) => buf.write_to(writer, ImageFormat::Png),
            Pixels::Rgba(buf) => buf.write_to(writer, ImageFormat::Png),
        };
        encoded.map_err(|e| Error::Carrier(format!("PNG encoding failed: {}", e)))
    }

    /// Encode as PNG into memory.
    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_png(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        match &self.pixels {
            Pixels::Rgb(buf) => buf.width(),
            Pixels::Rgba(buf) => buf.width(),
        }
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        match &self.pixels {
            Pixels::Rgb(buf) => buf.height(),
            Pixels::Rgba(buf) => buf.height(),
        }
    }

    /// Whether the carrier keeps an alpha channel.
    pub fn has_alpha(&self) -> bool {
        matches!(self.pixels, Pixels::Rgba(_))
    }

    /// Raw embedding capacity in bits.
    pub fn capacity_bits(&self) -> u64 {
        capacity::capacity_bits(self.width(), self.height())
    }

    /// Largest payload in bytes this carrier can hold.
    pub fn max_payload_len(&self) -> usize {
        capacity::max_payload_len(self.width(), self.height())
    }

    /// Convert back into a `DynamicImage`.
    pub fn into_dynamic(self) -> DynamicImage {
        match self.pixels {
            Pixels::Rgb(buf) => DynamicImage::ImageRgb8(buf),
            Pixels::Rgba(buf) => DynamicImage::ImageRgba8(buf),
        }
    }

    /// Interleaved samples and the number of channels per pixel.
    pub(crate) fn samples(&self) -> (&[u8], usize) {
        match &self.pixels {
            Pixels::Rgb(buf) => (buf.as_raw().as_slice(), 3),
            Pixels::Rgba(buf) => (buf.as_raw().as_slice(), 4),
        }
    }

    pub(crate) fn samples_mut(&mut self) -> (&mut [u8], usize) {
        match &mut self.pixels {
            Pixels::Rgb(buf) => (&mut **buf, 3),
            Pixels::Rgba(buf) => (&mut **buf, 4),
        }
    }
}

impl std::fmt::Debug for CarrierImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CarrierImage")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("alpha", &self.has_alpha())
            .finish()
    }
}
