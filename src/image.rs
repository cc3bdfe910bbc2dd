//! Image Descriptors and Codec
//!
//! The clipboard core only moves opaque byte payloads; image pixels cross
//! the wire PNG-encoded under the `image/png` format. This module holds the
//! descriptor types ([`ImageSpec`], [`Image`]) and, behind the `image`
//! feature, the thin codec the session delegates to.
//!
//! Pixel-format coverage is deliberately narrow: tightly packed RGBA8888
//! buffers in, RGBA8888 out. Anything richer belongs to the caller.

use bytes::Bytes;

use crate::error::{ClipboardError, Result};

/// Pixel layout of an [`Image`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImageSpec {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bits per pixel
    pub bits_per_pixel: u32,
    /// Bytes per row, including any padding
    pub bytes_per_row: u32,
    /// Red channel mask
    pub red_mask: u32,
    /// Green channel mask
    pub green_mask: u32,
    /// Blue channel mask
    pub blue_mask: u32,
    /// Alpha channel mask
    pub alpha_mask: u32,
    /// Red channel shift
    pub red_shift: u32,
    /// Green channel shift
    pub green_shift: u32,
    /// Blue channel shift
    pub blue_shift: u32,
    /// Alpha channel shift
    pub alpha_shift: u32,
}

impl ImageSpec {
    /// Tightly packed 32-bit RGBA layout, byte order R,G,B,A
    pub fn rgba8888(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits_per_pixel: 32,
            bytes_per_row: width * 4,
            red_mask: 0x0000_00ff,
            green_mask: 0x0000_ff00,
            blue_mask: 0x00ff_0000,
            alpha_mask: 0xff00_0000,
            red_shift: 0,
            green_shift: 8,
            blue_shift: 16,
            alpha_shift: 24,
        }
    }

    /// Total pixel buffer size this layout describes
    pub fn pixel_bytes(&self) -> usize {
        self.bytes_per_row as usize * self.height as usize
    }
}

/// An image payload: a pixel buffer plus its layout
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    spec: ImageSpec,
    pixels: Bytes,
}

impl Image {
    /// Wrap a pixel buffer, validating it against its layout
    pub fn new(spec: ImageSpec, pixels: impl Into<Bytes>) -> Result<Self> {
        let pixels = pixels.into();
        if pixels.len() != spec.pixel_bytes() {
            return Err(ClipboardError::InvalidImage(format!(
                "pixel buffer is {} byte(s), layout describes {}",
                pixels.len(),
                spec.pixel_bytes()
            )));
        }
        Ok(Self { spec, pixels })
    }

    /// Pixel layout
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }

    /// Raw pixel bytes
    pub fn pixels(&self) -> &Bytes {
        &self.pixels
    }
}

#[cfg(feature = "image")]
pub(crate) mod codec {
    //! PNG encode/decode for clipboard payloads

    use image::{DynamicImage, GenericImageView, ImageFormat, RgbaImage};
    use std::io::Cursor;

    use super::{Bytes, ClipboardError, Image, ImageSpec, Result};

    pub(crate) fn encode_png(img: &Image) -> Result<Bytes> {
        let spec = *img.spec();
        if spec != ImageSpec::rgba8888(spec.width, spec.height) {
            return Err(ClipboardError::ImageEncode(
                "only tightly packed RGBA8888 buffers are accepted".into(),
            ));
        }
        let rgba = RgbaImage::from_raw(spec.width, spec.height, img.pixels().to_vec())
            .ok_or_else(|| {
                ClipboardError::ImageEncode("pixel buffer does not match dimensions".into())
            })?;

        let mut out = Vec::new();
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(|e| ClipboardError::ImageEncode(e.to_string()))?;
        Ok(Bytes::from(out))
    }

    pub(crate) fn decode_png(data: &[u8]) -> Result<Image> {
        let decoded = image::load_from_memory_with_format(data, ImageFormat::Png)
            .map_err(|e| ClipboardError::ImageDecode(e.to_string()))?;
        let rgba = decoded.into_rgba8();
        let (width, height) = rgba.dimensions();
        Image::new(ImageSpec::rgba8888(width, height), rgba.into_raw())
    }

    pub(crate) fn decode_spec(data: &[u8]) -> Result<ImageSpec> {
        let decoded = image::load_from_memory_with_format(data, ImageFormat::Png)
            .map_err(|e| ClipboardError::ImageDecode(e.to_string()))?;
        let (width, height) = decoded.dimensions();
        Ok(ImageSpec::rgba8888(width, height))
    }
}
