//! Mask serialization: the compression ladder and data-URI codec.
//!
//! Masks travel and persist as base64 data URIs so the same string can go
//! into a database row, over a websocket frame, and straight into an image
//! element. Size is capped in two stages: past the soft cap the encoder
//! steps down the ladder (PNG, JPEG 0.7, JPEG 0.5, half-resolution JPEG
//! 0.5); past the hard cap on the final rung the encode fails outright and
//! the previously persisted mask stays authoritative.

#[cfg(test)]
#[path = "codec_test.rs"]
mod codec_test;

use std::str::FromStr;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::FilterType;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{
    DOWNSAMPLE_SCALE, JPEG_QUALITY_FIRST, JPEG_QUALITY_SECOND, MASK_HARD_CAP, MASK_SOFT_CAP,
};

/// Encoding variant a mask was last serialized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MaskFormat {
    Png,
    Jpeg,
    JpegHalf,
}

impl MaskFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MaskFormat::Png => "png",
            MaskFormat::Jpeg => "jpeg",
            MaskFormat::JpegHalf => "jpeg-half",
        }
    }

    /// Whether this rung survives a decode with its alpha channel intact.
    #[must_use]
    pub fn is_lossless(self) -> bool {
        matches!(self, MaskFormat::Png)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown mask format (expected \"png\", \"jpeg\" or \"jpeg-half\")")]
pub struct MaskFormatParseError;

impl FromStr for MaskFormat {
    type Err = MaskFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "png" => Ok(MaskFormat::Png),
            "jpeg" => Ok(MaskFormat::Jpeg),
            "jpeg-half" => Ok(MaskFormat::JpegHalf),
            _ => Err(MaskFormatParseError),
        }
    }
}

/// One serialized mask plus the metadata observers need to scale it back
/// over the map. `width`/`height` are the encoded raster's dimensions,
/// which on the half-resolution rung are half the mask's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodedMask {
    pub data_uri: String,
    pub format: MaskFormat,
    pub width: u32,
    pub height: u32,
}

impl EncodedMask {
    /// Size as counted against the caps: data-URI characters.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.data_uri.len()
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoded mask is {0} bytes, past the hard size cap")]
    Oversize(usize),
    #[error("mask encode failed: {0}")]
    Encode(#[source] image::ImageError),
    #[error("unrecognized mask data URI prefix")]
    InvalidDataUri,
    #[error("mask payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("mask decode failed: {0}")]
    Decode(#[source] image::ImageError),
}

/// Serialize a mask, stepping down the ladder until a rung fits.
///
/// # Errors
///
/// [`CodecError::Oversize`] when even the half-resolution rung exceeds the
/// hard cap, or [`CodecError::Encode`] if the underlying encoder fails.
pub fn encode(mask: &RgbaImage) -> Result<EncodedMask, CodecError> {
    encode_with_caps(mask, MASK_SOFT_CAP, MASK_HARD_CAP)
}

fn encode_with_caps(
    mask: &RgbaImage,
    soft_cap: usize,
    hard_cap: usize,
) -> Result<EncodedMask, CodecError> {
    let (width, height) = mask.dimensions();

    let data_uri = png_data_uri(mask)?;
    if data_uri.len() <= soft_cap {
        return Ok(EncodedMask { data_uri, format: MaskFormat::Png, width, height });
    }
    tracing::debug!(chars = data_uri.len(), "png mask past soft cap, stepping down to jpeg");

    let data_uri = jpeg_data_uri(mask, JPEG_QUALITY_FIRST)?;
    if data_uri.len() <= soft_cap {
        return Ok(EncodedMask { data_uri, format: MaskFormat::Jpeg, width, height });
    }

    let data_uri = jpeg_data_uri(mask, JPEG_QUALITY_SECOND)?;
    if data_uri.len() <= soft_cap {
        return Ok(EncodedMask { data_uri, format: MaskFormat::Jpeg, width, height });
    }

    let half = downsample(mask);
    let (half_w, half_h) = half.dimensions();
    let data_uri = jpeg_data_uri(&half, JPEG_QUALITY_SECOND)?;
    if data_uri.len() > hard_cap {
        tracing::warn!(chars = data_uri.len(), "mask still past hard cap after all fallbacks");
        return Err(CodecError::Oversize(data_uri.len()));
    }
    Ok(EncodedMask {
        data_uri,
        format: MaskFormat::JpegHalf,
        width: half_w,
        height: half_h,
    })
}

/// Decode a mask data URI back into a raster.
///
/// JPEG variants come back fully opaque (see [`flatten_onto_black`]);
/// callers treat whatever alpha the decode yields as authoritative.
///
/// # Errors
///
/// Fails on an unrecognized URI prefix, bad base64, or a payload the image
/// decoder rejects.
pub fn decode(data_uri: &str) -> Result<RgbaImage, CodecError> {
    let payload = data_uri
        .strip_prefix("data:image/png;base64,")
        .or_else(|| data_uri.strip_prefix("data:image/jpeg;base64,"))
        .ok_or(CodecError::InvalidDataUri)?;
    let bytes = BASE64.decode(payload)?;
    let image = image::load_from_memory(&bytes).map_err(CodecError::Decode)?;
    Ok(image.to_rgba8())
}

fn png_data_uri(image: &RgbaImage) -> Result<String, CodecError> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(CodecError::Encode)?;
    Ok(format!("data:image/png;base64,{}", BASE64.encode(&bytes)))
}

fn jpeg_data_uri(image: &RgbaImage, quality: u8) -> Result<String, CodecError> {
    let rgb = flatten_onto_black(image);
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality)
        .encode_image(&rgb)
        .map_err(CodecError::Encode)?;
    Ok(format!("data:image/jpeg;base64,{}", BASE64.encode(&bytes)))
}

/// Collapse straight alpha onto a black backdrop, the way a canvas
/// rasterizes to JPEG. Fog pixels and revealed pixels both land on plain
/// black, so the lossy rungs cannot represent "revealed": decoding one
/// yields a fully opaque raster. Lossless PNG is the only rung that
/// round-trips reveal edits.
#[allow(clippy::cast_possible_truncation)]
fn flatten_onto_black(image: &RgbaImage) -> RgbImage {
    let mut rgb = RgbImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(rgb.pixels_mut()) {
        let a = u16::from(src.0[3]);
        dst.0 = [
            ((u16::from(src.0[0]) * a) / 255) as u8,
            ((u16::from(src.0[1]) * a) / 255) as u8,
            ((u16::from(src.0[2]) * a) / 255) as u8,
        ];
    }
    rgb
}

fn downsample(image: &RgbaImage) -> RgbaImage {
    let width = (image.width() / DOWNSAMPLE_SCALE).max(1);
    let height = (image.height() / DOWNSAMPLE_SCALE).max(1);
    image::imageops::resize(image, width, height, FilterType::Triangle)
}
