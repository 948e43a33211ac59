use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use std::io::Cursor;

use crate::data_url::{decode_data_url, encode_data_url};

/// Error type for codec operations
#[derive(Debug)]
pub enum CodecError {
    Decode(String),
    Encode(String),
    InvalidParameter(String),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Decode(msg) => write!(f, "Image decode error: {}", msg),
            CodecError::Encode(msg) => write!(f, "Image encode error: {}", msg),
            CodecError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
        }
    }
}

impl std::error::Error for CodecError {}

/// Host capability for shrinking an encoded photo.
///
/// Implementations take a data URL (or bare base64) and return a new data URL
/// whose longest side does not exceed `max_dimension`.
pub trait ImageCodec: Send + Sync {
    fn resize(&self, photo: &str, max_dimension: u32, quality: u8) -> Result<String, CodecError>;
}

/// JPEG re-encoder backed by the `image` crate
#[derive(Debug, Clone, Copy)]
pub struct JpegCodec {
    filter: FilterType,
}

impl Default for JpegCodec {
    fn default() -> Self {
        Self {
            filter: FilterType::Triangle,
        }
    }
}

impl JpegCodec {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }
}

impl ImageCodec for JpegCodec {
    fn resize(&self, photo: &str, max_dimension: u32, quality: u8) -> Result<String, CodecError> {
        if max_dimension == 0 {
            return Err(CodecError::InvalidParameter(
                "max_dimension must be greater than zero".to_string(),
            ));
        }
        let quality = quality.clamp(1, 100);

        let (_, bytes) = decode_data_url(photo)?;
        let img = image::load_from_memory(&bytes)
            .map_err(|e| CodecError::Decode(format!("Failed to load image: {}", e)))?;

        let (width, height) = calculate_resize_dimensions(
            img.width(),
            img.height(),
            max_dimension,
            max_dimension,
        );
        let img = if (width, height) != (img.width(), img.height()) {
            img.resize(width, height, self.filter)
        } else {
            img
        };

        let mut buffer = Cursor::new(Vec::new());
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder
            .encode_image(&img.to_rgb8())
            .map_err(|e| CodecError::Encode(format!("Failed to write JPEG: {}", e)))?;

        let out = buffer.into_inner();
        log::debug!(
            "Re-encoded photo: {} -> {} bytes ({}x{}, q{})",
            bytes.len(),
            out.len(),
            width,
            height,
            quality
        );

        Ok(encode_data_url("image/jpeg", &out))
    }
}

/// Fits an image into a bounding box while keeping its aspect ratio
pub fn calculate_resize_dimensions(
    original_width: u32,
    original_height: u32,
    max_width: u32,
    max_height: u32,
) -> (u32, u32) {
    let ratio =
        (original_width as f32 / max_width as f32).max(original_height as f32 / max_height as f32);

    if ratio > 1.0 {
        let new_width = ((original_width as f32 / ratio) as u32).max(1);
        let new_height = ((original_height as f32 / ratio) as u32).max(1);
        (new_width, new_height)
    } else {
        (original_width, original_height)
    }
}
