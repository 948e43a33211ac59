//! # Photo Codec
//!
//! Image re-encoding for photos that travel inside catch submissions.
//!
//! Photos arrive from the capture UI as data URLs (or bare base64). Before a
//! submission goes over a slow link the upload pipeline may ask for a smaller
//! version of an oversized photo. This crate provides:
//! - the [`ImageCodec`] capability the upload pipeline depends on
//! - a JPEG implementation backed by the `image` crate
//! - helpers to split, decode and size data URLs
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use photo_codec::{ImageCodec, JpegCodec};
//!
//! let codec = JpegCodec::default();
//! let smaller = codec.resize(&data_url, 1280, 70)?;
//! ```

pub mod codec;
pub mod data_url;

pub use codec::{calculate_resize_dimensions, CodecError, ImageCodec, JpegCodec};
pub use data_url::{decode_data_url, encode_data_url, estimated_decoded_len, split_data_url};
