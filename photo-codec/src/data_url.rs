use base64::Engine;

use crate::codec::CodecError;

/// Splits a data URL into its MIME type and base64 payload.
///
/// Bare base64 (no `data:` prefix) is returned as-is with no MIME type.
pub fn split_data_url(encoded: &str) -> (Option<&str>, &str) {
    let Some(rest) = encoded.strip_prefix("data:") else {
        return (None, encoded);
    };

    match rest.split_once(',') {
        Some((header, payload)) => {
            let mime = header.trim_end_matches(";base64");
            let mime = if mime.is_empty() { None } else { Some(mime) };
            (mime, payload)
        }
        None => (None, rest),
    }
}

/// Approximate number of bytes the encoded photo occupies once decoded.
///
/// Every 4 base64 characters carry 3 bytes; trailing padding is discounted.
pub fn estimated_decoded_len(encoded: &str) -> usize {
    let (_, payload) = split_data_url(encoded);
    let payload = payload.trim();
    let padding = payload.chars().rev().take_while(|c| *c == '=').count();
    (payload.len() * 3 / 4).saturating_sub(padding)
}

/// Decodes a data URL (or bare base64) into MIME type and raw bytes
pub fn decode_data_url(encoded: &str) -> Result<(String, Vec<u8>), CodecError> {
    let (mime, payload) = split_data_url(encoded);
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| CodecError::Decode(format!("Invalid base64 payload: {}", e)))?;
    Ok((mime.unwrap_or("image/jpeg").to_string(), bytes))
}

/// Builds a base64 data URL from raw bytes
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, b64)
}
