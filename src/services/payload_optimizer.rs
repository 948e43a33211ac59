use crate::config::SyncConfig;
use crate::models::CatchFormData;
use photo_codec::{estimated_decoded_len, ImageCodec};

/// Fixed cost of the JSON envelope and catch metadata
pub const BASE_PAYLOAD_BYTES: usize = 1024;
/// Approximate encoded size of one GPS coordinate
pub const GPS_PAYLOAD_BYTES: usize = 100;

/// Approximate size of a catch report on the wire
pub fn estimate_payload_size(form: &CatchFormData) -> usize {
    let mut size = BASE_PAYLOAD_BYTES;
    for photo in form.photos() {
        size += estimated_decoded_len(&photo.data);
        if photo.gps.is_some() {
            size += GPS_PAYLOAD_BYTES;
        }
    }
    size
}

/// Whether a single encoded photo exceeds the per-photo threshold
pub fn is_photo_too_large(photo: &str, config: &SyncConfig) -> bool {
    estimated_decoded_len(photo) > config.max_photo_bytes
}

/// Re-encodes `photo` at the reduced dimension if it is too large.
///
/// Codec failures are logged and the photo is returned unchanged.
pub fn shrink_photo(photo: &str, config: &SyncConfig, codec: &dyn ImageCodec) -> String {
    if !is_photo_too_large(photo, config) {
        return photo.to_string();
    }

    match codec.resize(
        photo,
        config.reduced_photo_dimension,
        config.reduced_photo_quality,
    ) {
        Ok(resized) => {
            log::debug!(
                "Compressed photo from ~{} to ~{} bytes",
                estimated_decoded_len(photo),
                estimated_decoded_len(&resized)
            );
            resized
        }
        Err(e) => {
            log::warn!("Photo compression failed, keeping original: {}", e);
            photo.to_string()
        }
    }
}

/// Shapes a catch report so it fits the payload limit.
///
/// Returns the report unchanged if it already fits. Otherwise oversized
/// photos are compressed; if that is still not enough, a single metadata-only
/// report (no photos, no GPS) is returned.
pub fn optimize_payload(
    form: &CatchFormData,
    config: &SyncConfig,
    codec: &dyn ImageCodec,
) -> Vec<CatchFormData> {
    let size = estimate_payload_size(form);
    if size <= config.max_payload_bytes {
        return vec![form.clone()];
    }

    log::info!(
        "Catch report for trip {} is ~{} bytes (limit {}), optimizing",
        form.trip_id,
        size,
        config.max_payload_bytes
    );

    let mut compressed = form.clone();
    for entry in &mut compressed.catches {
        for photo in &mut entry.photos {
            photo.data = shrink_photo(&photo.data, config, codec);
        }
    }

    let size = estimate_payload_size(&compressed);
    if size <= config.max_payload_bytes {
        return vec![compressed];
    }

    log::warn!(
        "Catch report for trip {} still ~{} bytes after compression, sending metadata only",
        form.trip_id,
        size
    );
    vec![form.metadata_only()]
}

/// Advisory warnings to show before the user submits a report
pub fn get_optimization_suggestions(form: &CatchFormData, config: &SyncConfig) -> Vec<String> {
    let mut suggestions = Vec::new();

    let size = estimate_payload_size(form);
    if size > config.max_payload_bytes {
        suggestions.push(format!(
            "Report is about {:.1} MB, above the {:.1} MB limit. Photos may be left out.",
            size as f64 / (1024.0 * 1024.0),
            config.max_payload_bytes as f64 / (1024.0 * 1024.0)
        ));
    }

    let photo_count = form.photo_count();
    if photo_count > config.max_photos_per_submission {
        suggestions.push(format!(
            "{} photos attached. Consider keeping at most {}.",
            photo_count, config.max_photos_per_submission
        ));
    }

    let large = form
        .photos()
        .filter(|p| is_photo_too_large(&p.data, config))
        .count();
    if large > 0 {
        suggestions.push(format!("{} photo(s) will be compressed before upload.", large));
    }

    suggestions
}
