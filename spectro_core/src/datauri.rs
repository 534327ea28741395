//! Data URI helpers for the upload boundary.
//!
//! Uploads arrive as `"<type>,<base64-payload>"` (what a browser
//! `FileReader.readAsDataURL` produces) and results leave as
//! `data:<mime>;base64,<...>` strings that can be embedded directly.
use base64::{engine::general_purpose, Engine as _};

use crate::error::{PipelineError, PipelineResult};
use crate::types::{AudioFormat, AudioPayload};

/// Label used when neither the decoder nor the uploader named a format.
const FALLBACK_AUDIO_MIME: &str = "audio/mpeg";

/// Split an upload on its first comma into `(type, payload)`.
pub fn split_data_uri(contents: &str) -> PipelineResult<(&str, &str)> {
    contents.split_once(',').ok_or_else(|| {
        PipelineError::InputFormat("expected '<type>,<base64-payload>'".to_string())
    })
}

/// MIME type out of a `data:<mime>;base64` header, if one is present.
pub fn header_mime(header: &str) -> Option<String> {
    let header = header.trim();
    let header = header.strip_prefix("data:").unwrap_or(header);
    let mime = header.split(';').next().unwrap_or("").trim();
    if mime.is_empty() {
        None
    } else {
        Some(mime.to_ascii_lowercase())
    }
}

/// Turn an upload event into raw audio bytes.
pub fn decode_upload(contents: &str, filename: Option<String>) -> PipelineResult<AudioPayload> {
    let (header, payload) = split_data_uri(contents)?;
    let bytes = general_purpose::STANDARD.decode(payload.trim())?;
    Ok(AudioPayload {
        bytes,
        filename,
        mime: header_mime(header),
    })
}

/// Encode bytes as an embeddable `data:` URI.
pub fn encode_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", general_purpose::STANDARD.encode(bytes))
}

/// MIME label for replaying the original upload.
///
/// The decoder's own detection wins, then an `audio/*` type the uploader
/// declared, then a generic fallback.
pub fn playback_mime(detected: AudioFormat, declared: Option<&str>) -> String {
    if let Some(mime) = detected.mime() {
        return mime.to_string();
    }
    match declared {
        Some(mime) if mime.starts_with("audio/") => mime.to_string(),
        _ => FALLBACK_AUDIO_MIME.to_string(),
    }
}
