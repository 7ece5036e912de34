//! Helpers for resolving media sources: local files, MIME types, base64.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::Source;
use crate::error::{AgentScopeError, Result};

/// Media bytes resolved to inline base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl InlineData {
    /// Render as a `data:` URL.
    pub fn to_data_url(&self) -> String {
        data_url(&self.mime_type, &self.data)
    }
}

pub fn is_web_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

pub fn is_data_url(url: &str) -> bool {
    url.starts_with("data:")
}

pub fn data_url(mime_type: &str, data: &str) -> String {
    format!("data:{mime_type};base64,{data}")
}

/// Resolve a URL to a local filesystem path.
///
/// `file://` URLs always resolve; bare paths resolve only when the file exists.
pub fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(path) = url.strip_prefix("file://") {
        return Some(PathBuf::from(path));
    }
    if url.contains("://") || is_data_url(url) {
        return None;
    }
    let path = PathBuf::from(url);
    path.is_file().then_some(path)
}

/// Guess a MIME type from the extension of a path or URL.
pub fn guess_mime_type(path_or_url: &str) -> Option<&'static str> {
    let trimmed = path_or_url
        .split(['?', '#'])
        .next()
        .unwrap_or(path_or_url);
    let ext = Path::new(trimmed)
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "wav" => "audio/wav",
        "mp3" => "audio/mp3",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "m4a" => "audio/mp4",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "webm" => "video/webm",
        "mkv" => "video/x-matroska",
        "mpeg" | "mpg" => "video/mpeg",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

/// Audio format name (`wav` or `mp3`) for a MIME type.
pub fn audio_format(mime_type: &str) -> Option<&'static str> {
    match mime_type {
        "audio/wav" | "audio/x-wav" | "audio/wave" => Some("wav"),
        "audio/mp3" | "audio/mpeg" => Some("mp3"),
        _ => None,
    }
}

/// Read a local file and base64-encode it.
pub fn read_base64(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| {
        AgentScopeError::format(format!("cannot read media file {}: {e}", path.display()))
    })?;
    Ok(STANDARD.encode(bytes))
}

/// Resolve a source to inline data.
///
/// Base64 sources and local files resolve; remote URLs return `None`.
pub fn resolve_inline(source: &Source) -> Result<Option<InlineData>> {
    match source {
        Source::Base64 { media_type, data } => Ok(Some(InlineData {
            mime_type: media_type.clone(),
            data: data.clone(),
        })),
        Source::Url { url } => {
            let Some(path) = local_path(url) else {
                return Ok(None);
            };
            let mime_type = require_mime_type(&path.to_string_lossy())?;
            Ok(Some(InlineData {
                mime_type: mime_type.to_string(),
                data: read_base64(&path)?,
            }))
        }
    }
}

/// Like [`guess_mime_type`] but fails for unknown extensions.
pub fn require_mime_type(path_or_url: &str) -> Result<&'static str> {
    guess_mime_type(path_or_url).ok_or_else(|| {
        AgentScopeError::format(format!("cannot determine MIME type for '{path_or_url}'"))
    })
}
