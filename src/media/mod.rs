//! Media classification and loading.
//!
//! A [`MediaSource`] is either a local file (bytes plus the MIME type reported for
//! it) or a URL. [`classify`] decides what the viewer should treat it as, and
//! [`load_source`] turns it into decoded pixels or a probed video.

pub mod decode;
pub mod fetch;
pub mod probe;
pub mod stereo;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::RgbaImage;
use tracing::debug;

use crate::error::ViewerError;

pub use fetch::{MediaFetcher, SourceFetcher};
pub use probe::{VideoContainer, VideoInfo};
pub use stereo::{StereoMode, encode_texture, split_stereo};

/// Extensions recognised as images when classifying a URL.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Extensions recognised as videos when classifying a URL.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm"];

/// The only video MIME types accepted for local files.
pub const VIDEO_MIME_TYPES: &[&str] = &["video/mp4", "video/webm"];

const FALLBACK_MIME: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

/// Where the media comes from. Immutable once built; clones share the bytes.
#[derive(Clone, PartialEq, Eq)]
pub enum MediaSource {
    File { bytes: Arc<[u8]>, mime_type: String },
    Url { address: String },
}

impl MediaSource {
    pub fn file(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self::File {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn url(address: impl Into<String>) -> Self {
        Self::Url {
            address: address.into(),
        }
    }

    /// Reads a local file, deriving its MIME type from the extension.
    pub async fn from_path(path: &Path) -> Result<Self, ViewerError> {
        let bytes = tokio::fs::read(path).await.map_err(|err| {
            ViewerError::NetworkFailure(format!("failed to read {}: {err}", path.display()))
        })?;
        let mime = mime_for_path(path).unwrap_or(FALLBACK_MIME);
        Ok(Self::file(bytes, mime))
    }

    /// Interprets user input: remote and `file://` URLs stay URLs, existing
    /// paths are read as files, anything else is treated as an address.
    pub async fn resolve(raw: &str) -> Result<Self, ViewerError> {
        let trimmed = raw.trim();
        if fetch::is_remote(trimmed) || trimmed.starts_with("file://") {
            return Ok(Self::url(trimmed));
        }
        let path = Path::new(trimmed);
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            Self::from_path(path).await
        } else {
            Ok(Self::url(trimmed))
        }
    }
}

impl fmt::Debug for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { bytes, mime_type } => f
                .debug_struct("File")
                .field("mime_type", mime_type)
                .field("len", &bytes.len())
                .finish(),
            Self::Url { address } => f.debug_struct("Url").field("address", address).finish(),
        }
    }
}

impl fmt::Display for MediaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { bytes, mime_type } => write!(f, "file ({mime_type}, {} bytes)", bytes.len()),
            Self::Url { address } => f.write_str(address),
        }
    }
}

/// Media ready to be put on screen.
#[derive(Debug, Clone)]
pub enum LoadedMedia {
    Image(RgbaImage),
    Video { info: VideoInfo, bytes: Arc<[u8]> },
}

impl LoadedMedia {
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Video { .. } => MediaKind::Video,
        }
    }
}

pub fn classify(source: &MediaSource) -> MediaKind {
    match source {
        MediaSource::File { mime_type, .. } => classify_mime(mime_type),
        MediaSource::Url { address } => classify_address(address),
    }
}

/// `image/*` is an image, `video/mp4` and `video/webm` are videos, the rest is rejected.
pub fn classify_mime(mime: &str) -> MediaKind {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    if essence.starts_with("image/") {
        MediaKind::Image
    } else if VIDEO_MIME_TYPES.contains(&essence.as_str()) {
        MediaKind::Video
    } else {
        MediaKind::Unknown
    }
}

/// Whether a dropped or picked file may be loaded at all.
pub fn is_accepted_mime(mime: &str) -> bool {
    classify_mime(mime) != MediaKind::Unknown
}

/// Classifies by the extension of the last path segment; query and fragment are ignored.
pub fn classify_address(address: &str) -> MediaKind {
    match address_extension(address) {
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Image,
        Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => MediaKind::Video,
        _ => MediaKind::Unknown,
    }
}

fn address_extension(address: &str) -> Option<String> {
    let path = address.split(['?', '#']).next().unwrap_or_default();
    let segment = path.rsplit('/').next().unwrap_or_default();
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

pub fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        "mkv" => "video/x-matroska",
        "pdf" => "application/pdf",
        _ => return None,
    };
    Some(mime)
}

/// Classifies, fetches and decodes a source.
///
/// URLs without a recognised extension are probed: image decoding is tried
/// first and a video container is only considered when that fails.
pub async fn load_source(
    source: &MediaSource,
    fetcher: &dyn MediaFetcher,
) -> Result<LoadedMedia, ViewerError> {
    match source {
        MediaSource::File { bytes, mime_type } => match classify_mime(mime_type) {
            MediaKind::Image => decode_blocking(Arc::clone(bytes)).await.map(LoadedMedia::Image),
            MediaKind::Video => video_from(Arc::clone(bytes)),
            MediaKind::Unknown => Err(ViewerError::UnsupportedMediaType {
                mime: Some(mime_type.clone()),
                detail: format!("file type {mime_type:?} is not an image or MP4/WebM video"),
            }),
        },
        MediaSource::Url { address } => {
            let kind = classify_address(address);
            debug!(%address, ?kind, "classified url");
            let bytes = fetcher.fetch(address).await?;
            match kind {
                // A remote image that will not decode is reported like an unreachable URL.
                MediaKind::Image => decode_blocking(bytes)
                    .await
                    .map(LoadedMedia::Image)
                    .map_err(|err| ViewerError::UnsupportedMediaType {
                        mime: None,
                        detail: format!("{address}: {err}"),
                    }),
                MediaKind::Video => video_from(bytes),
                MediaKind::Unknown => probe_blocking(bytes).await,
            }
        }
    }
}

fn video_from(bytes: Arc<[u8]>) -> Result<LoadedMedia, ViewerError> {
    let info = probe::probe_video(&bytes)?;
    Ok(LoadedMedia::Video { info, bytes })
}

async fn decode_blocking(bytes: Arc<[u8]>) -> Result<RgbaImage, ViewerError> {
    tokio::task::spawn_blocking(move || decode::decode_image(&bytes))
        .await
        .map_err(|err| ViewerError::DecodeFailure {
            kind: MediaKind::Image,
            detail: format!("decode task failed: {err}"),
        })?
}

async fn probe_blocking(bytes: Arc<[u8]>) -> Result<LoadedMedia, ViewerError> {
    tokio::task::spawn_blocking(move || probe::probe_bytes(bytes))
        .await
        .map_err(|err| ViewerError::UnsupportedMediaType {
            mime: None,
            detail: format!("probe task failed: {err}"),
        })?
}
