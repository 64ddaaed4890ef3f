use thiserror::Error;

use crate::media::MediaKind;

/// Failures the viewer reports to its user.
///
/// Each variant carries a diagnostic detail for the log; [`ViewerError::user_message`]
/// gives the text shown in the single notification raised for it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ViewerError {
    /// The source is neither a supported image nor an MP4/WebM video.
    /// `mime` is set when the source was a local file.
    #[error("unsupported media type: {detail}")]
    UnsupportedMediaType {
        mime: Option<String>,
        detail: String,
    },

    /// The bytes were fetched but could not be decoded as `kind`.
    #[error("failed to decode {kind:?}: {detail}")]
    DecodeFailure { kind: MediaKind, detail: String },

    /// Fetching the source failed (HTTP error, unreadable path, timeout).
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// Playback could not start without a user gesture.
    #[error("autoplay blocked: {0}")]
    AutoplayBlocked(String),

    #[error("screenshot failed: {0}")]
    ScreenshotFailure(String),
}

impl ViewerError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UnsupportedMediaType { mime: Some(_), .. } => {
                "Please upload an image or MP4/WebM video file."
            }
            Self::UnsupportedMediaType { mime: None, .. } | Self::NetworkFailure(_) => {
                "Unsupported media type or inaccessible URL"
            }
            Self::DecodeFailure {
                kind: MediaKind::Video,
                ..
            } => "This video cannot be played. It may use an unsupported codec (try H.264/AAC).",
            Self::DecodeFailure { .. } => "Error loading image.",
            Self::AutoplayBlocked(_) => "Autoplay was blocked; playback starts on your next click.",
            Self::ScreenshotFailure(_) => "Could not capture a screenshot.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_rejections_ask_for_a_supported_upload() {
        let err = ViewerError::UnsupportedMediaType {
            mime: Some("application/pdf".into()),
            detail: "application/pdf".into(),
        };
        assert_eq!(
            err.user_message(),
            "Please upload an image or MP4/WebM video file."
        );
    }

    #[test]
    fn url_rejections_mention_inaccessible_urls() {
        let err = ViewerError::UnsupportedMediaType {
            mime: None,
            detail: "no decoder".into(),
        };
        assert_eq!(
            err.user_message(),
            "Unsupported media type or inaccessible URL"
        );
    }
}
