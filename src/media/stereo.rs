//! Stereo-pair splitting for equirectangular images.

use std::borrow::Cow;
use std::fmt;

use image::buffer::ConvertBuffer;
use image::codecs::jpeg::JpegEncoder;
use image::{RgbImage, RgbaImage};

use crate::error::ViewerError;
use crate::media::MediaKind;

/// How a stereo pair is packed into one image. Only the first eye is displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StereoMode {
    #[default]
    None,
    /// Eyes stacked vertically; the top half is shown.
    TopBottom,
    /// Eyes side by side; the left half is shown.
    LeftRight,
}

impl StereoMode {
    /// None → TopBottom → LeftRight → None.
    pub fn next(self) -> Self {
        match self {
            Self::None => Self::TopBottom,
            Self::TopBottom => Self::LeftRight,
            Self::LeftRight => Self::None,
        }
    }

    /// Parses the `stereo` query parameter; unknown values mean mono.
    pub fn from_query_value(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "tb" | "vertical" | "1" => Self::TopBottom,
            "lr" | "horizontal" | "2" => Self::LeftRight,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "mono",
            Self::TopBottom => "tb",
            Self::LeftRight => "lr",
        }
    }
}

impl fmt::Display for StereoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Crops the displayed eye out of a stereo pair.
///
/// `None` borrows the input untouched. Halves round down but never below one pixel.
pub fn split_stereo(image: &RgbaImage, mode: StereoMode) -> Cow<'_, RgbaImage> {
    let (width, height) = image.dimensions();
    let (crop_w, crop_h) = match mode {
        StereoMode::None => return Cow::Borrowed(image),
        StereoMode::TopBottom => (width, (height / 2).max(1)),
        StereoMode::LeftRight => ((width / 2).max(1), height),
    };
    Cow::Owned(image::imageops::crop_imm(image, 0, 0, crop_w, crop_h).to_image())
}

/// Encodes a sky texture as JPEG. `quality` is on the 1–100 scale.
pub fn encode_texture(image: &RgbaImage, quality: u8) -> Result<Vec<u8>, ViewerError> {
    let rgb: RgbImage = image.convert();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
        .encode_image(&rgb)
        .map_err(|err| ViewerError::DecodeFailure {
            kind: MediaKind::Image,
            detail: format!("texture encode failed: {err}"),
        })?;
    Ok(out)
}
