//! Container sniffing for video sources and best-effort probing of
//! addresses whose extension says nothing.

use std::sync::Arc;

use tracing::debug;

use crate::error::ViewerError;
use crate::media::{LoadedMedia, MediaKind, decode};

const EBML_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoContainer {
    Mp4,
    WebM,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    pub container: VideoContainer,
    /// Known for MP4 files whose `moov` box sits in the probed bytes.
    pub duration_secs: Option<f64>,
    pub byte_len: usize,
}

pub fn sniff_container(bytes: &[u8]) -> Option<VideoContainer> {
    if bytes.len() >= 8 && &bytes[4..8] == b"ftyp" {
        Some(VideoContainer::Mp4)
    } else if bytes.starts_with(&EBML_MAGIC) {
        Some(VideoContainer::WebM)
    } else {
        None
    }
}

pub fn probe_video(bytes: &[u8]) -> Result<VideoInfo, ViewerError> {
    let container = sniff_container(bytes).ok_or_else(|| ViewerError::DecodeFailure {
        kind: MediaKind::Video,
        detail: "no MP4 or WebM container signature".into(),
    })?;
    let duration_secs = match container {
        VideoContainer::Mp4 => mp4_duration_secs(bytes),
        VideoContainer::WebM => None,
    };
    debug!(?container, ?duration_secs, len = bytes.len(), "probed video");
    Ok(VideoInfo {
        container,
        duration_secs,
        byte_len: bytes.len(),
    })
}

/// Images are tried first; a video container is only considered when decoding fails.
pub fn probe_bytes(bytes: Arc<[u8]>) -> Result<LoadedMedia, ViewerError> {
    let image_err = match decode::decode_image(&bytes) {
        Ok(img) => return Ok(LoadedMedia::Image(img)),
        Err(err) => err,
    };
    debug!(error = %image_err, "not an image; probing for video");
    match probe_video(&bytes) {
        Ok(info) => Ok(LoadedMedia::Video { info, bytes }),
        Err(video_err) => Err(ViewerError::UnsupportedMediaType {
            mime: None,
            detail: format!("{image_err}; {video_err}"),
        }),
    }
}

fn mp4_duration_secs(bytes: &[u8]) -> Option<f64> {
    let moov = find_box(bytes, b"moov")?;
    let mvhd = find_box(moov, b"mvhd")?;
    let version = *mvhd.first()?;
    // version(1) + flags(3), then creation/modification times
    let (timescale, duration) = if version == 1 {
        (read_u32(mvhd, 20)?, read_u64(mvhd, 24)?)
    } else {
        (read_u32(mvhd, 12)?, u64::from(read_u32(mvhd, 16)?))
    };
    if timescale == 0 {
        return None;
    }
    Some(duration as f64 / f64::from(timescale))
}

/// Returns the payload of the first box of type `kind` at this nesting level.
fn find_box<'a>(mut data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    while data.len() >= 8 {
        let size32 = read_u32(data, 0)?;
        let (header, size) = match size32 {
            0 => (8, data.len()),
            1 => (16, usize::try_from(read_u64(data, 8)?).ok()?),
            n => (8, n as usize),
        };
        if size < header || size > data.len() {
            return None;
        }
        if &data[4..8] == kind {
            return Some(&data[header..size]);
        }
        data = &data[size..];
    }
    None
}

fn read_u32(data: &[u8], at: usize) -> Option<u32> {
    let raw = data.get(at..at + 4)?;
    Some(u32::from_be_bytes(raw.try_into().ok()?))
}

fn read_u64(data: &[u8], at: usize) -> Option<u64> {
    let raw = data.get(at..at + 8)?;
    Some(u64::from_be_bytes(raw.try_into().ok()?))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    /// A minimal MP4: `ftyp` followed by `moov/mvhd` (version 0).
    pub(crate) fn tiny_mp4(timescale: u32, duration: u32) -> Vec<u8> {
        let mut mvhd = vec![0u8; 4]; // version + flags
        mvhd.extend_from_slice(&0u32.to_be_bytes()); // creation
        mvhd.extend_from_slice(&0u32.to_be_bytes()); // modification
        mvhd.extend_from_slice(&timescale.to_be_bytes());
        mvhd.extend_from_slice(&duration.to_be_bytes());
        mvhd.extend_from_slice(&[0u8; 80]);
        let mut out = mp4_box(b"ftyp", b"isom\0\0\x02\0isomiso2mp41");
        out.extend(mp4_box(b"moov", &mp4_box(b"mvhd", &mvhd)));
        out
    }

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 255]))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn reads_mp4_duration_from_mvhd() {
        let info = probe_video(&tiny_mp4(1000, 12_500)).unwrap();
        assert_eq!(info.container, VideoContainer::Mp4);
        assert_eq!(info.duration_secs, Some(12.5));
    }

    #[test]
    fn sniffs_webm_without_duration() {
        let mut bytes = EBML_MAGIC.to_vec();
        bytes.extend_from_slice(&[0x9F, 0x42, 0x86, 0x81, 0x01]);
        let info = probe_video(&bytes).unwrap();
        assert_eq!(info.container, VideoContainer::WebM);
        assert_eq!(info.duration_secs, None);
        assert_eq!(info.byte_len, bytes.len());
    }

    #[test]
    fn probing_prefers_images() {
        let media = probe_bytes(png_bytes().into()).unwrap();
        assert!(matches!(media, LoadedMedia::Image(ref img) if img.dimensions() == (4, 2)));

        let media = probe_bytes(tiny_mp4(600, 600).into()).unwrap();
        assert!(matches!(media, LoadedMedia::Video { ref info, .. } if info.duration_secs == Some(1.0)));
    }

    #[test]
    fn probing_garbage_is_unsupported() {
        let err = probe_bytes(Arc::from(&b"<html>404</html>"[..])).unwrap_err();
        assert!(matches!(
            err,
            ViewerError::UnsupportedMediaType { mime: None, .. }
        ));
    }

    #[test]
    fn truncated_boxes_do_not_panic() {
        let mut bytes = tiny_mp4(1000, 1000);
        bytes.truncate(30);
        let info = probe_video(&bytes).unwrap();
        assert_eq!(info.duration_secs, None);
    }
}
