use std::io::Cursor;

use image::RgbaImage;
use tracing::debug;

use crate::error::ViewerError;
use crate::media::MediaKind;

// Decodes an image to RGBA8 and applies EXIF orientation if available.
// Missing metadata keeps the stored orientation.
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, ViewerError> {
    let img = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format() // sniff based on content
        .map_err(decode_error)?
        .decode()
        .map_err(decode_error)?;

    // Convert to RGBA8 early so that subsequent ops work on a concrete buffer
    let img = img.to_rgba8();
    let orientation = read_orientation(bytes).unwrap_or(1);
    Ok(apply_orientation(img, orientation))
}

fn decode_error(err: impl std::fmt::Display) -> ViewerError {
    ViewerError::DecodeFailure {
        kind: MediaKind::Image,
        detail: err.to_string(),
    }
}

fn apply_orientation(img: RgbaImage, orientation: u16) -> RgbaImage {
    use image::imageops::{flip_horizontal, flip_vertical, rotate90, rotate180, rotate270};
    match orientation {
        2 => flip_horizontal(&img),
        3 => rotate180(&img),
        4 => flip_vertical(&img),
        // transpose: rotate90 + flip_horizontal
        5 => flip_horizontal(&rotate90(&img)),
        6 => rotate90(&img),
        // transverse: rotate270 + flip_horizontal
        7 => flip_horizontal(&rotate270(&img)),
        8 => rotate270(&img),
        _ => img,
    }
}

fn read_orientation(bytes: &[u8]) -> Option<u16> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let orientation = field.value.get_uint(0)? as u16;
    debug!(orientation, "exif orientation");
    Some(orientation)
}
