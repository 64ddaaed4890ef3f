use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;

use crate::error::ViewerError;
use crate::media::{LoadedMedia, MediaSource, StereoMode};
use crate::session::{LoadTicket, PlaybackState, SessionSnapshot, ViewerStateChange};

/// Viewer -> Loader: fetch and decode one source.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub source: MediaSource,
}

/// Loader -> Viewer: the result of one load attempt.
#[derive(Debug)]
pub struct LoadOutcome {
    pub ticket: LoadTicket,
    pub result: Result<LoadedMedia, ViewerError>,
}

/// External -> Viewer.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    Load {
        source: MediaSource,
        stereo: StereoMode,
    },
    ToggleStereo,
    AdjustFov(f32),
    Wheel(f32),
    PinchStart(f32),
    Pinch(f32),
    Play,
    Pause,
    TogglePlayback,
    Seek(f32),
    Tick,
    Interact,
    Screenshot(Option<PathBuf>),
    Reset,
    Status,
}

/// Viewer -> outside world.
#[derive(Debug, Clone)]
pub enum ViewerEvent {
    StateChanged(ViewerStateChange),
    /// A new sky texture is on screen (fresh load or stereo change).
    ImageRendered {
        texture: Arc<RgbaImage>,
        stereo: StereoMode,
    },
    FovChanged(f32),
    Playback(PlaybackState),
    ScreenshotSaved(PathBuf),
    /// One user-visible notification per error.
    Notification {
        message: &'static str,
        error: ViewerError,
    },
    Status(SessionSnapshot),
}
