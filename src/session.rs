//! The viewer session state machine.
//!
//! Every change to what is on screen goes through one of the named transitions
//! on [`ViewerSession`]. Loads are keyed by a [`LoadTicket`]; results for any
//! ticket other than the latest are dropped, so an overtaken load can never
//! replace newer media.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};
use tracing::{debug, info, warn};

use crate::config::ZoomOptions;
use crate::error::ViewerError;
use crate::media::{MediaSource, StereoMode, split_stereo};
use crate::playback::VideoPlayback;

pub const DEFAULT_FOV: f32 = 80.0;
pub const MIN_FOV: f32 = 1.0;
pub const MAX_FOV: f32 = 179.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerState {
    Empty,
    Loading,
    ShowingImage,
    ShowingVideo,
    /// Transient; a failed load passes through here on its way back to `Empty`.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewerStateChange {
    pub from: ViewerState,
    pub to: ViewerState,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    /// Position as a fraction of the duration, in `[0, 1]`.
    pub current_time_fraction: f32,
    pub is_playing: bool,
}

/// Identifies one load attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

impl LoadTicket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Media handed to the session once a load finished.
pub enum SceneMedia {
    Image(RgbaImage),
    Video(Box<dyn VideoPlayback>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: ViewerState,
    pub stereo: StereoMode,
    pub fov: f32,
    pub playback: Option<PlaybackState>,
    pub source: Option<String>,
    pub generation: u64,
}

struct PendingLoad {
    ticket: LoadTicket,
    source: MediaSource,
    stereo: StereoMode,
}

enum Scene {
    Image {
        /// Decoded source, kept so stereo changes never refetch.
        source: Arc<RgbaImage>,
        texture: Arc<RgbaImage>,
    },
    Video(VideoScene),
}

struct VideoScene {
    player: Box<dyn VideoPlayback>,
    playback: PlaybackState,
    deferred_play: bool,
}

pub struct ViewerSession {
    state: ViewerState,
    generation: u64,
    pending: Option<PendingLoad>,
    current: Option<MediaSource>,
    scene: Option<Scene>,
    stereo: StereoMode,
    fov: f32,
    zoom: ZoomOptions,
    pinch_start: Option<f32>,
    notices: VecDeque<ViewerError>,
}

impl ViewerSession {
    pub fn new(zoom: ZoomOptions) -> Self {
        Self {
            state: ViewerState::Empty,
            generation: 0,
            pending: None,
            current: None,
            scene: None,
            stereo: StereoMode::None,
            fov: DEFAULT_FOV,
            zoom,
            pinch_start: None,
            notices: VecDeque::new(),
        }
    }

    pub fn state(&self) -> ViewerState {
        self.state
    }

    pub fn stereo_mode(&self) -> StereoMode {
        self.stereo
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    pub fn playback(&self) -> Option<PlaybackState> {
        match &self.scene {
            Some(Scene::Video(video)) => Some(video.playback),
            _ => None,
        }
    }

    pub fn current_source(&self) -> Option<&MediaSource> {
        self.current.as_ref()
    }

    /// The sky texture currently rendered, after stereo splitting.
    pub fn texture(&self) -> Option<Arc<RgbaImage>> {
        match &self.scene {
            Some(Scene::Image { texture, .. }) => Some(Arc::clone(texture)),
            _ => None,
        }
    }

    /// True only for the ticket of the load still awaited.
    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|pending| pending.ticket == ticket)
    }

    /// User-facing errors raised since the last drain, oldest first.
    pub fn drain_notices(&mut self) -> Vec<ViewerError> {
        self.notices.drain(..).collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            stereo: self.stereo,
            fov: self.fov,
            playback: self.playback(),
            source: self.current.as_ref().map(ToString::to_string),
            generation: self.generation,
        }
    }

    /// Tears down the current scene and starts waiting for `source`.
    ///
    /// `stereo` is applied if the source turns out to be an image.
    pub fn load_requested(&mut self, source: MediaSource, stereo: StereoMode) -> LoadTicket {
        self.dispose_scene();
        self.current = None;
        self.stereo = StereoMode::None;
        self.generation += 1;
        let ticket = LoadTicket(self.generation);
        if let Some(prev) = self.pending.take() {
            debug!(superseded = prev.ticket.0, "pending load superseded");
        }
        info!(generation = ticket.0, %source, %stereo, "load requested");
        self.pending = Some(PendingLoad {
            ticket,
            source,
            stereo,
        });
        self.goto(ViewerState::Loading);
        ticket
    }

    pub fn load_succeeded(
        &mut self,
        ticket: LoadTicket,
        media: SceneMedia,
    ) -> Option<ViewerStateChange> {
        if !self.is_current(ticket) {
            debug!(
                generation = ticket.0,
                current = self.generation,
                "ignoring stale load result"
            );
            if let SceneMedia::Video(mut player) = media {
                dispose_player(player.as_mut());
            }
            return None;
        }
        let PendingLoad { source, stereo, .. } = self.pending.take()?;
        self.fov = DEFAULT_FOV;
        self.pinch_start = None;
        self.current = Some(source);

        match media {
            SceneMedia::Image(image) => {
                self.stereo = stereo;
                let source = Arc::new(image);
                let texture = render_texture(&source, stereo);
                info!(
                    width = texture.width(),
                    height = texture.height(),
                    stereo = %stereo,
                    "showing image"
                );
                self.scene = Some(Scene::Image { source, texture });
                self.goto(ViewerState::ShowingImage)
            }
            SceneMedia::Video(mut player) => {
                if stereo != StereoMode::None {
                    debug!(requested = %stereo, "stereo video is not supported; showing mono");
                }
                self.stereo = StereoMode::None;
                let mut deferred_play = false;
                if let Err(err) = player.play() {
                    deferred_play = matches!(err, ViewerError::AutoplayBlocked(_));
                    self.notify(err);
                }
                info!(deferred_play, "showing video");
                self.scene = Some(Scene::Video(VideoScene {
                    player,
                    playback: PlaybackState {
                        current_time_fraction: 0.0,
                        is_playing: true,
                    },
                    deferred_play,
                }));
                self.goto(ViewerState::ShowingVideo)
            }
        }
    }

    pub fn load_failed(&mut self, ticket: LoadTicket, error: ViewerError) -> Option<ViewerStateChange> {
        if !self.is_current(ticket) {
            debug!(generation = ticket.0, error = %error, "ignoring stale load failure");
            return None;
        }
        self.pending = None;
        self.goto(ViewerState::Error);
        self.notify(error);
        self.goto(ViewerState::Empty)
    }

    /// Cycles the stereo mode of the shown image and re-splits the retained source.
    pub fn stereo_toggled(&mut self) -> Option<StereoMode> {
        let Some(Scene::Image { source, texture }) = self.scene.as_mut() else {
            debug!(state = ?self.state, "stereo toggle ignored");
            return None;
        };
        self.stereo = self.stereo.next();
        *texture = render_texture(source, self.stereo);
        info!(mode = %self.stereo, width = texture.width(), height = texture.height(), "stereo mode changed");
        Some(self.stereo)
    }

    pub fn reset(&mut self) -> Option<ViewerStateChange> {
        self.dispose_scene();
        if let Some(pending) = self.pending.take() {
            debug!(generation = pending.ticket.0, "pending load abandoned");
        }
        self.current = None;
        self.stereo = StereoMode::None;
        self.fov = DEFAULT_FOV;
        self.goto(ViewerState::Empty)
    }

    pub fn fov_adjusted(&mut self, delta: f32) -> Option<f32> {
        if !self.has_viewport() || !delta.is_finite() {
            return None;
        }
        self.fov = (self.fov + delta).clamp(MIN_FOV, MAX_FOV);
        Some(self.fov)
    }

    /// One wheel event; only the sign of `delta_y` matters.
    pub fn wheel(&mut self, delta_y: f32) -> Option<f32> {
        let step = self.zoom.wheel_step_degrees;
        let delta = if delta_y > 0.0 {
            step
        } else if delta_y < 0.0 {
            -step
        } else {
            0.0
        };
        self.fov_adjusted(delta)
    }

    pub fn pinch_started(&mut self, distance: f32) {
        self.pinch_start = Some(distance);
    }

    /// Fingers closing zoom out (wider FOV), spreading zooms in.
    pub fn pinch_moved(&mut self, distance: f32) -> Option<f32> {
        if !self.has_viewport() {
            return None;
        }
        let start = self.pinch_start?;
        if (distance - start).abs() <= self.zoom.pinch_threshold_px {
            return None;
        }
        self.pinch_start = Some(distance);
        let step = self.zoom.pinch_step_degrees;
        self.fov_adjusted(if start > distance { step } else { -step })
    }

    /// Play or pause the current video. A user request counts as a gesture.
    pub fn set_playing(&mut self, playing: bool) -> Option<PlaybackState> {
        let Some(Scene::Video(video)) = self.scene.as_mut() else {
            return None;
        };
        if playing {
            video.player.note_user_activation();
            video.deferred_play = false;
            if let Err(err) = video.player.play() {
                push_notice(&mut self.notices, err);
            }
        } else {
            video.player.pause();
        }
        video.playback.is_playing = playing;
        Some(video.playback)
    }

    pub fn toggle_playback(&mut self) -> Option<PlaybackState> {
        let playing = self.playback()?.is_playing;
        self.set_playing(!playing)
    }

    /// Scrubs to `fraction` of the duration; ignored while the duration is unknown.
    pub fn seek(&mut self, fraction: f32) -> Option<PlaybackState> {
        if !fraction.is_finite() {
            return None;
        }
        let Some(Scene::Video(video)) = self.scene.as_mut() else {
            return None;
        };
        let duration = video.player.duration_secs().filter(|d| *d > 0.0)?;
        let fraction = fraction.clamp(0.0, 1.0);
        video.player.seek_secs(f64::from(fraction) * duration);
        if !video.playback.is_playing {
            // keep the texture on the new frame without resuming
            video.player.pause();
        }
        video.playback.current_time_fraction = fraction;
        Some(video.playback)
    }

    /// Refreshes the playback position from the player.
    pub fn tick_playback(&mut self) -> Option<PlaybackState> {
        let Some(Scene::Video(video)) = self.scene.as_mut() else {
            return None;
        };
        if let Some(duration) = video.player.duration_secs().filter(|d| *d > 0.0) {
            video.playback.current_time_fraction =
                (video.player.position_secs() / duration).clamp(0.0, 1.0) as f32;
        }
        Some(video.playback)
    }

    /// Any click or key press. Retries a blocked autoplay once.
    pub fn user_interaction(&mut self) -> bool {
        let Some(Scene::Video(video)) = self.scene.as_mut() else {
            return false;
        };
        video.player.note_user_activation();
        if !std::mem::take(&mut video.deferred_play) || !video.player.is_paused() {
            return false;
        }
        match video.player.play() {
            Ok(()) => {
                info!("deferred playback started");
                true
            }
            Err(err) => {
                push_notice(&mut self.notices, err);
                false
            }
        }
    }

    /// Writes the frame on screen as PNG. Failures become a notice and leave
    /// the session untouched.
    pub fn screenshot(&mut self, path: &Path) -> bool {
        let saved = match &self.scene {
            Some(Scene::Image { texture, .. }) => save_png(texture, path),
            Some(Scene::Video(video)) => match video.player.current_frame() {
                Some(frame) => save_png(&frame, path),
                None => Err(ViewerError::ScreenshotFailure(
                    "video backend cannot read back frames".into(),
                )),
            },
            None => Err(ViewerError::ScreenshotFailure(format!(
                "nothing to capture while {:?}",
                self.state
            ))),
        };
        match saved {
            Ok(()) => {
                info!(path = %path.display(), "screenshot saved");
                true
            }
            Err(err) => {
                self.notify(err);
                false
            }
        }
    }

    fn has_viewport(&self) -> bool {
        matches!(
            self.state,
            ViewerState::Loading | ViewerState::ShowingImage | ViewerState::ShowingVideo
        )
    }

    fn dispose_scene(&mut self) {
        self.pinch_start = None;
        match self.scene.take() {
            Some(Scene::Video(mut video)) => dispose_player(video.player.as_mut()),
            Some(Scene::Image { .. }) => debug!("image scene dropped"),
            None => {}
        }
    }

    fn notify(&mut self, error: ViewerError) {
        push_notice(&mut self.notices, error);
    }

    fn goto(&mut self, to: ViewerState) -> Option<ViewerStateChange> {
        if self.state == to {
            return None;
        }
        let ch = ViewerStateChange {
            from: self.state,
            to,
        };
        debug!(from = ?ch.from, to = ?ch.to, "viewer state change");
        self.state = to;
        Some(ch)
    }
}

impl Drop for ViewerSession {
    fn drop(&mut self) {
        self.dispose_scene();
    }
}

fn render_texture(source: &Arc<RgbaImage>, mode: StereoMode) -> Arc<RgbaImage> {
    match split_stereo(source, mode) {
        Cow::Borrowed(_) => Arc::clone(source),
        Cow::Owned(half) => Arc::new(half),
    }
}

fn dispose_player(player: &mut dyn VideoPlayback) {
    player.pause();
    player.release();
    debug!("video playback released");
}

fn push_notice(notices: &mut VecDeque<ViewerError>, error: ViewerError) {
    warn!(error = %error, "{}", error.user_message());
    notices.push_back(error);
}

fn save_png(frame: &RgbaImage, path: &Path) -> Result<(), ViewerError> {
    frame
        .save_with_format(path, ImageFormat::Png)
        .map_err(|err| ViewerError::ScreenshotFailure(format!("failed to write {}: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Calls(Arc<Mutex<Vec<&'static str>>>);

    impl Calls {
        fn push(&self, call: &'static str) {
            self.0.lock().unwrap().push(call);
        }
        fn list(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
        fn count(&self, call: &str) -> usize {
            self.list().iter().filter(|c| **c == call).count()
        }
    }

    struct MockPlayer {
        calls: Calls,
        needs_gesture: bool,
        activated: bool,
        paused: bool,
        duration: Option<f64>,
        position: f64,
    }

    impl MockPlayer {
        fn boxed(calls: &Calls, needs_gesture: bool, duration: Option<f64>) -> Box<dyn VideoPlayback> {
            Box::new(Self {
                calls: calls.clone(),
                needs_gesture,
                activated: false,
                paused: true,
                duration,
                position: 0.0,
            })
        }
    }

    impl VideoPlayback for MockPlayer {
        fn play(&mut self) -> Result<(), ViewerError> {
            self.calls.push("play");
            if self.needs_gesture && !self.activated {
                return Err(ViewerError::AutoplayBlocked("gesture required".into()));
            }
            self.paused = false;
            Ok(())
        }
        fn pause(&mut self) {
            self.calls.push("pause");
            self.paused = true;
        }
        fn is_paused(&self) -> bool {
            self.paused
        }
        fn duration_secs(&self) -> Option<f64> {
            self.duration
        }
        fn position_secs(&self) -> f64 {
            self.position
        }
        fn seek_secs(&mut self, secs: f64) {
            self.calls.push("seek");
            self.position = secs;
        }
        fn note_user_activation(&mut self) {
            self.activated = true;
        }
        fn release(&mut self) {
            self.calls.push("release");
        }
    }

    fn session() -> ViewerSession {
        ViewerSession::new(ZoomOptions::default())
    }

    fn test_image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 0, 255]))
    }

    fn show_image(s: &mut ViewerSession, width: u32, height: u32) {
        let ticket = s.load_requested(MediaSource::url("pano.jpg"), StereoMode::None);
        s.load_succeeded(ticket, SceneMedia::Image(test_image(width, height)))
            .unwrap();
    }

    #[test]
    fn image_load_walks_empty_loading_showing() {
        let mut s = session();
        assert_eq!(s.state(), ViewerState::Empty);
        let ticket = s.load_requested(MediaSource::url("pano.jpg"), StereoMode::None);
        assert_eq!(s.state(), ViewerState::Loading);
        let ch = s
            .load_succeeded(ticket, SceneMedia::Image(test_image(8, 4)))
            .unwrap();
        assert_eq!((ch.from, ch.to), (ViewerState::Loading, ViewerState::ShowingImage));
        assert_eq!(s.current_source(), Some(&MediaSource::url("pano.jpg")));
        assert_eq!(s.texture().unwrap().dimensions(), (8, 4));
        assert!(s.playback().is_none());
    }

    #[test]
    fn fov_clamps_at_both_ends() {
        let mut s = session();
        show_image(&mut s, 4, 2);
        for _ in 0..200 {
            s.fov_adjusted(-2.0);
        }
        assert_eq!(s.fov(), MIN_FOV);
        for _ in 0..200 {
            s.fov_adjusted(2.0);
        }
        assert_eq!(s.fov(), MAX_FOV);
    }

    #[test]
    fn fov_is_ignored_without_media() {
        let mut s = session();
        assert_eq!(s.fov_adjusted(-10.0), None);
        assert_eq!(s.wheel(1.0), None);
        assert_eq!(s.fov(), DEFAULT_FOV);
    }

    #[test]
    fn wheel_and_pinch_step_the_fov() {
        let mut s = session();
        show_image(&mut s, 4, 2);
        assert_eq!(s.wheel(120.0), Some(82.0));
        assert_eq!(s.wheel(-3.0), Some(80.0));
        assert_eq!(s.wheel(0.0), Some(80.0));

        s.pinch_started(100.0);
        assert_eq!(s.pinch_moved(103.0), None, "below threshold");
        assert_eq!(s.pinch_moved(110.0), Some(79.0), "spreading zooms in");
        assert_eq!(s.pinch_moved(90.0), Some(80.0), "closing zooms out");
    }

    #[test]
    fn new_media_resets_stereo_and_fov() {
        let mut s = session();
        show_image(&mut s, 8, 4);
        s.stereo_toggled();
        s.stereo_toggled();
        s.fov_adjusted(-30.0);
        assert_eq!(s.stereo_mode(), StereoMode::LeftRight);

        let ticket = s.load_requested(MediaSource::file(vec![0u8], "image/png"), StereoMode::None);
        assert!(s.texture().is_none(), "previous scene disposed on request");
        assert_eq!(s.stereo_mode(), StereoMode::None, "no stale stereo while loading");
        assert_eq!(s.snapshot().stereo, StereoMode::None);
        s.load_succeeded(ticket, SceneMedia::Image(test_image(8, 4)));
        assert_eq!(s.stereo_mode(), StereoMode::None);
        assert_eq!(s.fov(), DEFAULT_FOV);
    }

    #[test]
    fn requested_stereo_applies_to_images() {
        let mut s = session();
        let ticket = s.load_requested(MediaSource::url("panorama.jpg"), StereoMode::TopBottom);
        s.load_succeeded(ticket, SceneMedia::Image(test_image(8, 4)));
        assert_eq!(s.state(), ViewerState::ShowingImage);
        assert_eq!(s.stereo_mode(), StereoMode::TopBottom);
        assert_eq!(s.texture().unwrap().dimensions(), (8, 2));
    }

    #[test]
    fn stereo_toggle_resplits_the_same_source() {
        let mut s = session();
        show_image(&mut s, 8, 4);
        assert_eq!(s.stereo_toggled(), Some(StereoMode::TopBottom));
        assert_eq!(s.texture().unwrap().dimensions(), (8, 2));
        assert_eq!(s.stereo_toggled(), Some(StereoMode::LeftRight));
        assert_eq!(s.texture().unwrap().dimensions(), (4, 4));
        assert_eq!(s.stereo_toggled(), Some(StereoMode::None));
        let texture = s.texture().unwrap();
        assert_eq!(texture.dimensions(), (8, 4));
        assert_eq!(texture.get_pixel(7, 3), &Rgba([7, 3, 0, 255]));
    }

    #[test]
    fn overtaken_loads_are_discarded() {
        let mut s = session();
        let first = s.load_requested(MediaSource::url("a.jpg"), StereoMode::None);
        let second = s.load_requested(MediaSource::url("b.jpg"), StereoMode::None);
        assert!(!s.is_current(first));
        assert_eq!(s.load_succeeded(first, SceneMedia::Image(test_image(2, 2))), None);
        assert_eq!(s.state(), ViewerState::Loading);

        s.load_succeeded(second, SceneMedia::Image(test_image(6, 2)));
        assert_eq!(s.current_source(), Some(&MediaSource::url("b.jpg")));
        assert_eq!(s.texture().unwrap().dimensions(), (6, 2));

        assert_eq!(
            s.load_failed(first, ViewerError::NetworkFailure("late".into())),
            None
        );
        assert_eq!(s.state(), ViewerState::ShowingImage);
        assert!(s.drain_notices().is_empty());
    }

    #[test]
    fn overtaken_video_is_released() {
        let calls = Calls::default();
        let mut s = session();
        let first = s.load_requested(MediaSource::url("a.mp4"), StereoMode::None);
        let _second = s.load_requested(MediaSource::url("b.mp4"), StereoMode::None);
        s.load_succeeded(first, SceneMedia::Video(MockPlayer::boxed(&calls, false, None)));
        assert_eq!(calls.list(), vec!["pause", "release"]);
    }

    #[test]
    fn failure_surfaces_and_returns_to_empty() {
        let mut s = session();
        let ticket = s.load_requested(MediaSource::url("x"), StereoMode::None);
        let ch = s
            .load_failed(
                ticket,
                ViewerError::UnsupportedMediaType {
                    mime: None,
                    detail: "html".into(),
                },
            )
            .unwrap();
        assert_eq!((ch.from, ch.to), (ViewerState::Error, ViewerState::Empty));
        assert_eq!(s.state(), ViewerState::Empty);
        let notices = s.drain_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(
            notices[0].user_message(),
            "Unsupported media type or inaccessible URL"
        );
    }

    #[test]
    fn video_forces_mono_and_starts_playing() {
        let calls = Calls::default();
        let mut s = session();
        let ticket = s.load_requested(MediaSource::url("clip.mp4"), StereoMode::LeftRight);
        s.load_succeeded(ticket, SceneMedia::Video(MockPlayer::boxed(&calls, false, Some(10.0))));
        assert_eq!(s.state(), ViewerState::ShowingVideo);
        assert_eq!(s.stereo_mode(), StereoMode::None);
        assert_eq!(
            s.playback(),
            Some(PlaybackState {
                current_time_fraction: 0.0,
                is_playing: true
            })
        );
        assert_eq!(calls.list(), vec!["play"]);
        assert_eq!(s.stereo_toggled(), None);
    }

    #[test]
    fn reset_pauses_then_releases_video_once() {
        let calls = Calls::default();
        let mut s = session();
        let ticket = s.load_requested(MediaSource::url("clip.webm"), StereoMode::None);
        s.load_succeeded(ticket, SceneMedia::Video(MockPlayer::boxed(&calls, false, None)));

        let ch = s.reset().unwrap();
        assert_eq!((ch.from, ch.to), (ViewerState::ShowingVideo, ViewerState::Empty));
        assert_eq!(calls.list(), vec!["play", "pause", "release"]);
        assert!(s.playback().is_none());
        assert!(s.current_source().is_none());

        drop(s);
        assert_eq!(calls.count("release"), 1);
    }

    #[test]
    fn replacing_a_video_releases_it_first() {
        let calls = Calls::default();
        let mut s = session();
        let ticket = s.load_requested(MediaSource::url("clip.mp4"), StereoMode::None);
        s.load_succeeded(ticket, SceneMedia::Video(MockPlayer::boxed(&calls, false, None)));
        s.load_requested(MediaSource::url("next.jpg"), StereoMode::None);
        assert_eq!(calls.list(), vec!["play", "pause", "release"]);
        assert_eq!(s.state(), ViewerState::Loading);
    }

    #[test]
    fn blocked_autoplay_retries_on_next_interaction_only() {
        let calls = Calls::default();
        let mut s = session();
        let ticket = s.load_requested(MediaSource::url("clip.mp4"), StereoMode::None);
        s.load_succeeded(ticket, SceneMedia::Video(MockPlayer::boxed(&calls, true, Some(4.0))));
        assert_eq!(s.state(), ViewerState::ShowingVideo);
        let notices = s.drain_notices();
        assert!(matches!(notices.as_slice(), [ViewerError::AutoplayBlocked(_)]));

        assert!(s.user_interaction());
        assert!(!s.user_interaction());
        assert_eq!(calls.count("play"), 2);
    }

    #[test]
    fn seek_clamps_and_respects_pause() {
        let calls = Calls::default();
        let mut s = session();
        let ticket = s.load_requested(MediaSource::url("clip.mp4"), StereoMode::None);
        s.load_succeeded(ticket, SceneMedia::Video(MockPlayer::boxed(&calls, false, Some(10.0))));

        let state = s.toggle_playback().unwrap();
        assert!(!state.is_playing);
        let state = s.seek(1.5).unwrap();
        assert_eq!(state.current_time_fraction, 1.0);
        assert_eq!(calls.list(), vec!["play", "pause", "seek", "pause"]);

        let state = s.tick_playback().unwrap();
        assert_eq!(state.current_time_fraction, 1.0);
    }

    #[test]
    fn seek_without_duration_is_ignored() {
        let calls = Calls::default();
        let mut s = session();
        let ticket = s.load_requested(MediaSource::url("clip.webm"), StereoMode::None);
        s.load_succeeded(ticket, SceneMedia::Video(MockPlayer::boxed(&calls, false, None)));
        assert_eq!(s.seek(0.5), None);
        assert_eq!(calls.count("seek"), 0);
    }

    #[test]
    fn screenshot_without_media_fails_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shot.png");
        let mut s = session();
        assert!(!s.screenshot(&path));
        assert_eq!(s.state(), ViewerState::Empty);
        assert!(!path.exists());
        assert!(matches!(
            s.drain_notices().as_slice(),
            [ViewerError::ScreenshotFailure(_)]
        ));
    }

    #[test]
    fn screenshot_writes_the_rendered_texture() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("panorama-screenshot.png");
        let mut s = session();
        show_image(&mut s, 8, 4);
        s.stereo_toggled();
        assert!(s.screenshot(&path));
        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (8, 2));
        assert_eq!(s.state(), ViewerState::ShowingImage);
    }

    #[test]
    fn reset_abandons_a_pending_load() {
        let mut s = session();
        let ticket = s.load_requested(MediaSource::url("slow.jpg"), StereoMode::None);
        s.reset();
        assert_eq!(s.load_succeeded(ticket, SceneMedia::Image(test_image(2, 2))), None);
        assert_eq!(s.state(), ViewerState::Empty);
    }
}
