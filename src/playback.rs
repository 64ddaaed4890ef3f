//! Video playback resources.
//!
//! The session never talks to a decoder directly; it drives a [`VideoPlayback`]
//! and is responsible for pausing and releasing it before dropping it.

use std::sync::Arc;
use std::time::Instant;

use serde::Deserialize;
use tracing::debug;

use crate::error::ViewerError;
use crate::media::VideoInfo;

/// Whether playback may start without a prior user gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoplayPolicy {
    #[default]
    Allowed,
    Blocked,
}

pub trait VideoPlayback: Send {
    /// Starts or resumes playback; refused with `AutoplayBlocked` until the
    /// runtime has seen a user gesture when its policy requires one.
    fn play(&mut self) -> Result<(), ViewerError>;
    fn pause(&mut self);
    fn is_paused(&self) -> bool;
    fn duration_secs(&self) -> Option<f64>;
    fn position_secs(&self) -> f64;
    fn seek_secs(&mut self, secs: f64);
    /// Records that the user interacted with the page.
    fn note_user_activation(&mut self) {}
    /// The frame currently on screen, if the backend can read it back.
    fn current_frame(&self) -> Option<image::RgbaImage> {
        None
    }
    /// Frees decoder resources. Called once, after `pause`, on teardown.
    fn release(&mut self);
}

/// Clock-driven playback over a probed container; it has no decoder and so
/// cannot provide frames.
pub struct HeadlessPlayback {
    info: VideoInfo,
    data: Option<Arc<[u8]>>,
    policy: AutoplayPolicy,
    activated: bool,
    base_position: f64,
    started_at: Option<Instant>,
}

impl HeadlessPlayback {
    pub fn new(info: VideoInfo, data: Arc<[u8]>, policy: AutoplayPolicy) -> Self {
        Self {
            info,
            data: Some(data),
            policy,
            activated: false,
            base_position: 0.0,
            started_at: None,
        }
    }

    pub fn is_released(&self) -> bool {
        self.data.is_none()
    }

    fn clamp_position(&self, secs: f64) -> f64 {
        let secs = secs.max(0.0);
        match self.info.duration_secs {
            Some(total) => secs.min(total),
            None => secs,
        }
    }
}

impl VideoPlayback for HeadlessPlayback {
    fn play(&mut self) -> Result<(), ViewerError> {
        if self.is_released() {
            return Err(ViewerError::DecodeFailure {
                kind: crate::media::MediaKind::Video,
                detail: "playback resource already released".into(),
            });
        }
        if self.policy == AutoplayPolicy::Blocked && !self.activated {
            return Err(ViewerError::AutoplayBlocked(
                "play() requires a prior user gesture".into(),
            ));
        }
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(started) = self.started_at.take() {
            self.base_position =
                self.clamp_position(self.base_position + started.elapsed().as_secs_f64());
        }
    }

    fn is_paused(&self) -> bool {
        self.started_at.is_none()
    }

    fn duration_secs(&self) -> Option<f64> {
        self.info.duration_secs
    }

    fn position_secs(&self) -> f64 {
        let running = self
            .started_at
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.clamp_position(self.base_position + running)
    }

    fn seek_secs(&mut self, secs: f64) {
        self.base_position = self.clamp_position(secs);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn note_user_activation(&mut self) {
        self.activated = true;
    }

    fn release(&mut self) {
        if let Some(data) = self.data.take() {
            debug!(len = data.len(), container = ?self.info.container, "released video buffer");
        }
        self.started_at = None;
    }
}
