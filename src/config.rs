use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use serde::Deserialize;

use crate::playback::AutoplayPolicy;

const DEFAULT_SCREENSHOT_FILE_NAME: &str = "panorama-screenshot.png";
const DEFAULT_USER_AGENT: &str = concat!("phovid360/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// JPEG quality (1–100) used when a rendered sky texture is written out.
    pub texture_quality: u8,
    /// Wheel and pinch zoom tuning.
    pub zoom: ZoomOptions,
    /// Directory screenshots are written to when no explicit path is given.
    pub screenshot_dir: PathBuf,
    /// File name of screenshots inside `screenshot-dir`.
    pub screenshot_file_name: String,
    /// Whether videos may start playing before the first user interaction.
    pub autoplay: AutoplayPolicy,
    /// Give up on a load after this long. Unset means wait indefinitely.
    #[serde(with = "humantime_serde")]
    pub load_timeout: Option<Duration>,
    /// User-Agent sent when fetching remote media.
    pub user_agent: String,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            (1..=100).contains(&self.texture_quality),
            "texture-quality must be between 1 and 100"
        );
        self.zoom.validate()?;
        ensure!(
            !self.screenshot_file_name.trim().is_empty(),
            "screenshot-file-name must not be empty"
        );
        ensure!(
            Path::new(&self.screenshot_file_name).file_name()
                == Some(OsStr::new(&self.screenshot_file_name)),
            "screenshot-file-name must be a bare file name"
        );
        if let Some(timeout) = self.load_timeout {
            ensure!(!timeout.is_zero(), "load-timeout must be positive");
        }
        ensure!(
            !self.user_agent.trim().is_empty(),
            "user-agent must not be empty"
        );
        Ok(self)
    }

    pub fn default_screenshot_path(&self) -> PathBuf {
        self.screenshot_dir.join(&self.screenshot_file_name)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            texture_quality: 95,
            zoom: ZoomOptions::default(),
            screenshot_dir: PathBuf::from("."),
            screenshot_file_name: DEFAULT_SCREENSHOT_FILE_NAME.to_string(),
            autoplay: AutoplayPolicy::default(),
            load_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ZoomOptions {
    /// Field-of-view change per wheel notch, in degrees.
    pub wheel_step_degrees: f32,
    /// Field-of-view change per recognised pinch movement, in degrees.
    pub pinch_step_degrees: f32,
    /// Finger-distance change (pixels) needed before a pinch registers.
    pub pinch_threshold_px: f32,
}

impl ZoomOptions {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.wheel_step_degrees.is_finite() && self.wheel_step_degrees > 0.0,
            "zoom.wheel-step-degrees must be positive"
        );
        ensure!(
            self.pinch_step_degrees.is_finite() && self.pinch_step_degrees > 0.0,
            "zoom.pinch-step-degrees must be positive"
        );
        ensure!(
            self.pinch_threshold_px.is_finite() && self.pinch_threshold_px >= 0.0,
            "zoom.pinch-threshold-px must not be negative"
        );
        Ok(())
    }
}

impl Default for ZoomOptions {
    fn default() -> Self {
        Self {
            wheel_step_degrees: 2.0,
            pinch_step_degrees: 1.0,
            pinch_threshold_px: 5.0,
        }
    }
}
