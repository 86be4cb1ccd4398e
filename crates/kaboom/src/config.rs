//! Game configuration.
//!
//! [`KaboomConfig`] can be built in code or read from JSON. Every field has
//! a default, so a config file only lists what it changes:
//!
//! ```json
//! { "title": "bean", "width": 320, "height": 240, "scale": 2, "gravity": 1600 }
//! ```

use serde::Deserialize;

use crate::error::Result;
use crate::math::Color;

/// Window size used when neither a logical size nor a canvas is given.
pub const DEFAULT_CANVAS: (f32, f32) = (640.0, 480.0);

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct KaboomConfig {
    pub title: String,
    /// Logical width. `None` follows the window.
    pub width: Option<f32>,
    pub height: Option<f32>,
    /// Window pixels per logical pixel.
    pub scale: f32,
    /// Stretch the logical canvas to the window.
    pub stretch: bool,
    /// With `stretch`, keep the aspect ratio and center the canvas.
    pub letterbox: bool,
    /// Clear color. `None` draws a checkerboard.
    pub background: Option<Color>,
    /// Enable debug keys and the inspect overlay toggle.
    pub debug: bool,
    /// Cell size of the collision grid.
    pub hash_grid_size: f32,
    /// Lines kept in the on-screen debug log.
    pub log_max: usize,
    /// Downward acceleration applied to bodies, in pixels per second squared.
    pub gravity: f32,
    /// Seed for the camera shake and `rand` helpers.
    pub seed: u64,
}

impl Default for KaboomConfig {
    fn default() -> Self {
        Self {
            title: "kaboom".to_string(),
            width: None,
            height: None,
            scale: 1.0,
            stretch: false,
            letterbox: false,
            background: None,
            debug: true,
            hash_grid_size: 64.0,
            log_max: 8,
            gravity: 0.0,
            seed: 0,
        }
    }
}

impl KaboomConfig {
    pub fn from_json(src: &str) -> Result<Self> {
        Ok(serde_json::from_str(src)?)
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Fixed logical size.
    pub fn size(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn stretch(mut self, stretch: bool) -> Self {
        self.stretch = stretch;
        self
    }

    pub fn letterbox(mut self, letterbox: bool) -> Self {
        self.letterbox = letterbox;
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn gravity(mut self, gravity: f32) -> Self {
        self.gravity = gravity;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Logical size when fixed, otherwise the default canvas over `scale`.
    pub fn logical_size(&self) -> (f32, f32) {
        let scale = self.pixel_scale();
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            _ => (DEFAULT_CANVAS.0 / scale, DEFAULT_CANVAS.1 / scale),
        }
    }

    /// Initial window size in logical pixels.
    pub fn window_size(&self) -> (f32, f32) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (w * self.pixel_scale(), h * self.pixel_scale()),
            _ => DEFAULT_CANVAS,
        }
    }

    /// Logical size and letterboxing for [`Gfx::resize`](crate::gfx::Gfx::resize).
    /// A fixed size that is not stretched keeps its aspect ratio.
    pub(crate) fn viewport_mode(&self) -> (Option<(f32, f32)>, bool) {
        match (self.width, self.height) {
            (Some(w), Some(h)) => (Some((w, h)), self.letterbox || !self.stretch),
            _ => (None, false),
        }
    }

    pub(crate) fn pixel_scale(&self) -> f32 {
        if self.scale > 0.0 { self.scale } else { 1.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = KaboomConfig::from_json(r#"{ "width": 320, "height": 240, "gravity": 1600 }"#).unwrap();
        assert_eq!(cfg.logical_size(), (320.0, 240.0));
        assert_eq!(cfg.gravity, 1600.0);
        assert_eq!(cfg.hash_grid_size, 64.0);
        assert_eq!(cfg.log_max, 8);
        assert!(cfg.background.is_none());
    }

    #[test]
    fn background_color_parses() {
        let cfg = KaboomConfig::from_json(r#"{ "background": { "r": 0.5, "g": 0.5, "b": 1.0 } }"#).unwrap();
        assert_eq!(cfg.background, Some(Color::rgb(0.5, 0.5, 1.0)));
    }

    #[test]
    fn bad_json_is_a_config_error() {
        let err = KaboomConfig::from_json("{ \"width\": \"wide\" }").unwrap_err();
        assert_eq!(err.name(), "ConfigError");
    }

    #[test]
    fn scaled_window() {
        let cfg = KaboomConfig::default().size(320.0, 240.0).scale(2.0);
        assert_eq!(cfg.window_size(), (640.0, 480.0));
        assert_eq!(KaboomConfig::default().scale(2.0).logical_size(), (320.0, 240.0));
    }
}
