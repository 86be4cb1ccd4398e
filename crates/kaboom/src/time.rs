//! Frame timing and delta time.
//!
//! [`Time`] is advanced once per frame by [`Context::step`](crate::Context::step)
//! with an explicit delta, so a headless game steps deterministically. The
//! window runner measures the real delta with [`Time::measure`] and feeds it
//! back in.

use std::time::{Duration, Instant};

/// Longest wall-clock delta a single frame may see, so a stalled window
/// does not teleport everything on the next frame.
pub const MAX_DT: f32 = 0.25;

#[derive(Clone, Copy, Debug)]
pub struct Time {
    frame_start: Instant,
    /// Unscaled delta of the current frame.
    real_dt: f32,
    /// Multiplier applied to `dt`. The debug time scale lives here.
    time_scale: f32,
    /// Scaled time since startup.
    elapsed: f32,
    frame_count: u64,
}

impl Default for Time {
    fn default() -> Self {
        Self::new()
    }
}

impl Time {
    pub(crate) fn new() -> Self {
        Self {
            frame_start: Instant::now(),
            real_dt: 0.0,
            time_scale: 1.0,
            elapsed: 0.0,
            frame_count: 0,
        }
    }

    /// Wall-clock time since the previous call, capped at [`MAX_DT`].
    pub(crate) fn measure(&mut self) -> f32 {
        let now = Instant::now();
        let dt: Duration = now - self.frame_start;
        self.frame_start = now;
        dt.as_secs_f32().min(MAX_DT)
    }

    /// Start a new frame lasting `dt` real seconds.
    pub(crate) fn advance(&mut self, dt: f32) {
        self.real_dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.elapsed += self.dt();
        self.frame_count += 1;
    }

    /// Scaled delta time in seconds. This is what game logic should use.
    pub fn dt(&self) -> f32 {
        self.real_dt * self.time_scale
    }

    /// Delta time ignoring the time scale.
    pub fn real_dt(&self) -> f32 {
        self.real_dt
    }

    /// Scaled seconds since startup.
    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    /// Number of frames stepped so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Estimated FPS based on the last frame's delta.
    pub fn fps(&self) -> f32 {
        if self.real_dt > 0.0 { 1.0 / self.real_dt } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_applies_to_dt_only() {
        let mut t = Time::new();
        t.set_time_scale(0.5);
        t.advance(0.1);
        assert!((t.dt() - 0.05).abs() < 1e-6);
        assert!((t.real_dt() - 0.1).abs() < 1e-6);
        assert!((t.elapsed() - 0.05).abs() < 1e-6);
        assert!((t.fps() - 10.0).abs() < 1e-3);
        assert_eq!(t.frame_count(), 1);
    }

    #[test]
    fn bad_deltas_become_zero() {
        let mut t = Time::new();
        t.advance(1.0);
        assert_eq!(t.dt(), 1.0);
        t.advance(f32::NAN);
        assert_eq!(t.dt(), 0.0);
        t.advance(-1.0);
        assert_eq!(t.dt(), 0.0);
    }
}
