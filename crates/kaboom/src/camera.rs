//! Camera: focal point, zoom, rotation and a decaying shake.
//!
//! Each frame the view matrix is rebuilt as
//!
//! ```text
//!   T(center) · S(scale) · R(angle) · T(-(pos or center) + shake_offset)
//! ```
//!
//! so `pos` ends up in the middle of the screen. The shake offset points in
//! a random direction with length `shake`, and `shake` decays with
//! `lerp(shake, 0, 5·dt)`. Shake only moves the picture; positions seen by
//! game logic and collision are untouched.

use rand::Rng;

use crate::math::{Mat4, Vec2, Vec3, deg2rad, lerp, mat4_mul_vec2, vec2_from_angle};

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    /// World point at the screen center. `None` follows the screen center.
    pub pos: Option<Vec2>,
    pub scale: Vec2,
    /// Degrees.
    pub angle: f32,
    pub shake: f32,
    transform: Mat4,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            pos: None,
            scale: Vec2::ONE,
            angle: 0.0,
            shake: 0.0,
            transform: Mat4::IDENTITY,
        }
    }
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add shake intensity (pixels of jitter).
    pub fn shake(&mut self, intensity: f32) {
        self.shake += intensity;
    }

    /// Focal point, falling back to the screen center.
    pub fn focus(&self, center: Vec2) -> Vec2 {
        self.pos.unwrap_or(center)
    }

    /// The view matrix built by the last [`update`](Self::update).
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// Decay shake and rebuild the view matrix.
    pub(crate) fn update(&mut self, dt: f32, center: Vec2, rng: &mut impl Rng) -> Mat4 {
        let offset = vec2_from_angle(rng.gen_range(0.0..360.0)) * self.shake;
        self.shake = lerp(self.shake, 0.0, (5.0 * dt).min(1.0));
        let focus = self.focus(center);
        self.transform = Mat4::from_translation(Vec3::new(center.x, center.y, 0.0))
            * Mat4::from_scale(Vec3::new(self.scale.x, self.scale.y, 1.0))
            * Mat4::from_rotation_z(deg2rad(self.angle))
            * Mat4::from_translation(Vec3::new(offset.x - focus.x, offset.y - focus.y, 0.0));
        self.transform
    }

    /// World point to screen point.
    pub fn to_screen(&self, p: Vec2) -> Vec2 {
        mat4_mul_vec2(&self.transform, p)
    }

    /// Screen point to world point.
    pub fn to_world(&self, p: Vec2) -> Vec2 {
        mat4_mul_vec2(&self.transform.inverse(), p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn default_camera_is_identity() {
        let mut cam = Camera::new();
        let m = cam.update(0.016, Vec2::new(320.0, 240.0), &mut rng());
        assert!(m.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn focus_lands_on_screen_center() {
        let mut cam = Camera::new();
        cam.pos = Some(Vec2::new(1000.0, 50.0));
        cam.scale = Vec2::splat(2.0);
        cam.update(0.016, Vec2::new(320.0, 240.0), &mut rng());
        let p = cam.to_screen(Vec2::new(1000.0, 50.0));
        assert!((p - Vec2::new(320.0, 240.0)).length() < 1e-3);
        let q = cam.to_screen(Vec2::new(1010.0, 50.0));
        assert!((q.x - 340.0).abs() < 1e-3);
    }

    #[test]
    fn to_world_inverts_to_screen() {
        let mut cam = Camera::new();
        cam.pos = Some(Vec2::new(40.0, -20.0));
        cam.angle = 30.0;
        cam.scale = Vec2::new(1.5, 0.5);
        cam.update(0.016, Vec2::new(100.0, 100.0), &mut rng());
        let w = Vec2::new(12.0, 34.0);
        let back = cam.to_world(cam.to_screen(w));
        assert!((back - w).length() < 1e-3);
    }

    #[test]
    fn shake_decays_toward_zero() {
        let mut cam = Camera::new();
        cam.shake(12.0);
        let mut r = rng();
        let mut last = cam.shake;
        for _ in 0..60 {
            cam.update(1.0 / 60.0, Vec2::ZERO, &mut r);
            assert!(cam.shake < last);
            last = cam.shake;
        }
        assert!(cam.shake < 12.0 * 0.01);
    }

    #[test]
    fn shake_offset_is_bounded_by_intensity() {
        let mut cam = Camera::new();
        cam.shake(5.0);
        cam.update(0.0, Vec2::ZERO, &mut rng());
        let moved = cam.to_screen(Vec2::ZERO).length();
        assert!((moved - 5.0).abs() < 1e-3);
    }
}
