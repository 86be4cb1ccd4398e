//! The transform stack.
//!
//! One *current* matrix plus a stack of saved ones. `push` saves, the
//! `translate`/`scale`/`rotate_*` calls right-multiply the current matrix,
//! `pop` restores. Identity-equivalent inputs are skipped.

use crate::math::{Mat4, Vec2, Vec3, deg2rad};

#[derive(Debug, Clone)]
pub struct TransformStack {
    current: Mat4,
    stack: Vec<Mat4>,
}

impl TransformStack {
    pub fn new() -> Self {
        Self {
            current: Mat4::IDENTITY,
            stack: Vec::new(),
        }
    }

    pub fn current(&self) -> Mat4 {
        self.current
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn push(&mut self) {
        self.stack.push(self.current);
    }

    /// Restore the last saved matrix. Popping an empty stack does nothing.
    pub fn pop(&mut self) {
        if let Some(m) = self.stack.pop() {
            self.current = m;
        }
    }

    pub fn translate(&mut self, t: Vec2) {
        if t == Vec2::ZERO {
            return;
        }
        self.current *= Mat4::from_translation(Vec3::new(t.x, t.y, 0.0));
    }

    pub fn scale(&mut self, s: Vec2) {
        if s == Vec2::ONE {
            return;
        }
        self.current *= Mat4::from_scale(Vec3::new(s.x, s.y, 1.0));
    }

    pub fn rotate_x(&mut self, deg: f32) {
        if deg == 0.0 {
            return;
        }
        self.current *= Mat4::from_rotation_x(deg2rad(deg));
    }

    pub fn rotate_y(&mut self, deg: f32) {
        if deg == 0.0 {
            return;
        }
        self.current *= Mat4::from_rotation_y(deg2rad(deg));
    }

    pub fn rotate_z(&mut self, deg: f32) {
        if deg == 0.0 {
            return;
        }
        self.current *= Mat4::from_rotation_z(deg2rad(deg));
    }

    pub fn apply(&mut self, m: &Mat4) {
        self.current *= *m;
    }

    /// Back to identity with an empty stack. Called at frame start.
    pub fn reset(&mut self) {
        self.current = Mat4::IDENTITY;
        self.stack.clear();
    }
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_push_pop_round_trips() {
        let mut ts = TransformStack::new();
        ts.translate(Vec2::new(3.0, 4.0));
        let before = ts.current();

        ts.push();
        ts.translate(Vec2::new(10.0, 0.0));
        ts.push();
        ts.scale(Vec2::splat(2.0));
        ts.rotate_z(45.0);
        ts.pop();
        ts.rotate_x(10.0);
        ts.pop();

        assert_eq!(ts.current(), before);
        assert_eq!(ts.depth(), 0);
    }

    #[test]
    fn identity_inputs_are_skipped() {
        let mut ts = TransformStack::new();
        ts.translate(Vec2::ZERO);
        ts.scale(Vec2::ONE);
        ts.rotate_z(0.0);
        assert_eq!(ts.current(), Mat4::IDENTITY);
    }

    #[test]
    fn pop_on_empty_is_noop() {
        let mut ts = TransformStack::new();
        ts.translate(Vec2::new(1.0, 1.0));
        let m = ts.current();
        ts.pop();
        assert_eq!(ts.current(), m);
    }

    #[test]
    fn composition_order() {
        let mut ts = TransformStack::new();
        ts.translate(Vec2::new(10.0, 0.0));
        ts.scale(Vec2::splat(2.0));
        let p = ts.current().transform_point3(Vec3::new(1.0, 1.0, 0.0));
        assert!((p.x - 12.0).abs() < 1e-5);
        assert!((p.y - 2.0).abs() < 1e-5);
    }
}
