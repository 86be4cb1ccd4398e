//! Named shader inputs supplied per draw call.
//!
//! Uniform sets are compared by value: two sets holding the same names and
//! values are the same batch state, whoever built them.
//!
//! On the GPU every shader sees `u.slots: array<vec4<f32>, 16>`. Values are packed
//! into those slots in key order (a `Mat4` takes four slots), so a shader
//! reads e.g. the first uniform as `u.slots[0]`.

use std::collections::BTreeMap;

use crate::math::{Color, Mat4, Vec2, Vec3};

/// Number of `vec4` slots available to a shader.
pub const UNIFORM_SLOTS: usize = 16;

pub type UniformBlock = [[f32; 4]; UNIFORM_SLOTS];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(Vec2),
    Vec3(Vec3),
    Color(Color),
    Mat4(Mat4),
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<Color> for UniformValue {
    fn from(v: Color) -> Self {
        Self::Color(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Uniform {
    values: BTreeMap<String, UniformValue>,
}

impl Uniform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<UniformValue>) {
        self.values.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&UniformValue> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pack into the fixed slot block uploaded to the GPU.
    pub fn pack(&self) -> UniformBlock {
        let mut block = [[0.0; 4]; UNIFORM_SLOTS];
        let mut slot = 0;
        for (name, value) in &self.values {
            let needed = if matches!(value, UniformValue::Mat4(_)) { 4 } else { 1 };
            if slot + needed > UNIFORM_SLOTS {
                log::warn!("uniform \"{name}\" does not fit in {UNIFORM_SLOTS} slots, dropped");
                break;
            }
            match value {
                UniformValue::Float(f) => block[slot] = [*f, 0.0, 0.0, 0.0],
                UniformValue::Vec2(v) => block[slot] = [v.x, v.y, 0.0, 0.0],
                UniformValue::Vec3(v) => block[slot] = [v.x, v.y, v.z, 0.0],
                UniformValue::Color(c) => block[slot] = c.to_array(),
                UniformValue::Mat4(m) => {
                    for (i, col) in m.to_cols_array_2d().iter().enumerate() {
                        block[slot + i] = *col;
                    }
                }
            }
            slot += needed;
        }
        block
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_by_value() {
        let a = Uniform::new().with("u_time", 1.0).with("u_tint", Color::RED);
        let b = Uniform::new().with("u_tint", Color::RED).with("u_time", 1.0);
        assert_eq!(a, b);
        assert_ne!(a, Uniform::new().with("u_time", 2.0).with("u_tint", Color::RED));
    }

    #[test]
    fn packs_in_key_order() {
        let u = Uniform::new().with("b", 2.0).with("a", Vec2::new(1.0, 3.0));
        let block = u.pack();
        assert_eq!(block[0], [1.0, 3.0, 0.0, 0.0]);
        assert_eq!(block[1], [2.0, 0.0, 0.0, 0.0]);
    }
}
