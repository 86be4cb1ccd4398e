//! Everything a game usually needs, in one import.

pub use crate::assets::{SpriteAnim, SpriteOpt};
pub use crate::collision::{Collision, Side};
pub use crate::comps::*;
pub use crate::config::KaboomConfig;
pub use crate::context::Context;
pub use crate::draw::{
    DrawCircleOpt, DrawLineOpt, DrawPolygonOpt, DrawRectOpt, DrawSpriteOpt, DrawTextOpt, TextAlign,
};
pub use crate::error::{KaboomError, Result};
pub use crate::event::EventController;
pub use crate::game::Game;
pub use crate::geometry::Shape;
pub use crate::input::{KeyCode, MouseButton};
pub use crate::math::{Anchor, Color, Vec2, vec2_from_angle};
pub use crate::object::{Component, EventArg, ObjId};
pub use crate::comps;
