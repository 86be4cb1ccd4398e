//! # Built-in Components
//!
//! Each component is a plain struct implementing
//! [`Component`](crate::object::Component), with a lowercase constructor
//! function so object definitions read as a list:
//!
//! ```text
//!   ctx.add(comps![
//!       sprite("bean"),      renderable      (sprite.rs)
//!       pos(80.0, 40.0),     transform       (transform.rs)
//!       area(),              collision shape (area.rs)
//!       body(),              gravity         (body.rs)
//!       "player",            tag
//!   ])
//! ```

mod area;
mod behavior;
mod body;
mod render;
mod shapes;
mod sprite;
mod text;
mod transform;

pub use area::{Area, area};
pub use behavior::{
    Follow, Health, Lifespan, Move, Offscreen, State, TimerComp, follow, health, lifespan, move_angle,
    move_toward, offscreen, state, timer,
};
pub use body::{Body, DEFAULT_JUMP_FORCE, DEFAULT_MAX_VEL, Solid, body, solid};
pub use render::{
    AnchorComp, ColorComp, Mask, Opacity, OutlineComp, ShaderComp, anchor, color, opacity, outline, shader,
};
pub use shapes::{Circle, Rect, UvQuad, circle, rect, uvquad};
pub use sprite::{PlayOpt, Sprite, sprite};
pub use text::{Text, text};
pub use transform::{Fixed, Pos, Rotate, Scale, Z, fixed, pos, rotate, scale, z};
