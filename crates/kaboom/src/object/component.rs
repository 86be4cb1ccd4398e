//! # Component — Capabilities Attached to a Game Object
//!
//! A component is a typed struct implementing [`Component`]. Its lifecycle
//! hooks receive the [`Context`] and the host's [`ObjId`] explicitly, so a
//! hook can reach every sibling component and the rest of the game:
//!
//! ```text
//!   ctx.add(comps![pos(80.0, 40.0), area(), "player"])
//!                  │                │       │
//!                  │                │       └─ tag
//!                  └─ named comps ("pos", "area")
//!
//!   each frame:  Area::update(&mut self, ctx, obj)   ← self is the Area,
//!                                                      obj is the host
//! ```
//!
//! While a hook runs, its own component is taken out of the host so that
//! `self` and `ctx` never alias. Other components of the same host stay
//! reachable through `ctx.c::<T>(obj)`.
//!
//! ## Members
//!
//! [`Component::members`] lists the method names a component contributes to
//! its host. [`Context::call`](crate::Context::call) routes a member call to
//! the component that contributed the name last, so a later component
//! shadows an earlier one and `unuse` brings the earlier one back.

use std::any::Any;

use crate::collision::Collision;
use crate::context::Context;
use crate::error::Result;
use crate::geometry::Shape;
use crate::math::Vec2;

use super::ObjId;

/// Upcast helper so `dyn Component` can be downcast to its concrete type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Payload carried by custom events and member calls.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EventArg {
    #[default]
    None,
    Obj(ObjId),
    Collision(Collision),
    Number(f32),
    Text(String),
    Point(Vec2),
}

impl EventArg {
    pub fn as_obj(&self) -> Option<ObjId> {
        match self {
            EventArg::Obj(id) => Some(*id),
            EventArg::Collision(col) => Some(col.target),
            _ => None,
        }
    }

    pub fn as_collision(&self) -> Option<&Collision> {
        match self {
            EventArg::Collision(col) => Some(col),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f32> {
        match self {
            EventArg::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            EventArg::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_point(&self) -> Option<Vec2> {
        match self {
            EventArg::Point(p) => Some(*p),
            _ => None,
        }
    }
}

impl From<ObjId> for EventArg {
    fn from(id: ObjId) -> Self {
        EventArg::Obj(id)
    }
}

impl From<Collision> for EventArg {
    fn from(col: Collision) -> Self {
        EventArg::Collision(col)
    }
}

impl From<f32> for EventArg {
    fn from(n: f32) -> Self {
        EventArg::Number(n)
    }
}

impl From<&str> for EventArg {
    fn from(s: &str) -> Self {
        EventArg::Text(s.to_string())
    }
}

impl From<Vec2> for EventArg {
    fn from(p: Vec2) -> Self {
        EventArg::Point(p)
    }
}

/// A capability attached to a game object.
///
/// Every hook has a no-op default; implement only what the component needs.
#[allow(unused_variables)]
pub trait Component: AsAny {
    /// Named components can be replaced, required and removed with `unuse`.
    fn id(&self) -> Option<&str> {
        None
    }

    /// Ids of components the host must already carry.
    fn require(&self) -> &[&'static str] {
        &[]
    }

    /// Method names this component answers through [`Component::call`].
    fn members(&self) -> &[&'static str] {
        &[]
    }

    /// Runs once, when the host enters the scene (or at `use` time when it
    /// already has).
    fn add(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        Ok(())
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        Ok(())
    }

    /// Runs with the host's transform pushed.
    fn draw(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        Ok(())
    }

    /// Runs when the host is destroyed or the component is unused.
    fn destroy(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        Ok(())
    }

    /// Extra debug drawing while inspect mode is on.
    fn draw_inspect(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        Ok(())
    }

    /// One line shown in the inspect tooltip.
    fn inspect(&self) -> Option<String> {
        None
    }

    /// Custom events triggered on the host.
    fn on_event(&mut self, ctx: &mut Context, obj: ObjId, event: &str, arg: &EventArg) -> Result<()> {
        Ok(())
    }

    /// A member call routed here because this component lists `member`.
    fn call(&mut self, ctx: &mut Context, obj: ObjId, member: &str, arg: &EventArg) -> Result<EventArg> {
        Ok(EventArg::None)
    }

    /// Local-space shape used by `area` when no explicit shape is given.
    fn render_area(&self) -> Option<Shape> {
        None
    }
}

/// One entry of a component list: a tag or a component.
pub enum CompEntry {
    Tag(String),
    Comp(Box<dyn Component>),
}

impl From<&str> for CompEntry {
    fn from(tag: &str) -> Self {
        CompEntry::Tag(tag.to_string())
    }
}

impl From<String> for CompEntry {
    fn from(tag: String) -> Self {
        CompEntry::Tag(tag)
    }
}

impl<C: Component> From<C> for CompEntry {
    fn from(comp: C) -> Self {
        CompEntry::Comp(Box::new(comp))
    }
}

impl From<Box<dyn Component>> for CompEntry {
    fn from(comp: Box<dyn Component>) -> Self {
        CompEntry::Comp(comp)
    }
}

/// Build a `Vec<CompEntry>` from components and tag strings.
#[macro_export]
macro_rules! comps {
    ($($entry:expr),* $(,)?) => {
        vec![$($crate::object::CompEntry::from($entry)),*]
    };
}
