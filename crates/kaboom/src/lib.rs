//! # Kaboom — A Small 2D Game Runtime
//!
//! Game objects are built from components and tags, updated and drawn once
//! per frame, and talk to each other through events:
//!
//! ```text
//!   Game::run ─► window (winit) ─► Context::step(dt)
//!                                    │
//!        objects (comps + tags) ◄────┤ update, timers, collisions
//!        gfx (batched quads) ◄───────┘ camera, draw tree, debug overlay
//! ```
//!
//! Start with `use kaboom::prelude::*` and build a [`Game`](game::Game), or
//! drive a [`Context`] by hand with [`Context::headless`] and
//! [`Context::step`].

pub mod assets;
pub mod camera;
pub mod collision;
pub mod comps;
pub mod config;
pub mod context;
pub mod debug;
pub mod draw;
pub mod error;
pub mod event;
pub mod game;
pub mod geometry;
pub mod gfx;
pub mod input;
pub mod math;
pub mod object;
pub mod prelude;
pub mod time;
pub mod timer;
pub(crate) mod window;

pub use context::Context;
pub use error::{KaboomError, Result};
