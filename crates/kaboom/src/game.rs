//! Game builder and entry point.
//!
//! [`Game`] holds the configuration and a setup callback until the window
//! exists, then hands both to the winit event loop.
//!
//! # Example
//!
//! ```ignore
//! use kaboom::prelude::*;
//!
//! fn main() -> kaboom::Result<()> {
//!     Game::new(KaboomConfig::default().title("bean").gravity(1600.0))
//!         .setup(|ctx| {
//!             ctx.add(comps![rect(48.0, 48.0), pos(80.0, 40.0), area(), body(), "player"])?;
//!             Ok(())
//!         })
//!         .run()
//! }
//! ```

use winit::event_loop::EventLoop;

use crate::config::KaboomConfig;
use crate::context::Context;
use crate::error::{KaboomError, Result};
use crate::window::WinitApp;

/// Runs once, right after the context is created.
pub type SetupFn = dyn FnOnce(&mut Context) -> Result<()>;

pub struct Game {
    config: KaboomConfig,
    setup: Option<Box<SetupFn>>,
}

impl Game {
    pub fn new(config: KaboomConfig) -> Self {
        Self { config, setup: None }
    }

    /// Read the configuration from a JSON string.
    pub fn from_json(src: &str) -> Result<Self> {
        Ok(Self::new(KaboomConfig::from_json(src)?))
    }

    pub fn setup(mut self, f: impl FnOnce(&mut Context) -> Result<()> + 'static) -> Self {
        self.setup = Some(Box::new(f));
        self
    }

    /// Open the window and run until it closes. Logging is initialized
    /// here, filtered by `RUST_LOG` and defaulting to `info`.
    pub fn run(self) -> Result<()> {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

        let event_loop = EventLoop::new().map_err(|e| KaboomError::Gpu(format!("event loop: {e}")))?;
        let mut app = WinitApp::new(self.config, self.setup);
        event_loop
            .run_app(&mut app)
            .map_err(|e| KaboomError::Gpu(format!("event loop: {e}")))?;
        app.finish()
    }
}
