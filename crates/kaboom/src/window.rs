//! Window management via winit.
//!
//! Implements [`winit::application::ApplicationHandler`] to drive the event
//! loop. The window and GPU backend are created on the first `resumed`,
//! window events are queued into [`Input`](crate::input::Input) in canvas
//! coordinates, and every `RedrawRequested` steps one frame.

use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::ActiveEventLoop;
use winit::keyboard::PhysicalKey;
use winit::window::{Window, WindowId};

use crate::config::KaboomConfig;
use crate::context::Context;
use crate::error::Result;
use crate::game::SetupFn;
use crate::gfx::WgpuBackend;
use crate::input::InputEvent;
use crate::math::Vec2;

/// The application state that winit drives.
pub(crate) struct WinitApp {
    config: KaboomConfig,
    setup: Option<Box<SetupFn>>,
    ctx: Option<Context>,
    window: Option<Arc<Window>>,
    /// First error that ended the loop.
    error: Option<crate::KaboomError>,
}

impl WinitApp {
    pub fn new(config: KaboomConfig, setup: Option<Box<SetupFn>>) -> Self {
        Self { config, setup, ctx: None, window: None, error: None }
    }

    /// Outcome of the run once the loop has exited.
    pub fn finish(self) -> Result<()> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn start(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let (w, h) = self.config.window_size();
        let attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(LogicalSize::new(w, h));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .map_err(|e| crate::KaboomError::Gpu(format!("window: {e}")))?,
        );

        let backend = WgpuBackend::new(window.clone())?;
        let mut ctx = Context::new(self.config.clone(), Box::new(backend))?;
        let size = window.inner_size();
        ctx.resize(size.width, size.height);

        if let Some(setup) = self.setup.take() {
            if let Err(e) = setup(&mut ctx) {
                log::error!("setup failed: {e}");
                ctx.fatal = Some(e);
            }
        }

        self.ctx = Some(ctx);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn exit_with(&mut self, event_loop: &ActiveEventLoop, err: crate::KaboomError) {
        log::error!("{err}");
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for WinitApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.start(event_loop) {
            self.exit_with(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Window close requested, exiting.");
                event_loop.exit();
            }

            WindowEvent::Resized(size) => ctx.resize(size.width, size.height),

            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed if !event.repeat => ctx.input.push(InputEvent::KeyDown(key)),
                        ElementState::Pressed => {}
                        ElementState::Released => ctx.input.push(InputEvent::KeyUp(key)),
                    }
                }
            }

            WindowEvent::MouseInput { button, state, .. } => match state {
                ElementState::Pressed => ctx.input.push(InputEvent::MouseDown(button)),
                ElementState::Released => ctx.input.push(InputEvent::MouseUp(button)),
            },

            WindowEvent::CursorMoved { position, .. } => {
                let p = ctx.window_to_canvas(Vec2::new(position.x as f32, position.y as f32));
                ctx.input.push(InputEvent::MouseMove(p));
            }

            WindowEvent::RedrawRequested => {
                let dt = ctx.time.measure();
                if let Err(e) = ctx.step(dt) {
                    self.exit_with(event_loop, e);
                    return;
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            _ => {}
        }
    }
}
