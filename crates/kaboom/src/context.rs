//! # Context — The Game and Its Frame Pipeline
//!
//! [`Context`] owns everything a running game has: the renderer, the scene
//! tree, the camera, input, timers, assets and debug state. There is no
//! global instance; every hook and handler receives `&mut Context`.
//!
//! One call to [`Context::step`] runs one frame:
//!
//! ```text
//!   advance time ─► apply input ─► finish asset loads
//!        │
//!        ├─ still loading ───────────────► loading bar
//!        ├─ fatal error stored ──────────► fatal screen
//!        └─ running:
//!             input handlers ─► update tree ─► timers ─► sweep
//!             ─► collision check ─► sweep ─► camera ─► draw tree ─► debug overlay
//! ```
//!
//! An `Err` from any game callback stops game logic for good: it is logged,
//! stored, and every later frame draws the fatal screen instead. Only
//! backend failures are returned from `step`.

use std::collections::HashMap;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::assets::Assets;
use crate::camera::Camera;
use crate::config::KaboomConfig;
use crate::debug::DebugState;
use crate::draw::{DrawRectOpt, DrawSpriteOpt, DrawTextOpt, FontAtlas, FormattedText, Outline, format_text};
use crate::error::{KaboomError, Result};
use crate::event::{EventController, Handlers};
use crate::gfx::{Gfx, NullBackend, RenderBackend};
use crate::input::{Input, InputHandlers};
use crate::math::{Color, Vec2};
use crate::object::{HookState, ObjHandler, Scene};
use crate::time::Time;
use crate::timer::Timers;

/// Callback run once every asset has settled.
pub type LoadHandler = dyn FnMut(&mut Context) -> Result<()>;

const LOADING_BAR_W: f32 = 0.5;
const LOADING_BAR_H: f32 = 24.0;

pub struct Context {
    pub gfx: Gfx,
    pub camera: Camera,
    pub input: Input,
    pub time: Time,
    pub debug: DebugState,
    pub assets: Assets,
    pub config: KaboomConfig,
    pub(crate) scene: Scene,
    pub(crate) tag_events: HashMap<String, Handlers<ObjHandler>>,
    pub(crate) input_handlers: InputHandlers,
    pub(crate) timers: Timers,
    pub(crate) hooks: HookState,
    pub(crate) rng: StdRng,
    pub(crate) font: Rc<FontAtlas>,
    pub(crate) fatal: Option<KaboomError>,
    loaded: bool,
    load_events: Handlers<LoadHandler>,
}

// ── Construction ─────────────────────────────────────────────────────────

impl Context {
    pub fn new(config: KaboomConfig, backend: Box<dyn RenderBackend>) -> Result<Self> {
        let (w, h) = config.logical_size();
        let mut gfx = Gfx::new(backend, w, h, config.background)?;
        let font = Rc::new(FontAtlas::builtin(&mut gfx)?);
        log::info!("\"{}\" running at {w}x{h}", config.title);

        Ok(Self {
            gfx,
            camera: Camera::new(),
            input: Input::new(),
            time: Time::new(),
            debug: DebugState::new(config.log_max),
            assets: Assets::new(),
            scene: Scene::new(),
            tag_events: HashMap::new(),
            input_handlers: InputHandlers::default(),
            timers: Timers::default(),
            hooks: HookState::default(),
            rng: StdRng::seed_from_u64(config.seed),
            font,
            fatal: None,
            loaded: false,
            load_events: Handlers::new(),
            config,
        })
    }

    /// A context drawing into a [`NullBackend`], for tests and tools.
    pub fn headless(config: KaboomConfig) -> Result<Self> {
        Self::new(config, Box::new(NullBackend::new()))
    }

    /// Fit the logical canvas into a window of `width`×`height` pixels.
    pub fn resize(&mut self, width: u32, height: u32) {
        let (logical, letterbox) = self.config.viewport_mode();
        self.gfx.resize(width, height, logical, self.config.pixel_scale(), letterbox);
    }

    /// Window pixel position to logical canvas position.
    pub fn window_to_canvas(&self, p: Vec2) -> Vec2 {
        let logical = Vec2::new(self.gfx.width(), self.gfx.height());
        self.gfx.viewport().to_logical(p, logical)
    }
}

// ── Frame ────────────────────────────────────────────────────────────────

impl Context {
    /// Run one frame lasting `dt` real seconds.
    pub fn step(&mut self, dt: f32) -> Result<()> {
        self.time.advance(dt);
        self.input.frame();
        self.assets.poll(&mut self.gfx);
        self.handle_debug_keys();

        if let Err(e) = self.run_logic() {
            self.fail(e)?;
        }

        let view = self.camera.update(self.time.dt(), self.gfx.center(), &mut self.rng);
        self.gfx.set_view(view);
        self.gfx.frame_start();
        let drawn = if self.fatal.is_some() {
            self.draw_fatal()
        } else if !self.loaded {
            self.draw_loading()
        } else {
            self.draw_scene()
        };
        if let Err(e) = drawn {
            self.fail(e)?;
            self.gfx.recover();
            self.draw_fatal()?;
        }
        self.gfx.frame_end()
    }

    fn run_logic(&mut self) -> Result<()> {
        if self.fatal.is_some() || !self.check_loaded()? {
            return Ok(());
        }
        self.fire_input()?;
        if !self.debug.should_update() {
            return Ok(());
        }
        let root = self.scene.root();
        self.update_tree(root)?;
        self.tick_timers()?;
        self.scene.sweep();
        self.check_frame()?;
        self.scene.sweep();
        Ok(())
    }

    fn draw_scene(&mut self) -> Result<()> {
        self.gfx.draw_background()?;
        let root = self.scene.root();
        self.draw_tree(root)?;
        self.draw_debug()
    }

    /// Store a game error as fatal. Backend errors are handed back instead.
    fn fail(&mut self, err: KaboomError) -> Result<()> {
        if matches!(err, KaboomError::Gpu(_)) {
            return Err(err);
        }
        if self.fatal.is_none() {
            log::error!("{}: {err}", err.name());
            self.fatal = Some(err);
        }
        Ok(())
    }

    /// The error that stopped the game, if any.
    pub fn fatal_error(&self) -> Option<&KaboomError> {
        self.fatal.as_ref()
    }
}

// ── Loading ──────────────────────────────────────────────────────────────

impl Context {
    /// Run `f` once every asset has loaded. Registered after loading, it
    /// runs on the next frame.
    pub fn on_load(&mut self, f: impl FnMut(&mut Context) -> Result<()> + 'static) -> EventController {
        if self.loaded {
            return self.wait(0.0, f);
        }
        self.load_events.add(Box::new(f))
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn check_loaded(&mut self) -> Result<bool> {
        if self.loaded {
            return Ok(true);
        }
        if self.assets.is_loading() {
            return Ok(false);
        }
        self.loaded = true;
        log::debug!("assets settled after {} frames", self.time.frame_count());
        for entry in self.load_events.snapshot() {
            entry.invoke(|f| f(self))?;
        }
        self.load_events.clear();
        Ok(true)
    }

    fn draw_loading(&mut self) -> Result<()> {
        let (w, h) = (self.gfx.width(), self.gfx.height());
        let bar_w = w * LOADING_BAR_W;
        let top_left = Vec2::new((w - bar_w) * 0.5, (h - LOADING_BAR_H) * 0.5);
        self.gfx.draw_rect(&DrawRectOpt::new(w, h).color(Color::BLACK).fixed(true))?;
        self.gfx.draw_rect(
            &DrawRectOpt::new(bar_w * self.assets.load_progress(), LOADING_BAR_H)
                .pos(top_left)
                .fixed(true),
        )?;
        self.gfx.draw_rect(
            &DrawRectOpt::new(bar_w, LOADING_BAR_H)
                .fill(false)
                .outline(Outline::new(4.0, Color::WHITE))
                .pos(top_left)
                .fixed(true),
        )
    }
}

// ── Drawing with named assets ────────────────────────────────────────────

impl Context {
    /// Draw a named sprite. Skipped while it is still loading.
    pub fn draw_sprite(&mut self, opt: &DrawSpriteOpt) -> Result<()> {
        let Some(data) = self.assets.resolve_sprite(&opt.sprite)? else {
            return Ok(());
        };
        let Some(frame) = data.frames.get(opt.frame).copied() else {
            return Err(KaboomError::draw_args(format!("frame not found: {} on sprite \"{}\"", opt.frame, opt.sprite)));
        };
        self.gfx.draw_texture(&opt.to_texture_opt(data.tex, frame))
    }

    /// Draw text in its named font, or the built-in one. `None` while the
    /// font is still loading.
    pub fn draw_text(&mut self, opt: &DrawTextOpt) -> Result<Option<FormattedText>> {
        let Some(font) = self.text_font(opt)? else {
            return Ok(None);
        };
        self.gfx.draw_text(&font, opt).map(Some)
    }

    /// Lay out text without drawing it.
    pub fn format_text(&self, opt: &DrawTextOpt) -> Result<Option<FormattedText>> {
        let Some(font) = self.text_font(opt)? else {
            return Ok(None);
        };
        format_text(&font, opt).map(Some)
    }

    fn text_font(&self, opt: &DrawTextOpt) -> Result<Option<Rc<FontAtlas>>> {
        match &opt.font {
            Some(name) => self.assets.resolve_font(name),
            None => Ok(Some(self.font.clone())),
        }
    }
}

// ── World ────────────────────────────────────────────────────────────────

impl Context {
    pub fn width(&self) -> f32 {
        self.gfx.width()
    }

    pub fn height(&self) -> f32 {
        self.gfx.height()
    }

    pub fn center(&self) -> Vec2 {
        self.gfx.center()
    }

    pub fn dt(&self) -> f32 {
        self.time.dt()
    }

    pub fn gravity(&self) -> f32 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: f32) {
        self.config.gravity = gravity;
    }

    /// Shake the camera by `intensity` pixels.
    pub fn shake(&mut self, intensity: f32) {
        self.camera.shake(intensity);
    }

    /// Random float in `lo..hi`, from the seeded generator.
    pub fn rand(&mut self, lo: f32, hi: f32) -> f32 {
        if hi > lo { self.rng.gen_range(lo..hi) } else { lo }
    }

    /// Random integer in `lo..hi`.
    pub fn randi(&mut self, lo: i32, hi: i32) -> i32 {
        if hi > lo { self.rng.gen_range(lo..hi) } else { lo }
    }

    /// `true` with probability `p`.
    pub fn chance(&mut self, p: f32) -> bool {
        self.rng.r#gen::<f32>() < p
    }

    /// Remove every object and start the game over from `setup`.
    pub fn restart(&mut self, setup: impl FnOnce(&mut Context) -> Result<()>) -> Result<()> {
        self.clear_scene()?;
        let root = self.scene.root();
        if let Some(o) = self.scene.get_mut(root) {
            for list in o.events.values_mut() {
                list.clear();
            }
        }
        self.tag_events.clear();
        self.input_handlers = InputHandlers::default();
        self.timers = Timers::default();
        self.camera = Camera::new();
        self.fatal = None;
        setup(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::SpriteOpt;
    use crate::comps::{Mask, pos, rect, sprite};
    use crate::gfx::{Recorded, StencilMode};
    use crate::{KaboomError, comps};
    use std::cell::Cell;

    fn ctx() -> Context {
        Context::headless(KaboomConfig::default().size(100.0, 100.0)).unwrap()
    }

    #[test]
    fn load_handlers_fire_once() {
        let mut ctx = ctx();
        let hits = Rc::new(Cell::new(0));
        let h = hits.clone();
        ctx.on_load(move |_| {
            h.set(h.get() + 1);
            Ok(())
        });
        ctx.step(0.1).unwrap();
        ctx.step(0.1).unwrap();
        assert_eq!(hits.get(), 1);
        assert!(ctx.is_loaded());

        let h = hits.clone();
        ctx.on_load(move |_| {
            h.set(h.get() + 10);
            Ok(())
        });
        ctx.step(0.1).unwrap();
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn callback_error_becomes_fatal() {
        let mut ctx = ctx();
        let updates = Rc::new(Cell::new(0));
        let u = updates.clone();
        ctx.on_frame_update(move |_| {
            u.set(u.get() + 1);
            Err(KaboomError::custom("boss escaped"))
        });
        ctx.step(0.1).unwrap();
        ctx.step(0.1).unwrap();
        assert_eq!(updates.get(), 1);
        let err = ctx.fatal_error().unwrap();
        assert_eq!(err.name(), "Error");
        assert_eq!(err.to_string(), "boss escaped");
    }

    #[test]
    fn fatal_screen_replaces_scene() {
        let (backend, log) = NullBackend::recording();
        let mut ctx = Context::new(KaboomConfig::default().size(100.0, 100.0), Box::new(backend)).unwrap();
        ctx.add(comps![pos(10.0, 10.0), rect(f32::NAN, 10.0)]).unwrap();
        ctx.step(0.1).unwrap();
        assert_eq!(ctx.fatal_error().map(|e| e.name()), Some("InvalidDrawArgs"));

        log.borrow_mut().clear();
        ctx.step(0.1).unwrap();
        let draws = log.borrow().iter().filter(|r| matches!(r, Recorded::Draw { .. })).count();
        assert!(draws > 0);
        assert!(ctx.fatal_error().is_some());
    }

    #[test]
    fn draw_error_under_a_mask_leaves_fatal_screen_unclipped() {
        let (backend, log) = NullBackend::recording();
        let mut ctx = Context::new(KaboomConfig::default().size(100.0, 100.0), Box::new(backend)).unwrap();
        let window = ctx.add(comps![pos(10.0, 10.0), rect(20.0, 20.0), Mask::intersect()]).unwrap();
        ctx.add_child(window, comps![pos(0.0, 0.0), rect(f32::NAN, 10.0)]).unwrap();
        ctx.step(0.1).unwrap();
        assert_eq!(ctx.fatal_error().map(|e| e.name()), Some("InvalidDrawArgs"));

        let last = log.borrow().iter().rev().find_map(|r| match r {
            Recorded::Draw { stencil, .. } => Some(*stencil),
            Recorded::ClearStencil => None,
        });
        assert_eq!(last, Some(StencilMode::None));
        assert_eq!(ctx.gfx.transform_depth(), 0);
    }

    #[test]
    fn sprite_frame_out_of_range_is_fatal() {
        let mut ctx = ctx();
        ctx.assets
            .add_sprite(&mut ctx.gfx, "bean", 2, 1, &[255; 8], SpriteOpt::default().slice(2, 1))
            .unwrap();
        ctx.add(comps![sprite("bean").frame(1), pos(0.0, 0.0)]).unwrap();
        ctx.step(0.1).unwrap();
        assert!(ctx.fatal_error().is_none());

        ctx.add(comps![sprite("bean").frame(7), pos(0.0, 0.0)]).unwrap();
        ctx.step(0.1).unwrap();
        let err = ctx.fatal_error().unwrap();
        assert_eq!(err.name(), "InvalidDrawArgs");
        assert!(err.to_string().contains("frame not found: 7"));
    }

    #[test]
    fn seeded_rand_is_deterministic() {
        let mut a = Context::headless(KaboomConfig::default().seed(7)).unwrap();
        let mut b = Context::headless(KaboomConfig::default().seed(7)).unwrap();
        let xs: Vec<f32> = (0..4).map(|_| a.rand(0.0, 10.0)).collect();
        let ys: Vec<f32> = (0..4).map(|_| b.rand(0.0, 10.0)).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().all(|x| (0.0..10.0).contains(x)));
        assert_eq!(a.rand(3.0, 3.0), 3.0);
    }

    #[test]
    fn letterboxed_mouse_mapping() {
        let mut ctx = Context::headless(KaboomConfig::default().size(100.0, 100.0)).unwrap();
        ctx.resize(400, 200);
        let p = ctx.window_to_canvas(Vec2::new(200.0, 100.0));
        assert!((p - Vec2::new(50.0, 50.0)).length() < 1e-3);
        assert_eq!((ctx.width(), ctx.height()), (100.0, 100.0));
    }

    #[test]
    fn restart_clears_everything() {
        let mut ctx = ctx();
        ctx.add(comps![pos(0.0, 0.0), "thing"]).unwrap();
        ctx.wait(1.0, |_| Ok(()));
        ctx.restart(|ctx| {
            ctx.add(comps![pos(1.0, 1.0), "fresh"])?;
            Ok(())
        })
        .unwrap();
        assert!(ctx.get("thing").is_empty());
        assert_eq!(ctx.get("fresh").len(), 1);
        assert_eq!(ctx.timers.len(), 0);
    }
}
