//! # Assets — Named Sprites, Fonts and Shaders
//!
//! Assets live in named buckets. Loading from disk happens on a background
//! thread; only the GPU upload happens on the frame thread.
//!
//! ```text
//!   load_sprite("bean", "bean.png")
//!        │  bucket["bean"] = Loading
//!        ▼
//!   worker thread ── fs::read + image decode ──► mpsc ──┐
//!                                                       ▼
//!   frame start:  Assets::poll(gfx) ── make_texture ──► bucket["bean"] = Ready
//! ```
//!
//! ## Loading vs Missing
//!
//! Draw code resolves names through `resolve_*`, which answers one of:
//!
//! - `Ok(Some(asset))` when ready,
//! - `Ok(None)` while the asset (or any other loader) is still pending, so
//!   the draw is skipped,
//! - `Err(..)` once every loader has settled and the name is absent or its
//!   load failed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc;
use std::thread;

use crate::draw::FontAtlas;
use crate::error::{KaboomError, Result};
use crate::gfx::{Gfx, Shader, Texture};
use crate::math::{Quad, Vec2};

#[derive(Debug, Clone)]
pub enum AssetState<T> {
    Loading,
    Ready(T),
    Failed(String),
}

/// A named animation of a sprite.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpriteAnim {
    /// Show a single frame.
    Frame(usize),
    Range {
        from: usize,
        to: usize,
        looping: bool,
        ping_pong: bool,
        /// Frames per second.
        speed: f32,
    },
}

impl SpriteAnim {
    pub const DEFAULT_SPEED: f32 = 10.0;

    pub fn range(from: usize, to: usize) -> Self {
        SpriteAnim::Range { from, to, looping: false, ping_pong: false, speed: Self::DEFAULT_SPEED }
    }

    pub fn looping(self) -> Self {
        match self {
            SpriteAnim::Range { from, to, ping_pong, speed, .. } => {
                SpriteAnim::Range { from, to, looping: true, ping_pong, speed }
            }
            other => other,
        }
    }

    pub fn ping_pong(self) -> Self {
        match self {
            SpriteAnim::Range { from, to, speed, .. } => {
                SpriteAnim::Range { from, to, looping: true, ping_pong: true, speed }
            }
            other => other,
        }
    }

    pub fn speed(self, speed: f32) -> Self {
        match self {
            SpriteAnim::Range { from, to, looping, ping_pong, .. } => {
                SpriteAnim::Range { from, to, looping, ping_pong, speed }
            }
            other => other,
        }
    }
}

/// How to cut a sprite sheet into frames.
#[derive(Debug, Clone, PartialEq)]
pub struct SpriteOpt {
    pub slice_x: u32,
    pub slice_y: u32,
    pub anims: HashMap<String, SpriteAnim>,
}

impl Default for SpriteOpt {
    fn default() -> Self {
        Self { slice_x: 1, slice_y: 1, anims: HashMap::new() }
    }
}

impl SpriteOpt {
    pub fn slice(mut self, x: u32, y: u32) -> Self {
        self.slice_x = x.max(1);
        self.slice_y = y.max(1);
        self
    }

    pub fn anim(mut self, name: impl Into<String>, anim: SpriteAnim) -> Self {
        self.anims.insert(name.into(), anim);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpriteData {
    pub tex: Texture,
    pub frames: Vec<Quad>,
    pub anims: HashMap<String, SpriteAnim>,
}

impl SpriteData {
    /// Slice a texture row by row into `slice_x * slice_y` frames.
    pub fn from_texture(tex: Texture, opt: SpriteOpt) -> Self {
        let (sx, sy) = (opt.slice_x.max(1), opt.slice_y.max(1));
        let (fw, fh) = (1.0 / sx as f32, 1.0 / sy as f32);
        let frames = (0..sy)
            .flat_map(|y| (0..sx).map(move |x| Quad::new(x as f32 * fw, y as f32 * fh, fw, fh)))
            .collect();
        Self { tex, frames, anims: opt.anims }
    }

    /// Pixel size of one frame.
    pub fn frame_size(&self, frame: usize) -> Vec2 {
        let q = self.frames.get(frame).copied().unwrap_or(Quad::FULL);
        Vec2::new(q.w * self.tex.width as f32, q.h * self.tex.height as f32)
    }
}

enum Loaded {
    Image { name: String, opt: SpriteOpt, result: std::result::Result<image::RgbaImage, String> },
    Font { name: String, size: f32, result: std::result::Result<Vec<u8>, String> },
    Shader { name: String, result: std::result::Result<String, String> },
}

pub struct Assets {
    sprites: HashMap<String, AssetState<Rc<SpriteData>>>,
    fonts: HashMap<String, AssetState<Rc<FontAtlas>>>,
    shaders: HashMap<String, AssetState<Shader>>,
    tx: mpsc::Sender<Loaded>,
    rx: mpsc::Receiver<Loaded>,
    in_flight: usize,
    total: usize,
    root: PathBuf,
}

impl Default for Assets {
    fn default() -> Self {
        Self::new()
    }
}

impl Assets {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            sprites: HashMap::new(),
            fonts: HashMap::new(),
            shaders: HashMap::new(),
            tx,
            rx,
            in_flight: 0,
            total: 0,
            root: PathBuf::new(),
        }
    }

    /// Directory relative paths are loaded from.
    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        self.root = root.into();
    }

    fn path(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    fn spawn(&mut self, job: impl FnOnce() -> Loaded + Send + 'static) {
        self.in_flight += 1;
        self.total += 1;
        let tx = self.tx.clone();
        thread::spawn(move || {
            let _ = tx.send(job());
        });
    }

    // ── Loaders ──────────────────────────────────────────────────────

    /// Decode an image file into a sprite in the background.
    pub fn load_sprite(&mut self, name: &str, path: impl AsRef<Path>, opt: SpriteOpt) {
        let path = self.path(path);
        let name = name.to_string();
        self.sprites.insert(name.clone(), AssetState::Loading);
        self.spawn(move || Loaded::Image {
            result: image::open(&path).map(|img| img.to_rgba8()).map_err(|e| e.to_string()),
            name,
            opt,
        });
    }

    /// Register a sprite from raw RGBA pixels right away.
    pub fn add_sprite(&mut self, gfx: &mut Gfx, name: &str, width: u32, height: u32, rgba: &[u8], opt: SpriteOpt) -> Result<()> {
        let tex = gfx.make_texture(width, height, rgba)?;
        self.sprites.insert(name.to_string(), AssetState::Ready(Rc::new(SpriteData::from_texture(tex, opt))));
        Ok(())
    }

    /// Read a TTF file in the background and rasterize it at `size`.
    pub fn load_font(&mut self, name: &str, path: impl AsRef<Path>, size: f32) {
        let path = self.path(path);
        let name = name.to_string();
        self.fonts.insert(name.clone(), AssetState::Loading);
        self.spawn(move || Loaded::Font {
            result: std::fs::read(&path).map_err(|e| e.to_string()),
            name,
            size,
        });
    }

    pub fn add_font(&mut self, name: &str, font: FontAtlas) {
        self.fonts.insert(name.to_string(), AssetState::Ready(Rc::new(font)));
    }

    /// Compile a fragment shader right away.
    pub fn load_shader(&mut self, gfx: &mut Gfx, name: &str, frag: &str) -> Result<()> {
        match gfx.make_shader(frag) {
            Ok(shader) => {
                self.shaders.insert(name.to_string(), AssetState::Ready(shader));
                Ok(())
            }
            Err(e) => {
                self.shaders.insert(name.to_string(), AssetState::Failed(e.to_string()));
                Err(e)
            }
        }
    }

    /// Read a fragment shader file in the background.
    pub fn load_shader_file(&mut self, name: &str, path: impl AsRef<Path>) {
        let path = self.path(path);
        let name = name.to_string();
        self.shaders.insert(name.clone(), AssetState::Loading);
        self.spawn(move || Loaded::Shader {
            result: std::fs::read_to_string(&path).map_err(|e| e.to_string()),
            name,
        });
    }

    /// Finish whatever the workers have delivered. Runs at frame start.
    pub(crate) fn poll(&mut self, gfx: &mut Gfx) {
        while let Ok(loaded) = self.rx.try_recv() {
            self.in_flight = self.in_flight.saturating_sub(1);
            match loaded {
                Loaded::Image { name, opt, result } => {
                    let state = result
                        .and_then(|img| {
                            gfx.make_texture(img.width(), img.height(), img.as_raw())
                                .map_err(|e| e.to_string())
                        })
                        .map(|tex| Rc::new(SpriteData::from_texture(tex, opt)));
                    self.sprites.insert(name.clone(), settle("sprite", &name, state));
                }
                Loaded::Font { name, size, result } => {
                    let state = result.and_then(|bytes| build_font(gfx, &name, &bytes, size)).map(Rc::new);
                    self.fonts.insert(name.clone(), settle("font", &name, state));
                }
                Loaded::Shader { name, result } => {
                    let state = result.and_then(|src| gfx.make_shader(&src).map_err(|e| e.to_string()));
                    self.shaders.insert(name.clone(), settle("shader", &name, state));
                }
            }
        }
    }

    // ── Progress ─────────────────────────────────────────────────────

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    /// Fraction of background loads that have settled, `1.0` when idle.
    pub fn load_progress(&self) -> f32 {
        if self.total == 0 {
            return 1.0;
        }
        (self.total - self.in_flight) as f32 / self.total as f32
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn sprite(&self, name: &str) -> Option<Rc<SpriteData>> {
        match self.sprites.get(name) {
            Some(AssetState::Ready(s)) => Some(s.clone()),
            _ => None,
        }
    }

    pub fn font(&self, name: &str) -> Option<Rc<FontAtlas>> {
        match self.fonts.get(name) {
            Some(AssetState::Ready(f)) => Some(f.clone()),
            _ => None,
        }
    }

    pub fn shader(&self, name: &str) -> Option<Shader> {
        match self.shaders.get(name) {
            Some(AssetState::Ready(s)) => Some(*s),
            _ => None,
        }
    }

    pub fn resolve_sprite(&self, name: &str) -> Result<Option<Rc<SpriteData>>> {
        self.resolve("sprite", name, self.sprites.get(name))
    }

    pub fn resolve_font(&self, name: &str) -> Result<Option<Rc<FontAtlas>>> {
        self.resolve("font", name, self.fonts.get(name))
    }

    pub fn resolve_shader(&self, name: &str) -> Result<Option<Shader>> {
        self.resolve("shader", name, self.shaders.get(name))
    }

    fn resolve<T: Clone>(&self, kind: &'static str, name: &str, state: Option<&AssetState<T>>) -> Result<Option<T>> {
        match state {
            Some(AssetState::Ready(v)) => Ok(Some(v.clone())),
            Some(AssetState::Loading) => Ok(None),
            Some(AssetState::Failed(reason)) => Err(KaboomError::AssetLoad {
                name: name.to_string(),
                reason: reason.clone(),
            }),
            None if self.is_loading() => Ok(None),
            None => Err(KaboomError::AssetMissing { kind, name: name.to_string() }),
        }
    }
}

fn settle<T>(kind: &str, name: &str, result: std::result::Result<T, String>) -> AssetState<T> {
    match result {
        Ok(v) => {
            log::debug!("loaded {kind} \"{name}\"");
            AssetState::Ready(v)
        }
        Err(reason) => {
            log::warn!("failed to load {kind} \"{name}\": {reason}");
            AssetState::Failed(reason)
        }
    }
}

#[cfg(feature = "text")]
fn build_font(gfx: &mut Gfx, name: &str, bytes: &[u8], size: f32) -> std::result::Result<FontAtlas, String> {
    FontAtlas::from_ttf(gfx, name, bytes, size).map_err(|e| e.to_string())
}

#[cfg(not(feature = "text"))]
fn build_font(_gfx: &mut Gfx, _name: &str, _bytes: &[u8], _size: f32) -> std::result::Result<FontAtlas, String> {
    Err("TTF fonts need the \"text\" feature".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx::NullBackend;
    use std::time::Duration;

    fn gfx() -> Gfx {
        Gfx::new(Box::new(NullBackend::new()), 64.0, 64.0, None).unwrap()
    }

    fn settle_all(assets: &mut Assets, gfx: &mut Gfx) {
        for _ in 0..400 {
            assets.poll(gfx);
            if !assets.is_loading() {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("loaders never settled");
    }

    #[test]
    fn sheet_slices_into_frames() {
        let mut g = gfx();
        let mut assets = Assets::new();
        let rgba = vec![255u8; 8 * 4 * 4];
        assets.add_sprite(&mut g, "hero", 8, 4, &rgba, SpriteOpt::default().slice(4, 2)).unwrap();
        let hero = assets.sprite("hero").unwrap();
        assert_eq!(hero.frames.len(), 8);
        assert_eq!(hero.frames[5], Quad::new(0.25, 0.5, 0.25, 0.5));
        assert_eq!(hero.frame_size(0), Vec2::new(2.0, 2.0));
    }

    #[test]
    fn unknown_name_is_missing_when_idle() {
        let assets = Assets::new();
        let err = assets.resolve_sprite("ghost").unwrap_err();
        assert_eq!(err.name(), "AssetMissing");
        assert_eq!(assets.load_progress(), 1.0);
    }

    #[test]
    fn background_load_decodes_png() {
        let dir = std::env::temp_dir().join(format!("kaboom-assets-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("dot.png");
        image::RgbaImage::from_pixel(3, 2, image::Rgba([1, 2, 3, 255])).save(&path).unwrap();

        let mut g = gfx();
        let mut assets = Assets::new();
        assets.load_sprite("dot", &path, SpriteOpt::default());
        assert!(assets.resolve_sprite("dot").unwrap().is_none());
        assert!(assets.resolve_sprite("other").unwrap().is_none());
        settle_all(&mut assets, &mut g);
        let dot = assets.resolve_sprite("dot").unwrap().unwrap();
        assert_eq!((dot.tex.width, dot.tex.height), (3, 2));
        assert_eq!(assets.load_progress(), 1.0);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn failed_load_reports_reason() {
        let mut g = gfx();
        let mut assets = Assets::new();
        assets.load_sprite("nope", "/definitely/not/here.png", SpriteOpt::default());
        settle_all(&mut assets, &mut g);
        let err = assets.resolve_sprite("nope").unwrap_err();
        assert_eq!(err.name(), "AssetLoad");
    }

    #[test]
    fn anim_builders() {
        let a = SpriteAnim::range(0, 3).ping_pong().speed(4.0);
        assert_eq!(a, SpriteAnim::Range { from: 0, to: 3, looping: true, ping_pong: true, speed: 4.0 });
        assert_eq!(SpriteAnim::Frame(2).looping(), SpriteAnim::Frame(2));
    }
}
