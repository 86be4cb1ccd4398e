//! The `sprite` component: draws a frame of a named sprite asset and plays
//! its animations.
//!
//! ```text
//!   timer += dt * anim_speed
//!   timer >= 1 / speed ──► frame += dir
//!                          past the range?  loop ──► restart (or bounce)
//!                                           else ──► hold last, "anim_end"
//! ```

use crate::assets::SpriteAnim;
use crate::context::Context;
use crate::draw::DrawSpriteOpt;
use crate::error::{KaboomError, Result};
use crate::geometry::{self, Shape};
use crate::math::{Quad, Vec2};
use crate::object::{Component, EventArg, ObjId};

#[derive(Debug, Clone, PartialEq)]
struct Playing {
    name: String,
    timer: f32,
    dir: i32,
    looping: Option<bool>,
    ping_pong: Option<bool>,
    speed: Option<f32>,
}

/// Overrides for a single `play` call.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PlayOpt {
    pub looping: Option<bool>,
    pub ping_pong: Option<bool>,
    pub speed: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    pub name: String,
    pub frame: usize,
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub tiled: bool,
    pub flip_x: bool,
    pub flip_y: bool,
    pub quad: Quad,
    /// Multiplier on every animation's speed.
    pub anim_speed: f32,
    playing: Option<Playing>,
    queued: Option<(String, PlayOpt)>,
    size: Vec2,
}

impl Sprite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            frame: 0,
            width: None,
            height: None,
            tiled: false,
            flip_x: false,
            flip_y: false,
            quad: Quad::FULL,
            anim_speed: 1.0,
            playing: None,
            queued: None,
            size: Vec2::ZERO,
        }
    }

    pub fn width(mut self, width: f32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn height(mut self, height: f32) -> Self {
        self.height = Some(height);
        self
    }

    pub fn frame(mut self, frame: usize) -> Self {
        self.frame = frame;
        self
    }

    pub fn tiled(mut self, tiled: bool) -> Self {
        self.tiled = tiled;
        self
    }

    pub fn flip_x(mut self, flip: bool) -> Self {
        self.flip_x = flip;
        self
    }

    /// Start playing once the sprite has loaded.
    pub fn anim(mut self, name: impl Into<String>) -> Self {
        self.queued = Some((name.into(), PlayOpt::default()));
        self
    }

    pub fn cur_anim(&self) -> Option<&str> {
        self.playing.as_ref().map(|p| p.name.as_str())
    }

    /// Drawn size; zero until the asset has loaded.
    pub fn size(&self) -> Vec2 {
        self.size
    }

    fn measure(&mut self, ctx: &Context) {
        let Some(data) = ctx.assets.sprite(&self.name) else {
            return;
        };
        let natural = data.frame_size(0) * Vec2::new(self.quad.w, self.quad.h);
        self.size = match (self.width, self.height) {
            (Some(w), Some(h)) => Vec2::new(w, h),
            (Some(w), None) => Vec2::new(w, natural.y * w / natural.x.max(f32::EPSILON)),
            (None, Some(h)) => Vec2::new(natural.x * h / natural.y.max(f32::EPSILON), h),
            (None, None) => natural,
        };
    }

    fn start(&mut self, ctx: &mut Context, obj: ObjId, name: &str, opt: PlayOpt) -> Result<()> {
        let Some(data) = ctx.assets.sprite(&self.name) else {
            self.queued = Some((name.to_string(), opt));
            return Ok(());
        };
        let anim = data.anims.get(name).copied().ok_or_else(|| {
            KaboomError::custom(format!("anim not found: \"{name}\" on sprite \"{}\"", self.name))
        })?;
        if self.playing.is_some() {
            self.stop(ctx, obj)?;
        }
        match anim {
            SpriteAnim::Frame(f) => self.frame = f,
            SpriteAnim::Range { from, to, .. } => {
                self.frame = from;
                self.playing = Some(Playing {
                    name: name.to_string(),
                    timer: 0.0,
                    dir: if from > to { -1 } else { 1 },
                    looping: opt.looping,
                    ping_pong: opt.ping_pong,
                    speed: opt.speed,
                });
            }
        }
        ctx.trigger(obj, "anim_start", EventArg::Text(name.to_string()))
    }

    fn stop(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let Some(p) = self.playing.take() else {
            return Ok(());
        };
        ctx.trigger(obj, "anim_end", EventArg::Text(p.name))
    }

    fn advance(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let Some(data) = ctx.assets.sprite(&self.name) else {
            return Ok(());
        };
        let Some(p) = self.playing.as_mut() else {
            return Ok(());
        };
        let Some(SpriteAnim::Range { from, to, looping, ping_pong, speed }) = data.anims.get(&p.name).copied() else {
            return self.stop(ctx, obj);
        };
        let speed = p.speed.unwrap_or(speed);
        let looping = p.looping.unwrap_or(looping);
        let ping_pong = p.ping_pong.unwrap_or(ping_pong);
        p.timer += ctx.time.dt() * self.anim_speed;
        if speed <= 0.0 || p.timer < 1.0 / speed {
            return Ok(());
        }
        p.timer = 0.0;
        let (lo, hi) = (from.min(to) as i64, from.max(to) as i64);
        let mut next = self.frame as i64 + p.dir as i64;
        if next < lo || next > hi {
            if looping {
                if ping_pong {
                    p.dir = -p.dir;
                    next = self.frame as i64 + p.dir as i64;
                } else {
                    next = from as i64;
                }
            } else {
                self.frame = to;
                return self.stop(ctx, obj);
            }
        }
        self.frame = next.clamp(lo, hi) as usize;
        Ok(())
    }
}

impl Component for Sprite {
    fn id(&self) -> Option<&str> {
        Some("sprite")
    }

    fn members(&self) -> &[&'static str] {
        &["play", "stop", "num_frames"]
    }

    fn update(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        if self.size == Vec2::ZERO {
            self.measure(ctx);
        }
        if let Some((name, opt)) = self.queued.take() {
            self.start(ctx, obj, &name, opt)?;
        }
        self.advance(ctx, obj)
    }

    fn draw(&mut self, ctx: &mut Context, obj: ObjId) -> Result<()> {
        let mut opt = DrawSpriteOpt::new(self.name.clone())
            .frame(self.frame)
            .tiled(self.tiled)
            .flip_x(self.flip_x)
            .flip_y(self.flip_y)
            .props(ctx.render_props(obj));
        opt.quad = self.quad;
        opt.width = self.width;
        opt.height = self.height;
        ctx.draw_sprite(&opt)
    }

    fn call(&mut self, ctx: &mut Context, obj: ObjId, member: &str, arg: &EventArg) -> Result<EventArg> {
        match member {
            "play" => {
                if let Some(name) = arg.as_text() {
                    self.start(ctx, obj, name, PlayOpt::default())?;
                }
            }
            "stop" => self.stop(ctx, obj)?,
            "num_frames" => {
                let n = ctx.assets.sprite(&self.name).map_or(0, |d| d.frames.len());
                return Ok(EventArg::Number(n as f32));
            }
            _ => {}
        }
        Ok(EventArg::None)
    }

    fn render_area(&self) -> Option<Shape> {
        Some(Shape::Rect(geometry::Rect::new(Vec2::ZERO, self.size.x, self.size.y)))
    }

    fn inspect(&self) -> Option<String> {
        Some(match &self.playing {
            Some(p) => format!("\"{}\" {} ({})", self.name, self.frame, p.name),
            None => format!("\"{}\" {}", self.name, self.frame),
        })
    }
}

pub fn sprite(name: impl Into<String>) -> Sprite {
    Sprite::new(name)
}

impl Context {
    /// Play a named animation on the object's sprite.
    pub fn play(&mut self, obj: ObjId, anim: &str, opt: PlayOpt) -> Result<()> {
        self.with_comp::<Sprite, _>(obj, |spr, ctx| spr.start(ctx, obj, anim, opt))
            .map(|_| ())
    }

    pub fn stop_anim(&mut self, obj: ObjId) -> Result<()> {
        self.with_comp::<Sprite, _>(obj, |spr, ctx| spr.stop(ctx, obj)).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::assets::SpriteOpt;
    use crate::comps;
    use crate::comps::pos;
    use crate::config::KaboomConfig;

    /// A 4×1 sheet of 2×2 frames with a few animations.
    fn ctx() -> Context {
        let mut ctx = Context::headless(KaboomConfig::default().size(100.0, 100.0)).unwrap();
        let opt = SpriteOpt::default()
            .slice(4, 1)
            .anim("run", SpriteAnim::range(0, 3).looping())
            .anim("bounce", SpriteAnim::range(0, 2).ping_pong())
            .anim("once", SpriteAnim::range(0, 2))
            .anim("idle", SpriteAnim::Frame(3));
        ctx.assets.add_sprite(&mut ctx.gfx, "hero", 8, 2, &[255; 8 * 2 * 4], opt).unwrap();
        ctx
    }

    fn frame(ctx: &Context, obj: ObjId) -> usize {
        ctx.c::<Sprite>(obj).unwrap().frame
    }

    /// Steps long enough for one frame at the default speed of 10 fps.
    fn frames_over(ctx: &mut Context, obj: ObjId, steps: usize) -> Vec<usize> {
        (0..steps)
            .map(|_| {
                ctx.step(0.15).unwrap();
                frame(ctx, obj)
            })
            .collect()
    }

    fn record(ctx: &mut Context, obj: ObjId, events: &[&'static str]) -> Rc<RefCell<Vec<String>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        for &ev in events {
            let l = log.clone();
            ctx.on_obj(obj, ev, move |_, _, arg| {
                l.borrow_mut().push(format!("{ev} {}", arg.as_text().unwrap_or("")));
                Ok(())
            });
        }
        log
    }

    #[test]
    fn looping_anim_wraps_to_start() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![sprite("hero").anim("run"), pos(0.0, 0.0)]).unwrap();
        assert_eq!(frames_over(&mut ctx, obj, 5), vec![1, 2, 3, 0, 1]);
        assert_eq!(ctx.c::<Sprite>(obj).unwrap().cur_anim(), Some("run"));
    }

    #[test]
    fn ping_pong_turns_at_both_ends() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![sprite("hero").anim("bounce"), pos(0.0, 0.0)]).unwrap();
        assert_eq!(frames_over(&mut ctx, obj, 5), vec![1, 2, 1, 0, 1]);
    }

    #[test]
    fn one_shot_anim_holds_last_frame_and_ends() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![sprite("hero").anim("once"), pos(0.0, 0.0)]).unwrap();
        let log = record(&mut ctx, obj, &["anim_start", "anim_end"]);
        assert_eq!(frames_over(&mut ctx, obj, 4), vec![1, 2, 2, 2]);
        assert_eq!(ctx.c::<Sprite>(obj).unwrap().cur_anim(), None);
        assert_eq!(*log.borrow(), vec!["anim_start once", "anim_end once"]);
    }

    #[test]
    fn play_and_stop_through_the_context() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![sprite("hero"), pos(0.0, 0.0)]).unwrap();
        let log = record(&mut ctx, obj, &["anim_start", "anim_end"]);

        ctx.play(obj, "idle", PlayOpt::default()).unwrap();
        assert_eq!(frame(&ctx, obj), 3);

        ctx.play(obj, "run", PlayOpt::default()).unwrap();
        assert_eq!(frame(&ctx, obj), 0);
        assert_eq!(ctx.c::<Sprite>(obj).unwrap().cur_anim(), Some("run"));

        // switching anims ends the current one first
        ctx.play(obj, "bounce", PlayOpt::default()).unwrap();
        ctx.stop_anim(obj).unwrap();
        assert_eq!(ctx.c::<Sprite>(obj).unwrap().cur_anim(), None);
        assert_eq!(
            *log.borrow(),
            vec!["anim_start idle", "anim_start run", "anim_end run", "anim_start bounce", "anim_end bounce"]
        );

        assert!(ctx.play(obj, "fly", PlayOpt::default()).is_err());
    }

    #[test]
    fn play_options_override_the_anim() {
        let mut ctx = ctx();
        let obj = ctx.add(comps![sprite("hero"), pos(0.0, 0.0)]).unwrap();
        let opt = PlayOpt { looping: Some(true), ..PlayOpt::default() };
        ctx.play(obj, "once", opt).unwrap();
        assert_eq!(frames_over(&mut ctx, obj, 3), vec![1, 2, 0]);
    }

    #[test]
    fn measure_follows_frame_and_requested_size() {
        let mut ctx = ctx();
        let natural = ctx.add(comps![sprite("hero"), pos(0.0, 0.0)]).unwrap();
        let wide = ctx.add(comps![sprite("hero").width(6.0), pos(0.0, 0.0)]).unwrap();
        let exact = ctx.add(comps![sprite("hero").width(3.0).height(5.0), pos(0.0, 0.0)]).unwrap();
        assert_eq!(ctx.c::<Sprite>(natural).unwrap().size(), Vec2::ZERO);
        ctx.step(0.01).unwrap();
        assert_eq!(ctx.c::<Sprite>(natural).unwrap().size(), Vec2::new(2.0, 2.0));
        assert_eq!(ctx.c::<Sprite>(wide).unwrap().size(), Vec2::new(6.0, 6.0));
        assert_eq!(ctx.c::<Sprite>(exact).unwrap().size(), Vec2::new(3.0, 5.0));
        assert_eq!(ctx.call(natural, "num_frames", EventArg::None).unwrap(), Some(EventArg::Number(4.0)));
    }
}
