//! # Debug — Overlay, Log and Fatal Screen
//!
//! Diagnostic state carried by every [`Context`]. With `config.debug` on,
//! the function keys drive it:
//!
//! ```text
//!   F1  inspect (area outlines, fps, tooltip)   F2  clear log
//!   F7  slower  F9  faster                      F8  pause   F10  step one frame
//! ```
//!
//! The overlay is drawn after the scene with `fixed` set, so the camera
//! never moves it:
//!
//! ```text
//!   ┌──────────────────────────────┐
//!   │ fps                       ▮▮ │  pause icon
//!   │        ┌─────────────┐       │
//!   │        │ tag: info   │ ◄──── tooltip of the hovered object
//!   │        └─────────────┘       │
//!   │ log line                     │
//!   │ log line               x0.6  │  time scale
//!   └──────────────────────────────┘
//! ```

use std::collections::VecDeque;

use crate::context::Context;
use crate::draw::{DrawRectOpt, DrawTextOpt, FontAtlas, format_text};
use crate::error::Result;
use crate::input::KeyCode;
use crate::math::{Anchor, Color, Vec2};
use crate::object::ObjId;

const TEXT_SIZE: f32 = 16.0;
const PAD: f32 = 4.0;
const MARGIN: f32 = 8.0;
const TIME_SCALE_STEP: f32 = 0.2;
const MAX_TIME_SCALE: f32 = 2.0;

// ── Log ring ─────────────────────────────────────────────────────────────

/// One line of the on-screen log.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: log::Level,
    pub message: String,
    /// Game time when the line was logged.
    pub time: f32,
}

#[derive(Debug, Clone)]
pub struct DebugState {
    /// Outline areas and show object info under the cursor.
    pub inspect: bool,
    /// Freeze updates. Drawing continues.
    pub paused: bool,
    logs: VecDeque<LogEntry>,
    log_max: usize,
    step_once: bool,
}

impl DebugState {
    pub(crate) fn new(log_max: usize) -> Self {
        Self {
            inspect: false,
            paused: false,
            logs: VecDeque::new(),
            log_max,
            step_once: false,
        }
    }

    /// Oldest first.
    pub fn logs(&self) -> impl Iterator<Item = &LogEntry> {
        self.logs.iter()
    }

    pub fn clear_log(&mut self) {
        self.logs.clear();
    }

    fn push(&mut self, entry: LogEntry) {
        if self.log_max == 0 {
            return;
        }
        while self.logs.len() >= self.log_max {
            self.logs.pop_front();
        }
        self.logs.push_back(entry);
    }

    /// Run updates this frame even though the game is paused.
    pub fn step_frame(&mut self) {
        self.step_once = true;
    }

    /// Whether the update phase runs this frame. Consumes a pending step.
    pub(crate) fn should_update(&mut self) -> bool {
        !self.paused || std::mem::take(&mut self.step_once)
    }
}

// ── Context API ──────────────────────────────────────────────────────────

impl Context {
    /// Log to the terminal and the on-screen log.
    pub fn debug_log(&mut self, msg: impl Into<String>) {
        let message = msg.into();
        log::info!("{message}");
        let time = self.time.elapsed();
        self.debug.push(LogEntry { level: log::Level::Info, message, time });
    }

    pub fn debug_error(&mut self, msg: impl Into<String>) {
        let message = msg.into();
        log::error!("{message}");
        let time = self.time.elapsed();
        self.debug.push(LogEntry { level: log::Level::Error, message, time });
    }

    /// Draw calls issued by the last finished frame.
    pub fn draw_calls(&self) -> u32 {
        self.gfx.draw_calls()
    }

    pub(crate) fn handle_debug_keys(&mut self) {
        if !self.config.debug {
            return;
        }
        let pressed = |k| self.input.is_key_pressed(k);
        let (inspect, clear, pause, slower, faster, step) = (
            pressed(KeyCode::F1),
            pressed(KeyCode::F2),
            pressed(KeyCode::F8),
            pressed(KeyCode::F7),
            pressed(KeyCode::F9),
            pressed(KeyCode::F10),
        );
        if inspect {
            self.debug.inspect = !self.debug.inspect;
        }
        if clear {
            self.debug.clear_log();
        }
        if pause {
            self.debug.paused = !self.debug.paused;
            log::debug!("paused: {}", self.debug.paused);
        }
        if slower || faster {
            let delta = if faster { TIME_SCALE_STEP } else { -TIME_SCALE_STEP };
            let scale = (self.time.time_scale() + delta).clamp(0.0, MAX_TIME_SCALE);
            self.time.set_time_scale(scale);
        }
        if step {
            self.debug.step_frame();
        }
    }

    /// Topmost object with an area under the cursor.
    fn hovered(&self) -> Option<ObjId> {
        self.get_all("area").into_iter().rev().find(|&id| self.is_hovering(id))
    }

    // ── Overlay ──────────────────────────────────────────────────────

    pub(crate) fn draw_debug(&mut self) -> Result<()> {
        let font = self.font.clone();
        let (w, h) = (self.gfx.width(), self.gfx.height());

        if self.debug.inspect {
            let fps = format!("{:.0}", self.time.fps());
            self.draw_label(&font, &fps, Vec2::new(MARGIN, MARGIN), Anchor::TopLeft)?;

            if let Some(obj) = self.hovered() {
                let lines = self.obj(obj).map(|o| o.inspect()).unwrap_or_default();
                if !lines.is_empty() {
                    let mouse = self.input.mouse_pos();
                    let anchor = if mouse.x > w * 0.5 { Anchor::TopRight } else { Anchor::TopLeft };
                    self.draw_label(&font, &lines.join("\n"), mouse + Vec2::new(0.0, MARGIN), anchor)?;
                }
            }
        }

        if self.debug.paused {
            self.draw_pause_icon(Vec2::new(w - MARGIN, MARGIN))?;
        }

        let scale = self.time.time_scale();
        if (scale - 1.0).abs() > f32::EPSILON {
            let label = format!("x{scale:.1}");
            self.draw_label(&font, &label, Vec2::new(w - MARGIN, h - MARGIN), Anchor::BotRight)?;
        }

        if !self.debug.logs.is_empty() {
            let lines: Vec<String> = self
                .debug
                .logs()
                .map(|e| match e.level {
                    log::Level::Error => format!("[{:.2}] error: {}", e.time, e.message),
                    _ => format!("[{:.2}] {}", e.time, e.message),
                })
                .collect();
            self.draw_label(&font, &lines.join("\n"), Vec2::new(MARGIN, h - MARGIN), Anchor::BotLeft)?;
        }
        Ok(())
    }

    /// Text in a dark box whose `anchor` point sits at `pos`.
    fn draw_label(&mut self, font: &FontAtlas, text: &str, pos: Vec2, anchor: Anchor) -> Result<()> {
        let opt = DrawTextOpt::new(text).size(TEXT_SIZE).fixed(true);
        let ft = format_text(font, &opt)?;
        let (bw, bh) = (ft.width + PAD * 2.0, ft.height + PAD * 2.0);
        let top_left = pos + anchor.corner_offset(bw, bh);
        self.gfx.draw_rect(
            &DrawRectOpt::new(bw, bh)
                .radius(PAD)
                .pos(top_left)
                .color(Color::BLACK)
                .opacity(0.8)
                .fixed(true),
        )?;
        self.gfx.draw_text(font, &opt.pos(top_left + Vec2::splat(PAD)))?;
        Ok(())
    }

    fn draw_pause_icon(&mut self, top_right: Vec2) -> Result<()> {
        let size = TEXT_SIZE * 2.0;
        let top_left = top_right - Vec2::new(size, 0.0);
        self.gfx.draw_rect(
            &DrawRectOpt::new(size, size)
                .radius(PAD)
                .pos(top_left)
                .color(Color::BLACK)
                .opacity(0.8)
                .fixed(true),
        )?;
        let (bar_w, bar_h) = (size * 0.2, size * 0.6);
        for x in [size * 0.25, size * 0.55] {
            self.gfx.draw_rect(
                &DrawRectOpt::new(bar_w, bar_h)
                    .pos(top_left + Vec2::new(x, size * 0.2))
                    .fixed(true),
            )?;
        }
        Ok(())
    }

    // ── Fatal screen ─────────────────────────────────────────────────

    /// Full-screen report of the error that stopped the game.
    pub(crate) fn draw_fatal(&mut self) -> Result<()> {
        let Some(err) = self.fatal.as_ref() else {
            return Ok(());
        };
        let (name, message) = (err.name(), err.to_string());
        let font = self.font.clone();
        let (w, h) = (self.gfx.width(), self.gfx.height());

        self.gfx.draw_rect(&DrawRectOpt::new(w, h).color(Color::rgb8(0, 0, 255)).fixed(true))?;
        let title = DrawTextOpt::new(name)
            .size(TEXT_SIZE)
            .pos(Vec2::splat(MARGIN))
            .color(Color::rgb8(255, 165, 0))
            .fixed(true);
        let ft = self.gfx.draw_text(&font, &title)?;
        let body = DrawTextOpt::new(message)
            .size(TEXT_SIZE)
            .width(w - MARGIN * 2.0)
            .pos(Vec2::new(MARGIN, MARGIN * 2.0 + ft.height))
            .fixed(true);
        self.gfx.draw_text(&font, &body)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KaboomConfig;
    use crate::input::InputEvent;

    fn state(max: usize) -> DebugState {
        DebugState::new(max)
    }

    #[test]
    fn log_ring_drops_oldest() {
        let mut d = state(2);
        for (i, msg) in ["a", "b", "c"].iter().enumerate() {
            d.push(LogEntry { level: log::Level::Info, message: msg.to_string(), time: i as f32 });
        }
        let msgs: Vec<&str> = d.logs().map(|e| e.message.as_str()).collect();
        assert_eq!(msgs, ["b", "c"]);
        d.clear_log();
        assert_eq!(d.logs().count(), 0);
    }

    #[test]
    fn step_while_paused_runs_once() {
        let mut d = state(8);
        assert!(d.should_update());
        d.paused = true;
        assert!(!d.should_update());
        d.step_frame();
        assert!(d.should_update());
        assert!(!d.should_update());
    }

    #[test]
    fn function_keys_toggle_and_scale() {
        let mut ctx = Context::headless(KaboomConfig::default()).unwrap();
        ctx.input.push(InputEvent::KeyDown(KeyCode::F1));
        ctx.input.push(InputEvent::KeyDown(KeyCode::F9));
        ctx.step(0.1).unwrap();
        assert!(ctx.debug.inspect);
        assert!((ctx.time.time_scale() - 1.2).abs() < 1e-4);

        ctx.input.push(InputEvent::KeyDown(KeyCode::F8));
        ctx.step(0.1).unwrap();
        assert!(ctx.debug.paused);
    }

    #[test]
    fn keys_ignored_without_debug() {
        let mut ctx = Context::headless(KaboomConfig::default().debug(false)).unwrap();
        ctx.input.push(InputEvent::KeyDown(KeyCode::F1));
        ctx.step(0.1).unwrap();
        assert!(!ctx.debug.inspect);
    }

    #[test]
    fn debug_log_keeps_game_time() {
        let mut ctx = Context::headless(KaboomConfig::default()).unwrap();
        ctx.step(0.5).unwrap();
        ctx.debug_log("hello");
        ctx.debug_error("oops");
        let logs: Vec<&LogEntry> = ctx.debug.logs().collect();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[1].level, log::Level::Error);
        assert!((logs[0].time - 0.5).abs() < 1e-4);
    }
}
