//! # Input — Keyboard and Mouse State
//!
//! The window pushes raw events into a queue as they arrive. At the start of
//! every frame the queue is applied, so all game code in a frame sees the
//! same input:
//!
//! ```text
//!             press            next frame          release         next frame
//!   Idle ───────────► Pressed ───────────► Down ───────────► Released ───────► Idle
//! ```
//!
//! `is_*_pressed` and `is_*_released` are true for exactly one frame;
//! `is_*_down` is true from the press until the release.

use std::collections::HashMap;
use std::hash::Hash;

pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

use crate::context::Context;
use crate::error::Result;
use crate::event::{EventController, Handlers};
use crate::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    Idle,
    Pressed,
    Down,
    Released,
}

/// Per-button state for one kind of input.
#[derive(Debug, Clone)]
pub struct Buttons<T: Eq + Hash + Copy> {
    states: HashMap<T, ButtonState>,
}

impl<T: Eq + Hash + Copy> Default for Buttons<T> {
    fn default() -> Self {
        Self { states: HashMap::new() }
    }
}

impl<T: Eq + Hash + Copy> Buttons<T> {
    pub fn state(&self, b: T) -> ButtonState {
        self.states.get(&b).copied().unwrap_or_default()
    }

    pub fn is_pressed(&self, b: T) -> bool {
        self.state(b) == ButtonState::Pressed
    }

    /// Held, including the frame it was pressed.
    pub fn is_down(&self, b: T) -> bool {
        matches!(self.state(b), ButtonState::Pressed | ButtonState::Down)
    }

    pub fn is_released(&self, b: T) -> bool {
        self.state(b) == ButtonState::Released
    }

    fn with_state(&self, pred: impl Fn(ButtonState) -> bool) -> Vec<T> {
        self.states.iter().filter(|(_, s)| pred(**s)).map(|(b, _)| *b).collect()
    }

    /// Key repeat while held is ignored.
    fn press(&mut self, b: T) {
        let s = self.states.entry(b).or_default();
        if matches!(*s, ButtonState::Idle | ButtonState::Released) {
            *s = ButtonState::Pressed;
        }
    }

    fn release(&mut self, b: T) {
        if let Some(s) = self.states.get_mut(&b) {
            if matches!(*s, ButtonState::Pressed | ButtonState::Down) {
                *s = ButtonState::Released;
            }
        }
    }

    /// Age one frame: `Pressed` becomes `Down`, `Released` becomes `Idle`.
    fn advance(&mut self) {
        self.states.retain(|_, s| *s != ButtonState::Released);
        for s in self.states.values_mut() {
            if *s == ButtonState::Pressed {
                *s = ButtonState::Down;
            }
        }
    }
}

/// A raw input event, in logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    MouseMove(Vec2),
}

#[derive(Debug, Clone, Default)]
pub struct Input {
    keys: Buttons<KeyCode>,
    mouse: Buttons<MouseButton>,
    queue: Vec<InputEvent>,
    mouse_pos: Vec2,
    mouse_delta: Vec2,
    moved: bool,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event. It takes effect at the start of the next frame.
    pub fn push(&mut self, ev: InputEvent) {
        self.queue.push(ev);
    }

    /// Age button states and apply queued events.
    pub(crate) fn frame(&mut self) {
        self.keys.advance();
        self.mouse.advance();
        let prev = self.mouse_pos;
        self.moved = false;
        for ev in self.queue.drain(..) {
            match ev {
                InputEvent::KeyDown(k) => self.keys.press(k),
                InputEvent::KeyUp(k) => self.keys.release(k),
                InputEvent::MouseDown(b) => self.mouse.press(b),
                InputEvent::MouseUp(b) => self.mouse.release(b),
                InputEvent::MouseMove(p) => {
                    self.mouse_pos = p;
                    self.moved = true;
                }
            }
        }
        self.mouse_delta = self.mouse_pos - prev;
    }

    pub fn keys(&self) -> &Buttons<KeyCode> {
        &self.keys
    }

    pub fn mouse(&self) -> &Buttons<MouseButton> {
        &self.mouse
    }

    pub fn is_key_pressed(&self, k: KeyCode) -> bool {
        self.keys.is_pressed(k)
    }

    pub fn is_key_down(&self, k: KeyCode) -> bool {
        self.keys.is_down(k)
    }

    pub fn is_key_released(&self, k: KeyCode) -> bool {
        self.keys.is_released(k)
    }

    pub fn is_mouse_pressed(&self, b: MouseButton) -> bool {
        self.mouse.is_pressed(b)
    }

    pub fn is_mouse_down(&self, b: MouseButton) -> bool {
        self.mouse.is_down(b)
    }

    pub fn is_mouse_released(&self, b: MouseButton) -> bool {
        self.mouse.is_released(b)
    }

    /// Cursor in logical screen coordinates.
    pub fn mouse_pos(&self) -> Vec2 {
        self.mouse_pos
    }

    /// Cursor movement since the previous frame.
    pub fn mouse_delta(&self) -> Vec2 {
        self.mouse_delta
    }

    pub fn is_mouse_moved(&self) -> bool {
        self.moved
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────

pub type KeyHandler = dyn FnMut(&mut Context, KeyCode) -> Result<()>;
pub type MouseHandler = dyn FnMut(&mut Context, MouseButton, Vec2) -> Result<()>;
pub type MoveHandler = dyn FnMut(&mut Context, Vec2, Vec2) -> Result<()>;

#[derive(Default)]
pub(crate) struct InputHandlers {
    key_press: Handlers<KeyHandler>,
    key_down: Handlers<KeyHandler>,
    key_release: Handlers<KeyHandler>,
    mouse_press: Handlers<MouseHandler>,
    mouse_down: Handlers<MouseHandler>,
    mouse_release: Handlers<MouseHandler>,
    mouse_move: Handlers<MoveHandler>,
}

fn key_filter(
    key: Option<KeyCode>,
    mut f: impl FnMut(&mut Context, KeyCode) -> Result<()> + 'static,
) -> Box<KeyHandler> {
    Box::new(move |ctx: &mut Context, k: KeyCode| match key {
        Some(want) if want != k => Ok(()),
        _ => f(ctx, k),
    })
}

fn mouse_filter(
    button: Option<MouseButton>,
    mut f: impl FnMut(&mut Context, MouseButton, Vec2) -> Result<()> + 'static,
) -> Box<MouseHandler> {
    Box::new(move |ctx: &mut Context, b: MouseButton, p: Vec2| match button {
        Some(want) if want != b => Ok(()),
        _ => f(ctx, b, p),
    })
}

impl Context {
    /// `key` pressed this frame. `None` listens to every key.
    pub fn on_key_press(&mut self, key: Option<KeyCode>, f: impl FnMut(&mut Context, KeyCode) -> Result<()> + 'static) -> EventController {
        self.input_handlers.key_press.add(key_filter(key, f))
    }

    /// Every frame `key` is held.
    pub fn on_key_down(&mut self, key: Option<KeyCode>, f: impl FnMut(&mut Context, KeyCode) -> Result<()> + 'static) -> EventController {
        self.input_handlers.key_down.add(key_filter(key, f))
    }

    pub fn on_key_release(&mut self, key: Option<KeyCode>, f: impl FnMut(&mut Context, KeyCode) -> Result<()> + 'static) -> EventController {
        self.input_handlers.key_release.add(key_filter(key, f))
    }

    /// Handlers get the button and the cursor position.
    pub fn on_mouse_press(
        &mut self,
        button: Option<MouseButton>,
        f: impl FnMut(&mut Context, MouseButton, Vec2) -> Result<()> + 'static,
    ) -> EventController {
        self.input_handlers.mouse_press.add(mouse_filter(button, f))
    }

    pub fn on_mouse_down(
        &mut self,
        button: Option<MouseButton>,
        f: impl FnMut(&mut Context, MouseButton, Vec2) -> Result<()> + 'static,
    ) -> EventController {
        self.input_handlers.mouse_down.add(mouse_filter(button, f))
    }

    pub fn on_mouse_release(
        &mut self,
        button: Option<MouseButton>,
        f: impl FnMut(&mut Context, MouseButton, Vec2) -> Result<()> + 'static,
    ) -> EventController {
        self.input_handlers.mouse_release.add(mouse_filter(button, f))
    }

    /// Cursor moved this frame. Handlers get the position and the delta.
    pub fn on_mouse_move(&mut self, f: impl FnMut(&mut Context, Vec2, Vec2) -> Result<()> + 'static) -> EventController {
        self.input_handlers.mouse_move.add(Box::new(f))
    }

    /// Fire input handlers for this frame's button states.
    pub(crate) fn fire_input(&mut self) -> Result<()> {
        let k = &self.input.keys;
        let (pressed, down, released) = (k.with_state(is_pressed), k.with_state(is_held), k.with_state(is_released));
        self.fire_keys(|h| &mut h.key_press, pressed)?;
        self.fire_keys(|h| &mut h.key_down, down)?;
        self.fire_keys(|h| &mut h.key_release, released)?;

        let m = &self.input.mouse;
        let (pressed, down, released) = (m.with_state(is_pressed), m.with_state(is_held), m.with_state(is_released));
        self.fire_buttons(|h| &mut h.mouse_press, pressed)?;
        self.fire_buttons(|h| &mut h.mouse_down, down)?;
        self.fire_buttons(|h| &mut h.mouse_release, released)?;

        if self.input.moved {
            let (pos, delta) = (self.input.mouse_pos, self.input.mouse_delta);
            for e in self.input_handlers.mouse_move.snapshot() {
                e.invoke(|f| f(self, pos, delta))?;
            }
        }
        Ok(())
    }

    fn fire_keys(&mut self, list: fn(&mut InputHandlers) -> &mut Handlers<KeyHandler>, keys: Vec<KeyCode>) -> Result<()> {
        for k in keys {
            for e in list(&mut self.input_handlers).snapshot() {
                e.invoke(|f| f(self, k))?;
            }
        }
        Ok(())
    }

    fn fire_buttons(
        &mut self,
        list: fn(&mut InputHandlers) -> &mut Handlers<MouseHandler>,
        buttons: Vec<MouseButton>,
    ) -> Result<()> {
        let pos = self.input.mouse_pos;
        for b in buttons {
            for e in list(&mut self.input_handlers).snapshot() {
                e.invoke(|f| f(self, b, pos))?;
            }
        }
        Ok(())
    }
}

fn is_pressed(s: ButtonState) -> bool {
    s == ButtonState::Pressed
}

fn is_held(s: ButtonState) -> bool {
    matches!(s, ButtonState::Pressed | ButtonState::Down)
}

fn is_released(s: ButtonState) -> bool {
    s == ButtonState::Released
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KaboomConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn key_walks_through_states() {
        let mut input = Input::new();
        input.push(InputEvent::KeyDown(KeyCode::Space));
        input.frame();
        assert!(input.is_key_pressed(KeyCode::Space));
        assert!(input.is_key_down(KeyCode::Space));

        // held, with OS key repeat
        input.push(InputEvent::KeyDown(KeyCode::Space));
        input.frame();
        assert!(!input.is_key_pressed(KeyCode::Space));
        assert!(input.is_key_down(KeyCode::Space));

        input.push(InputEvent::KeyUp(KeyCode::Space));
        input.frame();
        assert!(input.is_key_released(KeyCode::Space));
        assert!(!input.is_key_down(KeyCode::Space));

        input.frame();
        assert_eq!(input.keys().state(KeyCode::Space), ButtonState::Idle);
    }

    #[test]
    fn mouse_delta_is_per_frame() {
        let mut input = Input::new();
        input.push(InputEvent::MouseMove(Vec2::new(10.0, 10.0)));
        input.push(InputEvent::MouseMove(Vec2::new(15.0, 12.0)));
        input.frame();
        assert_eq!(input.mouse_pos(), Vec2::new(15.0, 12.0));
        assert_eq!(input.mouse_delta(), Vec2::new(15.0, 12.0));
        input.frame();
        assert_eq!(input.mouse_delta(), Vec2::ZERO);
        assert!(!input.is_mouse_moved());
    }

    #[test]
    fn handlers_fire_for_matching_keys() {
        let mut ctx = Context::headless(KaboomConfig::default()).unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = log.clone();
        ctx.on_key_press(Some(KeyCode::KeyA), move |_, k| {
            l.borrow_mut().push(format!("press {k:?}"));
            Ok(())
        });
        let l = log.clone();
        ctx.on_key_down(None, move |_, k| {
            l.borrow_mut().push(format!("down {k:?}"));
            Ok(())
        });
        ctx.input.push(InputEvent::KeyDown(KeyCode::KeyA));
        ctx.input.push(InputEvent::KeyDown(KeyCode::KeyB));
        ctx.step(0.016).unwrap();
        ctx.step(0.016).unwrap();
        let log = log.borrow();
        assert_eq!(log.iter().filter(|s| s.starts_with("press")).count(), 1);
        assert_eq!(log.iter().filter(|s| s.as_str() == "down KeyA").count(), 2);
        assert_eq!(log.iter().filter(|s| s.as_str() == "down KeyB").count(), 2);
    }

    #[test]
    fn mouse_press_reports_position() {
        let mut ctx = Context::headless(KaboomConfig::default()).unwrap();
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        ctx.on_mouse_press(Some(MouseButton::Left), move |_, _, p| {
            *s.borrow_mut() = Some(p);
            Ok(())
        });
        ctx.input.push(InputEvent::MouseMove(Vec2::new(3.0, 4.0)));
        ctx.input.push(InputEvent::MouseDown(MouseButton::Left));
        ctx.step(0.016).unwrap();
        assert_eq!(*seen.borrow(), Some(Vec2::new(3.0, 4.0)));
    }
}
