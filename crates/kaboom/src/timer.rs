//! # Timers — Delayed and Repeating Callbacks
//!
//! Timers count down scaled `dt` and run their callback on the frame the
//! count reaches zero. A timer may belong to an object: it then pauses while
//! the object (or any ancestor) is paused, and is dropped once the object is
//! gone.
//!
//! ```text
//!   wait(0.5, f)         ──0.5s──► f  (done)
//!   loop_every(0.5, f)   ► f ──0.5s──► f ──0.5s──► f ...
//! ```

use crate::context::Context;
use crate::error::Result;
use crate::event::EventController;
use crate::object::ObjId;

pub type TimerFn = dyn FnMut(&mut Context) -> Result<()>;

pub(crate) struct Timer {
    remaining: f32,
    /// Re-arm period for repeating timers.
    period: Option<f32>,
    owner: Option<ObjId>,
    ctl: EventController,
    action: Box<TimerFn>,
}

/// All live timers of a context.
#[derive(Default)]
pub(crate) struct Timers {
    list: Vec<Timer>,
}

impl Timers {
    fn push(&mut self, remaining: f32, period: Option<f32>, owner: Option<ObjId>, action: Box<TimerFn>) -> EventController {
        let ctl = EventController::new();
        self.list.push(Timer { remaining, period, owner, ctl: ctl.clone(), action });
        ctl
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.list.len()
    }

    /// Cancel every timer owned by `obj`.
    pub(crate) fn cancel_owned(&mut self, obj: ObjId) {
        for t in self.list.iter().filter(|t| t.owner == Some(obj)) {
            t.ctl.cancel();
        }
    }
}

impl Context {
    /// Run `f` once after `secs` seconds of game time.
    pub fn wait(&mut self, secs: f32, f: impl FnMut(&mut Context) -> Result<()> + 'static) -> EventController {
        self.timers.push(secs, None, None, Box::new(f))
    }

    /// Run `f` on the next frame and then every `secs` seconds.
    pub fn loop_every(&mut self, secs: f32, f: impl FnMut(&mut Context) -> Result<()> + 'static) -> EventController {
        self.timers.push(0.0, Some(secs.max(0.0)), None, Box::new(f))
    }

    /// Like [`wait`](Self::wait), but tied to `obj`: it stops counting while
    /// the object is paused and never fires after the object is destroyed.
    pub fn obj_wait(
        &mut self,
        obj: ObjId,
        secs: f32,
        mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static,
    ) -> EventController {
        self.timers.push(secs, None, Some(obj), Box::new(move |ctx: &mut Context| f(ctx, obj)))
    }

    /// Like [`loop_every`](Self::loop_every), tied to `obj`.
    pub fn obj_loop(
        &mut self,
        obj: ObjId,
        secs: f32,
        mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static,
    ) -> EventController {
        self.timers
            .push(0.0, Some(secs.max(0.0)), Some(obj), Box::new(move |ctx: &mut Context| f(ctx, obj)))
    }

    /// Advance every timer by this frame's `dt`. Timers added by callbacks
    /// start counting on the next frame.
    pub(crate) fn tick_timers(&mut self) -> Result<()> {
        let dt = self.time.dt();
        let mut list = std::mem::take(&mut self.timers.list);
        let mut res = Ok(());
        for t in list.iter_mut() {
            if t.ctl.is_cancelled() {
                continue;
            }
            if let Some(owner) = t.owner {
                if !self.scene.exists(owner) {
                    t.ctl.cancel();
                    continue;
                }
                if self.scene.is_paused(owner) {
                    continue;
                }
            }
            if t.ctl.paused() {
                continue;
            }
            t.remaining -= dt;
            if t.remaining > 0.0 {
                continue;
            }
            match t.period {
                Some(p) => t.remaining += p,
                None => t.ctl.cancel(),
            }
            if let Err(e) = (t.action)(self) {
                res = Err(e);
                break;
            }
        }
        list.retain(|t| !t.ctl.is_cancelled());
        list.append(&mut self.timers.list);
        self.timers.list = list;
        res
    }
}
