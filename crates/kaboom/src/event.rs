//! # Events — Handler Lists and Controllers
//!
//! Every subscription (per-object `on`, tag-scoped `on`, input handlers,
//! timers) lives in a [`Handlers`] list and hands back an
//! [`EventController`]. A controller shares two flags with its entry:
//!
//! ```text
//!   EventController ──Rc──┐
//!                         ▼
//!                    ┌──────────┐        ┌─────────────────────────┐
//!                    │  Flags   │◄──Rc───│ Entry { flags, handler } │◄── Handlers list
//!                    │ paused   │        └─────────────────────────┘
//!                    │ cancelled│
//!                    └──────────┘
//! ```
//!
//! `paused` suppresses calls without unregistering; `cancel` is permanent and
//! the entry is pruned the next time the list is walked.
//!
//! ## Deferred Attach / Detach
//!
//! Triggering never iterates the live list. [`Handlers::snapshot`] prunes
//! cancelled entries and returns `Rc` clones of the rest; the caller walks
//! the snapshot while handlers are free to subscribe or cancel. A handler
//! added mid-trigger first runs on the next trigger; a handler cancelled
//! mid-trigger is skipped if it has not run yet.
//!
//! Each handler sits in a `RefCell`. If a handler triggers the event it is
//! currently handling, the inner trigger skips it instead of re-entering.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::error::Result;

#[derive(Debug, Default)]
struct Flags {
    paused: Cell<bool>,
    cancelled: Cell<bool>,
}

/// Handle to one or more subscriptions.
#[derive(Clone, Default)]
pub struct EventController {
    flags: Vec<Rc<Flags>>,
}

impl fmt::Debug for EventController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventController")
            .field("handlers", &self.flags.len())
            .field("paused", &self.paused())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl EventController {
    /// A fresh controller for a subscription kept outside a [`Handlers`]
    /// list, such as a timer.
    pub(crate) fn new() -> Self {
        Self { flags: vec![Rc::new(Flags::default())] }
    }

    /// A controller that controls nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Combine controllers so pausing or cancelling one affects all.
    pub fn join(controllers: impl IntoIterator<Item = EventController>) -> Self {
        Self {
            flags: controllers.into_iter().flat_map(|c| c.flags).collect(),
        }
    }

    /// Paused state of the first handler.
    pub fn paused(&self) -> bool {
        self.flags.first().is_some_and(|f| f.paused.get())
    }

    pub fn set_paused(&self, paused: bool) {
        for f in &self.flags {
            f.paused.set(paused);
        }
    }

    pub fn cancel(&self) {
        for f in &self.flags {
            f.cancelled.set(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        !self.flags.is_empty() && self.flags.iter().all(|f| f.cancelled.get())
    }
}

/// One registered handler.
pub struct Entry<F: ?Sized> {
    flags: Rc<Flags>,
    handler: RefCell<Box<F>>,
}

impl<F: ?Sized> Entry<F> {
    pub fn is_cancelled(&self) -> bool {
        self.flags.cancelled.get()
    }

    /// Run the handler unless it is paused, cancelled, or already running.
    pub fn invoke(&self, call: impl FnOnce(&mut F) -> Result<()>) -> Result<()> {
        if self.flags.cancelled.get() || self.flags.paused.get() {
            return Ok(());
        }
        match self.handler.try_borrow_mut() {
            Ok(mut handler) => call(&mut **handler),
            Err(_) => Ok(()),
        }
    }
}

/// An ordered list of handlers of one signature.
pub struct Handlers<F: ?Sized> {
    entries: Vec<Rc<Entry<F>>>,
}

impl<F: ?Sized> Default for Handlers<F> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<F: ?Sized> Handlers<F> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, handler: Box<F>) -> EventController {
        let flags = Rc::new(Flags::default());
        self.entries.push(Rc::new(Entry {
            flags: flags.clone(),
            handler: RefCell::new(handler),
        }));
        EventController { flags: vec![flags] }
    }

    /// Drop cancelled entries and return the rest for iteration.
    pub fn snapshot(&mut self) -> Vec<Rc<Entry<F>>> {
        self.entries.retain(|e| !e.is_cancelled());
        self.entries.clone()
    }

    /// Live (not cancelled) handlers, paused ones included.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_cancelled()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for e in &self.entries {
            e.flags.cancelled.set(true);
        }
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Counter = dyn FnMut(&mut u32) -> Result<()>;

    fn fire(list: &mut Handlers<Counter>, n: &mut u32) {
        for e in list.snapshot() {
            e.invoke(|f| f(n)).unwrap();
        }
    }

    #[test]
    fn cancelled_handler_never_runs_again() {
        let mut list: Handlers<Counter> = Handlers::new();
        let ctl = list.add(Box::new(|n| {
            *n += 1;
            Ok(())
        }));
        let mut n = 0;
        fire(&mut list, &mut n);
        ctl.cancel();
        fire(&mut list, &mut n);
        fire(&mut list, &mut n);
        assert_eq!(n, 1);
        assert!(list.is_empty());
    }

    #[test]
    fn paused_handler_resumes() {
        let mut list: Handlers<Counter> = Handlers::new();
        let ctl = list.add(Box::new(|n| {
            *n += 1;
            Ok(())
        }));
        let mut n = 0;
        ctl.set_paused(true);
        fire(&mut list, &mut n);
        assert_eq!(n, 0);
        assert_eq!(list.len(), 1);
        ctl.set_paused(false);
        fire(&mut list, &mut n);
        assert_eq!(n, 1);
    }

    #[test]
    fn joined_controllers_act_together() {
        let mut list: Handlers<Counter> = Handlers::new();
        let a = list.add(Box::new(|n| {
            *n += 1;
            Ok(())
        }));
        let b = list.add(Box::new(|n| {
            *n += 10;
            Ok(())
        }));
        let both = EventController::join([a.clone(), b]);
        both.set_paused(true);
        assert!(a.paused());
        let mut n = 0;
        fire(&mut list, &mut n);
        assert_eq!(n, 0);
        both.cancel();
        assert!(both.is_cancelled());
        assert!(list.is_empty());
    }

    #[test]
    fn cancel_during_iteration_skips_pending_entry() {
        let mut list: Handlers<Counter> = Handlers::new();
        let later: Rc<RefCell<Option<EventController>>> = Rc::default();
        let hook = later.clone();
        list.add(Box::new(move |n| {
            *n += 1;
            if let Some(c) = hook.borrow().as_ref() {
                c.cancel();
            }
            Ok(())
        }));
        let second = list.add(Box::new(|n| {
            *n += 100;
            Ok(())
        }));
        *later.borrow_mut() = Some(second);
        let mut n = 0;
        fire(&mut list, &mut n);
        assert_eq!(n, 1);
    }

    #[test]
    fn errors_propagate() {
        let mut list: Handlers<Counter> = Handlers::new();
        list.add(Box::new(|_| Err(crate::error::KaboomError::custom("boom"))));
        let e = list.snapshot().remove(0);
        assert!(e.invoke(|f| f(&mut 0)).is_err());
    }
}
