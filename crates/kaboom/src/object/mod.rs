//! # Game Objects — Scene Tree, Components and Lifecycle
//!
//! A game object is a slot in the [`Scene`] arena holding an ordered list of
//! components, a set of tags, per-object event handlers and child links.
//! Everything that mutates objects goes through [`Context`], because hooks
//! and handlers need the whole game while they run.
//!
//! ```text
//!   ctx.add(comps![..])          ctx.use_comp(obj, c)       ctx.unuse(obj, "id")
//!        │                             │                          │
//!        ▼                             ▼                          ▼
//!   make ─► attach ─► add hooks   replace same id ─► require   destroy hook,
//!                                 check ─► add hook           cancel cleanups
//!
//!   frame:  update (children first) ─► collision check ─► draw (parent first)
//! ```
//!
//! ## Event order
//!
//! Triggering an event on an object calls, in order: the component hooks in
//! merge order, the object's own handlers in registration order, then the
//! tag-scoped handlers registered through [`Context::on`].
//!
//! Events triggered on an object while one of its components is running a
//! hook are queued and delivered right after that hook returns, so the
//! running component still receives them.

mod component;
mod id;
mod scene;

use std::collections::VecDeque;

pub use component::{AsAny, CompEntry, Component, EventArg};
pub use id::ObjId;
pub use scene::{GameObj, Scene};

use crate::comps::Mask;
use crate::context::Context;
use crate::error::{KaboomError, Result};
use crate::event::{EventController, Handlers};
use crate::gfx::StencilMode;
use crate::math::{Mat4, Vec2, mat4_mul_vec2};

/// Handler attached to an object or a tag.
pub type ObjHandler = dyn FnMut(&mut Context, ObjId, &EventArg) -> Result<()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hook {
    Add,
    Update,
    Draw,
    Destroy,
    DrawInspect,
}

/// Bookkeeping for components that are out of their slot running a hook.
#[derive(Default)]
pub(crate) struct HookState {
    active: Vec<(ObjId, u64)>,
    pending: VecDeque<(ObjId, String, EventArg)>,
    /// Objects whose queue is being delivered further up the call stack.
    draining: Vec<ObjId>,
}

impl HookState {
    fn is_running(&self, obj: ObjId) -> bool {
        self.active.iter().any(|(o, _)| *o == obj)
    }

    fn is_draining(&self, obj: ObjId) -> bool {
        self.draining.contains(&obj)
    }
}

// ── Creation ─────────────────────────────────────────────────────────────

impl Context {
    /// Create a detached object. It joins the game when attached.
    pub fn make(&mut self, entries: Vec<CompEntry>) -> Result<ObjId> {
        let id = self.scene.create();
        for entry in entries {
            self.use_entry(id, entry)?;
        }
        Ok(id)
    }

    /// Create an object under the root.
    pub fn add(&mut self, entries: Vec<CompEntry>) -> Result<ObjId> {
        let root = self.scene.root();
        self.add_child(root, entries)
    }

    /// Create an object under `parent`.
    pub fn add_child(&mut self, parent: ObjId, entries: Vec<CompEntry>) -> Result<ObjId> {
        let id = self.make(entries)?;
        self.attach(parent, id)?;
        Ok(id)
    }

    /// Move `child` under `parent`. If that puts it into the live tree, its
    /// requirements are checked and the `add` hooks of its subtree run.
    pub fn attach(&mut self, parent: ObjId, child: ObjId) -> Result<()> {
        let was_live = self.scene.exists(child);
        self.scene.link(parent, child);
        if was_live || !self.scene.exists(child) {
            return Ok(());
        }
        for id in self.scene.subtree(child) {
            let keys = self.scene.get(id).map(GameObj::slot_keys).unwrap_or_default();
            for key in &keys {
                self.check_require(id, *key)?;
            }
            self.run_hook(id, Hook::Add)?;
            self.fire_handlers(id, "add", &EventArg::None)?;
        }
        Ok(())
    }

    /// Attach a component or tag to an object at runtime.
    pub fn use_comp(&mut self, obj: ObjId, entry: impl Into<CompEntry>) -> Result<()> {
        self.use_entry(obj, entry.into())
    }

    fn use_entry(&mut self, obj: ObjId, entry: CompEntry) -> Result<()> {
        let comp = match entry {
            CompEntry::Tag(tag) => {
                if let Some(o) = self.scene.get_mut(obj) {
                    if !o.tags.contains(&tag) {
                        o.tags.push(tag);
                    }
                }
                return Ok(());
            }
            CompEntry::Comp(comp) => comp,
        };
        if let Some(cid) = comp.id() {
            if self.scene.get(obj).is_some_and(|o| o.has_comp(cid)) {
                let cid = cid.to_string();
                self.unuse(obj, &cid)?;
            }
        }
        let Some(o) = self.scene.get_mut(obj) else {
            return Ok(());
        };
        let key = o.push_slot(comp);
        if self.scene.exists(obj) {
            if let Err(e) = self.check_require(obj, key) {
                if let Some(o) = self.scene.get_mut(obj) {
                    o.slots.retain(|s| s.key != key);
                }
                return Err(e);
            }
            self.run_hook_one(obj, key, Hook::Add)?;
        }
        Ok(())
    }

    fn check_require(&self, obj: ObjId, key: u64) -> Result<()> {
        match self.scene.get(obj).and_then(|o| o.missing_require(key)) {
            Some((comp, requires)) => Err(KaboomError::MissingRequire { comp, requires }),
            None => Ok(()),
        }
    }

    /// Remove a tag or named component. A removed component's `destroy`
    /// hook runs and every handler it registered on the host is cancelled.
    pub fn unuse(&mut self, obj: ObjId, id: &str) -> Result<()> {
        let Some(o) = self.scene.get_mut(obj) else {
            return Ok(());
        };
        o.tags.retain(|t| t != id);
        let Some(pos) = o.slots.iter().position(|s| s.id.as_deref() == Some(id)) else {
            return Ok(());
        };
        let slot = o.slots.remove(pos);
        for c in &slot.cleanups {
            c.cancel();
        }
        if let Some(mut comp) = slot.comp {
            self.hooks.active.push((obj, slot.key));
            let res = comp.destroy(self, obj);
            self.hooks.active.pop();
            self.flush_pending(obj)?;
            res?;
        }
        Ok(())
    }
}

// ── Queries ──────────────────────────────────────────────────────────────

impl Context {
    pub fn root(&self) -> ObjId {
        self.scene.root()
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn obj(&self, id: ObjId) -> Option<&GameObj> {
        self.scene.get(id)
    }

    pub fn obj_mut(&mut self, id: ObjId) -> Option<&mut GameObj> {
        self.scene.get_mut(id)
    }

    pub fn exists(&self, id: ObjId) -> bool {
        self.scene.exists(id)
    }

    pub fn is(&self, id: ObjId, tag: &str) -> bool {
        self.scene.get(id).is_some_and(|o| o.is(tag))
    }

    pub fn is_all(&self, id: ObjId, tags: &[&str]) -> bool {
        self.scene.get(id).is_some_and(|o| o.is_all(tags))
    }

    /// A component of the object, by type.
    pub fn c<T: Component>(&self, id: ObjId) -> Option<&T> {
        self.scene.get(id)?.c::<T>()
    }

    pub fn c_mut<T: Component>(&mut self, id: ObjId) -> Option<&mut T> {
        self.scene.get_mut(id)?.c_mut::<T>()
    }

    /// Direct children of the root carrying `tag`, sorted by z.
    pub fn get(&self, tag: &str) -> Vec<ObjId> {
        self.scene.query(self.scene.root(), tag, false)
    }

    /// Every live object carrying `tag`, at any depth, sorted by z.
    pub fn get_all(&self, tag: &str) -> Vec<ObjId> {
        self.scene.query(self.scene.root(), tag, true)
    }

    pub fn children(&self, id: ObjId) -> Vec<ObjId> {
        self.scene.children(id)
    }

    pub fn world_transform(&self, id: ObjId) -> Mat4 {
        self.scene.world_transform(id)
    }

    /// Object-local point to world space.
    pub fn obj_to_world(&self, id: ObjId, p: Vec2) -> Vec2 {
        mat4_mul_vec2(&self.scene.world_transform(id), p)
    }

    /// World point to object-local space.
    pub fn obj_from_world(&self, id: ObjId, p: Vec2) -> Vec2 {
        mat4_mul_vec2(&self.scene.world_transform(id).inverse(), p)
    }

    /// Object-local point to screen space, honoring `fixed`.
    pub fn obj_to_screen(&self, id: ObjId, p: Vec2) -> Vec2 {
        let world = self.obj_to_world(id, p);
        if self.scene.is_fixed(id) {
            world
        } else {
            self.camera.to_screen(world)
        }
    }

    /// Route a member call to the component that contributed `member` last.
    /// Returns `None` when no component answers it.
    pub fn call(&mut self, obj: ObjId, member: &str, arg: impl Into<EventArg>) -> Result<Option<EventArg>> {
        let Some(key) = self.scene.get(obj).and_then(|o| o.provider(member)) else {
            return Ok(None);
        };
        let arg = arg.into();
        let Some(mut comp) = self.take_comp(obj, key) else {
            return Ok(None);
        };
        self.hooks.active.push((obj, key));
        let res = comp.call(self, obj, member, &arg);
        self.hooks.active.pop();
        self.put_comp(obj, key, comp);
        self.flush_pending(obj)?;
        res.map(Some)
    }
}

// ── Events ───────────────────────────────────────────────────────────────

impl Context {
    /// Subscribe to `event` on one object.
    pub fn on_obj(
        &mut self,
        obj: ObjId,
        event: &str,
        f: impl FnMut(&mut Context, ObjId, &EventArg) -> Result<()> + 'static,
    ) -> EventController {
        let Some(o) = self.scene.get_mut(obj) else {
            return EventController::empty();
        };
        let ctl = o.events.entry(event.to_string()).or_default().add(Box::new(f));
        // handlers a component registers on its own host go away with it
        if let Some(&(host, key)) = self.hooks.active.last() {
            if host == obj {
                if let Some(slot) = self.scene.get_mut(obj).and_then(|o| o.slot_mut(key)) {
                    slot.cleanups.push(ctl.clone());
                }
            }
        }
        ctl
    }

    /// Subscribe to `event` on every object tagged `tag`.
    pub fn on(
        &mut self,
        event: &str,
        tag: &str,
        mut f: impl FnMut(&mut Context, ObjId, &EventArg) -> Result<()> + 'static,
    ) -> EventController {
        let tag = tag.to_string();
        self.tag_events
            .entry(event.to_string())
            .or_insert_with(Handlers::new)
            .add(Box::new(move |ctx: &mut Context, obj: ObjId, arg: &EventArg| {
                if ctx.is(obj, &tag) { f(ctx, obj, arg) } else { Ok(()) }
            }))
    }

    pub fn on_add(&mut self, tag: &str, mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on("add", tag, move |ctx, obj, _| f(ctx, obj))
    }

    pub fn on_update(&mut self, tag: &str, mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on("update", tag, move |ctx, obj, _| f(ctx, obj))
    }

    pub fn on_draw(&mut self, tag: &str, mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on("draw", tag, move |ctx, obj, _| f(ctx, obj))
    }

    pub fn on_destroy(&mut self, tag: &str, mut f: impl FnMut(&mut Context, ObjId) -> Result<()> + 'static) -> EventController {
        self.on("destroy", tag, move |ctx, obj, _| f(ctx, obj))
    }

    /// Once per frame, after every object has updated.
    pub fn on_frame_update(&mut self, mut f: impl FnMut(&mut Context) -> Result<()> + 'static) -> EventController {
        let root = self.scene.root();
        self.on_obj(root, "update", move |ctx, _, _| f(ctx))
    }

    /// Once per frame, before any object draws.
    pub fn on_frame_draw(&mut self, mut f: impl FnMut(&mut Context) -> Result<()> + 'static) -> EventController {
        let root = self.scene.root();
        self.on_obj(root, "draw", move |ctx, _, _| f(ctx))
    }

    /// Trigger a custom event on an object.
    pub fn trigger(&mut self, obj: ObjId, event: &str, arg: impl Into<EventArg>) -> Result<()> {
        let arg = arg.into();
        if self.hooks.is_running(obj) {
            self.hooks.pending.push_back((obj, event.to_string(), arg));
            return Ok(());
        }
        for key in self.scene.get(obj).map(GameObj::slot_keys).unwrap_or_default() {
            let Some(mut comp) = self.take_comp(obj, key) else { continue };
            self.hooks.active.push((obj, key));
            let res = comp.on_event(self, obj, event, &arg);
            self.hooks.active.pop();
            self.put_comp(obj, key, comp);
            self.flush_pending(obj)?;
            res?;
        }
        self.fire_handlers(obj, event, &arg)
    }

    /// Object handlers, then tag-scoped handlers.
    fn fire_handlers(&mut self, obj: ObjId, event: &str, arg: &EventArg) -> Result<()> {
        let own = match self.scene.get_mut(obj).and_then(|o| o.events.get_mut(event)) {
            Some(list) => list.snapshot(),
            None => Vec::new(),
        };
        for entry in own {
            entry.invoke(|f| f(self, obj, arg))?;
        }
        let tagged = match self.tag_events.get_mut(event) {
            Some(list) => list.snapshot(),
            None => Vec::new(),
        };
        for entry in tagged {
            entry.invoke(|f| f(self, obj, arg))?;
        }
        Ok(())
    }

    /// Run `f` on the object's last component of type `T`, with the
    /// component out of its slot like any other hook. `None` if absent.
    pub fn with_comp<T: Component, R>(
        &mut self,
        obj: ObjId,
        f: impl FnOnce(&mut T, &mut Context) -> Result<R>,
    ) -> Result<Option<R>> {
        let key = self.scene.get(obj).and_then(|o| {
            o.slots
                .iter()
                .rev()
                .find(|s| s.comp.as_deref().is_some_and(|c| c.as_any().is::<T>()))
                .map(|s| s.key)
        });
        let Some(key) = key else {
            return Ok(None);
        };
        let Some(mut comp) = self.take_comp(obj, key) else {
            return Ok(None);
        };
        self.hooks.active.push((obj, key));
        let res = match comp.as_mut().as_any_mut().downcast_mut::<T>() {
            Some(t) => f(t, self).map(Some),
            None => Ok(None),
        };
        self.hooks.active.pop();
        self.put_comp(obj, key, comp);
        self.flush_pending(obj)?;
        res
    }

    fn take_comp(&mut self, obj: ObjId, key: u64) -> Option<Box<dyn Component>> {
        self.scene.get_mut(obj)?.slot_mut(key)?.comp.take()
    }

    /// Put a component back. If its slot was removed meanwhile the
    /// component is dropped.
    fn put_comp(&mut self, obj: ObjId, key: u64, comp: Box<dyn Component>) {
        if let Some(slot) = self.scene.get_mut(obj).and_then(|o| o.slot_mut(key)) {
            slot.comp = Some(comp);
        }
    }

    /// Deliver the events queued for `obj` in the order they were raised.
    /// Only the outermost caller drains, so an event raised while an earlier
    /// one is being delivered waits its turn.
    fn flush_pending(&mut self, obj: ObjId) -> Result<()> {
        if self.hooks.is_running(obj) || self.hooks.is_draining(obj) {
            return Ok(());
        }
        self.hooks.draining.push(obj);
        let res = self.drain_pending(obj);
        self.hooks.draining.retain(|o| *o != obj);
        res
    }

    fn drain_pending(&mut self, obj: ObjId) -> Result<()> {
        while let Some(i) = self.hooks.pending.iter().position(|(o, _, _)| *o == obj) {
            let Some((_, event, arg)) = self.hooks.pending.remove(i) else { break };
            self.trigger(obj, &event, arg)?;
        }
        Ok(())
    }

    fn run_hook(&mut self, obj: ObjId, hook: Hook) -> Result<()> {
        for key in self.scene.get(obj).map(GameObj::slot_keys).unwrap_or_default() {
            self.run_hook_one(obj, key, hook)?;
        }
        Ok(())
    }

    fn run_hook_one(&mut self, obj: ObjId, key: u64, hook: Hook) -> Result<()> {
        let Some(mut comp) = self.take_comp(obj, key) else {
            return Ok(());
        };
        self.hooks.active.push((obj, key));
        let res = match hook {
            Hook::Add => comp.add(self, obj),
            Hook::Update => comp.update(self, obj),
            Hook::Draw => comp.draw(self, obj),
            Hook::Destroy => comp.destroy(self, obj),
            Hook::DrawInspect => comp.draw_inspect(self, obj),
        };
        self.hooks.active.pop();
        self.put_comp(obj, key, comp);
        self.flush_pending(obj)?;
        res
    }
}

// ── Destruction ──────────────────────────────────────────────────────────

impl Context {
    /// Destroy an object and its subtree. `destroy` hooks and handlers run
    /// now; slots are freed at the next sweep.
    pub fn destroy(&mut self, obj: ObjId) -> Result<()> {
        if obj == self.scene.root() || self.scene.is_dead(obj) {
            return Ok(());
        }
        let subtree = self.scene.subtree(obj);
        let live = self.scene.exists(obj);
        for id in &subtree {
            self.scene.mark_dead(*id);
        }
        for id in subtree {
            if live {
                self.run_hook(id, Hook::Destroy)?;
                self.fire_handlers(id, "destroy", &EventArg::None)?;
            }
            if let Some(o) = self.scene.get_mut(id) {
                for slot in &o.slots {
                    for c in &slot.cleanups {
                        c.cancel();
                    }
                }
                for list in o.events.values_mut() {
                    list.clear();
                }
            }
        }
        Ok(())
    }

    /// Destroy every object tagged `tag`.
    pub fn destroy_all(&mut self, tag: &str) -> Result<()> {
        for id in self.get_all(tag) {
            self.destroy(id)?;
        }
        Ok(())
    }

    /// Destroy every object below the root.
    pub(crate) fn clear_scene(&mut self) -> Result<()> {
        for id in self.scene.children(self.scene.root()) {
            self.destroy(id)?;
        }
        self.scene.sweep();
        Ok(())
    }
}

// ── Frame phases ─────────────────────────────────────────────────────────

impl Context {
    /// Update pass: children before their parent, in insertion order.
    pub(crate) fn update_tree(&mut self, obj: ObjId) -> Result<()> {
        match self.scene.get(obj) {
            Some(o) if !o.paused && !o.dead => {}
            _ => return Ok(()),
        }
        for child in self.scene.children(obj) {
            self.update_tree(child)?;
        }
        if self.scene.is_dead(obj) {
            return Ok(());
        }
        self.run_hook(obj, Hook::Update)?;
        self.fire_handlers(obj, "update", &EventArg::None)
    }

    /// Draw pass: parent before children, children in z order.
    pub(crate) fn draw_tree(&mut self, obj: ObjId) -> Result<()> {
        let Some(o) = self.scene.get(obj) else {
            return Ok(());
        };
        if o.hidden || o.dead {
            return Ok(());
        }
        let mask = o.c::<Mask>().map(|m| m.mode);
        let local = o.local_matrix();
        self.gfx.push_transform();
        self.gfx.push_matrix(&local);
        let res = self.draw_obj(obj, mask);
        self.gfx.pop_transform();
        res
    }

    fn draw_obj(&mut self, obj: ObjId, mask: Option<StencilMode>) -> Result<()> {
        if let Some(test) = mask {
            self.gfx.clear_stencil();
            self.gfx.set_stencil(StencilMode::Write);
            self.run_hook(obj, Hook::Draw)?;
            self.fire_handlers(obj, "draw", &EventArg::None)?;
            self.gfx.set_stencil(test);
            for child in self.scene.children_by_z(obj) {
                self.draw_tree(child)?;
            }
            self.gfx.set_stencil(StencilMode::None);
        } else {
            self.run_hook(obj, Hook::Draw)?;
            self.fire_handlers(obj, "draw", &EventArg::None)?;
            for child in self.scene.children_by_z(obj) {
                self.draw_tree(child)?;
            }
        }
        if self.debug.inspect {
            self.run_hook(obj, Hook::DrawInspect)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
