//! # Scene — Arena of Game Objects
//!
//! Objects live in a slot arena indexed by [`ObjId`]. Parent/child links are
//! ids, so the tree can be walked and edited without borrowing through it.
//!
//! ```text
//!   objs: [ root, bean, coin, (free), enemy ]
//!            │
//!            ├── bean ── gun
//!            ├── coin
//!            └── enemy
//! ```
//!
//! Destroying an object only marks it dead. Dead objects keep their slot
//! until [`Scene::sweep`] runs between frame phases, so a walk over a child
//! list never sees the list change underneath it.

use std::collections::{HashMap, VecDeque};

use crate::comps::{Fixed, Pos, Rotate, Scale, Z};
use crate::event::{EventController, Handlers};
use crate::math::{Mat4, Vec2, model_matrix};

use super::component::Component;
use super::id::{IdAllocator, ObjId};
use super::ObjHandler;

/// A component slot. `comp` is `None` while the component runs a hook.
pub(crate) struct CompSlot {
    pub key: u64,
    pub id: Option<String>,
    pub comp: Option<Box<dyn Component>>,
    pub require: Vec<&'static str>,
    pub members: Vec<&'static str>,
    pub cleanups: Vec<EventController>,
}

pub struct GameObj {
    id: ObjId,
    pub(crate) slots: Vec<CompSlot>,
    pub(crate) tags: Vec<String>,
    pub(crate) events: HashMap<String, Handlers<ObjHandler>>,
    pub(crate) parent: Option<ObjId>,
    pub(crate) children: Vec<ObjId>,
    /// Skip drawing this object and its children.
    pub hidden: bool,
    /// Skip updating this object and its children.
    pub paused: bool,
    pub(crate) transform: Mat4,
    pub(crate) dead: bool,
    next_key: u64,
}

impl GameObj {
    fn new(id: ObjId) -> Self {
        Self {
            id,
            slots: Vec::new(),
            tags: Vec::new(),
            events: HashMap::new(),
            parent: None,
            children: Vec::new(),
            hidden: false,
            paused: false,
            transform: Mat4::IDENTITY,
            dead: false,
            next_key: 0,
        }
    }

    pub fn id(&self) -> ObjId {
        self.id
    }

    pub fn parent(&self) -> Option<ObjId> {
        self.parent
    }

    pub fn children(&self) -> &[ObjId] {
        &self.children
    }

    /// World transform as of the last propagation.
    pub fn transform(&self) -> Mat4 {
        self.transform
    }

    /// `"*"` matches everything. A tag matches plain tags and component ids.
    pub fn is(&self, tag: &str) -> bool {
        tag == "*" || self.tags.iter().any(|t| t == tag) || self.has_comp(tag)
    }

    /// True only if every tag matches.
    pub fn is_all(&self, tags: &[&str]) -> bool {
        tags.iter().all(|t| self.is(t))
    }

    pub fn has_comp(&self, id: &str) -> bool {
        self.slots.iter().any(|s| s.id.as_deref() == Some(id))
    }

    /// Plain tags followed by component ids, in merge order.
    pub fn tags(&self) -> Vec<&str> {
        self.tags
            .iter()
            .map(String::as_str)
            .chain(self.slots.iter().filter_map(|s| s.id.as_deref()))
            .collect()
    }

    /// Member names the object currently answers, without duplicates.
    pub fn members(&self) -> Vec<&'static str> {
        let mut out: Vec<&'static str> = Vec::new();
        for m in self.slots.iter().flat_map(|s| s.members.iter()) {
            if !out.contains(m) {
                out.push(m);
            }
        }
        out
    }

    /// Last-merged component of type `T`.
    pub fn c<T: Component>(&self) -> Option<&T> {
        self.slots
            .iter()
            .rev()
            .filter_map(|s| s.comp.as_deref())
            .find_map(|c| c.as_any().downcast_ref::<T>())
    }

    pub fn c_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.slots
            .iter_mut()
            .rev()
            .filter_map(|s| s.comp.as_deref_mut())
            .find_map(|c| c.as_any_mut().downcast_mut::<T>())
    }

    /// Text from every component's `inspect`, as `id: info` lines.
    pub fn inspect(&self) -> Vec<String> {
        self.slots
            .iter()
            .filter_map(|s| {
                let info = s.comp.as_deref()?.inspect()?;
                Some(match &s.id {
                    Some(id) => format!("{id}: {info}"),
                    None => info,
                })
            })
            .collect()
    }

    pub(crate) fn push_slot(&mut self, comp: Box<dyn Component>) -> u64 {
        let key = self.next_key;
        self.next_key += 1;
        self.slots.push(CompSlot {
            key,
            id: comp.id().map(str::to_string),
            require: comp.require().to_vec(),
            members: comp.members().to_vec(),
            comp: Some(comp),
            cleanups: Vec::new(),
        });
        key
    }

    pub(crate) fn slot_mut(&mut self, key: u64) -> Option<&mut CompSlot> {
        self.slots.iter_mut().find(|s| s.key == key)
    }

    pub(crate) fn slot_keys(&self) -> Vec<u64> {
        self.slots.iter().map(|s| s.key).collect()
    }

    /// Key of the component that contributed `member` last.
    pub(crate) fn provider(&self, member: &str) -> Option<u64> {
        self.slots
            .iter()
            .rev()
            .find(|s| s.members.contains(&member))
            .map(|s| s.key)
    }

    /// First required id that is missing, per slot.
    pub(crate) fn missing_require(&self, key: u64) -> Option<(String, String)> {
        let slot = self.slots.iter().find(|s| s.key == key)?;
        let missing = slot.require.iter().find(|r| !self.has_comp(r))?;
        Some((slot.id.clone().unwrap_or_default(), missing.to_string()))
    }

    /// Local transform from the `pos`/`scale`/`rotate` components.
    pub fn local_matrix(&self) -> Mat4 {
        model_matrix(
            self.c::<Pos>().map_or(Vec2::ZERO, |p| p.pos),
            self.c::<Scale>().map_or(Vec2::ONE, |s| s.scale),
            self.c::<Rotate>().map_or(0.0, |r| r.angle),
        )
    }

    pub fn z(&self) -> f32 {
        self.c::<Z>().map_or(0.0, |z| z.z)
    }
}

pub struct Scene {
    ids: IdAllocator,
    objs: Vec<Option<GameObj>>,
    root: ObjId,
    dead: Vec<ObjId>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut ids = IdAllocator::new();
        let root = ids.allocate();
        Self {
            ids,
            objs: vec![Some(GameObj::new(root))],
            root,
            dead: Vec::new(),
        }
    }

    pub fn root(&self) -> ObjId {
        self.root
    }

    /// Allocate a detached object.
    pub(crate) fn create(&mut self) -> ObjId {
        let id = self.ids.allocate();
        let idx = id.index as usize;
        if idx >= self.objs.len() {
            self.objs.resize_with(idx + 1, || None);
        }
        self.objs[idx] = Some(GameObj::new(id));
        id
    }

    pub fn get(&self, id: ObjId) -> Option<&GameObj> {
        if !self.ids.is_live(id) {
            return None;
        }
        self.objs.get(id.index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, id: ObjId) -> Option<&mut GameObj> {
        if !self.ids.is_live(id) {
            return None;
        }
        self.objs.get_mut(id.index as usize)?.as_mut()
    }

    /// Live objects in the arena, detached ones included.
    pub fn len(&self) -> usize {
        self.ids.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// In the live tree: not destroyed and reachable from the root.
    pub fn exists(&self, id: ObjId) -> bool {
        let mut cur = id;
        loop {
            let Some(obj) = self.get(cur) else {
                return false;
            };
            if obj.dead {
                return false;
            }
            if cur == self.root {
                return true;
            }
            match obj.parent {
                Some(p) => cur = p,
                None => return false,
            }
        }
    }

    pub(crate) fn link(&mut self, parent: ObjId, child: ObjId) {
        if let Some(old) = self.get(child).and_then(|c| c.parent) {
            if let Some(p) = self.get_mut(old) {
                p.children.retain(|c| *c != child);
            }
        }
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    pub fn children(&self, id: ObjId) -> Vec<ObjId> {
        self.get(id).map(|o| o.children.clone()).unwrap_or_default()
    }

    /// Children sorted by z; equal z keeps insertion order.
    pub fn children_by_z(&self, id: ObjId) -> Vec<ObjId> {
        let mut kids = self.children(id);
        kids.sort_by(|a, b| self.z(*a).total_cmp(&self.z(*b)));
        kids
    }

    fn z(&self, id: ObjId) -> f32 {
        self.get(id).map_or(0.0, GameObj::z)
    }

    /// `id` and everything below it, parents first.
    pub fn subtree(&self, id: ObjId) -> Vec<ObjId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(obj) = self.get(cur) {
                out.push(cur);
                stack.extend(obj.children.iter().rev().copied());
            }
        }
        out
    }

    /// Live children of `parent` tagged `tag`, sorted by z.
    pub fn query(&self, parent: ObjId, tag: &str, recursive: bool) -> Vec<ObjId> {
        let mut out = Vec::new();
        self.collect(parent, tag, recursive, &mut out);
        out.sort_by(|a, b| self.z(*a).total_cmp(&self.z(*b)));
        out
    }

    fn collect(&self, parent: ObjId, tag: &str, recursive: bool, out: &mut Vec<ObjId>) {
        for child in self.children(parent) {
            let Some(obj) = self.get(child) else { continue };
            if obj.dead {
                continue;
            }
            if obj.is(tag) {
                out.push(child);
            }
            if recursive {
                self.collect(child, tag, true, out);
            }
        }
    }

    /// Whether the object or any ancestor carries `fixed`.
    pub fn is_fixed(&self, id: ObjId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(obj) = self.get(c) else { return false };
            if obj.c::<Fixed>().is_some_and(|f| f.fixed) {
                return true;
            }
            cur = obj.parent;
        }
        false
    }

    /// Whether the object or any ancestor is paused.
    pub fn is_paused(&self, id: ObjId) -> bool {
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(obj) = self.get(c) else { return false };
            if obj.paused {
                return true;
            }
            cur = obj.parent;
        }
        false
    }

    /// World transform computed through the ancestor chain.
    pub fn world_transform(&self, id: ObjId) -> Mat4 {
        let mut m = Mat4::IDENTITY;
        let mut cur = Some(id);
        while let Some(c) = cur {
            let Some(obj) = self.get(c) else { break };
            m = obj.local_matrix() * m;
            cur = obj.parent;
        }
        m
    }

    /// Store world transforms on every object in the live tree, parents
    /// before children.
    pub fn propagate_transforms(&mut self) {
        let mut queue: VecDeque<(ObjId, Mat4)> = VecDeque::new();
        queue.push_back((self.root, Mat4::IDENTITY));
        while let Some((id, parent)) = queue.pop_front() {
            let Some(obj) = self.get_mut(id) else { continue };
            let world = parent * obj.local_matrix();
            obj.transform = world;
            for child in obj.children.clone() {
                queue.push_back((child, world));
            }
        }
    }

    pub(crate) fn mark_dead(&mut self, id: ObjId) {
        if let Some(obj) = self.get_mut(id) {
            if !obj.dead {
                obj.dead = true;
                self.dead.push(id);
            }
        }
    }

    pub fn is_dead(&self, id: ObjId) -> bool {
        self.get(id).is_none_or(|o| o.dead)
    }

    /// Free every object destroyed since the last sweep.
    pub fn sweep(&mut self) -> usize {
        let dead = std::mem::take(&mut self.dead);
        let mut freed = 0;
        for id in dead {
            let parent = self.get(id).and_then(|o| o.parent);
            if let Some(p) = parent.and_then(|p| self.get_mut(p)) {
                p.children.retain(|c| *c != id);
            }
            if self.ids.deallocate(id) {
                self.objs[id.index as usize] = None;
                freed += 1;
            }
        }
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comps::Pos;
    use crate::math::mat4_mul_vec2;

    fn tree() -> (Scene, ObjId, ObjId, ObjId) {
        let mut scene = Scene::new();
        let root = scene.root();
        let a = scene.create();
        let b = scene.create();
        let c = scene.create();
        scene.link(root, a);
        scene.link(a, b);
        scene.link(root, c);
        (scene, a, b, c)
    }

    #[test]
    fn exists_requires_path_to_root() {
        let (mut scene, a, b, _) = tree();
        let loose = scene.create();
        assert!(scene.exists(a));
        assert!(scene.exists(b));
        assert!(!scene.exists(loose));
        scene.mark_dead(a);
        assert!(!scene.exists(b));
    }

    #[test]
    fn sweep_frees_slots_and_unlinks() {
        let (mut scene, a, _, c) = tree();
        let before = scene.len();
        scene.mark_dead(c);
        assert!(scene.get(c).is_some());
        assert_eq!(scene.sweep(), 1);
        assert!(scene.get(c).is_none());
        assert_eq!(scene.children(scene.root()), vec![a]);
        assert_eq!(scene.len(), before - 1);
        let reused = scene.create();
        assert_eq!(reused.index(), c.index());
        assert!(scene.get(c).is_none());
    }

    #[test]
    fn subtree_is_parent_first() {
        let (scene, a, b, c) = tree();
        assert_eq!(&scene.subtree(scene.root())[1..], &[a, b, c]);
    }

    #[test]
    fn tags_match_ids_and_wildcard() {
        let mut scene = Scene::new();
        let id = scene.create();
        let obj = scene.get_mut(id).unwrap();
        obj.tags.push("enemy".into());
        obj.push_slot(Box::new(Pos::new(1.0, 2.0)));
        assert!(obj.is("enemy"));
        assert!(obj.is("pos"));
        assert!(obj.is("*"));
        assert!(obj.is_all(&["enemy", "pos"]));
        assert!(!obj.is_all(&["enemy", "boss"]));
        assert_eq!(obj.tags(), vec!["enemy", "pos"]);
    }

    #[test]
    fn transforms_compose_down_the_tree() {
        let (mut scene, a, b, _) = tree();
        scene.get_mut(a).unwrap().push_slot(Box::new(Pos::new(100.0, 0.0)));
        scene.get_mut(b).unwrap().push_slot(Box::new(Pos::new(10.0, 5.0)));
        scene.propagate_transforms();
        let m = scene.get(b).unwrap().transform();
        assert!((mat4_mul_vec2(&m, Vec2::ZERO) - Vec2::new(110.0, 5.0)).length() < 1e-4);
        let on_demand = scene.world_transform(b);
        assert!(on_demand.abs_diff_eq(m, 1e-5));
    }
}
