//! Rebuild callbacks
//!
//! Callers own their hooks (`HookRef`) and register them with a context, which
//! keeps only weak references in a generational slot map. Registration returns
//! a [`HookId`]; removal invalidates the id, and a hook whose owner dropped it
//! is skipped and pruned.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::registry::{ContextHandle, WeakContext};
use crate::resources::ResourceTable;
use crate::runtime::Runtime;

/// What a hook sees of its context while building
pub struct HookScope<'a, R: Runtime> {
    context_name: &'a str,
    hook_id: HookId,
    context: Option<&'a WeakContext<R>>,
    resources: &'a mut ResourceTable,
}

impl<'a, R: Runtime> HookScope<'a, R> {
    pub(crate) fn new(
        context_name: &'a str,
        hook_id: HookId,
        context: Option<&'a WeakContext<R>>,
        resources: &'a mut ResourceTable,
    ) -> Self {
        Self {
            context_name,
            hook_id,
            context,
            resources,
        }
    }

    pub fn context_name(&self) -> &str {
        self.context_name
    }

    pub fn hook_id(&self) -> HookId {
        self.hook_id
    }

    /// Handle to the context running this hook
    ///
    /// The context itself is mid-frame, so `borrow`/`borrow_mut` on the handle
    /// fail; its name, state and hook registration remain usable. `None` for
    /// contexts built outside a registry.
    pub fn context(&self) -> Option<ContextHandle<R>> {
        self.context.and_then(WeakContext::upgrade)
    }

    /// Resources of the context, for images drawn by this hook
    pub fn resources(&mut self) -> &mut ResourceTable {
        self.resources
    }
}

/// Per-frame GUI builder
pub trait Hook<R: Runtime> {
    fn build(&mut self, ui: &R::Ui, scope: &mut HookScope<'_, R>);
}

impl<R: Runtime, F> Hook<R> for F
where
    F: FnMut(&R::Ui, &mut HookScope<'_, R>),
{
    fn build(&mut self, ui: &R::Ui, scope: &mut HookScope<'_, R>) {
        self(ui, scope)
    }
}

/// Caller-owned hook
pub type HookRef<R> = Rc<RefCell<dyn Hook<R>>>;

/// Wrap a closure as a hook
pub fn hook<R: Runtime, F>(build: F) -> HookRef<R>
where
    F: FnMut(&R::Ui, &mut HookScope<'_, R>) + 'static,
{
    Rc::new(RefCell::new(build))
}

/// Handle to a registered hook
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct HookId {
    index: u32,
    generation: u32,
}

struct Slot<R: Runtime> {
    generation: u32,
    hook: Option<Weak<RefCell<dyn Hook<R>>>>,
}

/// Ordered, generational storage of weak hook references
pub struct HookSet<R: Runtime> {
    slots: Vec<Slot<R>>,
    free: Vec<u32>,
    /// Occupied slot indices in registration order
    order: Vec<u32>,
}

impl<R: Runtime> Default for HookSet<R> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            order: Vec::new(),
        }
    }
}

impl<R: Runtime> HookSet<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a hook at the end of the build order
    pub fn insert(&mut self, hook: &HookRef<R>) -> HookId {
        let weak = Rc::downgrade(hook);
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].hook = Some(weak);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    hook: Some(weak),
                });
                (self.slots.len() - 1) as u32
            }
        };
        self.order.push(index);
        HookId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Invalidate `id`; false if it was already stale
    pub fn remove(&mut self, id: HookId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.vacate(id.index);
        true
    }

    pub fn contains(&self, id: HookId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.hook.is_some())
    }

    pub fn clear(&mut self) {
        for index in std::mem::take(&mut self.order) {
            let slot = &mut self.slots[index as usize];
            slot.hook = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(index);
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Live hooks in registration order; expired ones are pruned
    pub fn snapshot(&mut self) -> Vec<(HookId, HookRef<R>)> {
        let mut live = Vec::with_capacity(self.order.len());
        let mut expired = Vec::new();
        for &index in &self.order {
            let slot = &self.slots[index as usize];
            let id = HookId {
                index,
                generation: slot.generation,
            };
            match slot.hook.as_ref().and_then(Weak::upgrade) {
                Some(hook) => live.push((id, hook)),
                None => expired.push(index),
            }
        }
        for index in expired {
            self.vacate(index);
        }
        live
    }

    fn vacate(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        slot.hook = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.order.retain(|&i| i != index);
        self.free.push(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draw::TextureId;
    use crate::headless::{HeadlessRuntime, HeadlessUi};

    type Log = Rc<RefCell<Vec<&'static str>>>;

    fn recording(log: &Log, tag: &'static str) -> HookRef<HeadlessRuntime> {
        let log = log.clone();
        hook(move |_: &HeadlessUi, _: &mut HookScope<'_, HeadlessRuntime>| log.borrow_mut().push(tag))
    }

    fn run(set: &mut HookSet<HeadlessRuntime>) {
        let mut resources = ResourceTable::new();
        let ui = HeadlessUi::new(TextureId::from_raw(0));
        for (id, hook) in set.snapshot() {
            let mut scope = HookScope::new("Test", id, None, &mut resources);
            hook.borrow_mut().build(&ui, &mut scope);
        }
    }

    #[test]
    fn hooks_run_in_registration_order() {
        let log = Log::default();
        let (a, b, c) = (recording(&log, "a"), recording(&log, "b"), recording(&log, "c"));
        let mut set = HookSet::new();
        set.insert(&a);
        let id_b = set.insert(&b);
        set.insert(&c);

        run(&mut set);
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);

        assert!(set.remove(id_b));
        let d = recording(&log, "d");
        set.insert(&d);
        log.borrow_mut().clear();
        run(&mut set);
        assert_eq!(*log.borrow(), vec!["a", "c", "d"]);
    }

    #[test]
    fn stale_ids_do_not_remove_reused_slots() {
        let log = Log::default();
        let a = recording(&log, "a");
        let b = recording(&log, "b");
        let mut set = HookSet::new();
        let id_a = set.insert(&a);
        assert!(set.remove(id_a));
        let id_b = set.insert(&b);
        assert_ne!(id_a, id_b);
        assert!(!set.remove(id_a));
        assert!(set.contains(id_b));
    }

    #[test]
    fn dropped_hooks_are_pruned() {
        let log = Log::default();
        let a = recording(&log, "a");
        let mut set = HookSet::new();
        let id = set.insert(&a);
        drop(a);
        run(&mut set);
        assert!(log.borrow().is_empty());
        assert!(!set.contains(id));
        assert!(set.is_empty());
    }

    #[test]
    fn clear_invalidates_everything() {
        let log = Log::default();
        let a = recording(&log, "a");
        let mut set = HookSet::new();
        let id = set.insert(&a);
        set.clear();
        assert!(!set.contains(id));
        assert_eq!(set.len(), 0);
    }
}
