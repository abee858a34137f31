//! Process-wide table of named contexts
//!
//! The host tree owns each context through its overlay container; the
//! registry only keeps weak references and hands out [`ContextHandle`]s.

use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use crate::context::{Context, ContextConfig, ContextState};
use crate::error::OverlayError;
use crate::hooks::{HookId, HookRef, HookSet};
use crate::host::{OverlayContainer, OverlayWidget, WidgetRef};
use crate::runtime::Runtime;
use crate::shared::SharedState;

/// Strong reference to a registered context
pub struct ContextHandle<R: Runtime> {
    name: Rc<str>,
    context: Rc<RefCell<Context<R>>>,
    hooks: Rc<RefCell<HookSet<R>>>,
    state: Rc<Cell<ContextState>>,
}

impl<R: Runtime> Clone for ContextHandle<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            context: self.context.clone(),
            hooks: self.hooks.clone(),
            state: self.state.clone(),
        }
    }
}

impl<R: Runtime> std::fmt::Debug for ContextHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextHandle")
            .field("name", &self.name)
            .field("state", &self.state.get())
            .finish()
    }
}

impl<R: Runtime> ContextHandle<R> {
    fn new(context: Rc<RefCell<Context<R>>>) -> Self {
        let (name, hooks, state) = {
            let inner = context.borrow();
            (Rc::from(inner.name()), inner.hook_set(), inner.lifecycle())
        };
        Self {
            name,
            context,
            hooks,
            state,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> ContextState {
        self.state.get()
    }

    pub fn is_active(&self) -> bool {
        self.state.get() == ContextState::Active
    }

    /// Register a hook; usable while the context is mid-frame
    pub fn add_hook(&self, hook: &HookRef<R>) -> HookId {
        self.hooks.borrow_mut().insert(hook)
    }

    pub fn remove_hook(&self, id: HookId) -> bool {
        self.hooks.borrow_mut().remove(id)
    }

    pub fn flush_hooks(&self) {
        self.hooks.borrow_mut().clear();
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.borrow().len()
    }

    /// # Panics
    ///
    /// Panics if the context is mutably borrowed, e.g. from inside its own
    /// hooks. Use [`try_borrow_mut`](Self::try_borrow_mut) on re-entrant paths.
    pub fn borrow(&self) -> Ref<'_, Context<R>> {
        self.context.borrow()
    }

    /// # Panics
    ///
    /// Panics if the context is already borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, Context<R>> {
        self.context.borrow_mut()
    }

    /// `None` while the context is busy building a frame
    pub fn try_borrow_mut(&self) -> Option<RefMut<'_, Context<R>>> {
        self.context.try_borrow_mut().ok()
    }

    /// The widget the host tree holds for this context
    pub fn widget(&self) -> WidgetRef {
        let widget: Rc<RefCell<dyn OverlayWidget>> = self.context.clone();
        widget
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.context, &other.context)
    }

    pub fn downgrade(&self) -> WeakContext<R> {
        WeakContext {
            name: self.name.clone(),
            context: Rc::downgrade(&self.context),
            hooks: self.hooks.clone(),
            state: self.state.clone(),
        }
    }
}

impl<R: Runtime> PartialEq for ContextHandle<R> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Non-owning reference to a context, as held by external callers
pub struct WeakContext<R: Runtime> {
    name: Rc<str>,
    context: Weak<RefCell<Context<R>>>,
    hooks: Rc<RefCell<HookSet<R>>>,
    state: Rc<Cell<ContextState>>,
}

impl<R: Runtime> Clone for WeakContext<R> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            context: self.context.clone(),
            hooks: self.hooks.clone(),
            state: self.state.clone(),
        }
    }
}

impl<R: Runtime> WeakContext<R> {
    /// Never borrows the context, so it is safe from inside a hook
    pub fn upgrade(&self) -> Option<ContextHandle<R>> {
        Some(ContextHandle {
            name: self.name.clone(),
            context: self.context.upgrade()?,
            hooks: self.hooks.clone(),
            state: self.state.clone(),
        })
    }
}

struct Entry<R: Runtime> {
    handle: WeakContext<R>,
    container: Weak<dyn OverlayContainer>,
}

impl<R: Runtime> Entry<R> {
    fn name(&self) -> &str {
        &self.handle.name
    }

    fn is_live(&self) -> bool {
        self.handle.state.get() != ContextState::Released && self.handle.context.strong_count() > 0
    }
}

/// Named contexts, in creation order
pub struct ContextRegistry<R: Runtime> {
    shared: Rc<SharedState<R>>,
    entries: RefCell<Vec<Entry<R>>>,
    shutting_down: Cell<bool>,
}

impl<R: Runtime> ContextRegistry<R> {
    pub fn new(shared: Rc<SharedState<R>>) -> Self {
        Self {
            shared,
            entries: RefCell::new(Vec::new()),
            shutting_down: Cell::new(false),
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.get()
    }

    /// Refuse new contexts and skip host-tree detaching on release
    pub fn begin_shutdown(&self) {
        self.shutting_down.set(true);
    }

    /// Live context registered under `name`
    pub fn find(&self, name: &str) -> Option<ContextHandle<R>> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(Entry::is_live);
        entries
            .iter()
            .find(|entry| entry.name() == name)
            .and_then(|entry| entry.handle.upgrade())
    }

    /// Create `name` in `container`, or return the existing context
    ///
    /// Returns `None` if construction fails or the registry is shutting
    /// down. A failed construction never allocates a slot.
    pub fn create(
        &self,
        name: &str,
        container: &Rc<dyn OverlayContainer>,
        config: &ContextConfig,
    ) -> Option<ContextHandle<R>> {
        if self.shutting_down.get() {
            tracing::debug!(target: "dear-imgui-overlay", "Refusing to create [{}] during shutdown", name);
            return None;
        }
        if let Some(existing) = self.find(name) {
            return Some(existing);
        }

        let context = Context::construct(name, config, Rc::downgrade(container), self.shared.clone())
            .map_err(|err| OverlayError::construction(name, err))
            .ok()?;
        let handle = ContextHandle::new(Rc::new(RefCell::new(context)));
        handle.context.borrow_mut().attach(handle.downgrade());
        container.add_slot(config.z_order, handle.widget());
        self.entries.borrow_mut().push(Entry {
            handle: handle.downgrade(),
            container: Rc::downgrade(container),
        });
        Some(handle)
    }

    /// Release `name`; false if no such context is registered
    pub fn release(&self, name: &str) -> bool {
        let entry = {
            let mut entries = self.entries.borrow_mut();
            match entries.iter().position(|entry| entry.name() == name) {
                Some(index) => entries.remove(index),
                None => return false,
            }
        };
        self.release_entry(entry);
        true
    }

    /// Release the context behind `handle`
    pub fn release_handle(&self, handle: &ContextHandle<R>) -> bool {
        let name = {
            let entries = self.entries.borrow();
            entries
                .iter()
                .find(|entry| std::ptr::eq(entry.handle.context.as_ptr(), Rc::as_ptr(&handle.context)))
                .map(|entry| entry.handle.name.clone())
        };
        name.is_some_and(|name| self.release(&name))
    }

    /// Release every context, including ones registered while releasing
    pub fn release_all(&self) {
        loop {
            let names: Vec<Rc<str>> = self
                .entries
                .borrow()
                .iter()
                .map(|entry| entry.handle.name.clone())
                .collect();
            if names.is_empty() {
                break;
            }
            for name in names {
                self.release(&name);
            }
        }
    }

    /// Names of live contexts in creation order
    pub fn names(&self) -> Vec<String> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(Entry::is_live);
        entries.iter().map(|entry| entry.name().to_owned()).collect()
    }

    /// Live contexts in creation order
    pub fn snapshot(&self) -> Vec<ContextHandle<R>> {
        let mut entries = self.entries.borrow_mut();
        entries.retain(Entry::is_live);
        entries
            .iter()
            .filter_map(|entry| entry.handle.upgrade())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    fn release_entry(&self, entry: Entry<R>) {
        tracing::info!(target: "dear-imgui-overlay", "Releasing context [{}]", entry.name());
        entry.handle.state.set(ContextState::Released);
        let Some(context) = entry.handle.context.upgrade() else {
            return;
        };

        if !self.shutting_down.get()
            && let Some(container) = entry.container.upgrade()
        {
            let widget: WidgetRef = context.clone();
            container.remove_slot(&widget);
            if container.child_count() == 0 {
                container.remove_from_parent();
            }
        }

        // Busy contexts are mid-frame and tear themselves down when it ends.
        if let Ok(mut context) = context.try_borrow_mut() {
            context.teardown();
        }
    }
}

impl<R: Runtime> Drop for ContextRegistry<R> {
    fn drop(&mut self) {
        self.begin_shutdown();
        self.release_all();
    }
}
