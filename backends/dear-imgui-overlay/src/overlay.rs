//! The overlay module object
//!
//! [`ImGuiOverlay`] is what a host instantiates once per process: it owns the
//! shared state, the context registry and the input dispatcher, and exposes
//! the hook API and the global commands.

use std::cell::RefCell;
use std::rc::Rc;

use crate::command::GlobalCommand;
use crate::context::ContextConfig;
use crate::dispatcher::{InputDispatcher, KeyDispatch};
use crate::hooks::{HookId, HookRef};
use crate::host::SlotProvider;
use crate::key::{HostKey, InputEventKind};
use crate::registry::{ContextHandle, ContextRegistry};
use crate::runtime::Runtime;
use crate::settings::OverlaySettings;
use crate::shared::{HostServices, SharedState};

/// Overlay slot used when none is named
pub const DEFAULT_SLOT: &str = "Default";
/// Name and slot of the demo context
pub const DEMOS_CONTEXT: &str = "Demos";

/// Version information reported to the host
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versions {
    pub overlay: &'static str,
    pub runtime: &'static str,
    pub runtime_version: String,
}

/// Process-wide overlay runtime
pub struct ImGuiOverlay<R: Runtime> {
    shared: Rc<SharedState<R>>,
    slots: Rc<dyn SlotProvider>,
    registry: ContextRegistry<R>,
    dispatcher: InputDispatcher,
    demo_hooks: RefCell<Vec<HookRef<R>>>,
}

impl<R: Runtime> ImGuiOverlay<R> {
    pub fn new(settings: OverlaySettings, services: HostServices) -> Self {
        let dispatcher = InputDispatcher::new(&settings);
        let HostServices {
            slots,
            input,
            layouts,
            fonts,
        } = services;
        let shared = Rc::new(SharedState::new(settings, input, layouts, fonts));
        tracing::info!(
            target: "dear-imgui-overlay",
            "Starting overlay on {} {} (visible: {}, controls: {})",
            R::name(),
            R::version(),
            shared.visibility(),
            shared.controls()
        );
        Self {
            registry: ContextRegistry::new(shared.clone()),
            shared,
            slots,
            dispatcher,
            demo_hooks: RefCell::new(Vec::new()),
        }
    }

    pub fn settings(&self) -> &OverlaySettings {
        self.shared.settings()
    }

    pub fn registry(&self) -> &ContextRegistry<R> {
        &self.registry
    }

    /// Release every context and refuse new ones
    pub fn shutdown(&self) {
        tracing::info!(target: "dear-imgui-overlay", "Shutting down overlay");
        self.registry.begin_shutdown();
        self.registry.release_all();
        self.demo_hooks.borrow_mut().clear();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.registry.is_shutting_down()
    }

    pub fn versions(&self) -> Versions {
        Versions {
            overlay: env!("CARGO_PKG_VERSION"),
            runtime: R::name(),
            runtime_version: R::version(),
        }
    }

    pub fn find_context(&self, name: &str) -> Option<ContextHandle<R>> {
        self.registry.find(name)
    }

    /// Live contexts in creation order
    pub fn contexts(&self) -> Vec<ContextHandle<R>> {
        self.registry.snapshot()
    }

    /// Create `name` in the default overlay slot
    pub fn create_context(&self, name: &str, config: &ContextConfig) -> Option<ContextHandle<R>> {
        self.create_context_in_slot(name, DEFAULT_SLOT, config)
    }

    pub fn create_context_in_slot(
        &self,
        name: &str,
        slot: &str,
        config: &ContextConfig,
    ) -> Option<ContextHandle<R>> {
        if let Some(existing) = self.registry.find(name) {
            return Some(existing);
        }
        if self.registry.is_shutting_down() {
            return None;
        }
        let Some(container) = self.slots.get_or_create_slot(slot) else {
            tracing::warn!(target: "dear-imgui-overlay", "No overlay slot [{}] for context [{}]", slot, name);
            return None;
        };
        let handle = self.registry.create(name, &container, config);
        if handle.is_none() && container.child_count() == 0 {
            container.remove_from_parent();
        }
        handle
    }

    pub fn release_context(&self, name: &str) -> bool {
        if name == DEMOS_CONTEXT {
            self.demo_hooks.borrow_mut().clear();
        }
        self.registry.release(name)
    }

    pub fn release_context_handle(&self, handle: &ContextHandle<R>) -> bool {
        self.registry.release_handle(handle)
    }

    pub fn release_all_contexts(&self) {
        self.registry.release_all();
        self.demo_hooks.borrow_mut().clear();
    }

    /// Register `hook` with `context_name`, creating the context if needed
    pub fn add_hook(&self, context_name: &str, hook: &HookRef<R>) -> Option<HookId> {
        self.ensure_context(context_name)
            .map(|context| context.add_hook(hook))
    }

    pub fn remove_hook(&self, context_name: &str, id: HookId) -> bool {
        self.ensure_context(context_name)
            .is_some_and(|context| context.remove_hook(id))
    }

    pub fn flush_hooks(&self, context_name: &str) {
        if let Some(context) = self.ensure_context(context_name) {
            context.flush_hooks();
        }
    }

    /// Global rendering toggle
    pub fn visibility(&self) -> bool {
        self.shared.visibility()
    }

    pub fn set_visibility(&self, visible: bool) {
        self.shared.set_visibility(visible);
    }

    /// Global input toggle
    pub fn controls(&self) -> bool {
        self.shared.controls()
    }

    pub fn set_controls(&self, controls: bool) {
        self.shared.set_controls(controls);
    }

    pub fn execute(&self, command: GlobalCommand) {
        match command {
            GlobalCommand::ToggleDemos => self.toggle_demos(),
            GlobalCommand::ToggleVisibility => {
                let visible = !self.shared.visibility();
                self.shared.set_visibility(visible);
                tracing::info!(target: "dear-imgui-overlay", "Overlay visibility: {}", visible);
            }
            GlobalCommand::ToggleControls => {
                let controls = !self.shared.controls();
                self.shared.set_controls(controls);
                tracing::info!(target: "dear-imgui-overlay", "Overlay controls: {}", controls);
            }
        }
    }

    /// Run a console command; false if the name is unknown
    pub fn execute_by_name(&self, name: &str) -> bool {
        match name.parse::<GlobalCommand>() {
            Ok(command) => {
                self.execute(command);
                true
            }
            Err(err) => {
                tracing::debug!(target: "dear-imgui-overlay", "{}", err);
                false
            }
        }
    }

    /// Dispatch a key event; true if a chord or a context claimed it
    pub fn route_key(&self, key: HostKey, event: InputEventKind, uppercase: bool) -> bool {
        let dispatch = self.dispatcher.route_key(&self.registry, key, event, uppercase);
        if let KeyDispatch::Command(command) = dispatch {
            self.execute(command);
        }
        dispatch.is_claimed()
    }

    pub fn route_axis(&self, key: HostKey, delta: f32) -> bool {
        self.dispatcher.route_axis(&self.registry, key, delta)
    }

    pub fn route_cursor(&self) -> bool {
        self.dispatcher.route_cursor(&self.registry)
    }

    /// Once per host tick: route a zero-delta cursor event so capture can
    /// be restored without movement
    pub fn tick(&self) {
        self.route_cursor();
    }

    fn ensure_context(&self, name: &str) -> Option<ContextHandle<R>> {
        self.create_context(name, &ContextConfig::default())
    }

    fn toggle_demos(&self) {
        if !self.shared.settings().include_demos {
            return;
        }
        if self.registry.find(DEMOS_CONTEXT).is_some() {
            tracing::info!(target: "dear-imgui-overlay", "Hiding demos");
            self.release_context(DEMOS_CONTEXT);
            return;
        }
        let Some(demos) = self.create_context_in_slot(DEMOS_CONTEXT, DEMOS_CONTEXT, &ContextConfig::default())
        else {
            return;
        };
        let hooks = R::demo_hooks();
        for hook in &hooks {
            demos.add_hook(hook);
        }
        *self.demo_hooks.borrow_mut() = hooks;
        tracing::info!(target: "dear-imgui-overlay", "Showing demos");
    }
}
