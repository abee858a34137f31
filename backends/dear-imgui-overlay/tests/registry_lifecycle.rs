use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use dear_imgui_overlay::{
    CaptorId, ContextConfig, ContextState, FontFace, FontLoader, Geometry, HeadlessContainer,
    HeadlessInput, HeadlessRuntime, HeadlessSlots, HeadlessUi, HookScope, HostServices, ImGuiOverlay,
    OverlayContainer, OverlayResult, OverlaySettings, SlotProvider, Teardown, WidgetRef, hook,
    take_teardown_log,
};

struct Host {
    slots: Rc<HeadlessSlots>,
    input: Rc<HeadlessInput>,
    overlay: Rc<ImGuiOverlay<HeadlessRuntime>>,
}

fn host(settings: OverlaySettings) -> Host {
    let slots = Rc::new(HeadlessSlots::new());
    let input = Rc::new(HeadlessInput::new());
    let overlay = ImGuiOverlay::new(settings, HostServices::new(slots.clone(), input.clone()));
    Host {
        slots,
        input,
        overlay: Rc::new(overlay),
    }
}

#[test]
fn creating_twice_allocates_one_slot() {
    let host = host(OverlaySettings::default());
    let first = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();
    let second = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();

    assert_eq!(first, second);
    assert_eq!(host.slots.created(), 1);
    assert_eq!(host.slots.container("Default").unwrap().slot_allocations(), 1);
}

#[test]
fn a_name_maps_to_one_active_context() {
    let host = host(OverlaySettings::default());
    let first = host.overlay.create_context("Stats", &ContextConfig::default()).unwrap();
    assert!(host.overlay.release_context("Stats"));
    let second = host.overlay.create_context("Stats", &ContextConfig::default()).unwrap();

    assert_ne!(first, second);
    assert_eq!(first.state(), ContextState::Released);
    assert!(second.is_active());
    assert_eq!(host.overlay.registry().names(), vec!["Stats".to_owned()]);
}

#[test]
fn hook_api_creates_missing_contexts() {
    let host = host(OverlaySettings::default());
    let noop = hook(|_: &HeadlessUi, _: &mut HookScope<'_, HeadlessRuntime>| {});

    let id = host.overlay.add_hook("Tools", &noop).unwrap();
    let tools = host.overlay.find_context("Tools").unwrap();
    assert_eq!(tools.hook_count(), 1);
    assert!(host.slots.container("Default").is_some());

    assert!(host.overlay.remove_hook("Tools", id));
    assert!(!host.overlay.remove_hook("Tools", id));
    assert!(!host.overlay.remove_hook("Other", id));
    assert!(host.overlay.find_context("Other").is_some());

    host.overlay.flush_hooks("Third");
    assert!(host.overlay.find_context("Third").is_some());
}

struct BrokenFonts;

impl FontLoader for BrokenFonts {
    fn load_faces(&self) -> OverlayResult<Vec<FontFace>> {
        Ok(vec![FontFace::new("Empty", Vec::new())])
    }
}

#[test]
fn failed_construction_is_absent_and_leaves_no_slot() {
    let slots = Rc::new(HeadlessSlots::new());
    let services =
        HostServices::new(slots.clone(), Rc::new(HeadlessInput::new())).with_fonts(Box::new(BrokenFonts));
    let overlay: ImGuiOverlay<HeadlessRuntime> = ImGuiOverlay::new(OverlaySettings::default(), services);

    assert!(overlay.create_context("Default", &ContextConfig::default()).is_none());
    assert!(overlay.find_context("Default").is_none());
    assert!(slots.container("Default").is_none());

    let noop = hook(|_: &HeadlessUi, _: &mut HookScope<'_, HeadlessRuntime>| {});
    assert!(overlay.add_hook("Default", &noop).is_none());
    assert_eq!(slots.created(), 2);
}

#[test]
fn release_detaches_the_emptied_container() {
    let host = host(OverlaySettings::default());
    host.overlay.create_context("A", &ContextConfig::default()).unwrap();
    host.overlay.create_context("B", &ContextConfig::default()).unwrap();
    let container = host.slots.container("Default").unwrap();

    host.overlay.release_context("A");
    assert_eq!(container.child_count(), 1);
    assert!(!container.is_detached());

    let b = host.overlay.find_context("B").unwrap();
    assert!(host.overlay.release_context_handle(&b));
    assert_eq!(container.child_count(), 0);
    assert!(container.is_detached());
}

#[test]
fn teardown_returns_capture_then_destroys_plot_before_gui() {
    let host = host(OverlaySettings {
        default_controls: true,
        ..OverlaySettings::default()
    });
    host.input.set_gameplay_focused(true);
    host.input.set_captor(Some(CaptorId(11)));
    let context = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();
    let id = context.borrow().runtime().unwrap().instance_id();
    host.overlay.tick();
    assert_eq!(host.input.captor(), None);

    take_teardown_log();
    host.overlay.release_context("Default");

    assert_eq!(host.input.captor(), Some(CaptorId(11)));
    assert_eq!(take_teardown_log(), vec![Teardown::Plot(id), Teardown::Gui(id)]);
    assert!(context.borrow().resources().is_empty());
}

#[test]
fn context_released_from_its_own_hook_finishes_the_frame_first() {
    let host = host(OverlaySettings::default());
    let overlay: Weak<ImGuiOverlay<HeadlessRuntime>> = Rc::downgrade(&host.overlay);
    let ran_after = Rc::new(Cell::new(false));

    let release = hook(move |_: &HeadlessUi, scope: &mut HookScope<'_, HeadlessRuntime>| {
        if let Some(overlay) = overlay.upgrade() {
            overlay.release_context(scope.context_name());
        }
    });
    let flag = ran_after.clone();
    let later = hook(move |ui: &HeadlessUi, _: &mut HookScope<'_, HeadlessRuntime>| {
        ui.text("still building");
        flag.set(true);
    });
    host.overlay.add_hook("Default", &release).unwrap();
    host.overlay.add_hook("Default", &later).unwrap();
    let context = host.overlay.find_context("Default").unwrap();
    let container = host.slots.container("Default").unwrap();

    take_teardown_log();
    container.tick(&Geometry::new([0.0, 0.0], [100.0, 100.0]), 0.0, 0.016);

    assert!(ran_after.get());
    assert_eq!(context.state(), ContextState::Released);
    assert!(context.borrow().runtime().is_none());
    assert_eq!(take_teardown_log().len(), 2);
    assert!(container.is_detached());
    assert!(host.overlay.find_context("Default").is_none());
}

#[test]
fn hook_api_is_usable_from_inside_a_hook() {
    let host = host(OverlaySettings::default());
    let overlay: Weak<ImGuiOverlay<HeadlessRuntime>> = Rc::downgrade(&host.overlay);
    let seen = Rc::new(Cell::new(0));
    let noop = hook(|_: &HeadlessUi, _: &mut HookScope<'_, HeadlessRuntime>| {});

    let counter = seen.clone();
    let other = noop.clone();
    let registrar = hook(move |_: &HeadlessUi, scope: &mut HookScope<'_, HeadlessRuntime>| {
        let Some(overlay) = overlay.upgrade() else {
            return;
        };
        if let Some(own) = overlay.find_context(scope.context_name()) {
            counter.set(own.hook_count());
        }
        overlay.add_hook("Other", &other);
    });
    host.overlay.add_hook("Default", &registrar).unwrap();

    host.slots
        .container("Default")
        .unwrap()
        .tick(&Geometry::new([0.0, 0.0], [100.0, 100.0]), 0.0, 0.016);

    assert_eq!(seen.get(), 1);
    assert_eq!(host.overlay.find_context("Other").unwrap().hook_count(), 1);
    assert_eq!(host.overlay.registry().names(), vec!["Default".to_owned(), "Other".to_owned()]);
}

#[test]
fn hook_reaches_its_own_context_through_the_scope() {
    let host = host(OverlaySettings::default());
    let seen: Rc<RefCell<Vec<(String, ContextState, bool)>>> = Rc::default();

    let log = seen.clone();
    let once = hook(move |_: &HeadlessUi, scope: &mut HookScope<'_, HeadlessRuntime>| {
        let Some(own) = scope.context() else {
            return;
        };
        // Mid-frame, so the context itself stays borrowed.
        log.borrow_mut()
            .push((own.name().to_owned(), own.state(), own.try_borrow_mut().is_none()));
        own.remove_hook(scope.hook_id());
    });
    host.overlay.add_hook("Default", &once).unwrap();
    let context = host.overlay.find_context("Default").unwrap();
    let container = host.slots.container("Default").unwrap();

    container.tick(&Geometry::new([0.0, 0.0], [100.0, 100.0]), 0.0, 0.016);
    container.tick(&Geometry::new([0.0, 0.0], [100.0, 100.0]), 0.0, 0.016);

    assert_eq!(*seen.borrow(), vec![("Default".to_owned(), ContextState::Active, true)]);
    assert_eq!(context.hook_count(), 0);
}

#[test]
fn shutdown_leaves_the_host_tree_alone() {
    let host = host(OverlaySettings::default());
    host.overlay.create_context("Default", &ContextConfig::default()).unwrap();
    let container = host.slots.container("Default").unwrap();

    host.overlay.shutdown();
    assert!(host.overlay.registry().is_empty());
    assert_eq!(container.child_count(), 1);
    assert!(!container.is_detached());
    assert!(host.overlay.create_context("Late", &ContextConfig::default()).is_none());
}

/// Container that registers a new context every time a slot is removed,
/// up to a limit
struct RespawningContainer {
    inner: HeadlessContainer,
    overlay: RefCell<Weak<ImGuiOverlay<HeadlessRuntime>>>,
    respawns: Cell<u32>,
}

impl OverlayContainer for RespawningContainer {
    fn add_slot(&self, z_order: Option<i32>, widget: WidgetRef) {
        self.inner.add_slot(z_order, widget);
    }

    fn remove_slot(&self, widget: &WidgetRef) -> bool {
        let removed = self.inner.remove_slot(widget);
        let overlay = self.overlay.borrow().upgrade();
        if let Some(overlay) = overlay
            && self.respawns.get() < 3
        {
            self.respawns.set(self.respawns.get() + 1);
            let name = format!("Respawned{}", self.respawns.get());
            overlay.create_context(&name, &ContextConfig::default());
        }
        removed
    }

    fn child_count(&self) -> usize {
        self.inner.child_count()
    }

    fn remove_from_parent(&self) {
        self.inner.remove_from_parent();
    }
}

struct RespawningSlots(Rc<RespawningContainer>);

impl SlotProvider for RespawningSlots {
    fn get_or_create_slot(&self, _name: &str) -> Option<Rc<dyn OverlayContainer>> {
        Some(self.0.clone())
    }
}

#[test]
fn release_all_converges_despite_reentrant_creation() {
    let container = Rc::new(RespawningContainer {
        inner: HeadlessContainer::new("Default"),
        overlay: RefCell::new(Weak::new()),
        respawns: Cell::new(0),
    });
    let services = HostServices::new(
        Rc::new(RespawningSlots(container.clone())),
        Rc::new(HeadlessInput::new()),
    );
    let overlay = Rc::new(ImGuiOverlay::<HeadlessRuntime>::new(OverlaySettings::default(), services));
    *container.overlay.borrow_mut() = Rc::downgrade(&overlay);

    overlay.create_context("A", &ContextConfig::default()).unwrap();
    overlay.create_context("B", &ContextConfig::default()).unwrap();
    overlay.release_all_contexts();

    assert!(overlay.registry().is_empty());
    assert_eq!(container.respawns.get(), 3);
    assert_eq!(container.child_count(), 0);
}
