use std::collections::HashSet;
use std::rc::Rc;

use dear_imgui_overlay::{
    CaptorId, ContextConfig, ContextHandle, Geometry, HeadlessInput, HeadlessRuntime, HeadlessSlots,
    HostKey, HostServices, ImGuiOverlay, InputEvent, InputEventKind, KeyHold, KeyPair,
    OverlaySettings, Runtime,
};
use pretty_assertions::assert_eq;

struct Host {
    slots: Rc<HeadlessSlots>,
    input: Rc<HeadlessInput>,
    overlay: ImGuiOverlay<HeadlessRuntime>,
}

fn host(settings: OverlaySettings) -> Host {
    let slots = Rc::new(HeadlessSlots::new());
    let input = Rc::new(HeadlessInput::new());
    let overlay = ImGuiOverlay::new(settings, HostServices::new(slots.clone(), input.clone()));
    Host {
        slots,
        input,
        overlay,
    }
}

fn with_controls() -> OverlaySettings {
    OverlaySettings {
        default_controls: true,
        ..OverlaySettings::default()
    }
}

fn take_events(context: &ContextHandle<HeadlessRuntime>) -> Vec<InputEvent> {
    context
        .borrow_mut()
        .runtime_mut()
        .map(HeadlessRuntime::take_events)
        .unwrap_or_default()
}

fn hold(context: &ContextHandle<HeadlessRuntime>, key: HostKey) -> Option<KeyHold> {
    context.borrow().router().and_then(|router| router.hold(key))
}

#[test]
fn visibility_chord_toggles_and_is_not_forwarded() {
    let settings = OverlaySettings {
        toggle_visibility: vec![KeyPair {
            key_a: HostKey::Home,
            key_b: HostKey::Invalid,
        }],
        ..with_controls()
    };
    let host = host(settings);
    host.input.set_gameplay_focused(true);
    let context = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();

    assert!(host.overlay.visibility());
    assert!(host.overlay.route_key(HostKey::Home, InputEventKind::Pressed, false));
    assert!(!host.overlay.visibility());
    assert!(take_events(&context).is_empty());
    assert_eq!(hold(&context, HostKey::Home), None);

    host.overlay.route_key(HostKey::Home, InputEventKind::Released, false);
    assert!(host.overlay.route_key(HostKey::Home, InputEventKind::Pressed, false));
    assert!(host.overlay.visibility());
    assert!(take_events(&context).is_empty());
}

#[test]
fn repeat_does_not_refire_a_chord() {
    let host = host(with_controls());
    assert!(host.overlay.route_key(HostKey::Insert, InputEventKind::Pressed, false));
    assert!(!host.overlay.controls());
    host.overlay.route_key(HostKey::Insert, InputEventKind::Repeat, false);
    assert!(!host.overlay.controls());
}

#[test]
fn gamepad_chord_toggles_controls() {
    let host = host(OverlaySettings::default());
    assert!(!host.overlay.controls());
    host.overlay.route_key(HostKey::GamepadSpecialLeft, InputEventKind::Pressed, false);
    assert!(host.overlay.route_key(HostKey::GamepadDPadUp, InputEventKind::Pressed, false));
    assert!(host.overlay.controls());
}

#[test]
fn forbidden_press_stays_with_the_host() {
    let host = host(OverlaySettings::default());
    host.input.set_gameplay_focused(true);
    let context = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();

    assert!(!host.overlay.route_key(HostKey::LeftMouseButton, InputEventKind::Pressed, false));
    assert_eq!(hold(&context, HostKey::LeftMouseButton), Some(KeyHold::Engine));
    assert!(take_events(&context).is_empty());
}

#[test]
fn permitted_press_is_claimed_by_the_first_context() {
    let host = host(with_controls());
    host.input.set_gameplay_focused(true);
    let first = host.overlay.create_context("A", &ContextConfig::default()).unwrap();
    let second = host.overlay.create_context("B", &ContextConfig::default()).unwrap();

    assert!(host.overlay.route_key(HostKey::LeftMouseButton, InputEventKind::Pressed, false));
    assert!(matches!(hold(&first, HostKey::LeftMouseButton), Some(KeyHold::Api(_))));
    assert_eq!(hold(&second, HostKey::LeftMouseButton), None);
    assert_eq!(take_events(&first).len(), 1);
    assert!(take_events(&second).is_empty());
}

#[test]
fn losing_controls_releases_before_engine_tracking() {
    let host = host(with_controls());
    host.input.set_gameplay_focused(true);
    let context = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();

    assert!(host.overlay.route_key(HostKey::W, InputEventKind::Pressed, false));
    host.overlay.set_controls(false);
    assert!(!host.overlay.route_key(HostKey::W, InputEventKind::Repeat, false));

    let events = take_events(&context);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], InputEvent::Key { down: true, .. }));
    assert!(matches!(events[1], InputEvent::Key { down: false, .. }));
    assert_eq!(hold(&context, HostKey::W), Some(KeyHold::Engine));

    host.overlay.route_key(HostKey::W, InputEventKind::Released, false);
    assert_eq!(hold(&context, HostKey::W), None);
    assert!(take_events(&context).is_empty());
}

#[test]
fn frame_begin_releases_keys_that_became_unroutable() {
    let host = host(with_controls());
    host.input.set_gameplay_focused(true);
    let context = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();
    host.overlay.route_key(HostKey::LeftMouseButton, InputEventKind::Pressed, false);
    take_events(&context);

    host.overlay.set_visibility(false);
    let container = host.slots.container("Default").unwrap();
    container.tick(&Geometry::new([0.0, 0.0], [320.0, 200.0]), 0.0, 0.016);

    let events = take_events(&context);
    assert!(matches!(events.as_slice(), [InputEvent::MouseButton { down: false, .. }]));
    assert_eq!(hold(&context, HostKey::LeftMouseButton), None);
}

#[test]
fn editor_context_needs_hover_for_buttons_but_not_motion() {
    let host = host(with_controls());
    host.input.set_cursor([40.0, 30.0]);
    let context = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();
    host.slots
        .container("Default")
        .unwrap()
        .tick(&Geometry::new([10.0, 10.0], [320.0, 200.0]), 0.0, 0.016);

    assert!(host.overlay.route_cursor());
    assert_eq!(take_events(&context), vec![InputEvent::MousePos([30.0, 20.0])]);
    assert!(!host.overlay.route_key(HostKey::LeftMouseButton, InputEventKind::Pressed, false));
    host.overlay.route_key(HostKey::LeftMouseButton, InputEventKind::Released, false);

    context.borrow_mut().runtime_mut().unwrap().set_hovered_or_focused(true);
    assert!(host.overlay.route_key(HostKey::LeftMouseButton, InputEventKind::Pressed, false));
}

#[test]
fn tick_steals_and_returns_mouse_capture() {
    let host = host(with_controls());
    host.input.set_gameplay_focused(true);
    host.input.set_captor(Some(CaptorId(7)));
    let context = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();

    host.overlay.tick();
    assert_eq!(host.input.captor(), None);
    assert_eq!(context.borrow().router().and_then(|r| r.stolen_captor()), Some(CaptorId(7)));

    host.overlay.set_visibility(false);
    host.overlay.tick();
    assert_eq!(host.input.captor(), Some(CaptorId(7)));
}

#[test]
fn only_the_wheel_axis_is_routed() {
    let host = host(with_controls());
    host.input.set_gameplay_focused(true);
    let context = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();

    assert!(host.overlay.route_axis(HostKey::MouseWheelAxis, 2.0));
    assert!(!host.overlay.route_axis(HostKey::GamepadLeftTrigger, 0.5));
    assert_eq!(take_events(&context), vec![InputEvent::MouseWheel([0.0, 2.0])]);
}

/// Drives a pseudo-random key sequence while flipping the global toggles and
/// checks that, once every physical key is up, nothing is still down on the
/// immediate-mode side.
#[test]
fn no_key_is_left_down_after_random_toggling() {
    let host = host(with_controls());
    host.input.set_gameplay_focused(true);
    let context = host.overlay.create_context("Default", &ContextConfig::default()).unwrap();
    let keys = [
        HostKey::A,
        HostKey::W,
        HostKey::Enter,
        HostKey::LeftShift,
        HostKey::LeftMouseButton,
        HostKey::RightMouseButton,
    ];

    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut next = move |bound: u64| {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (state >> 33) % bound
    };

    let mut physically_down: HashSet<HostKey> = HashSet::new();
    let mut api_down: HashSet<String> = HashSet::new();
    let record = |events: Vec<InputEvent>, api_down: &mut HashSet<String>| {
        for event in events {
            let (id, down) = match event {
                InputEvent::Key { key, down } => (format!("{key:?}"), down),
                InputEvent::MouseButton { button, down } => (format!("{button:?}"), down),
                InputEvent::Modifier { modifier, down } => (format!("{modifier:?}"), down),
                _ => continue,
            };
            if down {
                api_down.insert(id);
            } else {
                api_down.remove(&id);
            }
        }
    };

    for _ in 0..400 {
        match next(10) {
            0 => host.overlay.set_controls(!host.overlay.controls()),
            1 => host.overlay.set_visibility(!host.overlay.visibility()),
            _ => {
                let key = keys[next(keys.len() as u64) as usize];
                let event = if physically_down.contains(&key) {
                    if next(3) == 0 {
                        InputEventKind::Repeat
                    } else {
                        physically_down.remove(&key);
                        InputEventKind::Released
                    }
                } else {
                    physically_down.insert(key);
                    InputEventKind::Pressed
                };
                host.overlay.route_key(key, event, false);
            }
        }
        record(take_events(&context), &mut api_down);

        let borrowed = context.borrow();
        let router = borrowed.router().unwrap();
        for key in router.api_held() {
            assert!(physically_down.contains(&key), "{key:?} held by the overlay while up");
        }
    }

    for key in physically_down.drain() {
        host.overlay.route_key(key, InputEventKind::Released, false);
    }
    record(take_events(&context), &mut api_down);

    assert!(api_down.is_empty(), "stuck on the overlay side: {api_down:?}");
    assert_eq!(context.borrow().router().unwrap().api_held().count(), 0);
    assert!(!context.borrow().runtime().unwrap().is_modifier_down());
}
