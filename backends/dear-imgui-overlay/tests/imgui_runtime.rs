#![cfg(feature = "imgui")]

use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, OnceLock};

use dear_imgui_overlay::{
    Activation, DrawCmd, DrawElement, DrawElementList, FONT_RESOURCE, FRAME_BORDER_SIZE,
    FRAME_ROUNDING, FrameSetup, Geometry, HeadlessInput, HeadlessSlots, HookScope, HostServices,
    ImGuiOverlay, ImGuiRuntime, ImModifier, InputEvent, OverlaySettings, OverlayStyle, PaintRect,
    Runtime, TextureId, hook,
};
use dear_imgui_rs::{Condition, Ui};

// The engine keeps one global current context; tests take turns.
fn test_guard() -> MutexGuard<'static, ()> {
    static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
    GUARD
        .get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn setup() -> FrameSetup {
    FrameSetup {
        display_size: [800.0, 600.0],
        delta_time: 1.0 / 60.0,
        overlay: Some(OverlayStyle {
            frame_rounding: FRAME_ROUNDING,
            frame_border_size: FRAME_BORDER_SIZE,
            alpha: 1.0,
            draw_cursor: false,
            dock_space: true,
        }),
    }
}

fn stats_window(ui: &Ui) {
    ui.window("Stats")
        .size([200.0, 100.0], Condition::FirstUseEver)
        .build(|| ui.text("fps"));
}

#[test]
fn atlas_pixels_cover_the_whole_texture() {
    let _guard = test_guard();
    let atlas = ImGuiRuntime::build_atlas(&[], 16.0, TextureId::from_name(FONT_RESOURCE)).unwrap();
    let pixels = ImGuiRuntime::atlas_pixels(&atlas).expect("built atlas has pixels");

    assert!(pixels.width > 0 && pixels.height > 0);
    assert_eq!(pixels.rgba.len(), pixels.width as usize * pixels.height as usize * 4);
}

#[test]
fn frames_copy_draw_lists_out_of_the_engine() {
    let _guard = test_guard();
    let atlas = ImGuiRuntime::build_atlas(&[], 16.0, TextureId::from_name(FONT_RESOURCE)).unwrap();
    let mut runtime = ImGuiRuntime::create(&atlas).unwrap();
    let mut rt = Activation::new(&mut runtime);

    // New windows stay hidden for their first frame.
    rt.begin_frame(&setup(), &mut stats_window);
    rt.end_frame();
    rt.begin_frame(&setup(), &mut stats_window);
    let frame = rt.end_frame();

    assert_eq!(frame.display_size, [800.0, 600.0]);
    assert!(frame.total_vtx_count() > 0);
    for list in frame.draw_lists() {
        for cmd in &list.commands {
            if let DrawCmd::Elements { count, cmd_params } = cmd {
                assert!(list.indices_for(*count, cmd_params.idx_offset).is_some());
            }
        }
    }
}

#[test]
fn window_layout_is_saved_and_modifiers_are_tracked() {
    let _guard = test_guard();
    let atlas = ImGuiRuntime::build_atlas(&[], 16.0, TextureId::from_name(FONT_RESOURCE)).unwrap();
    let mut runtime = ImGuiRuntime::create(&atlas).unwrap();
    let mut rt = Activation::new(&mut runtime);

    rt.push_event(InputEvent::Modifier {
        modifier: ImModifier::Ctrl,
        down: true,
    });
    assert!(rt.is_modifier_down());
    rt.push_event(InputEvent::Modifier {
        modifier: ImModifier::Ctrl,
        down: false,
    });
    assert!(!rt.is_modifier_down());

    rt.begin_frame(&setup(), &mut stats_window);
    rt.end_frame();
    assert!(rt.save_settings().contains("[Window][Stats]"));

    rt.clear_want_save_settings();
    assert!(!rt.want_save_settings());
}

#[test]
fn overlay_paints_engine_frames_with_the_font_resource() {
    let _guard = test_guard();
    let slots = Rc::new(HeadlessSlots::new());
    let overlay: ImGuiOverlay<ImGuiRuntime> = ImGuiOverlay::new(
        OverlaySettings::default(),
        HostServices::new(slots.clone(), Rc::new(HeadlessInput::new())),
    );
    let stats = hook(|ui: &Ui, _: &mut HookScope<'_, ImGuiRuntime>| stats_window(ui));
    overlay.add_hook("Default", &stats);
    let container = slots.container("Default").expect("default slot");
    let geometry = Geometry::new([0.0, 0.0], [800.0, 600.0]);

    let paint = || {
        container.tick(&geometry, 0.0, 1.0 / 60.0);
        let mut elements = DrawElementList::new();
        container.paint(&PaintRect::from_geometry(&geometry), 0, &mut elements);
        elements
    };
    paint();
    let elements = paint();

    let fonts = elements
        .elements
        .iter()
        .filter(|element| match element {
            DrawElement::CustomVerts { resource, .. } => {
                resource.brush().map(|brush| brush.name()) == Some(FONT_RESOURCE)
            }
            _ => false,
        })
        .count();
    assert!(fonts > 0);
}
