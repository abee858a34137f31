//! Dear ImGui + ImPlot runtime
//!
//! [`ImGuiRuntime`] drives a real `dear_imgui_rs::Context` paired with a
//! `dear_implot::PlotContext`. Every context shares one font atlas, built once
//! by [`Runtime::build_atlas`] and handed to the host as RGBA pixels.
//!
//! Both engines keep a process-global current context. Activation swaps both
//! in and restores the previous pair, so runtimes nest the same way
//! [`Activation`](crate::Activation) guards nest.
//!
//! Notes:
//! - Glyph ranges of [`FontFace`] are not forwarded; the atlas rasterizes
//!   glyphs on demand.
//! - User callbacks recorded into draw lists come out as
//!   [`DrawCmd::ResetRenderState`]; the host has no way to run them.
//! - The ImPlot demo window is empty unless `dear-implot` is built with its
//!   `demo` feature.

use std::cell::RefCell;
use std::mem::ManuallyDrop;
use std::ptr;
use std::rc::{Rc, Weak};

use dear_imgui_rs::{
    BackendFlags, ConfigFlags, Context, FontSource, MouseButton, SharedFontAtlas, StyleVar, Ui, sys,
};
use dear_implot::PlotContext;
use tracing::debug;

use crate::draw::{DrawCmd, DrawCmdParams, DrawFrame, DrawList, DrawVert, TextureId};
use crate::error::{OverlayError, OverlayResult};
use crate::fonts::FontFace;
use crate::hooks::{HookRef, HookScope, hook};
use crate::key::{ImKey, ImModifier, ImModifiers, ImMouseButton};
use crate::runtime::{AtlasPixels, FrameSetup, InputEvent, Runtime};

/// Seconds between layout saves
const INI_SAVING_RATE: f32 = 2.0;
/// Smallest delta time handed to the engine
const MIN_DELTA_TIME: f32 = 1.0e-4;

thread_local! {
    static CURRENT_PLOT: RefCell<Option<Weak<PlotContext>>> = const { RefCell::new(None) };
}

/// Engine-side texture id for a resource id
///
/// Hooks pass this to `Ui::image` and friends to draw a registered resource.
pub fn imgui_texture_id(id: TextureId) -> dear_imgui_rs::texture::TextureId {
    dear_imgui_rs::texture::TextureId::new(id.id() as usize)
}

/// Shared glyph atlas of every [`ImGuiRuntime`]
pub struct ImGuiAtlas {
    shared: SharedFontAtlas,
    pixels: Option<AtlasPixels>,
}

/// Clears the engine's current context and puts the previous one back on drop
struct Detached {
    previous: *mut sys::ImGuiContext,
}

impl Detached {
    fn new() -> Self {
        let previous = unsafe { sys::ImGui_GetCurrentContext() };
        unsafe { sys::ImGui_SetCurrentContext(ptr::null_mut()) };
        Self { previous }
    }
}

impl Drop for Detached {
    fn drop(&mut self) {
        unsafe { sys::ImGui_SetCurrentContext(self.previous) };
        let plot = CURRENT_PLOT.with(|current| current.borrow().as_ref().and_then(Weak::upgrade));
        if let Some(plot) = plot {
            plot.set_as_current();
        }
    }
}

/// GUI context, plot context and the IO state this crate tracks beside them
pub struct ImGuiRuntime {
    plot: ManuallyDrop<Rc<PlotContext>>,
    gui: ManuallyDrop<Context>,
    raw: *mut sys::ImGuiContext,
    previous: Vec<(*mut sys::ImGuiContext, Option<Weak<PlotContext>>)>,
    modifiers: ImModifiers,
    hovered_or_focused: bool,
}

impl ImGuiRuntime {
    /// Engine context this runtime drives
    pub fn gui(&self) -> &Context {
        &self.gui
    }

    fn configure(gui: &mut Context) -> OverlayResult<()> {
        gui.set_ini_filename(None::<String>)
            .map_err(|err| OverlayError::context_creation(err.to_string()))?;
        let io = gui.io_mut();
        io.set_config_flags(
            ConfigFlags::NAV_ENABLE_KEYBOARD | ConfigFlags::NAV_ENABLE_GAMEPAD | ConfigFlags::DOCKING_ENABLE,
        );
        io.set_backend_flags(BackendFlags::HAS_GAMEPAD | BackendFlags::HAS_MOUSE_CURSORS);
        unsafe {
            let io = sys::ImGui_GetIO();
            (*io).IniSavingRate = INI_SAVING_RATE;
            (*io).ConfigWindowsMoveFromTitleBarOnly = true;
        }
        Ok(())
    }
}

fn add_key(key: sys::ImGuiKey, down: bool) {
    unsafe { sys::ImGuiIO_AddKeyEvent(sys::ImGui_GetIO(), key, down) };
}

fn mouse_button(button: ImMouseButton) -> MouseButton {
    match button {
        ImMouseButton::Left => MouseButton::Left,
        ImMouseButton::Right => MouseButton::Right,
        ImMouseButton::Middle => MouseButton::Middle,
    }
}

/// Left-side key and modifier flag queued for a modifier
fn modifier_keys(modifier: ImModifier) -> [sys::ImGuiKey; 2] {
    match modifier {
        ImModifier::Ctrl => [sys::ImGuiKey_LeftCtrl, sys::ImGuiMod_Ctrl],
        ImModifier::Shift => [sys::ImGuiKey_LeftShift, sys::ImGuiMod_Shift],
        ImModifier::Alt => [sys::ImGuiKey_LeftAlt, sys::ImGuiMod_Alt],
        ImModifier::Super => [sys::ImGuiKey_LeftSuper, sys::ImGuiMod_Super],
    }
}

fn imgui_key(key: ImKey) -> sys::ImGuiKey {
    match key {
        ImKey::Tab => sys::ImGuiKey_Tab,
        ImKey::LeftArrow => sys::ImGuiKey_LeftArrow,
        ImKey::RightArrow => sys::ImGuiKey_RightArrow,
        ImKey::UpArrow => sys::ImGuiKey_UpArrow,
        ImKey::DownArrow => sys::ImGuiKey_DownArrow,
        ImKey::PageUp => sys::ImGuiKey_PageUp,
        ImKey::PageDown => sys::ImGuiKey_PageDown,
        ImKey::Home => sys::ImGuiKey_Home,
        ImKey::End => sys::ImGuiKey_End,
        ImKey::Insert => sys::ImGuiKey_Insert,
        ImKey::Delete => sys::ImGuiKey_Delete,
        ImKey::Backspace => sys::ImGuiKey_Backspace,
        ImKey::Space => sys::ImGuiKey_Space,
        ImKey::Enter => sys::ImGuiKey_Enter,
        ImKey::Escape => sys::ImGuiKey_Escape,
        ImKey::Pause => sys::ImGuiKey_Pause,
        ImKey::CapsLock => sys::ImGuiKey_CapsLock,
        ImKey::ScrollLock => sys::ImGuiKey_ScrollLock,
        ImKey::NumLock => sys::ImGuiKey_NumLock,
        ImKey::LeftCtrl => sys::ImGuiKey_LeftCtrl,
        ImKey::LeftShift => sys::ImGuiKey_LeftShift,
        ImKey::LeftAlt => sys::ImGuiKey_LeftAlt,
        ImKey::LeftSuper => sys::ImGuiKey_LeftSuper,
        ImKey::RightCtrl => sys::ImGuiKey_RightCtrl,
        ImKey::RightShift => sys::ImGuiKey_RightShift,
        ImKey::RightAlt => sys::ImGuiKey_RightAlt,
        ImKey::RightSuper => sys::ImGuiKey_RightSuper,
        ImKey::Key0 => sys::ImGuiKey_0,
        ImKey::Key1 => sys::ImGuiKey_1,
        ImKey::Key2 => sys::ImGuiKey_2,
        ImKey::Key3 => sys::ImGuiKey_3,
        ImKey::Key4 => sys::ImGuiKey_4,
        ImKey::Key5 => sys::ImGuiKey_5,
        ImKey::Key6 => sys::ImGuiKey_6,
        ImKey::Key7 => sys::ImGuiKey_7,
        ImKey::Key8 => sys::ImGuiKey_8,
        ImKey::Key9 => sys::ImGuiKey_9,
        ImKey::A => sys::ImGuiKey_A,
        ImKey::B => sys::ImGuiKey_B,
        ImKey::C => sys::ImGuiKey_C,
        ImKey::D => sys::ImGuiKey_D,
        ImKey::E => sys::ImGuiKey_E,
        ImKey::F => sys::ImGuiKey_F,
        ImKey::G => sys::ImGuiKey_G,
        ImKey::H => sys::ImGuiKey_H,
        ImKey::I => sys::ImGuiKey_I,
        ImKey::J => sys::ImGuiKey_J,
        ImKey::K => sys::ImGuiKey_K,
        ImKey::L => sys::ImGuiKey_L,
        ImKey::M => sys::ImGuiKey_M,
        ImKey::N => sys::ImGuiKey_N,
        ImKey::O => sys::ImGuiKey_O,
        ImKey::P => sys::ImGuiKey_P,
        ImKey::Q => sys::ImGuiKey_Q,
        ImKey::R => sys::ImGuiKey_R,
        ImKey::S => sys::ImGuiKey_S,
        ImKey::T => sys::ImGuiKey_T,
        ImKey::U => sys::ImGuiKey_U,
        ImKey::V => sys::ImGuiKey_V,
        ImKey::W => sys::ImGuiKey_W,
        ImKey::X => sys::ImGuiKey_X,
        ImKey::Y => sys::ImGuiKey_Y,
        ImKey::Z => sys::ImGuiKey_Z,
        ImKey::F1 => sys::ImGuiKey_F1,
        ImKey::F2 => sys::ImGuiKey_F2,
        ImKey::F3 => sys::ImGuiKey_F3,
        ImKey::F4 => sys::ImGuiKey_F4,
        ImKey::F5 => sys::ImGuiKey_F5,
        ImKey::F6 => sys::ImGuiKey_F6,
        ImKey::F7 => sys::ImGuiKey_F7,
        ImKey::F8 => sys::ImGuiKey_F8,
        ImKey::F9 => sys::ImGuiKey_F9,
        ImKey::F10 => sys::ImGuiKey_F10,
        ImKey::F11 => sys::ImGuiKey_F11,
        ImKey::F12 => sys::ImGuiKey_F12,
        ImKey::Keypad0 => sys::ImGuiKey_Keypad0,
        ImKey::Keypad1 => sys::ImGuiKey_Keypad1,
        ImKey::Keypad2 => sys::ImGuiKey_Keypad2,
        ImKey::Keypad3 => sys::ImGuiKey_Keypad3,
        ImKey::Keypad4 => sys::ImGuiKey_Keypad4,
        ImKey::Keypad5 => sys::ImGuiKey_Keypad5,
        ImKey::Keypad6 => sys::ImGuiKey_Keypad6,
        ImKey::Keypad7 => sys::ImGuiKey_Keypad7,
        ImKey::Keypad8 => sys::ImGuiKey_Keypad8,
        ImKey::Keypad9 => sys::ImGuiKey_Keypad9,
        ImKey::KeypadMultiply => sys::ImGuiKey_KeypadMultiply,
        ImKey::KeypadAdd => sys::ImGuiKey_KeypadAdd,
        ImKey::KeypadSubtract => sys::ImGuiKey_KeypadSubtract,
        ImKey::KeypadDecimal => sys::ImGuiKey_KeypadDecimal,
        ImKey::KeypadDivide => sys::ImGuiKey_KeypadDivide,
        ImKey::Apostrophe => sys::ImGuiKey_Apostrophe,
        ImKey::Comma => sys::ImGuiKey_Comma,
        ImKey::Minus => sys::ImGuiKey_Minus,
        ImKey::Period => sys::ImGuiKey_Period,
        ImKey::Slash => sys::ImGuiKey_Slash,
        ImKey::Semicolon => sys::ImGuiKey_Semicolon,
        ImKey::Equal => sys::ImGuiKey_Equal,
        ImKey::LeftBracket => sys::ImGuiKey_LeftBracket,
        ImKey::Backslash => sys::ImGuiKey_Backslash,
        ImKey::RightBracket => sys::ImGuiKey_RightBracket,
        ImKey::GraveAccent => sys::ImGuiKey_GraveAccent,
        ImKey::GamepadStart => sys::ImGuiKey_GamepadStart,
        ImKey::GamepadBack => sys::ImGuiKey_GamepadBack,
        ImKey::GamepadFaceLeft => sys::ImGuiKey_GamepadFaceLeft,
        ImKey::GamepadFaceRight => sys::ImGuiKey_GamepadFaceRight,
        ImKey::GamepadFaceUp => sys::ImGuiKey_GamepadFaceUp,
        ImKey::GamepadFaceDown => sys::ImGuiKey_GamepadFaceDown,
        ImKey::GamepadDpadLeft => sys::ImGuiKey_GamepadDpadLeft,
        ImKey::GamepadDpadRight => sys::ImGuiKey_GamepadDpadRight,
        ImKey::GamepadDpadUp => sys::ImGuiKey_GamepadDpadUp,
        ImKey::GamepadDpadDown => sys::ImGuiKey_GamepadDpadDown,
        ImKey::GamepadL1 => sys::ImGuiKey_GamepadL1,
        ImKey::GamepadR1 => sys::ImGuiKey_GamepadR1,
        ImKey::GamepadL2 => sys::ImGuiKey_GamepadL2,
        ImKey::GamepadR2 => sys::ImGuiKey_GamepadR2,
        ImKey::GamepadL3 => sys::ImGuiKey_GamepadL3,
        ImKey::GamepadR3 => sys::ImGuiKey_GamepadR3,
        ImKey::GamepadLStickLeft => sys::ImGuiKey_GamepadLStickLeft,
        ImKey::GamepadLStickRight => sys::ImGuiKey_GamepadLStickRight,
        ImKey::GamepadLStickUp => sys::ImGuiKey_GamepadLStickUp,
        ImKey::GamepadLStickDown => sys::ImGuiKey_GamepadLStickDown,
        ImKey::GamepadRStickLeft => sys::ImGuiKey_GamepadRStickLeft,
        ImKey::GamepadRStickRight => sys::ImGuiKey_GamepadRStickRight,
        ImKey::GamepadRStickUp => sys::ImGuiKey_GamepadRStickUp,
        ImKey::GamepadRStickDown => sys::ImGuiKey_GamepadRStickDown,
    }
}

fn copy_command(cmd: &dear_imgui_rs::render::DrawCmd<'_>, origin: [f32; 2]) -> DrawCmd {
    if cmd.is_user_callback() {
        return DrawCmd::ResetRenderState;
    }
    let [x1, y1, x2, y2] = cmd.clip_rect();
    DrawCmd::Elements {
        count: cmd.elem_count() as usize,
        cmd_params: DrawCmdParams {
            clip_rect: [x1 - origin[0], y1 - origin[1], x2 - origin[0], y2 - origin[1]],
            texture_id: TextureId::from_raw(cmd.texture_id().id() as u64),
            vtx_offset: cmd.vtx_offset() as usize,
            idx_offset: cmd.idx_offset() as usize,
        },
    }
}

impl Runtime for ImGuiRuntime {
    type Ui = Ui;
    type Atlas = ImGuiAtlas;

    fn name() -> &'static str {
        "Dear ImGui"
    }

    fn version() -> String {
        dear_imgui_rs::dear_imgui_version().to_string()
    }

    fn build_atlas(
        faces: &[FontFace],
        size_pixels: f32,
        texture_id: TextureId,
    ) -> OverlayResult<ImGuiAtlas> {
        let _detached = Detached::new();
        let mut gui = Context::create_with_shared_font_atlas(SharedFontAtlas::create())
            .map_err(|err| OverlayError::atlas_build(err.to_string()))?;

        let pixels = {
            let mut fonts = gui.font_atlas_mut();
            let sources: Vec<FontSource<'_>> = if faces.is_empty() {
                vec![FontSource::default_font_with_size(size_pixels)]
            } else {
                faces
                    .iter()
                    .map(|face| FontSource::TtfData {
                        data: &face.data,
                        size_pixels: Some(size_pixels),
                        config: None,
                    })
                    .collect()
            };
            fonts.add_font(&sources);
            if !fonts.build() {
                return Err(OverlayError::atlas_build("engine rejected the font faces"));
            }
            fonts.set_texture_id(imgui_texture_id(texture_id));

            // SAFETY: the atlas is built and outlives the copy
            unsafe { fonts.get_tex_data_ptr() }.map(|(data, width, height)| {
                let len = width as usize * height as usize * 4;
                AtlasPixels {
                    rgba: unsafe { std::slice::from_raw_parts(data, len) }.to_vec(),
                    width,
                    height,
                }
            })
        };
        let shared = gui
            .clone_shared_font_atlas()
            .ok_or_else(|| OverlayError::atlas_build("context dropped the shared atlas"))?;
        debug!(
            target: "dear-imgui-overlay",
            "Built font atlas: {} faces, {:?}",
            faces.len().max(1),
            pixels.as_ref().map(|pixels| (pixels.width, pixels.height))
        );
        Ok(ImGuiAtlas { shared, pixels })
    }

    fn atlas_pixels(atlas: &ImGuiAtlas) -> Option<AtlasPixels> {
        atlas.pixels.clone()
    }

    fn create(atlas: &ImGuiAtlas) -> OverlayResult<Self> {
        let _detached = Detached::new();
        let mut gui = Context::create_with_shared_font_atlas(atlas.shared.clone())
            .map_err(|err| OverlayError::context_creation(err.to_string()))?;
        let raw = unsafe { sys::ImGui_GetCurrentContext() };
        Self::configure(&mut gui)?;
        let plot = PlotContext::try_create(&gui)
            .map_err(|err| OverlayError::context_creation(err.to_string()))?;

        Ok(Self {
            plot: ManuallyDrop::new(Rc::new(plot)),
            gui: ManuallyDrop::new(gui),
            raw,
            previous: Vec::new(),
            modifiers: ImModifiers::empty(),
            hovered_or_focused: false,
        })
    }

    fn activate(&mut self) {
        let previous_gui = unsafe { sys::ImGui_GetCurrentContext() };
        let previous_plot = CURRENT_PLOT.with(|current| current.replace(Some(Rc::downgrade(&self.plot))));
        self.previous.push((previous_gui, previous_plot));
        unsafe { sys::ImGui_SetCurrentContext(self.raw) };
        self.plot.set_as_current();
    }

    fn deactivate(&mut self) {
        let (previous_gui, previous_plot) = self.previous.pop().unwrap_or((ptr::null_mut(), None));
        unsafe { sys::ImGui_SetCurrentContext(previous_gui) };
        if let Some(plot) = previous_plot.as_ref().and_then(Weak::upgrade) {
            plot.set_as_current();
        }
        CURRENT_PLOT.with(|current| *current.borrow_mut() = previous_plot);
    }

    fn push_event(&mut self, event: InputEvent) {
        match event {
            InputEvent::MouseButton { button, down } => {
                self.gui.io_mut().add_mouse_button_event(mouse_button(button), down);
            }
            InputEvent::Modifier { modifier, down } => {
                self.modifiers.set(modifier.into(), down);
                for key in modifier_keys(modifier) {
                    add_key(key, down);
                }
            }
            InputEvent::Key { key, down } => add_key(imgui_key(key), down),
            InputEvent::Char(ch) => self.gui.io_mut().add_input_character(ch),
            InputEvent::MousePos(position) => self.gui.io_mut().add_mouse_pos_event(position),
            InputEvent::MouseWheel(delta) => self.gui.io_mut().add_mouse_wheel_event(delta),
        }
    }

    fn want_text_input(&self) -> bool {
        self.gui.io().want_text_input()
    }

    fn is_modifier_down(&self) -> bool {
        !self.modifiers.is_empty()
    }

    fn is_hovered_or_focused(&self) -> bool {
        self.hovered_or_focused
    }

    fn want_save_settings(&self) -> bool {
        self.gui.io().want_save_ini_settings()
    }

    fn clear_want_save_settings(&mut self) {
        unsafe { (*sys::ImGui_GetIO()).WantSaveIniSettings = false };
    }

    fn save_settings(&mut self) -> String {
        let mut data = String::new();
        self.gui.save_ini_settings(&mut data);
        data
    }

    fn load_settings(&mut self, data: &str) {
        self.gui.load_ini_settings(data);
    }

    fn begin_frame(&mut self, setup: &FrameSetup, build: &mut dyn FnMut(&Ui)) {
        {
            let io = self.gui.io_mut();
            io.set_display_size(setup.display_size);
            io.set_delta_time(setup.delta_time.max(MIN_DELTA_TIME));
        }
        let draw_cursor = setup.overlay.is_some_and(|style| style.draw_cursor);
        unsafe { (*sys::ImGui_GetIO()).MouseDrawCursor = draw_cursor };

        let ui = self.gui.frame();
        match setup.overlay {
            Some(style) => {
                let _rounding = ui.push_style_var(StyleVar::FrameRounding(style.frame_rounding));
                let _border = ui.push_style_var(StyleVar::FrameBorderSize(style.frame_border_size));
                let _alpha = ui.push_style_var(StyleVar::Alpha(style.alpha));
                if style.dock_space {
                    ui.dockspace_over_main_viewport();
                }
                build(ui);
            }
            None => build(ui),
        }

        self.hovered_or_focused = ui.is_any_item_hovered()
            || unsafe {
                sys::ImGui_IsWindowHovered(sys::ImGuiHoveredFlags_AnyWindow as i32)
                    || sys::ImGui_IsWindowFocused(sys::ImGuiFocusedFlags_AnyWindow as i32)
            };
    }

    fn end_frame(&mut self) -> DrawFrame {
        let draw_data = self.gui.render();
        let origin = draw_data.display_pos;
        let lists = draw_data
            .draw_lists()
            .map(|list| DrawList {
                vertices: list
                    .vtx_buffer()
                    .iter()
                    .map(|vert| DrawVert {
                        pos: [vert.pos[0] - origin[0], vert.pos[1] - origin[1]],
                        uv: vert.uv,
                        col: vert.col,
                    })
                    .collect(),
                indices: list.idx_buffer().to_vec(),
                commands: list.commands().map(|cmd| copy_command(&cmd, origin)).collect(),
            })
            .collect();
        DrawFrame {
            display_size: draw_data.display_size,
            lists,
        }
    }

    fn demo_hooks() -> Vec<HookRef<Self>> {
        let mut gui_open = true;
        let mut plot_open = true;
        vec![
            hook(move |ui: &Ui, _: &mut HookScope<'_, Self>| {
                if gui_open {
                    ui.show_demo_window(&mut gui_open);
                }
            }),
            hook(move |_: &Ui, _: &mut HookScope<'_, Self>| {
                if plot_open {
                    dear_implot::show_demo_window(&mut plot_open);
                }
            }),
        ]
    }
}

impl Drop for ImGuiRuntime {
    fn drop(&mut self) {
        self.activate();
        // SAFETY: neither field is touched again; plot goes first
        unsafe {
            ManuallyDrop::drop(&mut self.plot);
            ManuallyDrop::drop(&mut self.gui);
        }
        self.deactivate();
    }
}
