//! Immediate-mode engine seam
//!
//! A [`Runtime`] owns one GUI context and its plot context. Engines of this
//! family keep a process-global "current context"; callers never touch it
//! directly and go through [`Activation`], which makes the runtime current for
//! its lifetime and restores whatever was current before.

use std::ops::{Deref, DerefMut};

use crate::draw::{DrawFrame, TextureId};
use crate::error::OverlayResult;
use crate::fonts::FontFace;
use crate::hooks::HookRef;
use crate::key::{ImKey, ImModifier, ImMouseButton};

/// Style rounding applied to every frame of a visible context
pub const FRAME_ROUNDING: f32 = 4.0;
/// Style border size applied to every frame of a visible context
pub const FRAME_BORDER_SIZE: f32 = 2.0;

/// Event queued into the immediate-mode IO
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InputEvent {
    MouseButton { button: ImMouseButton, down: bool },
    Modifier { modifier: ImModifier, down: bool },
    Key { key: ImKey, down: bool },
    Char(char),
    MousePos([f32; 2]),
    MouseWheel([f32; 2]),
}

/// Per-frame style decisions for a visible context
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct OverlayStyle {
    pub frame_rounding: f32,
    pub frame_border_size: f32,
    /// Global window alpha
    pub alpha: f32,
    /// Let the engine draw its own mouse cursor
    pub draw_cursor: bool,
    /// Dock space covering the whole viewport, passthru central node
    pub dock_space: bool,
}

/// Everything a runtime needs to start a frame
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameSetup {
    pub display_size: [f32; 2],
    pub delta_time: f32,
    /// `None` when rendering is globally disabled: no dock space, no hooks
    pub overlay: Option<OverlayStyle>,
}

/// RGBA8 pixels of a built font atlas
#[derive(Clone, Debug, PartialEq)]
pub struct AtlasPixels {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl AtlasPixels {
    pub fn size(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

/// One immediate-mode GUI context paired with its plot context
pub trait Runtime: Sized + 'static {
    /// Handle passed to hooks while a frame is being built
    type Ui;
    /// Shared glyph atlas
    type Atlas;

    /// Engine name reported by `versions()`
    fn name() -> &'static str;

    fn version() -> String;

    /// Build the shared atlas; `faces` may be empty to use the built-in face
    fn build_atlas(faces: &[FontFace], size_pixels: f32, texture_id: TextureId)
    -> OverlayResult<Self::Atlas>;

    fn atlas_pixels(atlas: &Self::Atlas) -> Option<AtlasPixels>;

    /// Create a configured context sharing `atlas`
    fn create(atlas: &Self::Atlas) -> OverlayResult<Self>;

    /// Make this runtime current, remembering the previous one
    fn activate(&mut self);

    /// Restore whatever was current before `activate`
    fn deactivate(&mut self);

    fn push_event(&mut self, event: InputEvent);

    fn want_text_input(&self) -> bool;

    /// Ctrl, Shift, Alt, Super or the platform shortcut key
    fn is_modifier_down(&self) -> bool;

    /// Any window hovered, any item hovered or any window focused
    fn is_hovered_or_focused(&self) -> bool;

    fn want_save_settings(&self) -> bool;

    fn clear_want_save_settings(&mut self);

    /// Serialize window layout
    fn save_settings(&mut self) -> String;

    fn load_settings(&mut self, data: &str);

    /// Start a frame and call `build` with the frame's UI
    fn begin_frame(&mut self, setup: &FrameSetup, build: &mut dyn FnMut(&Self::Ui));

    /// Finish the frame and copy out its draw data
    fn end_frame(&mut self) -> DrawFrame;

    /// Hooks showing the engine's demo windows
    fn demo_hooks() -> Vec<HookRef<Self>> {
        Vec::new()
    }
}

/// Scoped activation of a runtime
pub struct Activation<'a, R: Runtime> {
    runtime: &'a mut R,
}

impl<'a, R: Runtime> Activation<'a, R> {
    pub fn new(runtime: &'a mut R) -> Self {
        runtime.activate();
        Self { runtime }
    }
}

impl<R: Runtime> Deref for Activation<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.runtime
    }
}

impl<R: Runtime> DerefMut for Activation<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.runtime
    }
}

impl<R: Runtime> Drop for Activation<'_, R> {
    fn drop(&mut self) {
        self.runtime.deactivate();
    }
}
