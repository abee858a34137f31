//! In-process runtime and host
//!
//! `HeadlessRuntime` implements [`Runtime`] without a GPU or a native engine:
//! it records queued input events, lets hooks emit textured quads and
//! callbacks, and produces real draw data. The host types implement the host
//! contracts over plain `Rc`/`RefCell` state. Together they drive tests and
//! hosts that only need input arbitration, such as dedicated servers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::draw::{DrawCmd, DrawCmdParams, DrawFrame, DrawIdx, DrawList, DrawVert, TextureId};
use crate::error::{OverlayError, OverlayResult};
use crate::fonts::FontFace;
use crate::geometry::{Geometry, PaintRect};
use crate::hooks::{HookRef, HookScope, hook};
use crate::host::{
    CaptorId, DrawElementSink, InputHost, OverlayContainer, SlotProvider, WidgetRef, same_widget,
};
use crate::key::{HostKey, ImModifiers};
use crate::runtime::{AtlasPixels, FrameSetup, InputEvent, OverlayStyle, Runtime};

thread_local! {
    static CURRENT: Cell<Option<u64>> = const { Cell::new(None) };
    static TEARDOWN: RefCell<Vec<Teardown>> = const { RefCell::new(Vec::new()) };
}

static NEXT_INSTANCE: AtomicU64 = AtomicU64::new(1);

/// Vertices addressable from one vertex offset
const INDEX_SPAN: usize = DrawIdx::MAX as usize + 1;

/// Instance id of the headless runtime current on this thread
pub fn current_runtime() -> Option<u64> {
    CURRENT.with(Cell::get)
}

/// Engine-side object destroyed when a headless runtime is dropped
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Teardown {
    Plot(u64),
    Gui(u64),
}

/// Destruction events recorded on this thread since the last call
pub fn take_teardown_log() -> Vec<Teardown> {
    TEARDOWN.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

/// Glyph atlas of the headless runtime: one white 8x8 cell per face
#[derive(Clone, Debug)]
pub struct HeadlessAtlas {
    pixels: AtlasPixels,
    texture_id: TextureId,
}

/// UI handle given to hooks
pub struct HeadlessUi {
    lists: RefCell<Vec<DrawList>>,
    display_size: [f32; 2],
    style: Option<OverlayStyle>,
    frame_index: u64,
    font_texture: TextureId,
}

impl HeadlessUi {
    pub(crate) fn new(font_texture: TextureId) -> Self {
        Self {
            lists: RefCell::new(Vec::new()),
            display_size: [0.0, 0.0],
            style: None,
            frame_index: 0,
            font_texture,
        }
    }

    pub fn display_size(&self) -> [f32; 2] {
        self.display_size
    }

    /// Style applied to this frame, `None` when rendering is disabled
    pub fn style(&self) -> Option<OverlayStyle> {
        self.style
    }

    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn font_texture(&self) -> TextureId {
        self.font_texture
    }

    /// Start a new draw list, like opening another window
    pub fn new_draw_list(&self) {
        self.lists.borrow_mut().push(DrawList::default());
    }

    /// Textured quad clipped to the display
    pub fn add_rect(&self, min: [f32; 2], max: [f32; 2], texture_id: TextureId, color: u32) {
        let clip = [0.0, 0.0, self.display_size[0], self.display_size[1]];
        self.add_rect_clipped(min, max, texture_id, color, clip);
    }

    /// Textured quad with an explicit `[x1, y1, x2, y2]` clip rect
    pub fn add_rect_clipped(
        &self,
        min: [f32; 2],
        max: [f32; 2],
        texture_id: TextureId,
        color: u32,
        clip_rect: [f32; 4],
    ) {
        self.with_list(|list| {
            let base = list.vertices.len();
            let idx_offset = list.indices.len();
            // Indices are relative to the command's vertex offset and must fit `DrawIdx`.
            let vtx_offset = match list.commands.iter().rev().find_map(|command| match command {
                DrawCmd::Elements { cmd_params, .. } => Some(cmd_params.vtx_offset),
                _ => None,
            }) {
                Some(offset) if base + 4 - offset <= INDEX_SPAN => offset,
                _ => base,
            };
            let corners = [
                ([min[0], min[1]], [0.0, 0.0]),
                ([max[0], min[1]], [1.0, 0.0]),
                ([max[0], max[1]], [1.0, 1.0]),
                ([min[0], max[1]], [0.0, 1.0]),
            ];
            list.vertices
                .extend(corners.iter().map(|&(pos, uv)| DrawVert { pos, uv, col: color }));
            list.indices
                .extend([0, 1, 2, 0, 2, 3].iter().map(|i| (base - vtx_offset + i) as DrawIdx));
            list.commands.push(DrawCmd::Elements {
                count: 6,
                cmd_params: DrawCmdParams {
                    clip_rect,
                    texture_id,
                    vtx_offset,
                    idx_offset,
                },
            });
        });
    }

    /// One quad per line of text, sampled from the font atlas
    pub fn text(&self, text: &str) {
        let width = text.chars().count() as f32 * 8.0;
        let line = self.lists.borrow().iter().map(|list| list.commands.len()).sum::<usize>();
        let top = line as f32 * 16.0;
        self.add_rect([0.0, top], [width, top + 16.0], self.font_texture, 0xffff_ffff);
    }

    pub fn add_callback(&self, callback: impl Fn() + 'static) {
        self.with_list(|list| list.commands.push(DrawCmd::Callback(Rc::new(callback))));
    }

    pub fn reset_render_state(&self) {
        self.with_list(|list| list.commands.push(DrawCmd::ResetRenderState));
    }

    fn with_list(&self, f: impl FnOnce(&mut DrawList)) {
        let mut lists = self.lists.borrow_mut();
        if lists.is_empty() {
            lists.push(DrawList::default());
        }
        if let Some(list) = lists.last_mut() {
            f(list);
        }
    }
}

/// Runtime that records everything in memory
pub struct HeadlessRuntime {
    instance_id: u64,
    previous: Vec<Option<u64>>,
    events: Vec<InputEvent>,
    modifiers: ImModifiers,
    want_text_input: bool,
    hovered_or_focused: bool,
    want_save_settings: bool,
    settings: String,
    loaded_settings: Option<String>,
    frame_count: u64,
    last_setup: Option<FrameSetup>,
    ui: HeadlessUi,
}

impl HeadlessRuntime {
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn is_current(&self) -> bool {
        current_runtime() == Some(self.instance_id)
    }

    /// Events queued since the last call
    pub fn take_events(&mut self) -> Vec<InputEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[InputEvent] {
        &self.events
    }

    pub fn set_want_text_input(&mut self, want: bool) {
        self.want_text_input = want;
    }

    /// Pretend a window is hovered or focused
    pub fn set_hovered_or_focused(&mut self, hovered: bool) {
        self.hovered_or_focused = hovered;
    }

    /// Pretend a window moved and the layout needs saving
    pub fn request_settings_save(&mut self, layout: impl Into<String>) {
        self.settings = layout.into();
        self.want_save_settings = true;
    }

    /// Layout blob passed to `load_settings`
    pub fn loaded_settings(&self) -> Option<&str> {
        self.loaded_settings.as_deref()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn last_setup(&self) -> Option<&FrameSetup> {
        self.last_setup.as_ref()
    }
}

impl Runtime for HeadlessRuntime {
    type Ui = HeadlessUi;
    type Atlas = HeadlessAtlas;

    fn name() -> &'static str {
        "headless"
    }

    fn version() -> String {
        env!("CARGO_PKG_VERSION").to_owned()
    }

    fn build_atlas(
        faces: &[FontFace],
        _size_pixels: f32,
        texture_id: TextureId,
    ) -> OverlayResult<HeadlessAtlas> {
        if let Some(face) = faces.iter().find(|face| face.data.is_empty()) {
            return Err(OverlayError::atlas_build(format!("face [{}] has no data", face.name)));
        }
        let cells = faces.len().max(1) as u32;
        let (width, height) = (8 * cells, 8);
        Ok(HeadlessAtlas {
            pixels: AtlasPixels {
                rgba: vec![0xff; (width * height * 4) as usize],
                width,
                height,
            },
            texture_id,
        })
    }

    fn atlas_pixels(atlas: &HeadlessAtlas) -> Option<AtlasPixels> {
        Some(atlas.pixels.clone())
    }

    fn create(atlas: &HeadlessAtlas) -> OverlayResult<Self> {
        Ok(Self {
            instance_id: NEXT_INSTANCE.fetch_add(1, Ordering::Relaxed),
            previous: Vec::new(),
            events: Vec::new(),
            modifiers: ImModifiers::empty(),
            want_text_input: false,
            hovered_or_focused: false,
            want_save_settings: false,
            settings: String::new(),
            loaded_settings: None,
            frame_count: 0,
            last_setup: None,
            ui: HeadlessUi::new(atlas.texture_id),
        })
    }

    fn activate(&mut self) {
        let previous = CURRENT.with(|current| current.replace(Some(self.instance_id)));
        self.previous.push(previous);
    }

    fn deactivate(&mut self) {
        let previous = self.previous.pop().flatten();
        CURRENT.with(|current| current.set(previous));
    }

    fn push_event(&mut self, event: InputEvent) {
        debug_assert!(self.is_current(), "event queued into an inactive runtime");
        if let InputEvent::Modifier { modifier, down } = event {
            self.modifiers.set(modifier.into(), down);
        }
        self.events.push(event);
    }

    fn want_text_input(&self) -> bool {
        self.want_text_input
    }

    fn is_modifier_down(&self) -> bool {
        !self.modifiers.is_empty()
    }

    fn is_hovered_or_focused(&self) -> bool {
        self.hovered_or_focused
    }

    fn want_save_settings(&self) -> bool {
        self.want_save_settings
    }

    fn clear_want_save_settings(&mut self) {
        self.want_save_settings = false;
    }

    fn save_settings(&mut self) -> String {
        self.settings.clone()
    }

    fn load_settings(&mut self, data: &str) {
        self.settings = data.to_owned();
        self.loaded_settings = Some(data.to_owned());
    }

    fn begin_frame(&mut self, setup: &FrameSetup, build: &mut dyn FnMut(&HeadlessUi)) {
        debug_assert!(self.is_current(), "frame started on an inactive runtime");
        self.last_setup = Some(*setup);
        self.ui.lists.borrow_mut().clear();
        self.ui.display_size = setup.display_size;
        self.ui.style = setup.overlay;
        self.ui.frame_index = self.frame_count;
        build(&self.ui);
    }

    fn end_frame(&mut self) -> DrawFrame {
        self.frame_count += 1;
        DrawFrame {
            display_size: self.ui.display_size,
            lists: std::mem::take(&mut *self.ui.lists.borrow_mut()),
        }
    }

    fn demo_hooks() -> Vec<HookRef<Self>> {
        vec![
            hook(|ui: &HeadlessUi, _: &mut HookScope<'_, Self>| ui.text("Dear ImGui Demo")),
            hook(|ui: &HeadlessUi, _: &mut HookScope<'_, Self>| ui.text("ImPlot Demo")),
        ]
    }
}

impl Drop for HeadlessRuntime {
    fn drop(&mut self) {
        TEARDOWN.with(|log| {
            let mut log = log.borrow_mut();
            log.push(Teardown::Plot(self.instance_id));
            log.push(Teardown::Gui(self.instance_id));
        });
    }
}

/// Host input services backed by cells
#[derive(Debug, Default)]
pub struct HeadlessInput {
    captor: Cell<Option<CaptorId>>,
    cursor: Cell<[f32; 2]>,
    gameplay: Cell<bool>,
    chars: RefCell<HashMap<HostKey, char>>,
}

impl HeadlessInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captor(&self) -> Option<CaptorId> {
        self.captor.get()
    }

    pub fn set_captor(&self, captor: Option<CaptorId>) {
        self.captor.set(captor);
    }

    pub fn set_cursor(&self, position: [f32; 2]) {
        self.cursor.set(position);
    }

    /// Report every context as living in a focused game viewport
    pub fn set_gameplay_focused(&self, gameplay: bool) {
        self.gameplay.set(gameplay);
    }

    pub fn map_char(&self, key: HostKey, ch: char) {
        self.chars.borrow_mut().insert(key, ch);
    }
}

impl InputHost for HeadlessInput {
    fn has_mouse_captor(&self) -> bool {
        self.captor.get().is_some()
    }

    fn cursor_position(&self) -> [f32; 2] {
        self.cursor.get()
    }

    fn take_mouse_capture(&self) -> Option<CaptorId> {
        self.captor.take()
    }

    fn restore_mouse_capture(&self, captor: CaptorId) {
        self.captor.set(Some(captor));
    }

    fn is_gameplay_focused(&self, _container: &dyn OverlayContainer) -> bool {
        self.gameplay.get()
    }

    fn char_for_key(&self, key: HostKey) -> Option<char> {
        self.chars.borrow().get(&key).copied()
    }
}

/// Overlay container that ticks and paints its children in z order
#[derive(Default)]
pub struct HeadlessContainer {
    name: String,
    children: RefCell<Vec<(i32, WidgetRef)>>,
    detached: Cell<bool>,
    allocations: Cell<usize>,
}

impl HeadlessContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of `add_slot` calls so far
    pub fn slot_allocations(&self) -> usize {
        self.allocations.get()
    }

    pub fn is_detached(&self) -> bool {
        self.detached.get()
    }

    pub fn widgets(&self) -> Vec<WidgetRef> {
        self.children.borrow().iter().map(|(_, widget)| widget.clone()).collect()
    }

    /// Tick every child, bottom to top
    pub fn tick(&self, geometry: &Geometry, current_time: f64, delta_time: f32) {
        for widget in self.widgets() {
            if let Ok(mut widget) = widget.try_borrow_mut() {
                widget.tick(geometry, current_time, delta_time);
            }
        }
    }

    /// Paint every child, bottom to top; returns the highest layer used
    pub fn paint(&self, rect: &PaintRect, layer: i32, sink: &mut dyn DrawElementSink) -> i32 {
        let mut max_layer = layer;
        for widget in self.widgets() {
            if let Ok(mut widget) = widget.try_borrow_mut() {
                max_layer = max_layer.max(widget.paint(rect, max_layer, sink));
            }
        }
        max_layer
    }
}

impl OverlayContainer for HeadlessContainer {
    fn add_slot(&self, z_order: Option<i32>, widget: WidgetRef) {
        self.allocations.set(self.allocations.get() + 1);
        let mut children = self.children.borrow_mut();
        let z = z_order.unwrap_or_else(|| children.last().map_or(0, |(z, _)| z.saturating_add(1)));
        let at = children.partition_point(|(existing, _)| *existing <= z);
        children.insert(at, (z, widget));
    }

    fn remove_slot(&self, widget: &WidgetRef) -> bool {
        let mut children = self.children.borrow_mut();
        let before = children.len();
        children.retain(|(_, child)| !same_widget(child, widget));
        children.len() != before
    }

    fn child_count(&self) -> usize {
        self.children.borrow().len()
    }

    fn remove_from_parent(&self) {
        self.detached.set(true);
    }
}

/// Slot provider that creates one container per slot name
#[derive(Default)]
pub struct HeadlessSlots {
    containers: RefCell<HashMap<String, Rc<HeadlessContainer>>>,
    created: Cell<usize>,
}

impl HeadlessSlots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Container currently attached under `name`
    pub fn container(&self, name: &str) -> Option<Rc<HeadlessContainer>> {
        self.containers
            .borrow()
            .get(name)
            .filter(|container| !container.is_detached())
            .cloned()
    }

    /// Number of containers created so far
    pub fn created(&self) -> usize {
        self.created.get()
    }
}

impl SlotProvider for HeadlessSlots {
    fn get_or_create_slot(&self, name: &str) -> Option<Rc<dyn OverlayContainer>> {
        if let Some(container) = self.container(name) {
            return Some(container);
        }
        let container = Rc::new(HeadlessContainer::new(name));
        self.containers
            .borrow_mut()
            .insert(name.to_owned(), container.clone());
        self.created.set(self.created.get() + 1);
        Some(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ui_quads_become_draw_data() {
        let atlas = HeadlessRuntime::build_atlas(&[], 16.0, TextureId::from_name("Font")).unwrap();
        let mut rt = HeadlessRuntime::create(&atlas).unwrap();
        let setup = FrameSetup {
            display_size: [100.0, 50.0],
            delta_time: 1.0 / 60.0,
            overlay: None,
        };

        rt.activate();
        rt.begin_frame(&setup, &mut |ui| {
            ui.add_rect([0.0, 0.0], [10.0, 10.0], ui.font_texture(), 0xffff_ffff);
            ui.new_draw_list();
            ui.add_rect([5.0, 5.0], [6.0, 6.0], TextureId::from_name("Logo"), 0xff00_00ff);
        });
        let frame = rt.end_frame();
        rt.deactivate();

        assert_eq!(frame.lists.len(), 2);
        assert_eq!(frame.total_vtx_count(), 8);
        assert_eq!(frame.total_idx_count(), 12);
        assert_eq!(rt.frame_count(), 1);
    }

    #[test]
    fn large_lists_rebase_vertex_offsets() {
        let atlas = HeadlessRuntime::build_atlas(&[], 16.0, TextureId::from_name("Font")).unwrap();
        let mut rt = HeadlessRuntime::create(&atlas).unwrap();
        let setup = FrameSetup {
            display_size: [100.0, 50.0],
            delta_time: 1.0 / 60.0,
            overlay: None,
        };
        let quads = INDEX_SPAN / 4 + 2;

        rt.activate();
        rt.begin_frame(&setup, &mut |ui| {
            for quad in 0..quads {
                let x = quad as f32;
                ui.add_rect([x, 0.0], [x + 1.0, 1.0], ui.font_texture(), 0xffff_ffff);
            }
        });
        let frame = rt.end_frame();
        rt.deactivate();

        let list = &frame.lists[0];
        let offsets: Vec<usize> = list
            .commands
            .iter()
            .filter_map(|command| match command {
                DrawCmd::Elements { cmd_params, .. } => Some(cmd_params.vtx_offset),
                _ => None,
            })
            .collect();
        assert_eq!(offsets.len(), quads);
        assert_eq!(offsets[0], 0);
        assert_eq!(offsets[INDEX_SPAN / 4 - 1], 0);
        assert_eq!(offsets[INDEX_SPAN / 4], INDEX_SPAN);
        assert_eq!(offsets[quads - 1], INDEX_SPAN);

        // Every command still addresses its own quad.
        for (quad, command) in list.commands.iter().enumerate() {
            let DrawCmd::Elements { count, cmd_params } = command else {
                panic!("unexpected command {command:?}");
            };
            let indices = list.indices_for(*count, cmd_params.idx_offset).unwrap();
            let first = list.vertices[cmd_params.vtx_offset + usize::from(indices[0])];
            assert_eq!(first.pos, [quad as f32, 0.0]);
        }
    }

    #[test]
    fn modifiers_are_tracked_from_events() {
        let atlas = HeadlessRuntime::build_atlas(&[], 16.0, TextureId::from_name("Font")).unwrap();
        let mut rt = HeadlessRuntime::create(&atlas).unwrap();
        rt.activate();
        rt.push_event(InputEvent::Modifier {
            modifier: crate::key::ImModifier::Alt,
            down: true,
        });
        assert!(rt.is_modifier_down());
        rt.push_event(InputEvent::Modifier {
            modifier: crate::key::ImModifier::Alt,
            down: false,
        });
        assert!(!rt.is_modifier_down());
        rt.deactivate();
    }

    #[test]
    fn dropping_runtime_destroys_plot_first() {
        let atlas = HeadlessRuntime::build_atlas(&[], 16.0, TextureId::from_name("Font")).unwrap();
        let rt = HeadlessRuntime::create(&atlas).unwrap();
        let id = rt.instance_id();
        take_teardown_log();
        drop(rt);
        assert_eq!(take_teardown_log(), vec![Teardown::Plot(id), Teardown::Gui(id)]);
    }

    #[test]
    fn slots_are_cached_until_detached() {
        let slots = HeadlessSlots::new();
        let first = slots.get_or_create_slot("Default").unwrap();
        let again = slots.get_or_create_slot("Default").unwrap();
        assert!(Rc::ptr_eq(&first, &again));
        first.remove_from_parent();
        slots.get_or_create_slot("Default").unwrap();
        assert_eq!(slots.created(), 2);
    }
}
