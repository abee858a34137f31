//! One named immediate-mode context embedded in the host tree
//!
//! A [`Context`] owns its runtime (GUI plus plot context), its input router,
//! its hooks and its resource table. The host drives it through
//! [`OverlayWidget`]: `tick` runs begin frame, hooks and end frame, `paint`
//! translates the last frame's draw data into host draw elements.
//!
//! Teardown order is fixed: the router first (hands mouse capture back), then
//! the runtime (plot context before GUI context), then resources.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use bitflags::bitflags;

use crate::draw::{DrawCmd, DrawCmdParams, DrawFrame, HostVertex, TextureId};
use crate::error::{OverlayError, OverlayResult};
use crate::fonts::FONT_RESOURCE;
use crate::geometry::{ClipRect, Geometry, PaintRect};
use crate::hooks::{HookId, HookRef, HookScope, HookSet};
use crate::host::{DrawElementSink, OverlayContainer, OverlayWidget, Presentation, Visibility};
use crate::key::{HostKey, InputEventKind};
use crate::layout::DEFAULT_LAYOUT;
use crate::logging;
use crate::registry::WeakContext;
use crate::resources::{ImageSource, ResourceHandle, ResourceTable, Tint, WHITE};
use crate::router::{ContextKind, InputRouter, RouteGate};
use crate::runtime::{Activation, FRAME_BORDER_SIZE, FRAME_ROUNDING, FrameSetup, OverlayStyle, Runtime};
use crate::shared::SharedState;

bitflags! {
    /// Creation-time configuration of a context
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ContextFlags: u32 {
        /// Skip the full-viewport dock space
        const NO_DOCK_SPACE = 1 << 0;
        /// Never blur the host content behind the overlay
        const NO_BLUR = 1 << 1;
        /// Neither load nor save the window layout
        const NO_SAVED_LAYOUT = 1 << 2;
    }
}

/// Lifecycle of a context
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ContextState {
    Constructing,
    Active,
    /// Torn down, or torn down as soon as the current frame ends
    Released,
}

/// Options for [`ContextRegistry::create`](crate::ContextRegistry::create)
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContextConfig {
    pub flags: ContextFlags,
    /// Persisted-layout name; empty means [`DEFAULT_LAYOUT`]
    pub layout_name: String,
    /// Stacking order inside the slot; `None` places the context on top
    pub z_order: Option<i32>,
}

impl ContextConfig {
    pub fn with_flags(mut self, flags: ContextFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_layout_name(mut self, layout_name: impl Into<String>) -> Self {
        self.layout_name = layout_name.into();
        self
    }

    pub fn with_z_order(mut self, z_order: i32) -> Self {
        self.z_order = Some(z_order);
        self
    }
}

/// Counters of the last frame
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Element draw commands
    pub batches: usize,
    pub vertices: usize,
    pub indices: usize,
    pub triangles: usize,
    pub resources: usize,
    /// Footprint of every registered resource
    pub resource_bytes: usize,
    /// Footprint of the resources referenced by the last paint
    pub in_use_bytes: usize,
}

impl FrameStats {
    fn record_frame(&mut self, frame: &DrawFrame) {
        self.batches = frame
            .draw_lists()
            .flat_map(|list| list.commands.iter())
            .filter(|command| matches!(command, DrawCmd::Elements { .. }))
            .count();
        self.vertices = frame.total_vtx_count();
        self.indices = frame.total_idx_count();
        self.triangles = self.indices / 3;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FramePhase {
    Idle,
    Building,
}

/// Named immediate-mode context
pub struct Context<R: Runtime> {
    name: Rc<str>,
    state: Rc<Cell<ContextState>>,
    flags: ContextFlags,
    layout_name: String,
    shared: Rc<SharedState<R>>,
    container: Weak<dyn OverlayContainer>,
    // Declaration order is drop order: router, runtime, resources.
    router: Option<InputRouter>,
    runtime: Option<R>,
    resources: ResourceTable,
    hooks: Rc<RefCell<HookSet<R>>>,
    /// Set once the registry owns this context
    this: Option<WeakContext<R>>,
    geometry: Geometry,
    frame: Option<DrawFrame>,
    phase: FramePhase,
    presentation: Presentation,
    stats: FrameStats,
}

impl<R: Runtime> Context<R> {
    /// Build a context: shared atlas, runtime, `Font` resource, saved layout
    /// and input router, in that order
    pub(crate) fn construct(
        name: &str,
        config: &ContextConfig,
        container: Weak<dyn OverlayContainer>,
        shared: Rc<SharedState<R>>,
    ) -> OverlayResult<Self> {
        let state = Rc::new(Cell::new(ContextState::Constructing));

        let (runtime, pixels) = {
            let mut fonts = shared.fonts.borrow_mut();
            let atlas = fonts.ensure_built()?;
            (R::create(atlas)?, R::atlas_pixels(atlas))
        };
        let pixels = pixels.ok_or_else(|| OverlayError::atlas_build("atlas has no pixel data"))?;

        let mut resources = ResourceTable::new();
        let size = pixels.size();
        resources.add(FONT_RESOURCE, ImageSource::Pixels(pixels.rgba), Some(size), WHITE)?;

        let layout_name = if config.layout_name.is_empty() {
            DEFAULT_LAYOUT.to_owned()
        } else {
            config.layout_name.clone()
        };

        let mut context = Self {
            name: Rc::from(name),
            state,
            flags: config.flags,
            layout_name,
            shared,
            container,
            router: None,
            runtime: Some(runtime),
            resources,
            hooks: Rc::new(RefCell::new(HookSet::new())),
            this: None,
            geometry: Geometry::default(),
            frame: None,
            phase: FramePhase::Idle,
            presentation: Presentation::default(),
            stats: FrameStats::default(),
        };
        context.load_layout();
        context.router = Some(InputRouter::new(
            context.shared.input.clone(),
            context.shared.remap().clone(),
        ));
        context.state.set(ContextState::Active);
        tracing::info!(target: "dear-imgui-overlay", "Created context [{}]", context.name);
        Ok(context)
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

    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    pub fn layout_name(&self) -> &str {
        &self.layout_name
    }

    pub(crate) fn lifecycle(&self) -> Rc<Cell<ContextState>> {
        self.state.clone()
    }

    pub(crate) fn hook_set(&self) -> Rc<RefCell<HookSet<R>>> {
        self.hooks.clone()
    }

    /// Give hooks a way back to this context
    pub(crate) fn attach(&mut self, this: WeakContext<R>) {
        self.this = Some(this);
    }

    /// Gameplay when the host's focused game viewport contains our slot
    pub fn kind(&self) -> ContextKind {
        match self.container.upgrade() {
            Some(container) if self.shared.input.is_gameplay_focused(container.as_ref()) => {
                ContextKind::Gameplay
            }
            _ => ContextKind::Editor,
        }
    }

    /// True in a focused game viewport, or while any window is hovered or
    /// focused in the last frame
    pub fn has_focus(&mut self) -> bool {
        let kind = self.kind();
        let Some(runtime) = self.runtime.as_mut() else {
            return false;
        };
        let rt = Activation::new(runtime);
        kind == ContextKind::Gameplay || rt.is_hovered_or_focused()
    }

    /// Whether `key` would currently be offered to the immediate-mode layer
    pub fn can_route(&mut self, key: HostKey) -> bool {
        self.is_active() && self.gate().permits(key)
    }

    /// Whether the engine cursor would be drawn in the next frame
    pub fn can_draw_cursor(&mut self) -> bool {
        self.shared.settings().draw_cursor && self.has_focus() && self.can_route(HostKey::AnyKey)
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Draw data of the last finished frame
    pub fn last_frame(&self) -> Option<&DrawFrame> {
        self.frame.as_ref()
    }

    pub fn runtime(&self) -> Option<&R> {
        self.runtime.as_ref()
    }

    pub fn runtime_mut(&mut self) -> Option<&mut R> {
        self.runtime.as_mut()
    }

    pub fn router(&self) -> Option<&InputRouter> {
        self.router.as_ref()
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.resources
    }

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

    /// Register an image; see [`ResourceTable::add`]
    pub fn add_resource(
        &mut self,
        name: &str,
        source: ImageSource,
        size: Option<[f32; 2]>,
        tint: Tint,
    ) -> OverlayResult<TextureId> {
        self.resources.add(name, source, size, tint)
    }

    pub fn release_resource(&mut self, name: &str) -> bool {
        self.resources.release(name)
    }

    pub fn release_all_resources(&mut self) {
        self.resources.release_all();
    }

    pub fn resolve_resource(&self, name: &str) -> ResourceHandle {
        self.resources.resolve_handle(name)
    }

    /// Start a frame and run every hook registered when it started
    pub fn begin_frame(&mut self, geometry: &Geometry, delta_time: f32) {
        if !self.is_active() || self.phase == FramePhase::Building {
            return;
        }
        self.geometry = *geometry;
        let kind = self.kind();
        let visible = self.shared.visibility();
        let flags = self.flags;
        let Some(runtime) = self.runtime.as_mut() else {
            return;
        };
        let mut rt = Activation::new(runtime);

        if rt.want_save_settings() {
            let saved = flags.contains(ContextFlags::NO_SAVED_LAYOUT) || {
                let data = rt.save_settings();
                self.shared.layouts.save(&self.layout_name, data.as_bytes())
            };
            // A failed save keeps the request so the next frame retries.
            if saved {
                rt.clear_want_save_settings();
            }
        }

        let gate = route_gate(&self.shared, kind, &rt);
        if let Some(router) = self.router.as_mut() {
            router.release_unroutable(&mut *rt, &gate);
        }

        let routable = gate.permits(HostKey::AnyKey);
        let settings = self.shared.settings();
        let overlay = visible.then(|| OverlayStyle {
            frame_rounding: FRAME_ROUNDING,
            frame_border_size: FRAME_BORDER_SIZE,
            alpha: if routable {
                settings.alpha_when_focused
            } else {
                settings.alpha_when_not_focused
            },
            draw_cursor: routable && gate.focused && settings.draw_cursor,
            dock_space: !flags.contains(ContextFlags::NO_DOCK_SPACE),
        });
        self.presentation = if visible && routable {
            Presentation {
                blur_strength: if flags.contains(ContextFlags::NO_BLUR) {
                    0.0
                } else {
                    settings.blur_strength
                },
                visibility: Visibility::Visible,
            }
        } else {
            Presentation::default()
        };

        let [width, height] = geometry.absolute_size();
        let setup = FrameSetup {
            display_size: [width + 1.0, height + 1.0],
            delta_time,
            overlay,
        };

        let hooks = if visible {
            self.hooks.borrow_mut().snapshot()
        } else {
            Vec::new()
        };
        let name = &self.name;
        let hook_set = &self.hooks;
        let this = self.this.as_ref();
        let resources = &mut self.resources;
        rt.begin_frame(&setup, &mut |ui| {
            for (id, hook) in &hooks {
                // Removed by an earlier hook of this frame.
                if !hook_set.borrow().contains(*id) {
                    continue;
                }
                let Ok(mut hook) = hook.try_borrow_mut() else {
                    continue;
                };
                let mut scope = HookScope::new(name, *id, this, &mut *resources);
                hook.build(ui, &mut scope);
            }
        });
        self.phase = FramePhase::Building;
    }

    /// Finish the frame started by `begin_frame` and keep its draw data
    pub fn end_frame(&mut self) {
        if self.phase != FramePhase::Building {
            return;
        }
        self.phase = FramePhase::Idle;
        let Some(runtime) = self.runtime.as_mut() else {
            return;
        };
        let frame = Activation::new(runtime).end_frame();
        self.stats.record_frame(&frame);
        logging::log_frame_stats(&self.name, self.stats.batches, self.stats.vertices, self.stats.indices);
        self.frame = Some(frame);
    }

    /// Offer a key event; true if the immediate-mode layer claimed it
    pub fn route_key(&mut self, key: HostKey, event: InputEventKind, uppercase: bool) -> bool {
        if !self.is_active() {
            return false;
        }
        let kind = self.kind();
        let (Some(runtime), Some(router)) = (self.runtime.as_mut(), self.router.as_mut()) else {
            return false;
        };
        let mut rt = Activation::new(runtime);
        let gate = route_gate(&self.shared, kind, &rt);
        router.route_key(&mut *rt, &gate, key, event, uppercase)
    }

    pub fn route_axis(&mut self, key: HostKey, delta: f32) -> bool {
        if !self.is_active() {
            return false;
        }
        let kind = self.kind();
        let (Some(runtime), Some(router)) = (self.runtime.as_mut(), self.router.as_mut()) else {
            return false;
        };
        let mut rt = Activation::new(runtime);
        let gate = route_gate(&self.shared, kind, &rt);
        router.route_axis(&mut *rt, &gate, key, delta)
    }

    /// Forward the host cursor, taking or restoring mouse capture
    pub fn route_cursor(&mut self) -> bool {
        if !self.is_active() {
            return false;
        }
        let kind = self.kind();
        let (Some(runtime), Some(router)) = (self.runtime.as_mut(), self.router.as_mut()) else {
            return false;
        };
        let mut rt = Activation::new(runtime);
        let gate = route_gate(&self.shared, kind, &rt);
        router.route_cursor(&mut *rt, &gate, kind, &self.geometry)
    }

    /// Translate the last frame into host draw elements one layer above
    /// `layer`
    pub fn paint_frame(&mut self, rect: &PaintRect, layer: i32, sink: &mut dyn DrawElementSink) -> i32 {
        if !self.is_active() || !self.shared.visibility() {
            return layer;
        }
        let (Some(frame), Some(runtime)) = (self.frame.as_ref(), self.runtime.as_mut()) else {
            return layer;
        };
        let _rt = Activation::new(runtime);
        let origin = rect.origin();
        let mut in_use: Vec<TextureId> = Vec::new();

        for list in frame.draw_lists() {
            let vertices: Vec<HostVertex> = list
                .vertices
                .iter()
                .map(|vert| HostVertex::from_draw_vert(vert, origin))
                .collect();
            for command in &list.commands {
                match command {
                    DrawCmd::Callback(callback) => callback(),
                    DrawCmd::ResetRenderState => {}
                    DrawCmd::Elements {
                        count,
                        cmd_params:
                            DrawCmdParams {
                                clip_rect,
                                texture_id,
                                vtx_offset,
                                idx_offset,
                            },
                    } => {
                        if texture_id.is_null() {
                            continue;
                        }
                        let (Some(indices), Some(vertices)) =
                            (list.indices_for(*count, *idx_offset), vertices.get(*vtx_offset..))
                        else {
                            tracing::warn!(
                                target: "dear-imgui-overlay",
                                "Skipping out-of-range draw command in [{}]",
                                self.name
                            );
                            continue;
                        };
                        let resource = self.resources.resolve_texture(*texture_id);
                        sink.push_clip(ClipRect::from_clip(*clip_rect, origin));
                        sink.draw_custom_verts(layer + 1, &resource, vertices, indices);
                        sink.pop_clip();
                        if !in_use.contains(texture_id) {
                            in_use.push(*texture_id);
                        }
                    }
                }
            }
        }

        self.stats.in_use_bytes = in_use
            .iter()
            .map(|texture_id| self.resources.memory_bytes_of(*texture_id))
            .sum();
        layer + 1
    }

    /// Tear down now; no-op if already done
    pub(crate) fn teardown(&mut self) {
        self.state.set(ContextState::Released);
        if self.runtime.is_none() && self.router.is_none() {
            return;
        }
        self.router = None;
        self.runtime = None;
        if let Ok(mut hooks) = self.hooks.try_borrow_mut() {
            hooks.clear();
        }
        self.resources.release_all();
        self.frame = None;
        self.phase = FramePhase::Idle;
        tracing::debug!(target: "dear-imgui-overlay", "Tore down context [{}]", self.name);
    }

    fn gate(&mut self) -> RouteGate {
        let kind = self.kind();
        match self.runtime.as_mut() {
            Some(runtime) => route_gate(&self.shared, kind, &Activation::new(runtime)),
            None => RouteGate::CLOSED,
        }
    }

    fn load_layout(&mut self) {
        if self.flags.contains(ContextFlags::NO_SAVED_LAYOUT) {
            return;
        }
        let Some(data) = self.shared.layouts.load(&self.layout_name) else {
            return;
        };
        if let Some(runtime) = self.runtime.as_mut() {
            Activation::new(runtime).load_settings(&String::from_utf8_lossy(&data));
            tracing::debug!(
                target: "dear-imgui-overlay",
                "Loaded layout [{}] for [{}]",
                self.layout_name,
                self.name
            );
        }
    }
}

fn route_gate<R: Runtime>(shared: &SharedState<R>, kind: ContextKind, runtime: &R) -> RouteGate {
    RouteGate {
        visible: shared.visibility(),
        controls: shared.controls(),
        focused: kind == ContextKind::Gameplay || runtime.is_hovered_or_focused(),
    }
}

impl<R: Runtime> OverlayWidget for Context<R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn tick(&mut self, geometry: &Geometry, _current_time: f64, delta_time: f32) {
        if self.state.get() == ContextState::Released {
            self.teardown();
            return;
        }
        self.stats.resources = self.resources.len();
        self.stats.resource_bytes = self.resources.memory_bytes();
        self.stats.in_use_bytes = 0;

        self.begin_frame(geometry, delta_time);
        self.end_frame();

        // Released by a hook while the frame was being built.
        if self.state.get() == ContextState::Released {
            self.teardown();
        }
    }

    fn paint(&mut self, rect: &PaintRect, layer: i32, sink: &mut dyn DrawElementSink) -> i32 {
        self.paint_frame(rect, layer, sink)
    }

    fn presentation(&self) -> Presentation {
        self.presentation
    }
}

impl<R: Runtime> Drop for Context<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}
