//! Contracts with the host UI tree
//!
//! The core never walks the host's widget hierarchy. It asks a
//! [`SlotProvider`] for an overlay container, hands that container a
//! [`WidgetRef`], and talks to input capture and focus through [`InputHost`].

use std::cell::RefCell;
use std::rc::Rc;

use crate::draw::{DrawIdx, HostVertex};
use crate::geometry::{ClipRect, Geometry, PaintRect};
use crate::key::HostKey;
use crate::resources::ResourceHandle;

/// How the host should treat the widget for hit testing
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    /// Drawn, but input passes through to whatever is underneath
    HitTestInvisible,
}

/// Host-side presentation decided by the last frame
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Presentation {
    /// Strength of the background blur behind the overlay
    pub blur_strength: f32,
    pub visibility: Visibility,
}

impl Default for Presentation {
    fn default() -> Self {
        Self {
            blur_strength: 0.0,
            visibility: Visibility::HitTestInvisible,
        }
    }
}

/// What the host sees of a context
pub trait OverlayWidget {
    fn name(&self) -> &str;

    /// Run one frame: begin, hooks, end
    fn tick(&mut self, geometry: &Geometry, current_time: f64, delta_time: f32);

    /// Emit the last frame into `sink`; returns the highest layer used
    fn paint(&mut self, rect: &PaintRect, layer: i32, sink: &mut dyn DrawElementSink) -> i32;

    fn presentation(&self) -> Presentation;
}

/// Widget handle stored by overlay containers
pub type WidgetRef = Rc<RefCell<dyn OverlayWidget>>;

/// Identity comparison of widget handles
pub fn same_widget(a: &WidgetRef, b: &WidgetRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Host panel that stacks overlay widgets
pub trait OverlayContainer {
    /// Add a child slot; `None` places it on top
    fn add_slot(&self, z_order: Option<i32>, widget: WidgetRef);

    /// Remove the slot holding `widget`; false if not a child
    fn remove_slot(&self, widget: &WidgetRef) -> bool;

    fn child_count(&self) -> usize;

    /// Detach this container from its own parent
    fn remove_from_parent(&self);
}

/// Finds or creates overlay containers by logical slot name
pub trait SlotProvider {
    fn get_or_create_slot(&self, name: &str) -> Option<Rc<dyn OverlayContainer>>;
}

/// Opaque token for a widget that held mouse capture
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CaptorId(pub u64);

/// Host input services used by the routers
pub trait InputHost {
    /// True if some widget currently holds mouse capture
    fn has_mouse_captor(&self) -> bool;

    /// Cursor position in absolute space
    fn cursor_position(&self) -> [f32; 2];

    /// Release the current mouse capture, returning who held it
    fn take_mouse_capture(&self) -> Option<CaptorId>;

    /// Hand capture back to a widget returned by `take_mouse_capture`
    fn restore_mouse_capture(&self, captor: CaptorId);

    /// True if the keyboard-focused widget is a running game viewport
    /// containing `container`
    fn is_gameplay_focused(&self, container: &dyn OverlayContainer) -> bool;

    /// Locale-correct character for a key, if the host's key manager knows one
    fn char_for_key(&self, key: HostKey) -> Option<char>;
}

/// Host draw-element list
pub trait DrawElementSink {
    fn push_clip(&mut self, clip: ClipRect);

    fn draw_custom_verts(
        &mut self,
        layer: i32,
        resource: &ResourceHandle,
        vertices: &[HostVertex],
        indices: &[DrawIdx],
    );

    fn pop_clip(&mut self);
}

/// Recorded draw element
#[derive(Clone, Debug, PartialEq)]
pub enum DrawElement {
    PushClip(ClipRect),
    CustomVerts {
        layer: i32,
        resource: ResourceHandle,
        vertices: Vec<HostVertex>,
        indices: Vec<DrawIdx>,
    },
    PopClip,
}

/// `DrawElementSink` that records into a list
#[derive(Clone, Debug, Default)]
pub struct DrawElementList {
    pub elements: Vec<DrawElement>,
}

impl DrawElementList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of custom-mesh elements
    pub fn mesh_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|element| matches!(element, DrawElement::CustomVerts { .. }))
            .count()
    }
}

impl DrawElementSink for DrawElementList {
    fn push_clip(&mut self, clip: ClipRect) {
        self.elements.push(DrawElement::PushClip(clip));
    }

    fn draw_custom_verts(
        &mut self,
        layer: i32,
        resource: &ResourceHandle,
        vertices: &[HostVertex],
        indices: &[DrawIdx],
    ) {
        self.elements.push(DrawElement::CustomVerts {
            layer,
            resource: resource.clone(),
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
        });
    }

    fn pop_clip(&mut self) {
        self.elements.push(DrawElement::PopClip);
    }
}
