//! Per-context image resources
//!
//! Draw commands refer to images by [`TextureId`]. The table maps resource
//! names (and their ids) to brushes the host can paint with, and keeps every
//! brush alive until it is released or the context is torn down.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::draw::TextureId;
use crate::error::{OverlayError, OverlayResult};

static LIVE_RESOURCES: AtomicUsize = AtomicUsize::new(0);

/// Number of resources registered across every context of the process
pub fn live_resource_count() -> usize {
    LIVE_RESOURCES.load(Ordering::Relaxed)
}

/// A texture object owned by the host
///
/// Hosts with a garbage collector report whether the object is reachable
/// from their root set; unreachable textures are rooted for the duration of
/// registration.
pub trait HostTexture {
    /// Native size in pixels
    fn size(&self) -> [f32; 2];

    /// False if the object no longer backs a usable texture
    fn is_valid(&self) -> bool {
        true
    }

    fn is_rooted(&self) -> bool {
        true
    }

    fn add_to_root(&self) {}

    fn remove_from_root(&self) {}
}

/// Roots a host texture until dropped, if it was not rooted already
pub struct RootGuard<'a> {
    texture: &'a dyn HostTexture,
    added: bool,
}

impl<'a> RootGuard<'a> {
    pub fn new(texture: &'a dyn HostTexture) -> Self {
        let added = !texture.is_rooted();
        if added {
            texture.add_to_root();
        }
        Self { texture, added }
    }
}

impl Drop for RootGuard<'_> {
    fn drop(&mut self) {
        if self.added {
            self.texture.remove_from_root();
        }
    }
}

/// Where the pixels of a resource come from
#[derive(Clone)]
pub enum ImageSource {
    /// An existing host texture object
    Texture(Rc<dyn HostTexture>),
    /// A texture the host manages by name
    Named(String),
    /// Tightly packed RGBA8 pixels
    Pixels(Vec<u8>),
}

impl fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageSource::Texture(texture) => {
                f.debug_tuple("Texture").field(&texture.size()).finish()
            }
            ImageSource::Named(name) => f.debug_tuple("Named").field(name).finish(),
            ImageSource::Pixels(data) => f.debug_tuple("Pixels").field(&data.len()).finish(),
        }
    }
}

/// Linear RGBA tint
pub type Tint = [f32; 4];

/// Untinted
pub const WHITE: Tint = [1.0, 1.0, 1.0, 1.0];

/// Dynamically created image the host paints custom meshes with
#[derive(Debug)]
pub struct ImageBrush {
    name: String,
    texture_id: TextureId,
    source: ImageSource,
    size: [f32; 2],
    tint: Tint,
}

impl ImageBrush {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn texture_id(&self) -> TextureId {
        self.texture_id
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    pub fn size(&self) -> [f32; 2] {
        self.size
    }

    pub fn tint(&self) -> Tint {
        self.tint
    }

    /// Approximate GPU footprint, assuming RGBA8
    pub fn memory_bytes(&self) -> usize {
        match &self.source {
            ImageSource::Pixels(data) => data.len(),
            _ => (self.size[0].max(0.0) * self.size[1].max(0.0)) as usize * 4,
        }
    }
}

/// Render resource handle passed to the host with each mesh
///
/// The default handle is empty and means "draw nothing".
#[derive(Clone, Debug, Default)]
pub struct ResourceHandle(Option<Rc<ImageBrush>>);

impl ResourceHandle {
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn brush(&self) -> Option<&ImageBrush> {
        self.0.as_deref()
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        match (&self.0, &other.0) {
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

/// Name to brush map of one context
#[derive(Debug, Default)]
pub struct ResourceTable {
    brushes: HashMap<String, Rc<ImageBrush>>,
    by_id: HashMap<TextureId, String>,
}

impl ResourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an image under `name`
    ///
    /// `size` overrides the native size of the source; pixel buffers have no
    /// native size and must pass one.
    pub fn add(
        &mut self,
        name: &str,
        source: ImageSource,
        size: Option<[f32; 2]>,
        tint: Tint,
    ) -> OverlayResult<TextureId> {
        if name.is_empty() {
            return Err(OverlayError::EmptyResourceName);
        }
        if self.brushes.contains_key(name) {
            return Err(OverlayError::DuplicateResource { name: name.into() });
        }
        let texture_id = TextureId::from_name(name);
        if self.by_id.contains_key(&texture_id) {
            return Err(OverlayError::invalid_source(name, "texture id collides with another resource"));
        }

        let size = match &source {
            ImageSource::Texture(texture) => {
                if !texture.is_valid() {
                    return Err(OverlayError::invalid_source(name, "texture is no longer valid"));
                }
                let _rooted = RootGuard::new(texture.as_ref());
                size.unwrap_or_else(|| texture.size())
            }
            ImageSource::Named(texture_name) => {
                if texture_name.is_empty() {
                    return Err(OverlayError::invalid_source(name, "empty texture reference"));
                }
                size.unwrap_or_default()
            }
            ImageSource::Pixels(data) => {
                let Some(size) = size else {
                    return Err(OverlayError::invalid_source(name, "pixel buffer without a size"));
                };
                let expected = (size[0].max(0.0) as usize) * (size[1].max(0.0) as usize) * 4;
                if data.is_empty() || expected == 0 {
                    return Err(OverlayError::invalid_source(name, "zero-size pixel buffer"));
                }
                if data.len() != expected {
                    return Err(OverlayError::invalid_source(
                        name,
                        format!("expected {} bytes of RGBA8, got {}", expected, data.len()),
                    ));
                }
                size
            }
        };

        let brush = Rc::new(ImageBrush {
            name: name.to_owned(),
            texture_id,
            source,
            size,
            tint,
        });
        self.brushes.insert(name.to_owned(), brush);
        self.by_id.insert(texture_id, name.to_owned());
        LIVE_RESOURCES.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            target: "dear-imgui-overlay",
            "Added resource [{}] id={} size={}x{}",
            name, texture_id.id(), size[0], size[1]
        );
        Ok(texture_id)
    }

    /// Remove a resource; returns false if it was not registered
    pub fn release(&mut self, name: &str) -> bool {
        let Some(brush) = self.brushes.remove(name) else {
            return false;
        };
        self.by_id.remove(&brush.texture_id);
        LIVE_RESOURCES.fetch_sub(1, Ordering::Relaxed);
        tracing::debug!(target: "dear-imgui-overlay", "Released resource [{}]", name);
        true
    }

    pub fn release_all(&mut self) {
        let names: Vec<String> = self.brushes.keys().cloned().collect();
        for name in names {
            self.release(&name);
        }
    }

    /// Handle for `name`, empty if absent
    pub fn resolve_handle(&self, name: &str) -> ResourceHandle {
        ResourceHandle(self.brushes.get(name).cloned())
    }

    /// Handle for a draw command's texture id, empty if unknown
    pub fn resolve_texture(&self, texture_id: TextureId) -> ResourceHandle {
        self.by_id
            .get(&texture_id)
            .map(|name| self.resolve_handle(name))
            .unwrap_or_default()
    }

    pub fn get(&self, name: &str) -> Option<&ImageBrush> {
        self.brushes.get(name).map(Rc::as_ref)
    }

    pub fn texture_id(&self, name: &str) -> Option<TextureId> {
        self.brushes.get(name).map(|brush| brush.texture_id)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.brushes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.brushes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brushes.is_empty()
    }

    pub fn memory_bytes(&self) -> usize {
        self.brushes.values().map(|brush| brush.memory_bytes()).sum()
    }

    /// Footprint of the resource behind `texture_id`, zero if unknown
    pub fn memory_bytes_of(&self, texture_id: TextureId) -> usize {
        self.resolve_texture(texture_id)
            .brush()
            .map_or(0, ImageBrush::memory_bytes)
    }
}

impl Drop for ResourceTable {
    fn drop(&mut self) {
        LIVE_RESOURCES.fetch_sub(self.brushes.len(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct GcTexture {
        rooted: Cell<bool>,
        root_calls: Cell<u32>,
    }

    impl HostTexture for GcTexture {
        fn size(&self) -> [f32; 2] {
            [32.0, 16.0]
        }
        fn is_rooted(&self) -> bool {
            self.rooted.get()
        }
        fn add_to_root(&self) {
            self.rooted.set(true);
            self.root_calls.set(self.root_calls.get() + 1);
        }
        fn remove_from_root(&self) {
            self.rooted.set(false);
        }
    }

    fn rgba(w: usize, h: usize) -> ImageSource {
        ImageSource::Pixels(vec![0xff; w * h * 4])
    }

    #[test]
    fn font_resource_resolves_until_released() {
        let mut table = ResourceTable::new();
        let id = table.add("Font", rgba(4, 4), Some([4.0, 4.0]), WHITE).unwrap();
        assert_eq!(id, TextureId::from_name("Font"));

        let handle = table.resolve_handle("Font");
        assert!(!handle.is_empty());
        assert_eq!(handle, table.resolve_texture(id));
        assert_eq!(table.memory_bytes(), 64);

        assert!(table.release("Font"));
        assert!(table.resolve_handle("Font").is_empty());
        assert!(table.resolve_texture(id).is_empty());
        assert!(!table.release("Font"));
    }

    #[test]
    fn duplicate_names_keep_the_original() {
        let mut table = ResourceTable::new();
        table.add("Logo", rgba(2, 2), Some([2.0, 2.0]), WHITE).unwrap();
        let original = table.resolve_handle("Logo");

        let err = table
            .add("Logo", rgba(8, 8), Some([8.0, 8.0]), WHITE)
            .unwrap_err();
        assert!(matches!(err, OverlayError::DuplicateResource { .. }));
        assert_eq!(table.resolve_handle("Logo"), original);
        assert_eq!(table.get("Logo").map(ImageBrush::size), Some([2.0, 2.0]));
    }

    #[test]
    fn invalid_input_is_rejected() {
        let mut table = ResourceTable::new();
        assert!(matches!(
            table.add("", rgba(1, 1), Some([1.0, 1.0]), WHITE),
            Err(OverlayError::EmptyResourceName)
        ));
        assert!(table.add("Empty", ImageSource::Pixels(Vec::new()), Some([0.0, 0.0]), WHITE).is_err());
        assert!(table.add("Short", rgba(1, 1), Some([4.0, 4.0]), WHITE).is_err());
        assert!(table.add("Unsized", rgba(1, 1), None, WHITE).is_err());
        assert!(table.add("Ref", ImageSource::Named(String::new()), None, WHITE).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn unrooted_texture_is_rooted_only_during_registration() {
        let texture = Rc::new(GcTexture {
            rooted: Cell::new(false),
            root_calls: Cell::new(0),
        });
        let mut table = ResourceTable::new();
        table
            .add("Viewport", ImageSource::Texture(texture.clone()), None, WHITE)
            .unwrap();
        assert_eq!(texture.root_calls.get(), 1);
        assert!(!texture.rooted.get());
        assert_eq!(table.get("Viewport").map(ImageBrush::size), Some([32.0, 16.0]));
    }

    #[test]
    fn named_texture_uses_explicit_size() {
        let mut table = ResourceTable::new();
        table
            .add("Icon", ImageSource::Named("/Game/UI/T_Icon".into()), Some([24.0, 24.0]), WHITE)
            .unwrap();
        assert_eq!(table.get("Icon").map(ImageBrush::size), Some([24.0, 24.0]));
        assert_eq!(table.memory_bytes(), 24 * 24 * 4);
    }

    #[test]
    fn release_all_empties_the_table() {
        let mut table = ResourceTable::new();
        table.add("A", rgba(1, 1), Some([1.0, 1.0]), WHITE).unwrap();
        table.add("B", rgba(1, 1), Some([1.0, 1.0]), WHITE).unwrap();
        table.release_all();
        assert!(table.is_empty());
        assert!(table.resolve_handle("A").is_empty());
    }
}
