//! Host services and the process-wide state every context reads

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::fonts::{BuiltinFonts, FileFontLoader, FontAtlasProvider, FontLoader};
use crate::host::{InputHost, SlotProvider};
use crate::key::KeyRemap;
use crate::layout::{LayoutStore, MemoryLayoutStore};
use crate::runtime::Runtime;
use crate::settings::OverlaySettings;

/// Everything the host provides to the overlay runtime
pub struct HostServices {
    pub slots: Rc<dyn SlotProvider>,
    pub input: Rc<dyn InputHost>,
    pub layouts: Rc<dyn LayoutStore>,
    /// `None` loads `settings.font`, or the built-in face if that is unset too
    pub fonts: Option<Box<dyn FontLoader>>,
}

impl HostServices {
    /// Services with in-memory layouts and fonts taken from settings
    pub fn new(slots: Rc<dyn SlotProvider>, input: Rc<dyn InputHost>) -> Self {
        Self {
            slots,
            input,
            layouts: Rc::new(MemoryLayoutStore::new()),
            fonts: None,
        }
    }

    pub fn with_layouts(mut self, layouts: Rc<dyn LayoutStore>) -> Self {
        self.layouts = layouts;
        self
    }

    pub fn with_fonts(mut self, fonts: Box<dyn FontLoader>) -> Self {
        self.fonts = Some(fonts);
        self
    }
}

/// Settings, global toggles and the services every context reads
///
/// Slots stay with the overlay: containers own contexts, and contexts own
/// this state.
pub struct SharedState<R: Runtime> {
    settings: OverlaySettings,
    visibility: Cell<bool>,
    controls: Cell<bool>,
    remap: KeyRemap,
    pub(crate) fonts: RefCell<FontAtlasProvider<R>>,
    pub(crate) input: Rc<dyn InputHost>,
    pub(crate) layouts: Rc<dyn LayoutStore>,
}

impl<R: Runtime> SharedState<R> {
    pub fn new(
        settings: OverlaySettings,
        input: Rc<dyn InputHost>,
        layouts: Rc<dyn LayoutStore>,
        fonts: Option<Box<dyn FontLoader>>,
    ) -> Self {
        let loader: Box<dyn FontLoader> = match (fonts, settings.font.as_ref()) {
            (Some(loader), _) => loader,
            (None, Some(path)) => Box::new(FileFontLoader::new(path)),
            (None, None) => Box::new(BuiltinFonts),
        };
        Self {
            visibility: Cell::new(settings.default_visibility),
            controls: Cell::new(settings.default_controls),
            remap: settings.key_remap(),
            fonts: RefCell::new(FontAtlasProvider::new(loader, settings.font_size)),
            input,
            layouts,
            settings,
        }
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    /// Global rendering toggle
    pub fn visibility(&self) -> bool {
        self.visibility.get()
    }

    pub fn set_visibility(&self, visible: bool) {
        self.visibility.set(visible);
    }

    /// Global input toggle
    pub fn controls(&self) -> bool {
        self.controls.get()
    }

    pub fn set_controls(&self, controls: bool) {
        self.controls.set(controls);
    }

    pub fn remap(&self) -> &KeyRemap {
        &self.remap
    }
}
