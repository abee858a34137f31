//! Font faces and the shared glyph atlas
//!
//! Every context shares one atlas. It is built lazily the first time a context
//! is constructed and cached for the rest of the process; its pixels become
//! each context's `Font` resource.

use std::path::{Path, PathBuf};

use crate::draw::TextureId;
use crate::error::{OverlayError, OverlayResult};
use crate::runtime::{AtlasPixels, Runtime};

/// Name of the atlas resource registered in every context
pub const FONT_RESOURCE: &str = "Font";

/// Glyph ranges to rasterize for a face
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GlyphRanges {
    Default,
    Japanese,
    Korean,
    ChineseSimplified,
    ChineseTraditional,
    /// Inclusive codepoint ranges
    Custom(Vec<(u32, u32)>),
}

impl GlyphRanges {
    /// Infer ranges from a face name such as `NotoSansJP-Regular`
    pub fn from_face_name(name: &str) -> Self {
        let upper = name.to_ascii_uppercase();
        if upper.contains("JP") {
            GlyphRanges::Japanese
        } else if upper.contains("KR") {
            GlyphRanges::Korean
        } else if upper.contains("SC") {
            GlyphRanges::ChineseSimplified
        } else if upper.contains("TC") {
            GlyphRanges::ChineseTraditional
        } else {
            GlyphRanges::Default
        }
    }
}

/// One typeface to load into the atlas
#[derive(Clone, Debug, PartialEq)]
pub struct FontFace {
    pub name: String,
    /// TTF/OTF bytes
    pub data: Vec<u8>,
    pub glyph_ranges: GlyphRanges,
}

impl FontFace {
    /// Face with glyph ranges inferred from its name
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let name = name.into();
        let glyph_ranges = GlyphRanges::from_face_name(&name);
        Self {
            name,
            data,
            glyph_ranges,
        }
    }

    pub fn with_glyph_ranges(mut self, glyph_ranges: GlyphRanges) -> Self {
        self.glyph_ranges = glyph_ranges;
        self
    }
}

/// Supplies the faces of the shared atlas, base face first
pub trait FontLoader {
    fn load_faces(&self) -> OverlayResult<Vec<FontFace>>;
}

/// No faces; the runtime falls back to its built-in face
#[derive(Copy, Clone, Debug, Default)]
pub struct BuiltinFonts;

impl FontLoader for BuiltinFonts {
    fn load_faces(&self) -> OverlayResult<Vec<FontFace>> {
        Ok(Vec::new())
    }
}

/// Loads a font file, or every `.ttf`/`.otf` of a directory in name order
#[derive(Clone, Debug)]
pub struct FileFontLoader {
    path: PathBuf,
}

impl FileFontLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load_face(path: &Path) -> OverlayResult<FontFace> {
        let data = std::fs::read(path)
            .map_err(|err| OverlayError::font_loading(format!("{}: {}", path.display(), err)))?;
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(FontFace::new(name, data))
    }
}

impl FontLoader for FileFontLoader {
    fn load_faces(&self) -> OverlayResult<Vec<FontFace>> {
        if !self.path.is_dir() {
            return Ok(vec![Self::load_face(&self.path)?]);
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("ttf") || ext.eq_ignore_ascii_case("otf"))
            })
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(OverlayError::font_loading(format!(
                "no font files in {}",
                self.path.display()
            )));
        }
        paths.iter().map(|path| Self::load_face(path)).collect()
    }
}

/// Lazily built, process-wide atlas
pub struct FontAtlasProvider<R: Runtime> {
    loader: Box<dyn FontLoader>,
    size_pixels: f32,
    atlas: Option<R::Atlas>,
}

impl<R: Runtime> FontAtlasProvider<R> {
    pub fn new(loader: Box<dyn FontLoader>, size_pixels: f32) -> Self {
        Self {
            loader,
            size_pixels,
            atlas: None,
        }
    }

    pub fn is_built(&self) -> bool {
        self.atlas.is_some()
    }

    /// Build the atlas on first use
    pub fn ensure_built(&mut self) -> OverlayResult<&R::Atlas> {
        let atlas = match self.atlas.take() {
            Some(atlas) => atlas,
            None => {
                let faces = self.loader.load_faces()?;
                let atlas = R::build_atlas(&faces, self.size_pixels, TextureId::from_name(FONT_RESOURCE))?;
                tracing::info!(
                    target: "dear-imgui-overlay",
                    "Built font atlas with {} face(s) at {}px",
                    faces.len(),
                    self.size_pixels
                );
                atlas
            }
        };
        Ok(self.atlas.insert(atlas))
    }

    /// Pixels of the built atlas
    pub fn pixels(&self) -> Option<AtlasPixels> {
        self.atlas.as_ref().and_then(R::atlas_pixels)
    }

    /// Drop the cached atlas; the next context rebuilds it
    pub fn reset(&mut self) {
        self.atlas = None;
    }
}
