//! Error types for the overlay runtime
//!
//! Most lookups in this crate return `Option` or a default handle instead of an
//! error. `OverlayError` covers the operations that can genuinely fail: context
//! construction, resource registration, settings and layout I/O.

use thiserror::Error;
use tracing::{error, warn};

/// Result type for overlay operations
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Errors that can occur while hosting immediate-mode contexts
#[derive(Error, Debug)]
pub enum OverlayError {
    /// The shared font atlas could not be built
    #[error("Failed to build font atlas: {reason}")]
    AtlasBuild { reason: String },

    /// The immediate-mode runtime refused to create a context
    #[error("Failed to create runtime context: {reason}")]
    ContextCreation { reason: String },

    /// A context with this name could not be constructed
    #[error("Context construction failed for [{name}]: {source}")]
    Construction {
        name: String,
        #[source]
        source: Box<OverlayError>,
    },

    /// Resource name was empty
    #[error("Resource name must not be empty")]
    EmptyResourceName,

    /// A resource with this name already exists in the table
    #[error("Resource [{name}] is already registered")]
    DuplicateResource { name: String },

    /// The image source carried no usable data
    #[error("Resource [{name}] has an invalid source: {reason}")]
    InvalidSource { name: String, reason: String },

    /// Font loading error
    #[error("Font loading failed: {reason}")]
    FontLoading { reason: String },

    /// Settings file could not be parsed
    #[error("Invalid settings: {0}")]
    Settings(#[from] toml::de::Error),

    /// IO operation error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl OverlayError {
    /// Create an atlas build error
    pub fn atlas_build(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        error!(target: "dear-imgui-overlay", "Font atlas build failed: {}", reason);
        Self::AtlasBuild { reason }
    }

    /// Create a context creation error
    pub fn context_creation(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        error!(target: "dear-imgui-overlay", "Runtime context creation failed: {}", reason);
        Self::ContextCreation { reason }
    }

    /// Wrap an error raised while constructing the named context
    pub fn construction(name: impl Into<String>, source: OverlayError) -> Self {
        let name = name.into();
        warn!(target: "dear-imgui-overlay", "Context [{}] failed to construct: {}", name, source);
        Self::Construction {
            name,
            source: Box::new(source),
        }
    }

    /// Create an invalid source error
    pub fn invalid_source(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSource {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a font loading error
    pub fn font_loading(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(target: "dear-imgui-overlay", "Font loading failed: {}", reason);
        Self::FontLoading { reason }
    }

    /// True for the guard-clause rejections of the resource table
    pub fn is_rejected_resource(&self) -> bool {
        matches!(
            self,
            Self::EmptyResourceName | Self::DuplicateResource { .. } | Self::InvalidSource { .. }
        )
    }
}
