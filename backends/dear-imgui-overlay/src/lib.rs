//! Immediate-mode overlay runtime for retained-mode host UIs
//!
//! This crate embeds Dear ImGui style contexts inside a host widget tree. The
//! host keeps its own layout, input and paint pipeline; the overlay adds:
//!
//! - **Context registry**: named contexts, created idempotently into overlay
//!   slots the host provides, and released cleanly even during shutdown
//! - **Input arbitration**: a global dispatcher with chord toggles and a
//!   per-context router that never leaves a key stuck on either side
//! - **Frame protocol**: begin frame, caller-owned hooks, end frame, then
//!   translation of draw lists into host custom-mesh elements
//! - **Resources**: per-context images addressed by name or texture id, with
//!   a shared font atlas registered as `Font`
//!
//! The immediate-mode engine sits behind the [`Runtime`] trait.
//! [`HeadlessRuntime`] implements it in-process for tests and for hosts that
//! only need input arbitration. With the `imgui` feature, `ImGuiRuntime`
//! drives Dear ImGui and ImPlot.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::rc::Rc;
//! use dear_imgui_overlay::*;
//!
//! let slots = Rc::new(HeadlessSlots::new());
//! let input = Rc::new(HeadlessInput::new());
//! let overlay: ImGuiOverlay<HeadlessRuntime> =
//!     ImGuiOverlay::new(OverlaySettings::default(), HostServices::new(slots.clone(), input));
//!
//! let stats = hook(|ui: &HeadlessUi, _: &mut HookScope<'_, HeadlessRuntime>| ui.text("Stats"));
//! overlay.add_hook("Default", &stats);
//!
//! // Each host tick:
//! overlay.tick();
//! if let Some(container) = slots.container("Default") {
//!     let geometry = Geometry::new([0.0, 0.0], [1280.0, 720.0]);
//!     container.tick(&geometry, 0.0, 1.0 / 60.0);
//!     let mut elements = DrawElementList::new();
//!     container.paint(&PaintRect::from_geometry(&geometry), 0, &mut elements);
//! }
//! ```

// Module declarations
mod command;
mod context;
mod dispatcher;
mod draw;
mod error;
mod fonts;
mod geometry;
mod headless;
mod hooks;
mod host;
#[cfg(feature = "imgui")]
mod imgui;
mod key;
mod layout;
pub mod logging;
mod overlay;
mod registry;
mod resources;
mod router;
mod runtime;
mod settings;
mod shared;

// Re-exports
pub use command::*;
pub use context::*;
pub use dispatcher::*;
pub use draw::*;
pub use error::*;
pub use fonts::*;
pub use geometry::*;
pub use headless::*;
pub use hooks::*;
pub use host::*;
#[cfg(feature = "imgui")]
pub use imgui::*;
pub use key::*;
pub use layout::*;
pub use overlay::*;
pub use registry::*;
pub use resources::*;
pub use router::*;
pub use runtime::*;
pub use settings::*;
pub use shared::*;
