//! Logging setup for hosts embedding the overlay
//!
//! Every event of this crate is emitted under the `dear-imgui-overlay` target.
//! Hosts that already install a subscriber need nothing from this module.

use tracing::trace;

/// Default filter: info for the overlay, warn for everything else
pub const DEFAULT_FILTER: &str = "dear-imgui-overlay=info,warn";

/// Install a fmt subscriber honoring `RUST_LOG`, or [`DEFAULT_FILTER`]
#[cfg(feature = "tracing-subscriber")]
pub fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Install a fmt subscriber with a custom filter
#[cfg(feature = "tracing-subscriber")]
pub fn init_tracing_with_filter(filter: &str) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::new(filter);

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Log a frame's draw statistics
pub fn log_frame_stats(context: &str, batches: usize, vertices: usize, indices: usize) {
    trace!(
        target: "dear-imgui-overlay",
        "[{}] {} batches, {} vertices, {} indices",
        context,
        batches,
        vertices,
        indices
    );
}
