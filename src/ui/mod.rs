//! Terminal user interface: rendering, spinners and shared UI constants.

pub mod progress;
pub mod render;
pub mod settings;

pub use progress::{set_progress_enabled, ProgressHandle};
pub use render::{RenderSink, Renderer};
