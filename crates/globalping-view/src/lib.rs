//! Terminal rendering of measurement frames.
//!
//! The session orchestrator hands every frame to a [`FrameRenderer`]; the
//! [`TerminalRenderer`] turns frames into the default, latency or JSON
//! output and keeps the live area of an interactive terminal up to date.

mod context;
mod default_output;
mod latency_output;
mod live_area;
mod printer;
mod renderer;

pub use context::{Context, DEFAULT_SHARE_URL};
pub use live_area::{LiveArea, TerminalSize};
pub use printer::{Printer, SharedBuffer};
pub use renderer::{probe_header, FrameRenderer, TerminalRenderer, ViewError};
