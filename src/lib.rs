//! Workspace placeholder crate.
//!
//! This crate exposes feature flags that map to the individual workspace
//! crates (e.g., `core-service`, `core-playback`). Embedders can depend on
//! `videohole-workspace` and enable the documented features without wiring
//! each crate individually.

#[cfg(feature = "service")]
pub use core_runtime as runtime;
#[cfg(feature = "service")]
pub use core_service as service;

#[cfg(feature = "backends")]
pub use core_playback as playback;
