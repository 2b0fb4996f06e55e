//! # Player Backends
//!
//! State machines wrapping the two native playback engines.
//!
//! ## Overview
//!
//! Both backends implement [`VideoPlayer`]:
//! - [`MediaPlayer`](media_player::MediaPlayer) drives the platform media
//!   player C API and supports every command
//! - [`PlusPlayer`](plus_player::PlusPlayer) drives the versioned streaming
//!   player wrapper; it has no looping or volume control
//!
//! A backend translates commands into native calls that are legal in the
//! current native state (see [`state`]), sets up DRM through
//! [`core_drm::DrmSessionManager`], and forwards native callbacks to the
//! player's [`EventChannel`](core_runtime::events::EventChannel).
//!
//! ## Creation sequence
//!
//! ```text
//! open library ─> create handle ─> callbacks ─> DRM session ─> display
//!     ─> 1x1 ROI ─> prepare_async ─> event channel
//! ```
//!
//! Any failure tears down what was already set up before the error is
//! returned.

pub mod buffering;
mod common;
pub mod context;
pub mod error;
pub mod media_player;
pub mod player;
pub mod plus_player;
pub mod state;

pub use context::{PlayerContext, PlayerContextBuilder};
pub use error::{PlayerError, Result};
pub use media_player::MediaPlayer;
pub use player::{CreateRequest, SeekCompletion, VideoPlayer};
pub use plus_player::PlusPlayer;
