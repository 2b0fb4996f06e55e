//! # Native Backend Bindings
//!
//! Runtime-resolved access to the platform multimedia libraries.
//!
//! ## Overview
//!
//! Nothing here links against the device libraries. Each backend is opened
//! with `dlopen` through a [`LibraryProxy`](proxy::LibraryProxy) and its entry
//! points are kept as [`Capability`](proxy::Capability) values. A missing
//! symbol only disables the operation that needs it.
//!
//! | Library | API trait | Implementation |
//! |---------|-----------|----------------|
//! | `libcapi-media-player.so.0` | [`MediaPlayerApi`] | [`DynamicMediaPlayer`](media_player::DynamicMediaPlayer) |
//! | `libplus_player_wrapper_{60,65,70}.so` | [`PlusPlayerApi`] | [`DynamicPlusPlayer`](plus_player::DynamicPlusPlayer) |
//! | `libdrmmanager.so.0` | [`DrmApi`] | [`DynamicDrm`](drm::DynamicDrm) |
//! | `libecore_wl2.so.1` | `NativeWindow` | [`EcoreWindow`](window::EcoreWindow) |
//!
//! Native callbacks are delivered through [`PlayerListener`] and
//! [`DrmEventListener`] on the runtime's own threads.

#![deny(unsafe_code)]

pub mod drm;
pub mod error;
pub mod listener;
pub mod loader;
pub mod media_player;
pub mod plus_player;
pub mod proxy;
pub mod types;
pub mod window;

pub use drm::DrmApi;
pub use error::{NativeError, Result};
pub use listener::{DrmEventListener, PlayerListener};
pub use loader::{DynamicLoader, NativeLoader};
pub use media_player::MediaPlayerApi;
pub use plus_player::PlusPlayerApi;
pub use types::{
    DisplayMode, DisplayRotation, DrmSessionHandle, MediaPlayerState, PlayerHandle, PlusDrmType,
    PlusPlayerState, SessionRef, TrackType, VideoSize,
};
