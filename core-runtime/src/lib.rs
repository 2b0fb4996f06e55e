//! # Core Runtime Module
//!
//! Runtime infrastructure shared by every player component:
//! - Logging and tracing setup
//! - Player configuration
//! - Per-player event channels
//!
//! ## Overview
//!
//! Nothing in this crate touches native libraries. It defines the settings
//! the backends are created with, the conventions they log under, and the
//! channel through which they report to the embedding application.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use config::{BackendKind, PlayerConfig};
pub use error::{Error, Result};
pub use events::{ChannelMessage, ChannelSink, EventChannel, EventSink, PlayerEvent};
