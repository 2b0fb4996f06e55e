//! # Host Bridge Traits
//!
//! Contracts between the video player core and the embedding host.
//!
//! ## Overview
//!
//! The core drives native multimedia libraries, but a few capabilities belong
//! to whoever embeds it: the compositor window, platform system queries, the
//! main event loop, the messaging transport into the application's execution
//! context, and the license-server network stack. Each of those is a trait
//! here so the core can be exercised without a device.
//!
//! ## Traits
//!
//! ### Display
//! - [`NativeWindow`](window::NativeWindow) - Window handle and geometry query
//! - [`SystemInfo`](system::SystemInfo) - Platform version, screen size, app id, resource path
//!
//! ### Scheduling & Messaging
//! - [`IdleScheduler`](scheduler::IdleScheduler) - One-shot tasks on the host loop
//! - [`MessagePort`](port::MessagePort) - Post messages into the application context
//!
//! ### DRM
//! - [`LicenseTransport`](license::LicenseTransport) - License-server transaction helper
//!
//! ### Utilities
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! Required collaborators are checked when the player context is built, not
//! when they are first needed:
//!
//! ```ignore
//! use core_playback::context::PlayerContext;
//!
//! let context = PlayerContext::builder()
//!     .window(window)
//!     .system_info(system)
//!     .build()?; // Error::CapabilityMissing names what is absent
//! ```
//!
//! ## Thread Safety
//!
//! Native runtimes invoke callbacks on their own threads, so every bridge
//! trait requires `Send + Sync`.

pub mod error;
pub mod license;
pub mod log;
pub mod port;
pub mod scheduler;
pub mod system;
pub mod window;

pub use error::BridgeError;

// Re-export commonly used types
pub use license::{DrmType, LicenseRequest, LicenseTransport};
pub use log::{LogEntry, LogLevel, LoggerSink, StderrLogger, DEFAULT_LOG_TAG};
pub use port::{MessagePort, PortMessage, ReplyPortId};
pub use scheduler::{IdleScheduler, IdleSourceId, IdleTask, QueuedIdleScheduler};
pub use system::{ScreenSize, SystemInfo};
pub use window::{Geometry, NativeWindow, WindowHandle};
