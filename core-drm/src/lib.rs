//! # DRM Session Manager
//!
//! Drives one native DRM session through creation, license challenges, key
//! installation and release.
//!
//! License responses come from one of two sources:
//!
//! - a license server URL, transacted through the host's
//!   [`LicenseTransport`](bridge_traits::LicenseTransport)
//! - a [`ChallengeCallback`](session::ChallengeCallback), usually backed by
//!   the cross-context call bridge
//!
//! Keys are never installed inside the native challenge callback. They are
//! batched and installed by a single idle task on the host loop.

pub mod error;
pub mod session;

pub use error::{DrmError, Result};
pub use session::{key_system, ChallengeCallback, ChallengeSource, DrmSessionManager, SessionState};
