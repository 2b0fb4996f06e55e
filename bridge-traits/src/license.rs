//! License Server Transport
//!
//! When a fixed license-server URL is configured, the DRM challenge is
//! answered by a network transaction. The transaction itself (HTTP, TEE
//! plumbing) belongs to the platform; the core only hands over the challenge.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Content protection scheme requested at creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrmType {
    #[default]
    None,
    PlayReady,
    Widevine,
}

impl DrmType {
    /// Map the integer used on the platform channel (0, 1, 2).
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::PlayReady),
            2 => Some(Self::Widevine),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::None => 0,
            Self::PlayReady => 1,
            Self::Widevine => 2,
        }
    }

    pub fn is_protected(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for DrmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::PlayReady => write!(f, "playready"),
            Self::Widevine => write!(f, "widevine"),
        }
    }
}

/// License acquisition request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LicenseRequest {
    pub server_url: String,
    pub drm_type: DrmType,
    pub challenge: Bytes,
}

/// License transport trait
///
/// Called from a native DRM callback thread; implementations block until the
/// license server answers.
pub trait LicenseTransport: Send + Sync {
    /// Perform the license transaction and return the raw response.
    fn acquire_license(&self, request: &LicenseRequest) -> Result<Bytes>;
}
