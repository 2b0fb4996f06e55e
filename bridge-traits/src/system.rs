//! Platform System Information
//!
//! Wraps the handful of platform queries the player backends depend on:
//! platform version (selects the versioned backend library), screen size
//! (display area of the streaming backend), the application id and the
//! application resource directory.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Platform feature key holding the platform version string.
pub const PLATFORM_VERSION_KEY: &str = "http://tizen.org/feature/platform.version";
/// Platform feature key holding the screen width.
pub const SCREEN_WIDTH_KEY: &str = "http://tizen.org/feature/screen.width";
/// Platform feature key holding the screen height.
pub const SCREEN_HEIGHT_KEY: &str = "http://tizen.org/feature/screen.height";

/// Physical screen size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenSize {
    pub width: i32,
    pub height: i32,
}

/// System information trait
///
/// Host implementations usually forward to `system_info_get_platform_*`,
/// `app_manager_get_app_id` and `app_get_resource_path`.
pub trait SystemInfo: Send + Sync {
    /// Platform version string, e.g. "6.5"
    fn platform_version(&self) -> Result<String>;

    /// Screen size used as the overlay display area
    fn screen_size(&self) -> Result<ScreenSize>;

    /// Identifier of the running application
    fn app_id(&self) -> Result<String>;

    /// Directory holding bundled resources (backend wrapper libraries)
    fn resource_dir(&self) -> Result<PathBuf>;
}
