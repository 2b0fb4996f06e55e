//! Factory for the native API tables.
//!
//! Players never open libraries themselves; they ask a [`NativeLoader`].
//! Tests substitute a loader that hands out in-process fakes.

use std::path::Path;
use std::sync::Arc;

use core_runtime::logging::strip_path;
use tracing::{info, instrument};

use crate::drm::{DynamicDrm, DrmApi, DRM_LIBRARY};
use crate::error::Result;
use crate::media_player::{DynamicMediaPlayer, MediaPlayerApi, MEDIA_PLAYER_LIBRARY};
use crate::plus_player::{DynamicPlusPlayer, PlusPlayerApi};
use crate::proxy::plus_player_library_path;

/// Opens backend libraries and returns their API tables.
pub trait NativeLoader: Send + Sync {
    fn open_media_player(&self) -> Result<Arc<dyn MediaPlayerApi>>;

    /// Open the wrapper matching `platform_version` below `resource_dir`.
    fn open_plus_player(&self, platform_version: &str, resource_dir: &Path) -> Result<Arc<dyn PlusPlayerApi>>;

    fn open_drm_runtime(&self) -> Result<Arc<dyn DrmApi>>;
}

/// [`NativeLoader`] using `dlopen`.
#[derive(Debug, Clone)]
pub struct DynamicLoader {
    media_player_library: String,
    drm_library: String,
}

impl DynamicLoader {
    pub fn new(media_player_library: impl Into<String>, drm_library: impl Into<String>) -> Self {
        Self {
            media_player_library: media_player_library.into(),
            drm_library: drm_library.into(),
        }
    }
}

impl Default for DynamicLoader {
    fn default() -> Self {
        Self::new(MEDIA_PLAYER_LIBRARY, DRM_LIBRARY)
    }
}

impl NativeLoader for DynamicLoader {
    fn open_media_player(&self) -> Result<Arc<dyn MediaPlayerApi>> {
        Ok(Arc::new(DynamicMediaPlayer::open(&self.media_player_library)?))
    }

    #[instrument(skip(self, resource_dir))]
    fn open_plus_player(&self, platform_version: &str, resource_dir: &Path) -> Result<Arc<dyn PlusPlayerApi>> {
        let path = plus_player_library_path(resource_dir, platform_version)?;
        let path_str = path.to_string_lossy();
        info!(library = strip_path(&path_str), "Loading streaming player wrapper");
        Ok(Arc::new(DynamicPlusPlayer::open(&path)?))
    }

    fn open_drm_runtime(&self) -> Result<Arc<dyn DrmApi>> {
        Ok(Arc::new(DynamicDrm::open(&self.drm_library)?))
    }
}
