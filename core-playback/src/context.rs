//! # Player Context
//!
//! Host collaborators shared by every player the plugin creates.
//!
//! ```ignore
//! let context = PlayerContext::builder()
//!     .config(PlayerConfig::default().with_backend(BackendKind::PlusPlayer))
//!     .window(Arc::new(EcoreWindow::new(window)))
//!     .system_info(system_info)
//!     .idle_scheduler(scheduler)
//!     .call_bridge(Arc::new(CallBridge::new(reply_port, timeout)))
//!     .build()?;
//! ```
//!
//! Required collaborators are checked by [`PlayerContextBuilder::build`], so a
//! misconfigured host fails before any native library is opened.

use std::path::PathBuf;
use std::sync::Arc;

use bridge_traits::license::LicenseTransport;
use bridge_traits::scheduler::IdleScheduler;
use bridge_traits::system::SystemInfo;
use bridge_traits::window::NativeWindow;
use core_bridge::CallBridge;
use core_native::loader::{DynamicLoader, NativeLoader};
use core_runtime::config::PlayerConfig;
use core_runtime::error::{Error, Result};

#[derive(Clone)]
pub struct PlayerContext {
    pub config: PlayerConfig,
    pub window: Arc<dyn NativeWindow>,
    pub system_info: Arc<dyn SystemInfo>,
    pub idle_scheduler: Arc<dyn IdleScheduler>,
    pub license_transport: Option<Arc<dyn LicenseTransport>>,
    pub loader: Arc<dyn NativeLoader>,
    pub call_bridge: Arc<CallBridge>,
}

impl PlayerContext {
    pub fn builder() -> PlayerContextBuilder {
        PlayerContextBuilder::default()
    }

    /// Directory holding the streaming player wrappers.
    pub fn resource_dir(&self) -> bridge_traits::error::Result<PathBuf> {
        match &self.config.resource_dir {
            Some(dir) => Ok(dir.clone()),
            None => self.system_info.resource_dir(),
        }
    }
}

impl std::fmt::Debug for PlayerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerContext")
            .field("config", &self.config)
            .field("window", &self.window.handle())
            .field("system_info", &"SystemInfo { ... }")
            .field("idle_scheduler", &"IdleScheduler { ... }")
            .field(
                "license_transport",
                &self.license_transport.as_ref().map(|_| "LicenseTransport { ... }"),
            )
            .field("loader", &"NativeLoader { ... }")
            .field("call_bridge", &self.call_bridge)
            .finish()
    }
}

#[derive(Default)]
pub struct PlayerContextBuilder {
    config: Option<PlayerConfig>,
    window: Option<Arc<dyn NativeWindow>>,
    system_info: Option<Arc<dyn SystemInfo>>,
    idle_scheduler: Option<Arc<dyn IdleScheduler>>,
    license_transport: Option<Arc<dyn LicenseTransport>>,
    loader: Option<Arc<dyn NativeLoader>>,
    call_bridge: Option<Arc<CallBridge>>,
}

impl PlayerContextBuilder {
    pub fn config(mut self, config: PlayerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn window(mut self, window: Arc<dyn NativeWindow>) -> Self {
        self.window = Some(window);
        self
    }

    pub fn system_info(mut self, system_info: Arc<dyn SystemInfo>) -> Self {
        self.system_info = Some(system_info);
        self
    }

    pub fn idle_scheduler(mut self, scheduler: Arc<dyn IdleScheduler>) -> Self {
        self.idle_scheduler = Some(scheduler);
        self
    }

    /// Needed only for content whose license server URL is known up front.
    pub fn license_transport(mut self, transport: Arc<dyn LicenseTransport>) -> Self {
        self.license_transport = Some(transport);
        self
    }

    /// Override library loading. Defaults to `dlopen` with the configured
    /// library names.
    pub fn loader(mut self, loader: Arc<dyn NativeLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn call_bridge(mut self, bridge: Arc<CallBridge>) -> Self {
        self.call_bridge = Some(bridge);
        self
    }

    pub fn build(self) -> Result<PlayerContext> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let window = self.window.ok_or_else(|| {
            Error::capability_missing(
                "NativeWindow",
                "A native window is required to attach video output. Use .window() to set it.",
            )
        })?;
        if window.handle().is_null() {
            return Err(Error::capability_missing(
                "NativeWindow",
                "The native window handle is null.",
            ));
        }

        let system_info = self.system_info.ok_or_else(|| {
            Error::capability_missing(
                "SystemInfo",
                "Platform system information is required. Use .system_info() to set it.",
            )
        })?;

        let idle_scheduler = self.idle_scheduler.ok_or_else(|| {
            Error::capability_missing(
                "IdleScheduler",
                "An idle scheduler is required for deferred DRM key installation.",
            )
        })?;

        let call_bridge = self.call_bridge.ok_or_else(|| {
            Error::capability_missing(
                "CallBridge",
                "A call bridge is required to deliver license challenges to the application.",
            )
        })?;

        let loader = self.loader.unwrap_or_else(|| {
            Arc::new(DynamicLoader::new(
                config.media_player_library.clone(),
                config.drm_library.clone(),
            ))
        });

        Ok(PlayerContext {
            config,
            window,
            system_info,
            idle_scheduler,
            license_transport: self.license_transport,
            loader,
            call_bridge,
        })
    }
}
