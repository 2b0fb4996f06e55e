//! Plugin-level service façade.
//!
//! This crate sits between the embedding plugin and the player backends: it
//! issues player ids, picks the configured backend for each new player and
//! routes every later command by id. Hosts build a
//! [`PlayerContext`](core_playback::PlayerContext) from their bridge
//! implementations and hand it to [`bootstrap`] once per engine.

pub mod error;
pub mod registry;

pub use error::{Result, ServiceError};
pub use registry::PlayerService;

use std::sync::Arc;

use core_playback::PlayerContext;
use core_runtime::logging::{init_logging, LoggingConfig};

/// Install logging and build the service.
///
/// ```ignore
/// let context = PlayerContext::builder()
///     .window(window)
///     .system_info(system_info)
///     .idle_scheduler(scheduler)
///     .call_bridge(bridge)
///     .build()?;
/// let service = core_service::bootstrap(context, Some(LoggingConfig::default()))?;
/// let id = service.create(&CreateRequest::new("https://example.com/a.mpd"))?;
/// ```
///
/// Pass `None` for `logging` when the host installs its own subscriber.
pub fn bootstrap(context: PlayerContext, logging: Option<LoggingConfig>) -> Result<PlayerService> {
    context.config.validate()?;
    if let Some(config) = logging {
        init_logging(config).map_err(|err| ServiceError::InitializationFailed(err.to_string()))?;
    }
    Ok(PlayerService::new(Arc::new(context)))
}
