//! Player registry
//!
//! Issues player ids, owns the id to instance map and routes commands.
//! The backends never see the registry; they only receive their id for
//! naming the event channel.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use bridge_traits::port::MessagePort;
use bridge_traits::window::Geometry;
use core_native::types::VideoSize;
use core_playback::{CreateRequest, MediaPlayer, PlayerContext, PlusPlayer, SeekCompletion, VideoPlayer};
use core_runtime::config::BackendKind;
use core_runtime::events::EventSink;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, ServiceError};

/// Plugin-level coordinator for every player instance.
pub struct PlayerService {
    context: Arc<PlayerContext>,
    next_id: AtomicI64,
    players: Mutex<HashMap<i64, Arc<dyn VideoPlayer>>>,
    send_port: Mutex<Option<Arc<dyn MessagePort>>>,
}

impl PlayerService {
    pub fn new(context: Arc<PlayerContext>) -> Self {
        info!(backend = ?context.config.backend, "Player service ready");
        Self {
            context,
            next_id: AtomicI64::new(1),
            players: Mutex::new(HashMap::new()),
            send_port: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &Arc<PlayerContext> {
        &self.context
    }

    pub fn backend(&self) -> BackendKind {
        self.context.config.backend
    }

    pub fn player_count(&self) -> usize {
        self.players.lock().len()
    }

    pub fn contains(&self, player_id: i64) -> bool {
        self.players.lock().contains_key(&player_id)
    }

    fn instantiate(&self, player_id: i64) -> Arc<dyn VideoPlayer> {
        let context = Arc::clone(&self.context);
        match self.backend() {
            BackendKind::MediaPlayer => Arc::new(MediaPlayer::new(player_id, context)),
            BackendKind::PlusPlayer => Arc::new(PlusPlayer::new(player_id, context)),
        }
    }

    fn player(&self, player_id: i64) -> Result<Arc<dyn VideoPlayer>> {
        self.players
            .lock()
            .get(&player_id)
            .cloned()
            .ok_or_else(|| ServiceError::player_not_found(player_id))
    }

    /// Port used for license challenges of players created from now on.
    ///
    /// Existing players keep the port they were given.
    pub fn register_send_port(&self, port: Arc<dyn MessagePort>) {
        debug!(port = %port.describe(), "Default send port registered");
        *self.send_port.lock() = Some(port);
    }

    /// Replace the send port of one player.
    pub fn register_player_send_port(&self, player_id: i64, port: Arc<dyn MessagePort>) -> Result<()> {
        self.player(player_id)?.register_send_port(port);
        Ok(())
    }

    /// Create a player and return its id.
    ///
    /// The id is consumed even when creation fails.
    #[instrument(skip(self, request), fields(drm = %request.drm_type))]
    pub fn create(&self, request: &CreateRequest) -> Result<i64> {
        let player_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let player = self.instantiate(player_id);
        if let Some(port) = self.send_port.lock().clone() {
            player.register_send_port(port);
        }

        self.players.lock().insert(player_id, Arc::clone(&player));
        match player.create(request) {
            Ok(_) => {
                info!(player_id, backend = ?player.backend(), "Player registered");
                Ok(player_id)
            }
            Err(e) => {
                self.players.lock().remove(&player_id);
                warn!(player_id, error = %e, "Player creation failed");
                Err(e.into())
            }
        }
    }

    pub fn dispose(&self, player_id: i64) -> Result<()> {
        let player = self
            .players
            .lock()
            .remove(&player_id)
            .ok_or_else(|| ServiceError::player_not_found(player_id))?;
        player.dispose();
        debug!(player_id, "Player removed");
        Ok(())
    }

    /// Dispose every player, e.g. when the engine shuts down.
    pub fn dispose_all(&self) {
        let players: Vec<_> = self.players.lock().drain().collect();
        if players.is_empty() {
            return;
        }
        info!(count = players.len(), "Disposing all players");
        for (_, player) in players {
            player.dispose();
        }
    }

    // ------------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------------

    pub fn play(&self, player_id: i64) -> Result<()> {
        Ok(self.player(player_id)?.play()?)
    }

    pub fn pause(&self, player_id: i64) -> Result<()> {
        Ok(self.player(player_id)?.pause()?)
    }

    pub fn set_looping(&self, player_id: i64, looping: bool) -> Result<()> {
        Ok(self.player(player_id)?.set_looping(looping)?)
    }

    pub fn set_volume(&self, player_id: i64, volume: f64) -> Result<()> {
        Ok(self.player(player_id)?.set_volume(volume)?)
    }

    pub fn set_playback_speed(&self, player_id: i64, speed: f64) -> Result<()> {
        Ok(self.player(player_id)?.set_playback_speed(speed)?)
    }

    pub fn seek_to(&self, player_id: i64, position_ms: i64, on_complete: SeekCompletion) -> Result<()> {
        Ok(self.player(player_id)?.seek_to(position_ms, on_complete)?)
    }

    pub fn position(&self, player_id: i64) -> Result<i64> {
        Ok(self.player(player_id)?.position()?)
    }

    pub fn duration(&self, player_id: i64) -> Result<i64> {
        Ok(self.player(player_id)?.duration()?)
    }

    pub fn video_size(&self, player_id: i64) -> Result<VideoSize> {
        Ok(self.player(player_id)?.video_size()?)
    }

    pub fn set_display_roi(&self, player_id: i64, roi: Geometry) -> Result<()> {
        Ok(self.player(player_id)?.set_display_roi(roi)?)
    }

    pub fn is_ready(&self, player_id: i64) -> Result<bool> {
        Ok(self.player(player_id)?.is_ready())
    }

    pub fn listen(&self, player_id: i64, sink: Arc<dyn EventSink>) -> Result<()> {
        Ok(self.player(player_id)?.listen(sink)?)
    }

    pub fn cancel_listen(&self, player_id: i64) -> Result<()> {
        self.player(player_id)?.cancel_listen();
        Ok(())
    }
}

impl Drop for PlayerService {
    fn drop(&mut self) {
        self.dispose_all();
    }
}

impl std::fmt::Debug for PlayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerService")
            .field("backend", &self.backend())
            .field("players", &self.player_count())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}
