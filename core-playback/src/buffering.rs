//! Buffering percent to event translation.

use core_runtime::events::PlayerEvent;

/// Threshold at or below which a fresh buffering report opens an episode.
pub const BUFFERING_START_PERCENT: i32 = 5;
pub const BUFFERING_END_PERCENT: i32 = 100;

/// Tracks whether a buffering episode is open, so start and end events
/// always alternate.
#[derive(Debug, Default)]
pub struct BufferingTracker {
    buffering: bool,
}

impl BufferingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_buffering(&self) -> bool {
        self.buffering
    }

    pub fn on_percent(&mut self, percent: i32) -> PlayerEvent {
        if percent >= BUFFERING_END_PERCENT {
            self.buffering = false;
            PlayerEvent::BufferingEnd
        } else if !self.buffering && percent <= BUFFERING_START_PERCENT {
            self.buffering = true;
            PlayerEvent::BufferingStart
        } else {
            PlayerEvent::BufferingUpdate { value: percent }
        }
    }

    pub fn reset(&mut self) {
        self.buffering = false;
    }
}
