//! Command legality shared by both backends.
//!
//! The two native engines number their states differently, but both orders
//! run from "nothing" through "ready" to "playing/paused". Each backend maps
//! its state enum onto the common anchors and the rules below apply to both.

use std::fmt;

use core_native::types::{MediaPlayerState, PlusPlayerState};

/// Anchor states of an ordered native state enum.
pub trait BackendState: Copy + Ord + fmt::Debug {
    const IDLE: Self;
    /// First state in which track information can be queried.
    const TRACK_SOURCE_READY: Self;
    const READY: Self;
    const PLAYING: Self;
    const PAUSED: Self;
}

impl BackendState for MediaPlayerState {
    const IDLE: Self = MediaPlayerState::Idle;
    const TRACK_SOURCE_READY: Self = MediaPlayerState::Ready;
    const READY: Self = MediaPlayerState::Ready;
    const PLAYING: Self = MediaPlayerState::Playing;
    const PAUSED: Self = MediaPlayerState::Paused;
}

impl BackendState for PlusPlayerState {
    const IDLE: Self = PlusPlayerState::Idle;
    const TRACK_SOURCE_READY: Self = PlusPlayerState::TrackSourceReady;
    const READY: Self = PlusPlayerState::Ready;
    const PLAYING: Self = PlusPlayerState::Playing;
    const PAUSED: Self = PlusPlayerState::Paused;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Play,
    Pause,
    Seek,
    SetSpeed,
    /// Position, duration and video size.
    Query,
}

/// What to do with a command in a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Legality {
    Proceed,
    /// Silently do nothing.
    Skip,
    /// Fail with `InvalidState`.
    Reject,
}

pub fn legality<S: BackendState>(command: Command, state: S) -> Legality {
    let allowed = match command {
        Command::Play => state == S::READY || state == S::PAUSED,
        Command::Pause => state == S::PLAYING,
        Command::Seek => state >= S::READY,
        Command::SetSpeed => state > S::IDLE,
        Command::Query => state >= S::TRACK_SOURCE_READY,
    };
    match (allowed, command) {
        (true, _) => Legality::Proceed,
        (false, Command::Play | Command::Pause) => Legality::Skip,
        (false, _) => Legality::Reject,
    }
}
