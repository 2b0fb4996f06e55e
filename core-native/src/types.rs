//! Value types shared by the native API wrappers.

use std::ffi::c_void;
use std::fmt;
use std::num::NonZeroUsize;

/// Native player instance (`player_h` or `PlusPlayerHandle`).
///
/// Kept as an address so it can be moved between the command thread and
/// native callback threads. Only the API wrappers turn it back into a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerHandle(NonZeroUsize);

impl PlayerHandle {
    /// `None` for a null pointer.
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonZeroUsize::new(ptr as usize).map(Self)
    }

    /// Handle from a plain address; used by fakes in tests.
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.get() as *mut c_void
    }

    pub fn as_raw(&self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for PlayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Native DRM session (`DRMSessionHandle_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DrmSessionHandle(NonZeroUsize);

impl DrmSessionHandle {
    pub fn from_ptr(ptr: *mut c_void) -> Option<Self> {
        NonZeroUsize::new(ptr as usize).map(Self)
    }

    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0.get() as *mut c_void
    }
}

impl fmt::Display for DrmSessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Opaque session reference passed with a license challenge.
///
/// The key installed for a challenge must carry the same reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionRef(pub usize);

impl SessionRef {
    pub fn from_ptr(ptr: *mut c_void) -> Self {
        Self(ptr as usize)
    }

    pub fn as_ptr(&self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

/// State reported by the media player C API (`player_state_e`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MediaPlayerState {
    None,
    Idle,
    Ready,
    Playing,
    Paused,
}

impl MediaPlayerState {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Idle,
            2 => Self::Ready,
            3 => Self::Playing,
            4 => Self::Paused,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "PLAYER_STATE_NONE",
            Self::Idle => "PLAYER_STATE_IDLE",
            Self::Ready => "PLAYER_STATE_READY",
            Self::Playing => "PLAYER_STATE_PLAYING",
            Self::Paused => "PLAYER_STATE_PAUSED",
        }
    }
}

impl fmt::Display for MediaPlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State reported by the streaming player wrapper (`plusplayer::State`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PlusPlayerState {
    None,
    Idle,
    TypeFinderReady,
    TrackSourceReady,
    Ready,
    Playing,
    Paused,
}

impl PlusPlayerState {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Idle,
            2 => Self::TypeFinderReady,
            3 => Self::TrackSourceReady,
            4 => Self::Ready,
            5 => Self::Playing,
            6 => Self::Paused,
            _ => Self::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "kNone",
            Self::Idle => "kIdle",
            Self::TypeFinderReady => "kTypeFinderReady",
            Self::TrackSourceReady => "kTrackSourceReady",
            Self::Ready => "kReady",
            Self::Playing => "kPlaying",
            Self::Paused => "kPaused",
        }
    }
}

impl fmt::Display for PlusPlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the decoded picture is fitted into the display area.
///
/// Both backends share the same numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayMode {
    LetterBox,
    OriginSize,
    FullScreen,
    CroppedFull,
    OriginOrLetter,
    /// Render into the region of interest set by the application.
    DstRoi,
}

impl DisplayMode {
    pub fn as_raw(&self) -> i32 {
        match self {
            Self::LetterBox => 0,
            Self::OriginSize => 1,
            Self::FullScreen => 2,
            Self::CroppedFull => 3,
            Self::OriginOrLetter => 4,
            Self::DstRoi => 5,
        }
    }
}

/// Display rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DisplayRotation {
    #[default]
    None,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl DisplayRotation {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Rotate90,
            2 => Self::Rotate180,
            3 => Self::Rotate270,
            _ => Self::None,
        }
    }

    /// Quarter turns exchange the reported width and height.
    pub fn swaps_dimensions(&self) -> bool {
        matches!(self, Self::Rotate90 | Self::Rotate270)
    }
}

/// Elementary stream kind (`plusplayer::TrackType`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackType {
    Audio,
    Video,
    Subtitle,
}

impl TrackType {
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            0 => Self::Audio,
            2 => Self::Subtitle,
            _ => Self::Video,
        }
    }

    pub fn as_raw(&self) -> i32 {
        match self {
            Self::Audio => 0,
            Self::Video => 1,
            Self::Subtitle => 2,
        }
    }
}

/// Decoded picture size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VideoSize {
    pub width: i32,
    pub height: i32,
}

impl VideoSize {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Size as seen on screen after `rotation`.
    pub fn rotated(self, rotation: DisplayRotation) -> Self {
        if rotation.swaps_dimensions() {
            Self {
                width: self.height,
                height: self.width,
            }
        } else {
            self
        }
    }
}

/// Content protection scheme understood by the streaming player
/// (`plusplayer::drm::Type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlusDrmType {
    None,
    Playready,
    Marlin,
    Verimatrix,
    WidevineClassic,
    SecureMedia,
    Sdrm,
    WidevineCdm,
}

impl PlusDrmType {
    pub fn as_raw(&self) -> i32 {
        match self {
            Self::None => 0,
            Self::Playready => 1,
            Self::Marlin => 2,
            Self::Verimatrix => 3,
            Self::WidevineClassic => 4,
            Self::SecureMedia => 5,
            Self::Sdrm => 6,
            Self::WidevineCdm => 7,
        }
    }
}
