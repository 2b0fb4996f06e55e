//! Native Window Abstractions
//!
//! The compositor surface that hosts the video hole is owned by the embedder.
//! The core only needs an opaque handle to attach the native display and a way
//! to ask for the window's geometry.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Opaque native window handle (e.g. an `Ecore_Wl2_Window*`).
///
/// Stored as an address so it can cross thread boundaries; it is never
/// dereferenced by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(usize);

impl WindowHandle {
    pub fn from_raw(ptr: *mut std::ffi::c_void) -> Self {
        Self(ptr as usize)
    }

    pub fn as_ptr(&self) -> *mut std::ffi::c_void {
        self.0 as *mut std::ffi::c_void
    }

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }
}

/// Window rectangle in compositor coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Geometry {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Native window trait
///
/// Implemented by the embedder (or by `core_native::window::EcoreWindow` on
/// Tizen) to expose the window the video overlay is attached to.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::window::{Geometry, NativeWindow, WindowHandle};
///
/// struct FixedWindow(WindowHandle);
///
/// impl NativeWindow for FixedWindow {
///     fn handle(&self) -> WindowHandle {
///         self.0
///     }
///
///     fn geometry(&self) -> bridge_traits::error::Result<Geometry> {
///         Ok(Geometry::new(0, 0, 1920, 1080))
///     }
/// }
/// ```
pub trait NativeWindow: Send + Sync {
    /// Handle passed to the native display attach call
    fn handle(&self) -> WindowHandle;

    /// Current window geometry
    fn geometry(&self) -> Result<Geometry>;
}
