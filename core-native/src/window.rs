#![allow(unsafe_code)]

//! Wayland window geometry through `libecore_wl2`.

use std::ffi::{c_int, c_void};

use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::window::{Geometry, NativeWindow, WindowHandle};
use tracing::debug;

use crate::proxy::LibraryProxy;

pub const ECORE_WL2_LIBRARY: &str = "libecore_wl2.so.1";

type FnWindowGeometryGet =
    unsafe extern "C" fn(*mut c_void, *mut c_int, *mut c_int, *mut c_int, *mut c_int);

/// [`NativeWindow`] for an `Ecore_Wl2_Window*` owned by the embedder.
///
/// The library is opened for each geometry query and closed right after, so
/// no handle is held between player creations.
#[derive(Debug, Clone)]
pub struct EcoreWindow {
    handle: WindowHandle,
    library: String,
}

impl EcoreWindow {
    pub fn new(handle: WindowHandle) -> Self {
        Self {
            handle,
            library: ECORE_WL2_LIBRARY.to_string(),
        }
    }

    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = library.into();
        self
    }
}

impl NativeWindow for EcoreWindow {
    fn handle(&self) -> WindowHandle {
        self.handle
    }

    fn geometry(&self) -> BridgeResult<Geometry> {
        let library = LibraryProxy::open(&self.library)
            .map_err(|_| BridgeError::NotAvailable("Cannot open dynamic library of ecore_wl2".to_string()))?;

        // SAFETY: signature of ecore_wl2_window_geometry_get from Ecore_Wl2.h.
        let geometry_get = unsafe { library.resolve::<FnWindowGeometryGet>("ecore_wl2_window_geometry_get") };
        let Ok(geometry_get) = geometry_get.get() else {
            library.close();
            return Err(BridgeError::NotAvailable(
                "Cannot get private api of ecore_wl2 from dynamic library".to_string(),
            ));
        };

        let mut geometry = Geometry::default();
        // SAFETY: the window belongs to the embedder and is alive; the
        // out-pointers outlive the call.
        unsafe {
            geometry_get(
                self.handle.as_ptr(),
                &mut geometry.x,
                &mut geometry.y,
                &mut geometry.width,
                &mut geometry.height,
            )
        };
        library.close();

        debug!(?geometry, "Window geometry");
        Ok(geometry)
    }
}
