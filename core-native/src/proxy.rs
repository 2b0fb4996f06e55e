#![allow(unsafe_code)]

//! # Symbol Proxy
//!
//! Opens a backend shared library at runtime and resolves its entry points
//! into a table of [`Capability`] values.
//!
//! Resolution never fails loudly. A missing symbol yields a disabled
//! capability that reports [`NativeError::SymbolUnavailable`] only when a call
//! site actually needs it. Components that cannot work at all without some
//! entry points check them up front with [`ensure_available`].
//!
//! The [`LibraryProxy`] owns the `dlopen` handle. Tables of function pointers
//! are populated once and are read-only afterwards; they must be stored next
//! to the proxy that produced them so the library outlives every pointer.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};

use core_runtime::logging::strip_path;
use tracing::{debug, info, warn};

use crate::error::{NativeError, Result};

/// Subdirectory of the application resources holding the wrapper libraries.
pub const PLUS_PLAYER_WRAPPER_DIR: &str = "video_player_videohole";

/// An opened shared library.
pub struct LibraryProxy {
    library: libloading::Library,
    path: String,
}

impl LibraryProxy {
    /// `dlopen` the library at `path` (a file path or a soname).
    pub fn open(path: impl AsRef<OsStr>) -> Result<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy().into_owned();

        // SAFETY: loading runs the library's initializers. The backend
        // libraries are platform components with no unsound constructors.
        let library = unsafe { libloading::Library::new(path) }.map_err(|e| {
            warn!(library = %path_str, error = %e, "dlopen failed");
            NativeError::LibraryOpen {
                path: path_str.clone(),
                message: e.to_string(),
            }
        })?;

        info!(library = strip_path(&path_str), "Opened native library");
        Ok(Self {
            library,
            path: path_str,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve `name` into a capability; an absent symbol disables it.
    ///
    /// # Safety
    ///
    /// `F` must be the exact `extern "C"` function pointer type of the
    /// exported symbol, and the returned capability must not outlive `self`.
    pub unsafe fn resolve<F: Copy>(&self, name: &'static str) -> Capability<F> {
        // SAFETY: the caller guarantees `F` matches the symbol's signature.
        match unsafe { self.library.get::<F>(name.as_bytes()) } {
            Ok(symbol) => Capability::available(name, *symbol),
            Err(e) => {
                debug!(library = strip_path(&self.path), symbol = name, error = %e, "Symbol not resolved");
                Capability::missing(name)
            }
        }
    }

    /// Close the library explicitly, logging any failure.
    ///
    /// Dropping the proxy closes it as well; consuming `self` makes a second
    /// close impossible.
    pub fn close(self) {
        let path = self.path;
        if let Err(e) = self.library.close() {
            warn!(library = strip_path(&path), error = %e, "dlclose failed");
        } else {
            debug!(library = strip_path(&path), "Closed native library");
        }
    }
}

impl fmt::Debug for LibraryProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryProxy")
            .field("path", &self.path)
            .finish()
    }
}

/// A resolved (or unresolved) native entry point.
#[derive(Clone, Copy)]
pub struct Capability<F> {
    name: &'static str,
    func: Option<F>,
}

impl<F: Copy> Capability<F> {
    pub fn available(name: &'static str, func: F) -> Self {
        Self {
            name,
            func: Some(func),
        }
    }

    pub fn missing(name: &'static str) -> Self {
        Self { name, func: None }
    }

    /// The callable entry point, or `SymbolUnavailable`.
    pub fn get(&self) -> Result<F> {
        self.func.ok_or(NativeError::SymbolUnavailable(self.name))
    }
}

impl<F> fmt::Debug for Capability<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.name)
            .field("available", &self.func.is_some())
            .finish()
    }
}

/// Name and availability of an entry point, independent of its signature.
pub trait SymbolStatus {
    fn name(&self) -> &'static str;
    fn is_available(&self) -> bool;
}

impl<F> SymbolStatus for Capability<F> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn is_available(&self) -> bool {
        self.func.is_some()
    }
}

/// Fail with `MandatorySymbolsMissing` unless every listed symbol resolved.
pub fn ensure_available(required: &[&dyn SymbolStatus]) -> Result<()> {
    let missing: Vec<&'static str> = required
        .iter()
        .filter(|symbol| !symbol.is_available())
        .map(|symbol| symbol.name())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(NativeError::MandatorySymbolsMissing(missing))
    }
}

/// Wrapper library file name for a platform version.
///
/// Only the major and minor components are significant ("6.5.1" → "6.5").
pub fn plus_player_library_name(platform_version: &str) -> Option<&'static str> {
    let mut parts = platform_version.trim().split('.');
    let major = parts.next()?;
    let minor = parts.next().unwrap_or("0");

    match (major, minor) {
        ("6", "0") => Some("libplus_player_wrapper_60.so"),
        ("6", "5") => Some("libplus_player_wrapper_65.so"),
        ("7", "0") => Some("libplus_player_wrapper_70.so"),
        _ => None,
    }
}

/// Full path of the wrapper library below the application resource directory.
pub fn plus_player_library_path(resource_dir: &Path, platform_version: &str) -> Result<PathBuf> {
    let name = plus_player_library_name(platform_version)
        .ok_or_else(|| NativeError::UnknownPlatformVersion(platform_version.to_string()))?;
    Ok(resource_dir.join(PLUS_PLAYER_WRAPPER_DIR).join(name))
}
