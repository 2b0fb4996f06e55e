//! # Native Layer Errors
//!
//! Failures raised while opening backend libraries, resolving entry points,
//! or calling into them.

use thiserror::Error;

/// Errors produced by the symbol proxy and the native API wrappers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    // ========================================================================
    // Library Errors
    // ========================================================================
    /// `dlopen` failed for the given library.
    #[error("Cannot open dynamic library {path}: {message}")]
    LibraryOpen { path: String, message: String },

    /// No backend library is known for this platform version.
    #[error("No backend library for platform version {0:?}")]
    UnknownPlatformVersion(String),

    // ========================================================================
    // Symbol Errors
    // ========================================================================
    /// The entry point was not resolved when the library was opened.
    #[error("Symbol {0} is not available")]
    SymbolUnavailable(&'static str),

    /// One or more mandatory entry points are missing.
    #[error("Mandatory symbols missing: {}", .0.join(", "))]
    MandatorySymbolsMissing(Vec<&'static str>),

    // ========================================================================
    // Call Errors
    // ========================================================================
    /// A native call returned a non-success status.
    #[error("{call} failed with code {code:#x}")]
    CallFailed { call: &'static str, code: i32 },

    /// A native call that reports success with a boolean returned false.
    #[error("{0} failed")]
    Rejected(&'static str),

    /// A native constructor returned a null handle.
    #[error("{0} returned a null handle")]
    NullHandle(&'static str),

    /// An argument could not be passed across the C boundary.
    #[error("Invalid argument for {call}: {message}")]
    InvalidArgument { call: &'static str, message: String },
}

impl NativeError {
    /// Native status code, when the failure carries one.
    pub fn code(&self) -> Option<i32> {
        match self {
            NativeError::CallFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns `true` when the failure comes from a missing capability rather
    /// than a failed call.
    pub fn is_capability_error(&self) -> bool {
        matches!(
            self,
            NativeError::SymbolUnavailable(_)
                | NativeError::MandatorySymbolsMissing(_)
                | NativeError::LibraryOpen { .. }
                | NativeError::UnknownPlatformVersion(_)
        )
    }

    /// Convert a C status code into a result.
    pub fn check(call: &'static str, code: i32) -> Result<()> {
        if code == 0 {
            Ok(())
        } else {
            Err(NativeError::CallFailed { call, code })
        }
    }

    /// Convert a boolean success flag into a result.
    pub fn check_bool(call: &'static str, ok: bool) -> Result<()> {
        if ok {
            Ok(())
        } else {
            Err(NativeError::Rejected(call))
        }
    }
}

/// Result type for native operations.
pub type Result<T> = std::result::Result<T, NativeError>;
