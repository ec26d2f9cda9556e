//! Platform surface
//!
//! Owns the OS window/display handles and the event pump. The capability
//! set is fixed (init, probe window, real window, non-blocking event
//! pump, teardown) and is provided by two concrete back ends
//! selected at build time: Win32 and X11. The selected back end is
//! re-exported as [`NativePlatform`]; the renderer depends only on that
//! alias plus the handle accessors each back end exposes.
//!
//! Lifecycle ordering is strict: `init` → `create_dummy_window` →
//! (context probe happens here) → `destroy_dummy_window` →
//! `create_window` → pump/draw → `destroy_window` → `shutdown`. Every
//! handle is registered with the leak ledger on acquisition and
//! unregistered in reverse order on release.

use thiserror::Error;

#[cfg(target_os = "linux")]
pub mod x11;

#[cfg(windows)]
pub mod win32;

#[cfg(windows)]
pub use win32::Win32Platform as NativePlatform;

#[cfg(target_os = "linux")]
pub use x11::X11Platform as NativePlatform;

#[cfg(not(any(windows, target_os = "linux")))]
compile_error!("ember_engine only supports the Win32 and X11 windowing back ends");

/// Platform surface errors. Every variant is fatal for the bootstrap.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The native windowing subsystem could not be reached
    #[error("platform initialization failed: {0}")]
    Init(String),

    /// An OS window (probe or real) could not be created
    #[error("window creation failed: {0}")]
    WindowCreation(String),
}

/// Current drawable size in device pixels.
///
/// Written by the event pump on resize/configure notifications and read
/// every frame to set the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScreenSize {
    /// Width in pixels
    pub width: i32,
    /// Height in pixels
    pub height: i32,
}
