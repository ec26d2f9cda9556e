//! # Ember Engine
//!
//! A minimal windowed-application bootstrap: native window creation on two
//! back ends (Win32 and X11), two-phase OpenGL context bring-up, a fixed
//! per-frame draw, and a leak ledger that audits every OS and graphics
//! handle the bootstrap acquires.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ember_engine::{Engine, EngineConfig};
//!
//! fn main() -> Result<(), ember_engine::EngineError> {
//!     ember_engine::foundation::logging::init();
//!     let mut engine = Engine::new(EngineConfig::default());
//!     engine.run()
//! }
//! ```
//!
//! The engine is single-window, single-context and single-threaded by
//! design; the only concurrency-aware piece is the leak ledger.

pub mod assets;
pub mod config;
pub mod debug;
pub mod foundation;
pub mod platform;
pub mod render;

mod engine;

pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::EngineConfig,
        debug::leak_ledger::{LeakLedger, ResourceKind},
        foundation::memory::ScratchAllocator,
        platform::ScreenSize,
        Engine, EngineError,
    };
}
