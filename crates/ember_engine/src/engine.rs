//! Session aggregate
//!
//! Owns the leak ledger and drives the full lifecycle in order: platform
//! init → probe window → capability probe → real window → persistent
//! context → session loop → teardown in exact reverse → leak report.
//! Everything is passed by reference; there are no ambient globals, so
//! tests can construct isolated sessions.

use thiserror::Error;

use crate::config::EngineConfig;
use crate::debug::leak_ledger::{LeakLedger, ResourceKind};
use crate::foundation::memory::{MemoryError, ScratchAllocator};
use crate::platform::{NativePlatform, PlatformError};
use crate::render::{Renderer, RendererError};

/// Top-level bootstrap errors. All of them are terminal for the process.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Platform surface failure
    #[error("platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Context bring-up or draw-pipeline failure
    #[error("renderer error: {0}")]
    Renderer(#[from] RendererError),

    /// Scratch arena creation failure
    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),
}

/// One engine session: configuration plus the leak ledger auditing it.
pub struct Engine {
    config: EngineConfig,
    ledger: LeakLedger,
}

impl Engine {
    /// Create a session from a configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            ledger: LeakLedger::new(),
        }
    }

    /// The session's leak ledger.
    pub fn ledger(&self) -> &LeakLedger {
        &self.ledger
    }

    /// Run the full lifecycle: bootstrap, session loop, teardown, report.
    ///
    /// Any bring-up failure aborts the sequence immediately; no
    /// partial-state recovery is attempted.
    pub fn run(&mut self) -> Result<(), EngineError> {
        log::info!("starting engine bootstrap");

        // Platform init and the capability probe against the dummy window.
        let mut platform = NativePlatform::init(&self.ledger)?;
        platform.create_dummy_window(&self.ledger)?;
        let probe = Renderer::probe(&platform, &self.ledger)?;
        platform.destroy_dummy_window(&self.ledger);

        // Real window and the persistent context.
        platform.create_window(
            self.config.window.width,
            self.config.window.height,
            &self.config.window.title,
            &self.ledger,
        )?;

        let mut scratch = ScratchAllocator::with_capacity(self.config.memory.scratch_capacity)?;
        self.ledger
            .register(scratch.base_addr(), ResourceKind::Heap, "bootstrap scratch arena");

        let mut renderer =
            match probe.create_context(&platform, &mut scratch, &self.ledger, &self.config.shaders)
            {
                Ok(renderer) => renderer,
                Err(err) => {
                    self.ledger.unregister(scratch.base_addr());
                    return Err(err.into());
                }
            };

        // Session loop: pump, draw, present, until a stop is requested.
        log::info!("entering session loop");
        loop {
            if platform.pump_events() {
                break;
            }
            renderer.draw_frame(platform.screen_size());
        }
        log::info!("session loop ended");

        // Teardown, exact reverse of construction.
        renderer.destroy_context(&self.ledger);
        platform.destroy_window(&self.ledger);
        renderer.shutdown();
        platform.shutdown(&self.ledger);

        self.ledger.unregister(scratch.base_addr());
        drop(scratch);

        let leaked = self.ledger.report();
        if leaked > 0 {
            log::warn!("{} handle(s) leaked during this session", leaked);
        }

        Ok(())
    }
}
