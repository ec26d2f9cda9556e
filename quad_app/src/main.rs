//! Quad demo application
//!
//! Drives the engine lifecycle in sequence: bootstrap, session loop
//! drawing one fixed quad, teardown, leak report.

use std::path::Path;

use ember_engine::foundation::logging;
use ember_engine::{Engine, EngineConfig};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    log::info!("Starting Ember quad demo");

    let config = EngineConfig::load_or_default(Path::new("ember.toml"));
    let mut engine = Engine::new(config);

    match engine.run() {
        Ok(()) => {
            log::info!("Quad demo finished");
            Ok(())
        }
        Err(err) => {
            log::error!("engine bootstrap failed: {}", err);
            Err(err.into())
        }
    }
}
