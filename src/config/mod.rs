//! Engine Configuration Module
//!
//! Provides engine configuration loaded from TOML files. Every tunable of the
//! precipitation, recharge, cache, provider and water-budget stages lives here.
//!
//! ## Loading Order
//!
//! 1. `BOREHOLE_CONFIG` environment variable (path to TOML file)
//! 2. `borehole_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! ```ignore
//! // In main():
//! config::init(EngineConfig::load());
//!
//! // Anywhere in the codebase:
//! let years = config::current().precipitation.years_back;
//! ```
//!
//! Components also take an explicit `EngineConfig`, so tests never need the
//! global.

mod engine_config;
pub mod defaults;
pub mod validation;

pub use engine_config::*;

use std::sync::OnceLock;

/// Global engine configuration, initialized once at startup.
static ENGINE_CONFIG: OnceLock<EngineConfig> = OnceLock::new();

/// Initialize the global engine configuration.
///
/// Later calls are ignored with a warning.
pub fn init(config: EngineConfig) {
    if ENGINE_CONFIG.set(config).is_err() {
        tracing::warn!("config::init() called more than once - ignoring");
    }
}

/// Global configuration if initialized.
pub fn get() -> Option<&'static EngineConfig> {
    ENGINE_CONFIG.get()
}

/// Check whether the config has been initialized.
pub fn is_initialized() -> bool {
    ENGINE_CONFIG.get().is_some()
}

/// The global configuration, or built-in defaults before `init()`.
pub fn current() -> EngineConfig {
    get().cloned().unwrap_or_default()
}
