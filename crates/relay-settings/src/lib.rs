//! # relay-settings
//!
//! Layered configuration for the chat relay.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`RelaySettings::default()`]
//! 2. **Settings file**: `$RELAY_SETTINGS` or `./relay.json` (deep-merged)
//! 3. **Environment variables**: `RELAY_*` overrides (highest priority)
//!
//! The binary applies its CLI flags on top of the result.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;
