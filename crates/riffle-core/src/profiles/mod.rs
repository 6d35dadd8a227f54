//! Device profile storage
//!
//! A device profile is an [`EqPreset`](crate::eq::EqPreset) keyed by a
//! user-chosen device name ("Desk speakers", "HD 600", ...). The engine only
//! sees the [`ProfileStorage`] port; where profiles live is up to the host.
//!
//! - [`MemoryStorage`] - in-process map, for tests and ephemeral sessions
//! - [`JsonFileStorage`] - a single pretty-printed JSON object on disk

mod error;
mod json_file;
mod memory;

pub use error::ProfileError;
pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

use crate::eq::EqPreset;

/// Name-keyed persistence of presets
pub trait ProfileStorage: Send {
    /// Look up a profile, `Ok(None)` if it doesn't exist
    fn get(&self, name: &str) -> Result<Option<EqPreset>, ProfileError>;

    /// Insert or overwrite a profile
    fn set(&mut self, name: &str, preset: &EqPreset) -> Result<(), ProfileError>;

    /// Remove a profile, returning whether it existed
    fn delete(&mut self, name: &str) -> Result<bool, ProfileError>;

    /// All stored profile names in sorted order
    fn names(&self) -> Result<Vec<String>, ProfileError>;
}

/// Profile names are trimmed and must not be empty
pub(crate) fn validate_name(name: &str) -> Result<&str, ProfileError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(ProfileError::EmptyName)
    } else {
        Ok(trimmed)
    }
}
