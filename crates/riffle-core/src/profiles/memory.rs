use std::collections::BTreeMap;

use super::{validate_name, ProfileError, ProfileStorage};
use crate::eq::EqPreset;

/// Profiles kept in a map for the lifetime of the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    profiles: BTreeMap<String, EqPreset>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProfileStorage for MemoryStorage {
    fn get(&self, name: &str) -> Result<Option<EqPreset>, ProfileError> {
        Ok(self.profiles.get(validate_name(name)?).cloned())
    }

    fn set(&mut self, name: &str, preset: &EqPreset) -> Result<(), ProfileError> {
        let name = validate_name(name)?;
        self.profiles.insert(name.to_string(), preset.clone());
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<bool, ProfileError> {
        Ok(self.profiles.remove(validate_name(name)?).is_some())
    }

    fn names(&self) -> Result<Vec<String>, ProfileError> {
        Ok(self.profiles.keys().cloned().collect())
    }
}
