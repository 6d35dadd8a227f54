use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{validate_name, ProfileError, ProfileStorage};
use crate::eq::EqPreset;

type ProfileMap = BTreeMap<String, EqPreset>;

/// All profiles in one JSON object: `{ "<device>": { name, preamp, bands } }`
///
/// Every operation reads the file, and writes go through a sibling temp
/// file plus rename so a crash mid-write never leaves a truncated store.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default location (`<config dir>/riffle/device_profiles.json`)
    pub fn default_location() -> Self {
        Self::new(crate::config::default_profiles_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<ProfileMap, ProfileError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ProfileMap::new()),
            Err(e) => return Err(e.into()),
        };
        if data.trim().is_empty() {
            return Ok(ProfileMap::new());
        }
        Ok(serde_json::from_str(&data)?)
    }

    fn write_all(&self, profiles: &ProfileMap) -> Result<(), ProfileError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(profiles)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        log::info!(
            "profiles: wrote {} profile(s) to {:?}",
            profiles.len(),
            self.path
        );
        Ok(())
    }
}

impl ProfileStorage for JsonFileStorage {
    fn get(&self, name: &str) -> Result<Option<EqPreset>, ProfileError> {
        let name = validate_name(name)?;
        Ok(self.read_all()?.remove(name))
    }

    fn set(&mut self, name: &str, preset: &EqPreset) -> Result<(), ProfileError> {
        let name = validate_name(name)?;
        let mut profiles = self.read_all()?;
        profiles.insert(name.to_string(), preset.clone());
        self.write_all(&profiles)
    }

    fn delete(&mut self, name: &str) -> Result<bool, ProfileError> {
        let name = validate_name(name)?;
        let mut profiles = self.read_all()?;
        if profiles.remove(name).is_none() {
            return Ok(false);
        }
        self.write_all(&profiles)?;
        Ok(true)
    }

    fn names(&self) -> Result<Vec<String>, ProfileError> {
        Ok(self.read_all()?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eq::{BandType, EqBand};

    fn sample_preset() -> EqPreset {
        EqPreset::new(
            "Desk",
            -3.0,
            vec![
                EqBand::new(BandType::LowShelf, 90.0, 4.0, 0.9),
                EqBand::peaking(2500.0, -1.5, 3.0),
            ],
        )
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStorage::new(dir.path().join("profiles.json"));
        assert!(store.names().unwrap().is_empty());
        assert_eq!(store.get("Desk").unwrap(), None);
    }

    #[test]
    fn test_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("profiles.json");
        let mut store = JsonFileStorage::new(&path);

        store.set("Desk", &sample_preset()).unwrap();
        store.set("Car", &EqPreset::new("Car", 0.0, Vec::new())).unwrap();

        // A fresh handle sees the same data
        let reopened = JsonFileStorage::new(&path);
        assert_eq!(reopened.names().unwrap(), vec!["Car", "Desk"]);
        assert_eq!(reopened.get("Desk").unwrap(), Some(sample_preset()));

        assert!(store.delete("Car").unwrap());
        assert!(!store.delete("Car").unwrap());
        assert_eq!(reopened.names().unwrap(), vec!["Desk"]);
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        let mut store = JsonFileStorage::new(&path);
        store.set("Desk", &sample_preset()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        let desk = &json["Desk"];
        assert_eq!(desk["name"], "Desk");
        assert_eq!(desk["preamp"], -3.0);
        assert_eq!(desk["bands"][0]["type"], "low-shelf");
        assert_eq!(desk["bands"][1]["frequency"], 2500.0);
        assert!(desk["bands"][1].get("Q").is_some());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("profiles.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = JsonFileStorage::new(&path);
        assert!(matches!(store.names(), Err(ProfileError::Json(_))));
    }
}
