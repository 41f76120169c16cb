use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub const DEFAULT_VOLUME: u16 = 100;
pub const MAX_VOLUME: u16 = 200;

/// Persists the playback volume as a single decimal line. The file is
/// re-read on every access so an edit from outside the session shows up
/// at the next prompt.
pub struct VolumeStore {
    path: PathBuf,
}

impl VolumeStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Current volume percent, creating the file with the default on first
    /// access. A corrupt or unreadable file yields the default without
    /// rewriting it.
    pub fn get(&self) -> u16 {
        if !self.path.exists() {
            if let Err(e) = fs::write(&self.path, format!("{}\n", DEFAULT_VOLUME)) {
                tracing::warn!("could not create volume file: {}", e);
            }
            return DEFAULT_VOLUME;
        }

        match fs::read_to_string(&self.path) {
            Ok(contents) => match contents.trim().parse::<u16>() {
                Ok(v) if v <= MAX_VOLUME => v,
                _ => {
                    tracing::warn!("volume file holds an invalid value, using default");
                    DEFAULT_VOLUME
                }
            },
            Err(e) => {
                tracing::warn!("could not read volume file: {}", e);
                DEFAULT_VOLUME
            }
        }
    }

    /// Accepts only 0..=200; the stored value is untouched on rejection.
    pub fn set(&self, volume: u16) -> Result<()> {
        if volume > MAX_VOLUME {
            return Err(Error::InvalidInput(format!(
                "volume must be between 0 and {}",
                MAX_VOLUME
            )));
        }
        fs::write(&self.path, format!("{}\n", volume))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> VolumeStore {
        VolumeStore::new(dir.path().join("volume.txt"))
    }

    #[test]
    fn test_absent_file_initialized_with_default() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert_eq!(store.get(), DEFAULT_VOLUME);
        // The backing file was created on first access
        let contents = fs::read_to_string(dir.path().join("volume.txt")).unwrap();
        assert_eq!(contents.trim(), "100");
    }

    #[test]
    fn test_set_and_get_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set(150).unwrap();
        assert_eq!(store.get(), 150);
        store.set(0).unwrap();
        assert_eq!(store.get(), 0);
        store.set(200).unwrap();
        assert_eq!(store.get(), 200);
    }

    #[test]
    fn test_out_of_range_set_rejected_and_value_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.set(80).unwrap();
        let err = store.set(250).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(store.get(), 80);
    }

    #[test]
    fn test_garbage_file_yields_default() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        fs::write(dir.path().join("volume.txt"), "loud\n").unwrap();
        assert_eq!(store.get(), DEFAULT_VOLUME);
        // Unreadable value is not rewritten
        let contents = fs::read_to_string(dir.path().join("volume.txt")).unwrap();
        assert_eq!(contents, "loud\n");
    }
}
