use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

const APP_DIR_NAME: &str = "busker";
const CATALOG_FILE_NAME: &str = "catalog.txt";
const VOLUME_FILE_NAME: &str = "volume.txt";
const DOWNLOADS_DIR_NAME: &str = "downloads";

/// Every filesystem location the program touches, resolved once at startup
/// and passed into the components that need it.
#[derive(Debug, Clone)]
pub struct Paths {
    pub catalog_file: PathBuf,
    pub volume_file: PathBuf,
    pub downloads_dir: PathBuf,
}

impl Paths {
    pub fn resolve() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join(APP_DIR_NAME);

        fs::create_dir_all(&config_dir).context("Failed to create config directory")?;

        // Media root: the user's audio directory, falling back to ~/Music
        let media_root = dirs::audio_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
            .context("Failed to get a media directory")?;

        Ok(Self {
            catalog_file: config_dir.join(CATALOG_FILE_NAME),
            volume_file: config_dir.join(VOLUME_FILE_NAME),
            downloads_dir: media_root.join(DOWNLOADS_DIR_NAME),
        })
    }
}
