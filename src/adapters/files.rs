//! Filesystem adapters.
//!
//! - [`FileStore`] implements [`StoragePort`]: one `<key>.json` file per
//!   record under the state directory.  Writes go to a temporary sibling
//!   and are renamed into place, so a power cut leaves either the old or
//!   the new record.
//! - [`JsonConfigFile`] implements [`ConfigPort`]: reads and validates the
//!   system configuration.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{SystemConfig, validate_config};

// ───────────────────────────────────────────────────────────────
// Record store
// ───────────────────────────────────────────────────────────────

pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        info!("FileStore: records under {}", dir.display());
        Self { dir }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StoragePort for FileStore {
    fn read(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.path_for(key)).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound,
            _ => StorageError::IoError,
        })
    }

    fn write(&self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        write_atomic(&self.dir, &path, data).map_err(|_| StorageError::IoError)?;
        debug!("FileStore: wrote {}", path.display());
        Ok(())
    }
}

fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let tmp = path.with_extension("json.tmp");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(data)?;
        f.sync_all()?;
    }
    fs::rename(&tmp, path)
}

// ───────────────────────────────────────────────────────────────
// Config file
// ───────────────────────────────────────────────────────────────

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let bytes = fs::read(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::IoError,
        })?;
        let cfg: SystemConfig =
            serde_json::from_slice(&bytes).map_err(|_| ConfigError::Corrupted)?;
        validate_config(&cfg)?;
        info!("Config loaded from {}", self.path.display());
        Ok(cfg)
    }
}
