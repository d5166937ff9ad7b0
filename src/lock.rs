//! Lock file keeping two long running sessions off the same keyboard

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use tracing::debug;

/// Held for as long as the lock file is open. Released and removed on drop.
pub struct Lock {
    _file: File,
    path: PathBuf,
}

impl Lock {
    /// Take the per-user lock, failing if another meter already holds it
    pub fn acquire() -> io::Result<Self> {
        let path = ProjectDirs::from("", "", "das-keys")
            .map(|dirs| dirs.config_dir().join("das-keys.lock"))
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "could not determine lock file path"))?;
        Self::acquire_at(&path)
    }

    /// Take an exclusive, non-blocking lock on `path` and record our pid in it
    pub fn acquire_at(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.try_lock().is_err() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "another instance of das-keys is already running",
            ));
        }

        file.set_len(0)?;
        writeln!(file, "{}", std::process::id())?;
        debug!(path = %path.display(), "acquired lock");

        Ok(Self {
            _file: file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for Lock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
