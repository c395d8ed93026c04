use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use walkdir::WalkDir;

use crate::errors::{PetSegError, Result};

/// Directory of generated PNGs served back by URL.
///
/// Files are transient: `sweep` removes anything older than `max_age`.
#[derive(Debug)]
pub struct ArtifactStore {
    dir: PathBuf,
    max_age: Duration,
    sequence: AtomicU64,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| PetSegError::FileSystem {
            path: dir.clone(),
            operation: "artifact directory create".to_string(),
            source: e,
        })?;
        Ok(Self {
            dir,
            max_age,
            sequence: AtomicU64::new(0),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub const fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Writes `bytes` as `<kind>_<timestamp>_<seq>.png` and returns the file name.
    pub fn save_png(&self, kind: &str, bytes: &[u8]) -> Result<String> {
        let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%f");
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        let name = format!("{kind}_{stamp}_{seq}.png");
        let path = self.dir.join(&name);

        fs::write(&path, bytes).map_err(|e| PetSegError::FileSystem {
            path,
            operation: "artifact write".to_string(),
            source: e,
        })?;
        Ok(name)
    }

    /// Deletes regular files older than `max_age`; returns how many were removed.
    pub fn sweep(&self) -> Result<usize> {
        self.sweep_at(SystemTime::now())
    }

    fn sweep_at(&self, now: SystemTime) -> Result<usize> {
        let mut removed = 0;
        for entry in WalkDir::new(&self.dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let modified = match entry.metadata().ok().and_then(|m| m.modified().ok()) {
                Some(modified) => modified,
                None => continue,
            };
            let age = now.duration_since(modified).unwrap_or_default();
            if age > self.max_age {
                match fs::remove_file(entry.path()) {
                    Ok(()) => removed += 1,
                    // another sweep got there first
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(PetSegError::FileSystem {
                            path: entry.path().to_path_buf(),
                            operation: "artifact remove".to_string(),
                            source: e,
                        })
                    }
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, dir = %self.dir.display(), "swept stale artifacts");
        }
        Ok(removed)
    }
}
