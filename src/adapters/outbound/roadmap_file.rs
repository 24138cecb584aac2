use crate::common::DomainResult;
use crate::domains::ports::RoadmapStore;
use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Stores roadmap files on the local filesystem. Relative locations are
/// resolved against `base`.
#[derive(Debug, Clone)]
pub struct FilesystemRoadmapStore {
    base: PathBuf,
}

impl FilesystemRoadmapStore {
    /// `None` takes the base from `ROADMAP_DATA_DIR`, falling back to the
    /// working directory.
    pub fn new(base: Option<PathBuf>) -> Self {
        let base = base.unwrap_or_else(|| {
            env::var("ROADMAP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("."))
        });
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    fn resolve(&self, location: &Path) -> PathBuf {
        if location.is_absolute() {
            location.to_path_buf()
        } else {
            self.base.join(location)
        }
    }
}

impl RoadmapStore for FilesystemRoadmapStore {
    /// Writes to a sibling temporary file first so a failed save never
    /// leaves a truncated roadmap behind.
    fn save_roadmap_bytes(&self, location: &Path, bytes: &[u8]) -> DomainResult<()> {
        let target = self.resolve(location);
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut partial = target.clone().into_os_string();
        partial.push(".partial");
        let partial = PathBuf::from(partial);
        {
            let mut file = fs::File::create(&partial)?;
            file.write_all(bytes)?;
            file.sync_all()?;
        }
        fs::rename(&partial, &target)?;
        Ok(())
    }

    fn load_roadmap_bytes(&self, location: &Path) -> DomainResult<Vec<u8>> {
        let mut buf = Vec::new();
        fs::File::open(self.resolve(location))?.read_to_end(&mut buf)?;
        Ok(buf)
    }
}
