use anyhow::{Context, Result};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Durable storage for the pattern atlas.
///
/// `load` returns `None` when there is nothing usable: absent, unreadable, or
/// built for a different catalog fingerprint.
pub trait AtlasCache {
    fn load(&self, fingerprint: &str) -> Result<Option<RgbImage>>;
    fn store(&self, atlas: &RgbImage, fingerprint: &str) -> Result<()>;
    fn invalidate(&self) -> Result<()>;
}

/// Sidecar written next to the atlas image
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AtlasManifest {
    version: u32,
    fingerprint: String,
    width: u32,
    height: u32,
}

impl AtlasManifest {
    const CURRENT_VERSION: u32 = 1;
}

/// Atlas stored as a PNG plus a JSON manifest (`<atlas>.json`).
pub struct FileAtlasCache {
    path: PathBuf,
}

impl FileAtlasCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn manifest_path(&self) -> PathBuf {
        self.path.with_extension("json")
    }

    fn read_manifest(&self) -> Option<AtlasManifest> {
        let content = std::fs::read_to_string(self.manifest_path()).ok()?;
        serde_json::from_str(&content).ok()
    }
}

impl AtlasCache for FileAtlasCache {
    fn load(&self, fingerprint: &str) -> Result<Option<RgbImage>> {
        if !self.path.exists() {
            debug!("No cached atlas at {}", self.path.display());
            return Ok(None);
        }

        let manifest = match self.read_manifest() {
            Some(m) => m,
            None => {
                warn!("Atlas manifest missing or unreadable, rebuilding");
                return Ok(None);
            }
        };
        if manifest.version != AtlasManifest::CURRENT_VERSION
            || manifest.fingerprint != fingerprint
        {
            info!("Cached atlas was built for another catalog, rebuilding");
            return Ok(None);
        }

        let atlas = match image::open(&self.path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!("Cached atlas {} is corrupt: {}", self.path.display(), e);
                return Ok(None);
            }
        };
        if atlas.dimensions() != (manifest.width, manifest.height) {
            warn!(
                "Cached atlas is {}x{}, manifest says {}x{}",
                atlas.width(),
                atlas.height(),
                manifest.width,
                manifest.height
            );
            return Ok(None);
        }

        Ok(Some(atlas))
    }

    fn store(&self, atlas: &RgbImage, fingerprint: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        atlas
            .save_with_format(&self.path, image::ImageFormat::Png)
            .with_context(|| format!("Failed to write atlas {}", self.path.display()))?;

        let manifest = AtlasManifest {
            version: AtlasManifest::CURRENT_VERSION,
            fingerprint: fingerprint.to_string(),
            width: atlas.width(),
            height: atlas.height(),
        };
        let content = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(self.manifest_path(), content)
            .context("Failed to write atlas manifest")?;

        info!(
            "Stored atlas {}x{} at {}",
            atlas.width(),
            atlas.height(),
            self.path.display()
        );
        Ok(())
    }

    fn invalidate(&self) -> Result<()> {
        for path in [self.path.clone(), self.manifest_path()] {
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }
}
