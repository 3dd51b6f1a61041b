use crate::error::AssetError;
use card_catalog::{Card, IconRef};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Resolves an icon reference to decoded pixels, fetching and caching it on first use.
/// Calling it twice for the same reference yields the same pixels.
pub trait ImageFetcher {
    fn resolve(&self, icon: &IconRef) -> Result<RgbImage, AssetError>;
}

/// Remote origin for icon bytes (the card API's image host).
pub trait IconSource {
    fn download(&self, icon: &IconRef) -> anyhow::Result<Vec<u8>>;
}

/// Directory-backed icon cache.
///
/// Icons live at `dir/<url basename>`. Missing files are downloaded through the
/// optional [`IconSource`]; without one they are reported as [`AssetError::Missing`].
pub struct IconStore {
    dir: PathBuf,
    source: Option<Box<dyn IconSource + Send + Sync>>,
}

impl IconStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: Box<dyn IconSource + Send + Sync>) -> Self {
        self.source = Some(source);
        self
    }

    /// Local path where the icon is (or will be) cached
    pub fn local_path(&self, icon: &IconRef) -> PathBuf {
        self.dir.join(icon.file_name())
    }

    /// Icons of `cards` with no local copy. Without a source these will all
    /// resolve to [`AssetError::Missing`].
    pub fn missing_icons<'c>(&self, cards: &'c [Card]) -> Vec<&'c IconRef> {
        cards
            .iter()
            .flat_map(|card| card.icons())
            .map(|(icon, _)| icon)
            .filter(|icon| !self.local_path(icon).exists())
            .collect()
    }

    fn fetch(&self, icon: &IconRef, dest: &Path) -> Result<(), AssetError> {
        let source = self
            .source
            .as_ref()
            .ok_or_else(|| AssetError::Missing(dest.display().to_string()))?;

        info!("Fetching {}", icon.url);
        let bytes = source.download(icon).map_err(|e| AssetError::Fetch {
            url: icon.url.clone(),
            source: e.into(),
        })?;

        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(dest, bytes)?;
        Ok(())
    }
}

impl ImageFetcher for IconStore {
    fn resolve(&self, icon: &IconRef) -> Result<RgbImage, AssetError> {
        let path = self.local_path(icon);
        if !path.exists() {
            self.fetch(icon, &path)?;
        }

        let img = image::open(&path).map_err(|e| AssetError::Decode {
            path: path.display().to_string(),
            source: e,
        })?;
        debug!("Resolved icon {} ({}x{})", path.display(), img.width(), img.height());
        Ok(img.to_rgb8())
    }
}
