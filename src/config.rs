use anyhow::{Context, Result};
use card_vision::VisionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Paths and switches for one recognizer instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Card catalog JSON (record list or paged API dump)
    pub catalog_path: PathBuf,
    /// Local icon cache directory
    pub icon_dir: PathBuf,
    /// Cached pattern atlas; its manifest sits next to it as `.json`
    pub atlas_path: PathBuf,
    /// Scan rows on the rayon pool
    pub parallel: bool,
    pub vision: VisionConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("cache/cards.json"),
            icon_dir: PathBuf::from("round_card_images"),
            atlas_path: PathBuf::from("cache/all_patterns.png"),
            parallel: true,
            vision: VisionConfig::default(),
        }
    }
}

impl ScannerConfig {
    /// Load from a JSON file; fields left out keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: ScannerConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.vision.validate()?;
        Ok(config)
    }
}
