use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Reference to a round icon image, as published by the card API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IconRef {
    pub url: String,
}

impl IconRef {
    /// Build a reference, turning protocol-relative URLs (`//host/...`) into `http:` ones.
    pub fn new(url: &str) -> Self {
        let url = if let Some(rest) = url.strip_prefix("//") {
            format!("http://{}", rest)
        } else {
            url.to_string()
        };
        Self { url }
    }

    /// File name used for the local copy: URL basename without the query string.
    pub fn file_name(&self) -> &str {
        let without_query = self.url.split('?').next().unwrap_or(&self.url);
        without_query.rsplit('/').next().unwrap_or(without_query)
    }
}

/// A catalog entry.
///
/// `index` is the card's position in the catalog list and is load-bearing:
/// the pattern atlas addresses its slots by it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Card {
    pub index: usize,
    pub id: u32,
    pub name: Option<String>,
    pub rarity: String,
    pub attribute: String,
    pub icon: Option<IconRef>,
    pub icon_upgraded: Option<IconRef>,
}

impl Card {
    /// Available icon variants in fixed order: base first, then upgraded.
    pub fn icons(&self) -> Vec<(&IconRef, bool)> {
        let mut icons = Vec::with_capacity(2);
        if let Some(ref icon) = self.icon {
            icons.push((icon, false));
        }
        if let Some(ref icon) = self.icon_upgraded {
            icons.push((icon, true));
        }
        icons
    }

    pub fn icon_for(&self, upgraded: bool) -> Option<&IconRef> {
        if upgraded {
            self.icon_upgraded.as_ref()
        } else {
            self.icon.as_ref()
        }
    }
}

/// Supplies the ordered card list. Order must be stable between runs.
pub trait CatalogProvider {
    fn get_catalog(&self) -> Result<Vec<Card>>;
}

/// Raw card record in the API's shape
#[derive(Debug, Clone, Deserialize)]
pub struct CardRecord {
    pub id: u32,
    #[serde(default)]
    pub name: Option<String>,
    pub rarity: String,
    pub attribute: String,
    #[serde(default)]
    pub round_card_image: Option<String>,
    #[serde(default)]
    pub round_card_idolized_image: Option<String>,
}

/// One page of a paged API dump
#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[allow(dead_code)]
    #[serde(default)]
    next: Option<String>,
    results: Vec<CardRecord>,
}

/// A catalog file is either the flattened record list or the raw pages
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CatalogFile {
    Records(Vec<CardRecord>),
    Pages(Vec<CatalogPage>),
}

/// In-memory card catalog
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub cards: Vec<Card>,
}

impl Catalog {
    /// Load the catalog from a JSON file (record list or paged dump).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {}", path.display()))?;
        let file: CatalogFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse catalog {}", path.display()))?;

        let records = match file {
            CatalogFile::Records(records) => records,
            CatalogFile::Pages(pages) => pages.into_iter().flat_map(|p| p.results).collect(),
        };

        let catalog = Self::from_records(records);
        tracing::info!("Loaded {} cards from {}", catalog.cards.len(), path.display());
        Ok(catalog)
    }

    /// Assign catalog indices in record order.
    pub fn from_records(records: Vec<CardRecord>) -> Self {
        let cards = records
            .into_iter()
            .enumerate()
            .map(|(index, r)| Card {
                index,
                id: r.id,
                name: r.name,
                rarity: r.rarity,
                attribute: r.attribute,
                icon: r.round_card_image.as_deref().map(IconRef::new),
                icon_upgraded: r.round_card_idolized_image.as_deref().map(IconRef::new),
            })
            .collect();
        Self { cards }
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

impl CatalogProvider for Catalog {
    fn get_catalog(&self) -> Result<Vec<Card>> {
        Ok(self.cards.clone())
    }
}

/// Fingerprint of everything the atlas layout depends on: card order and icon references.
pub fn fingerprint(cards: &[Card]) -> String {
    let mut hasher = Sha256::new();
    for card in cards {
        hasher.update(card.index.to_le_bytes());
        for upgraded in [false, true] {
            match card.icon_for(upgraded) {
                Some(icon) => hasher.update(icon.url.as_bytes()),
                None => hasher.update(b"-"),
            }
            hasher.update(b"\n");
        }
    }
    hex::encode(hasher.finalize())
}
