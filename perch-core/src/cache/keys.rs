//! Typed cache keys and namespaces.
//!
//! The persistent store is shared with unrelated state (install timestamps,
//! user settings), so every cache access goes through a typed key that can
//! only ever name one of the three bird namespaces. Raw string prefixes never
//! leave this module.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque region identifier from the catalog API (e.g. `US`, `CA`, `FR`).
///
/// Normalized to uppercase so that cache keys for the same region always
/// collide regardless of how the caller spelled it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegionCode(String);

impl RegionCode {
    /// Creates a region code, normalizing to uppercase.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque species identifier from the catalog (e.g. `amerob`).
///
/// Stable across regions: the same species carries the same code in every
/// regional catalog, which is what makes cross-region fallback matching work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpeciesCode(String);

impl SpeciesCode {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpeciesCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The three cache namespaces Perch owns in the shared persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    /// Regional bird catalogs (`birds_<region>`).
    Catalog,
    /// Per-species photos (`image_<speciesCode>`).
    Image,
    /// Per-species recordings (`audio_<speciesCode>`).
    Audio,
}

impl CacheNamespace {
    /// Storage-key prefix for this namespace.
    pub fn prefix(&self) -> &'static str {
        match self {
            CacheNamespace::Catalog => "birds_",
            CacheNamespace::Image => "image_",
            CacheNamespace::Audio => "audio_",
        }
    }

    /// All namespaces, for full purges.
    pub fn all() -> [CacheNamespace; 3] {
        [
            CacheNamespace::Catalog,
            CacheNamespace::Image,
            CacheNamespace::Audio,
        ]
    }
}

/// A fully-typed cache key. The namespace determines the payload shape:
/// `Catalog` keys store `Vec<CatalogBird>`, `Image` keys store `ImageMedia`,
/// `Audio` keys store `AudioMedia`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Catalog(RegionCode),
    Image(SpeciesCode),
    Audio(SpeciesCode),
}

impl CacheKey {
    /// Namespace this key belongs to.
    pub fn namespace(&self) -> CacheNamespace {
        match self {
            CacheKey::Catalog(_) => CacheNamespace::Catalog,
            CacheKey::Image(_) => CacheNamespace::Image,
            CacheKey::Audio(_) => CacheNamespace::Audio,
        }
    }

    /// Renders the key as stored in the persistent backend.
    pub fn storage_key(&self) -> String {
        match self {
            CacheKey::Catalog(region) => format!("birds_{region}"),
            CacheKey::Image(species) => format!("image_{species}"),
            CacheKey::Audio(species) => format!("audio_{species}"),
        }
    }

    /// Parses a raw storage key back into a typed key.
    ///
    /// Returns `None` for keys outside the three bird namespaces, so
    /// enumeration and purging can never touch unrelated persisted state.
    pub fn parse(raw: &str) -> Option<CacheKey> {
        if let Some(region) = raw.strip_prefix("birds_") {
            if region.is_empty() {
                return None;
            }
            return Some(CacheKey::Catalog(RegionCode::new(region)));
        }
        if let Some(species) = raw.strip_prefix("image_") {
            if species.is_empty() {
                return None;
            }
            return Some(CacheKey::Image(SpeciesCode::new(species)));
        }
        if let Some(species) = raw.strip_prefix("audio_") {
            if species.is_empty() {
                return None;
            }
            return Some(CacheKey::Audio(SpeciesCode::new(species)));
        }
        None
    }

    /// Species code for media keys, `None` for catalog keys.
    pub fn species(&self) -> Option<&SpeciesCode> {
        match self {
            CacheKey::Image(species) | CacheKey::Audio(species) => Some(species),
            CacheKey::Catalog(_) => None,
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
