use std::fmt;
use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use md5::{Digest, Md5};
use serde::Serialize;

use crate::error::HarvestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CatalogId(u32);

impl CatalogId {
    pub fn new(value: u32) -> Result<Self, HarvestError> {
        if value == 0 {
            return Err(HarvestError::InvalidCatalogId(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Every id of a catalog whose highest id is `bound`.
    pub fn range(bound: u32) -> impl Iterator<Item = CatalogId> {
        (1..=bound).map(CatalogId)
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CatalogId {
    type Err = HarvestError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = value
            .trim()
            .parse::<u32>()
            .map_err(|_| HarvestError::InvalidCatalogId(value.to_string()))?;
        Self::new(parsed).map_err(|_| HarvestError::InvalidCatalogId(value.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub id: CatalogId,
    pub asset_url: String,
    pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPayload {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub extension: String,
}

impl AssetPayload {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(&self.bytes)
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.fingerprint(), self.extension)
    }
}

/// MD5 of the asset bytes, kept as 32 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self(hex::encode(Md5::digest(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredFile {
    pub fingerprint: Fingerprint,
    pub extension: String,
    pub path: Utf8PathBuf,
}

impl StoredFile {
    pub fn new(root: &Utf8Path, fingerprint: Fingerprint, extension: &str) -> Self {
        let path = root.join(format!("{fingerprint}.{extension}"));
        Self {
            fingerprint,
            extension: extension.to_string(),
            path,
        }
    }

    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or(self.path.as_str())
    }
}
