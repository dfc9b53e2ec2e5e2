//! Checksum record written after a successful extraction

use super::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What was extracted, and for which game version
///
/// Stored as a flat JSON object: `{"checksum": "...", "game_version": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractInfo {
    pub checksum: String,
    pub game_version: String,
}

impl ExtractInfo {
    pub fn new(checksum: impl Into<String>, game_version: impl Into<String>) -> Self {
        Self {
            checksum: checksum.into(),
            game_version: game_version.into(),
        }
    }

    /// Load a record; a missing file yields the default record
    pub async fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No extract record at {}", path.display());
            return Ok(Self::default());
        }
        let contents = tokio::fs::read_to_string(path).await?;
        Self::from_json_str(&contents)
    }

    /// Write the record, creating parent directories as needed
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_json_string()?).await?;
        tracing::debug!("Wrote extract record to {}", path.display());
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
