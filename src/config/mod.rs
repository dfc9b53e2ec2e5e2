//! Configuration management for gdmods
//!
//! Uses XDG-compliant paths:
//! - Config: ~/.config/gdmods/config.toml
//! - Data: ~/.local/share/gdmods/
//! - Cache: ~/.cache/gdmods/

mod paths;

pub use paths::Paths;

use crate::extract::ArchiveTool;
use crate::game::GameLayout;
use crate::lifecycle::ExtractSettings;
use crate::progress::ProgressHub;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Grim Dawn installation directory
    pub game_dir: Option<String>,

    /// Game version stored in extraction records
    pub game_version: String,

    /// Archive tool override (path, or a command name looked up on PATH)
    pub archive_tool: Option<String>,

    /// Launcher for the archive tool, e.g. "wine" or "proton run"
    pub archive_tool_runner: Option<String>,

    /// Override for the extracted data directory
    pub data_dir_override: Option<String>,

    /// Override for the extraction staging root
    pub staging_dir_override: Option<String>,

    /// Extraction settings
    pub extraction: ExtractionConfig,

    #[serde(skip)]
    pub paths: Paths,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game_dir: None,
            game_version: String::new(),
            archive_tool: None,
            archive_tool_runner: None,
            data_dir_override: None,
            staging_dir_override: None,
            extraction: ExtractionConfig::default(),
            paths: Paths::new(),
        }
    }
}

/// Extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Fail a run when the archive tool exits unsuccessfully
    pub strict_exit_codes: bool,

    /// Capacity of the all-runs progress broadcast
    pub progress_buffer: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            strict_exit_codes: true,
            progress_buffer: 1000,
        }
    }
}

impl Config {
    /// Resolve the extracted data directory (override or default XDG path)
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir_override
            .as_deref()
            .map(expand_user_path)
            .unwrap_or_else(|| self.paths.data_dir())
    }

    /// Resolve the staging root for extraction runs (override or default XDG path)
    pub fn staging_root(&self) -> PathBuf {
        self.staging_dir_override
            .as_deref()
            .map(expand_user_path)
            .unwrap_or_else(|| self.paths.staging_dir())
    }

    pub fn game_layout(&self) -> Result<GameLayout> {
        let Some(game_dir) = self.game_dir.as_deref() else {
            bail!("No game directory configured. Run: gdmods config set-game-dir <dir>");
        };
        Ok(GameLayout::new(expand_user_path(game_dir), self.data_dir()))
    }

    /// Build the archive tool invocation from config
    ///
    /// `override_path` (e.g. from the command line) wins over the configured
    /// tool, which wins over the game's own `ArchiveTool.exe`.
    pub fn archive_tool(&self, override_path: Option<&str>) -> Result<ArchiveTool> {
        let program = match override_path.or(self.archive_tool.as_deref()) {
            Some(raw) => resolve_program(raw)?,
            None => self.game_layout()?.archive_tool(),
        };

        let mut tool = ArchiveTool::new(program);
        if let Some(runner) = self.archive_tool_runner.as_deref() {
            let mut parts = runner.split_whitespace();
            if let Some(first) = parts.next() {
                let launcher = resolve_program(first)?;
                let mut runner_parts = vec![launcher.to_string_lossy().to_string()];
                runner_parts.extend(parts.map(str::to_string));
                tool = tool.with_runner(runner_parts);
            }
        }
        Ok(tool)
    }

    /// Set the archive tool, leaving the config untouched when it cannot be used
    pub fn set_archive_tool(&mut self, raw: &str) -> Result<()> {
        let raw = raw.trim();
        self.archive_tool(Some(raw))?;
        self.archive_tool = Some(raw.to_string());
        Ok(())
    }

    /// Everything an extraction run needs, taken from config
    pub fn extract_settings(
        &self,
        tool_override: Option<&str>,
        hub: Option<ProgressHub>,
    ) -> Result<ExtractSettings> {
        let mut settings = ExtractSettings::new(self.archive_tool(tool_override)?, &self.game_version);
        settings.strict_exit_codes = self.extraction.strict_exit_codes;
        settings.staging_root = Some(self.staging_root());
        settings.hub = hub;
        Ok(settings)
    }

    /// Ensure required directories exist, including overrides.
    pub fn ensure_dirs(&self) -> Result<()> {
        self.paths
            .ensure_dirs()
            .context("Failed to create default application directories")?;
        std::fs::create_dir_all(self.data_dir()).context("Failed to create data directory")?;
        std::fs::create_dir_all(self.staging_root())
            .context("Failed to create staging directory")?;
        Ok(())
    }

    /// Load configuration from disk or create default
    pub async fn load() -> Result<Self> {
        let paths = Paths::new();
        let mut config = Self::load_from(&paths.config_file()).await?;
        config.paths = paths;
        Ok(config)
    }

    /// Load configuration from a specific file, creating it with defaults if missing
    pub async fn load_from(config_path: &Path) -> Result<Self> {
        if config_path.exists() {
            let content = fs::read_to_string(config_path)
                .await
                .context("Failed to read config file")?;
            toml::from_str(&content).context("Failed to parse config file")
        } else {
            let config = Config::default();
            config.save_to(config_path).await?;
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub async fn save(&self) -> Result<()> {
        self.save_to(&self.paths.config_file()).await
    }

    pub async fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(config_path, content)
            .await
            .context("Failed to write config file")?;

        Ok(())
    }
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_user_path(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Paths are used as given; bare command names are looked up on PATH
fn resolve_program(raw: &str) -> Result<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("Program path cannot be empty");
    }
    if raw.contains(['/', '\\']) || raw.starts_with('~') {
        return Ok(expand_user_path(raw));
    }
    which::which(raw).with_context(|| format!("'{}' was not found on PATH", raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_creates_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).await.unwrap();
        assert!(path.exists());
        assert!(config.extraction.strict_exit_codes);
        assert!(config.game_dir.is_none());
    }

    #[tokio::test]
    async fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::default();
        config.game_dir = Some("/games/Grim Dawn".to_string());
        config.game_version = "1.2.1.2".to_string();
        config.extraction.strict_exit_codes = false;
        config.save_to(&path).await.unwrap();

        let loaded = Config::load_from(&path).await.unwrap();
        assert_eq!(loaded.game_dir.as_deref(), Some("/games/Grim Dawn"));
        assert_eq!(loaded.game_version, "1.2.1.2");
        assert!(!loaded.extraction.strict_exit_codes);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("game_version = \"1.0\"\n[extraction]\n").unwrap();
        assert_eq!(config.game_version, "1.0");
        assert!(config.extraction.strict_exit_codes);
        assert_eq!(config.extraction.progress_buffer, 1000);
    }

    #[test]
    fn test_archive_tool_defaults_to_game_dir() {
        let mut config = Config::default();
        assert!(config.archive_tool(None).is_err());

        config.game_dir = Some("/games/gd".to_string());
        let tool = config.archive_tool(None).unwrap();
        assert_eq!(tool.program(), Path::new("/games/gd/ArchiveTool.exe"));

        let tool = config.archive_tool(Some("/opt/tools/ArchiveTool.exe")).unwrap();
        assert_eq!(tool.program(), Path::new("/opt/tools/ArchiveTool.exe"));
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_is_resolved_on_path() {
        let mut config = Config::default();
        config.game_dir = Some("/games/gd".to_string());
        config.archive_tool_runner = Some("sh -e".to_string());
        let tool = config.archive_tool(None).unwrap();
        assert!(tool.launcher().is_absolute());
        assert!(tool.launcher().ends_with("sh"));

        config.archive_tool_runner = Some("definitely-not-a-real-runner-xyz".to_string());
        assert!(config.archive_tool(None).is_err());
    }

    #[test]
    fn test_unusable_archive_tool_is_not_stored() {
        let mut config = Config::default();
        config.archive_tool = Some("/opt/tools/ArchiveTool.exe".to_string());

        assert!(config.set_archive_tool("definitely-not-a-real-tool-xyz").is_err());
        assert!(config.set_archive_tool("   ").is_err());
        assert_eq!(
            config.archive_tool.as_deref(),
            Some("/opt/tools/ArchiveTool.exe")
        );

        config.set_archive_tool(" /games/gd/ArchiveTool.exe ").unwrap();
        assert_eq!(config.archive_tool.as_deref(), Some("/games/gd/ArchiveTool.exe"));
    }

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default();
        config.data_dir_override = Some("/data/gd".to_string());
        config.staging_dir_override = Some("/tmp/gd-staging".to_string());
        assert_eq!(config.data_dir(), PathBuf::from("/data/gd"));
        assert_eq!(config.staging_root(), PathBuf::from("/tmp/gd-staging"));
    }
}
