//! Reacting to mods being installed, removed or toggled

use crate::extract::{ArchiveTool, ExtractionPipeline, ExtractionTask, PipelineOutcome};
use crate::game::{find_mod_databases, GameLayout};
use crate::progress::{ProgressHub, Subscriber};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Notification from the mod manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModEvent {
    Installed { name: String, path: PathBuf },
    Removed { name: String },
    StateChanged { name: String, active: bool },
}

/// What handling an event did
#[derive(Debug)]
pub enum LifecycleOutcome {
    /// The mod's databases were extracted and recorded
    Extracted(PipelineOutcome),
    /// The mod ships no databases; only its extract directory was created
    NoDatabases(PathBuf),
    Removed { directory: bool, record: bool },
    StateLogged,
}

/// Everything needed to build extraction runs
#[derive(Debug, Clone)]
pub struct ExtractSettings {
    pub tool: ArchiveTool,
    pub strict_exit_codes: bool,
    pub staging_root: Option<PathBuf>,
    pub game_version: String,
    pub hub: Option<ProgressHub>,
}

impl ExtractSettings {
    pub fn new(tool: ArchiveTool, game_version: impl Into<String>) -> Self {
        Self {
            tool,
            strict_exit_codes: true,
            staging_root: None,
            game_version: game_version.into(),
            hub: None,
        }
    }

    /// A fresh run over `archives` into `destination`
    pub fn task(&self, archives: Vec<PathBuf>, destination: impl Into<PathBuf>) -> ExtractionTask {
        let mut task = ExtractionTask::new(self.tool.clone(), archives, destination)
            .strict_exit_codes(self.strict_exit_codes);
        if let Some(root) = &self.staging_root {
            task = task.with_staging_root(root);
        }
        if let Some(hub) = &self.hub {
            task = task.with_hub(hub.clone());
        }
        task
    }
}

pub struct ModLifecycle {
    layout: GameLayout,
    settings: ExtractSettings,
    subscribers: Vec<Subscriber>,
}

impl ModLifecycle {
    pub fn new(layout: GameLayout, settings: ExtractSettings) -> Self {
        Self {
            layout,
            settings,
            subscribers: Vec::new(),
        }
    }

    /// Receive progress for every extraction this lifecycle starts
    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    pub async fn handle(&self, event: ModEvent) -> Result<LifecycleOutcome> {
        match event {
            ModEvent::Installed { name, path } => self.on_installed(&name, &path).await,
            ModEvent::Removed { name } => self.on_removed(&name).await,
            ModEvent::StateChanged { name, active } => {
                tracing::info!(
                    "Mod {} is now {}",
                    name,
                    if active { "active" } else { "inactive" }
                );
                Ok(LifecycleOutcome::StateLogged)
            }
        }
    }

    async fn on_installed(&self, name: &str, path: &Path) -> Result<LifecycleOutcome> {
        validate_mod_name(name)?;
        tracing::info!("Mod {} installed from {}", name, path.display());

        let mod_path = path.to_path_buf();
        let databases = tokio::task::spawn_blocking(move || find_mod_databases(&mod_path))
            .await
            .context("Database scan task failed")?;

        let extract_path = self.layout.mod_extract_path(name);
        if databases.is_empty() {
            tokio::fs::create_dir_all(&extract_path)
                .await
                .with_context(|| format!("Failed to create {}", extract_path.display()))?;
            tracing::debug!("Mod {} has no databases to extract", name);
            return Ok(LifecycleOutcome::NoDatabases(extract_path));
        }

        let mut task = self.settings.task(databases, &extract_path);
        for subscriber in &self.subscribers {
            task.subscribe(subscriber.clone());
        }
        let outcome = ExtractionPipeline::new(
            task,
            self.layout.mod_record_path(name),
            self.settings.game_version.clone(),
        )
        .run()
        .await
        .with_context(|| format!("Failed to extract databases of mod {}", name))?;

        Ok(LifecycleOutcome::Extracted(outcome))
    }

    async fn on_removed(&self, name: &str) -> Result<LifecycleOutcome> {
        validate_mod_name(name)?;
        tracing::info!("Mod {} removed", name);

        let extract_path = self.layout.mod_extract_path(name);
        let directory = extract_path.is_dir();
        if directory {
            tokio::fs::remove_dir_all(&extract_path)
                .await
                .with_context(|| format!("Failed to remove {}", extract_path.display()))?;
        }

        let record_path = self.layout.mod_record_path(name);
        let record = record_path.is_file();
        if record {
            tokio::fs::remove_file(&record_path)
                .await
                .with_context(|| format!("Failed to remove {}", record_path.display()))?;
        }

        Ok(LifecycleOutcome::Removed { directory, record })
    }
}

/// Mod names become directory names, so they must be a single plain component
pub(crate) fn validate_mod_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Mod name cannot be empty");
    }
    if name.contains(['/', '\\']) || name == "." || name == ".." {
        bail!("Invalid mod name '{}'", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn lifecycle(data: &Path) -> ModLifecycle {
        ModLifecycle::new(
            GameLayout::new("/unused", data),
            ExtractSettings::new(ArchiveTool::new("/unused/ArchiveTool.exe"), "1.0"),
        )
    }

    #[tokio::test]
    async fn test_removed_deletes_extract_and_record() {
        let data = tempfile::tempdir().unwrap();
        let lifecycle = lifecycle(data.path());
        let layout = GameLayout::new("/unused", data.path());
        fs::create_dir_all(layout.mod_extract_path("Foo").join("records")).unwrap();
        fs::write(layout.mod_record_path("Foo"), "{}").unwrap();

        let outcome = lifecycle
            .handle(ModEvent::Removed { name: "Foo".into() })
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            LifecycleOutcome::Removed { directory: true, record: true }
        ));
        assert!(!layout.mod_extract_path("Foo").exists());
        assert!(!layout.mod_record_path("Foo").exists());

        let again = lifecycle
            .handle(ModEvent::Removed { name: "Foo".into() })
            .await
            .unwrap();
        assert!(matches!(
            again,
            LifecycleOutcome::Removed { directory: false, record: false }
        ));
    }

    #[tokio::test]
    async fn test_installed_without_databases_creates_directory() {
        let data = tempfile::tempdir().unwrap();
        let mod_dir = tempfile::tempdir().unwrap();
        fs::write(mod_dir.path().join("DPYes.dll"), "x").unwrap();

        let outcome = lifecycle(data.path())
            .handle(ModEvent::Installed {
                name: "Foo".into(),
                path: mod_dir.path().to_path_buf(),
            })
            .await
            .unwrap();
        match outcome {
            LifecycleOutcome::NoDatabases(path) => assert!(path.is_dir()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_path_like_names_are_rejected() {
        let data = tempfile::tempdir().unwrap();
        let lifecycle = lifecycle(data.path());
        for name in ["", "../escape", "a/b", ".."] {
            assert!(lifecycle
                .handle(ModEvent::Removed { name: name.into() })
                .await
                .is_err());
        }
    }

    #[tokio::test]
    async fn test_state_change_is_logged_only() {
        let data = tempfile::tempdir().unwrap();
        let outcome = lifecycle(data.path())
            .handle(ModEvent::StateChanged {
                name: "Foo".into(),
                active: true,
            })
            .await
            .unwrap();
        assert!(matches!(outcome, LifecycleOutcome::StateLogged));
        assert_eq!(fs::read_dir(data.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_installed_extracts_mod_databases() {
        let data = tempfile::tempdir().unwrap();
        let tools = tempfile::tempdir().unwrap();
        let script = tools.path().join("tool.sh");
        fs::write(&script, "cp \"$1\" \"$3/$(basename \"$1\").dbr\"\n").unwrap();

        let mod_dir = tempfile::tempdir().unwrap();
        let arz = mod_dir.path().join("mods/Foo/database/Foo.arz");
        fs::create_dir_all(arz.parent().unwrap()).unwrap();
        fs::write(&arz, "FOO").unwrap();

        let layout = GameLayout::new("/unused", data.path());
        let settings = ExtractSettings::new(
            ArchiveTool::new(&script).with_runner(["/bin/sh"]),
            "1.0",
        );
        let lifecycle = ModLifecycle::new(layout.clone(), settings);

        let outcome = lifecycle
            .handle(ModEvent::Installed {
                name: "Foo".into(),
                path: mod_dir.path().to_path_buf(),
            })
            .await
            .unwrap();

        match outcome {
            LifecycleOutcome::Extracted(result) => {
                assert_eq!(result.record.game_version, "1.0");
                assert_eq!(result.extract.files_merged, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(
            fs::read_to_string(layout.mod_extract_path("Foo").join("Foo.arz.dbr")).unwrap(),
            "FOO"
        );
        assert!(layout.mod_record_path("Foo").is_file());
    }
}
