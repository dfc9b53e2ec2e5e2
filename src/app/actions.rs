//! CLI command action handlers

use super::{bar_subscriber, extraction_bar, App};
use crate::checker::{CheckReturn, Verdict, PATH_SEPARATOR};
use crate::config::expand_user_path;
use crate::extract::{is_up_to_date, ExtractInfo, ExtractionPipeline};
use crate::hash::hash_directory;
use crate::lifecycle::{validate_mod_name, LifecycleOutcome, ModEvent};
use crate::tree::{DiskChange, DiskTree};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

impl App {
    // ========== Mod Tree Commands ==========

    pub async fn cmd_check(&self, dir: &Path, name: Option<&str>) -> Result<CheckReturn> {
        let loaded = load_tree(dir, name)?;
        let tree = loaded.tree();
        let mod_root_name = crate::checker::ModDataChecker::mod_root_name(tree);

        println!("Mod: {} ({})", mod_root_name, dir.display());
        println!("{:-<60}", "");
        for entry in self.checker.walk(tree, tree.root(), &mod_root_name, true) {
            let path = tree.path(entry.node, PATH_SEPARATOR);
            match &entry.verdict {
                Verdict::Fixable(dest) => println!("  {:<8} {} -> {}", entry.verdict.label(), path, dest),
                verdict => println!("  {:<8} {}", verdict.label(), path),
            }
        }

        let status = self.checker.check(tree, tree.root());
        println!("{:-<60}", "");
        println!("Result: {}", status);
        if status == CheckReturn::Fixable {
            println!("Run 'gdmods fix {}' to normalize the layout.", dir.display());
        }
        Ok(status)
    }

    pub async fn cmd_fix(&self, dir: &Path, name: Option<&str>, dry_run: bool) -> Result<()> {
        let mut loaded = load_tree(dir, name)?;
        let before = self.checker.check(loaded.tree(), loaded.tree().root());
        if before == CheckReturn::Valid {
            println!("Mod layout is already valid.");
            return Ok(());
        }

        let report = self
            .checker
            .fix_with_report(loaded.tree_mut())
            .context("Failed to normalize mod tree")?;
        let changes = loaded.plan();

        if changes.is_empty() {
            println!("Nothing to change.");
        } else {
            println!("Planned changes:");
            for change in &changes {
                match change {
                    DiskChange::Remove(path) => println!("  delete {}", path),
                    DiskChange::Move { from, to } => println!("  move   {} -> {}", from, to),
                }
            }
        }
        for path in &report.unknown {
            println!("  ! unknown file left in place: {}", path);
        }
        for path in &report.conflicts {
            println!("  ! destination taken, left in place: {}", path);
        }

        if dry_run {
            println!("Dry run: nothing was written.");
            return Ok(());
        }

        let stats = loaded.apply(&changes)?;
        println!(
            "Deleted {} files, moved {} files, pruned {} empty directories.",
            stats.removed, stats.moved, stats.pruned
        );

        let after = self.checker.check(loaded.tree(), loaded.tree().root());
        println!("Result: {}", after);
        Ok(())
    }

    // ========== Extraction Commands ==========

    pub async fn cmd_extract(
        &self,
        dest: &Path,
        tool: Option<&str>,
        archives: &[PathBuf],
    ) -> Result<()> {
        if archives.is_empty() {
            bail!("No archives given");
        }
        for archive in archives {
            if !archive.is_file() {
                bail!("Archive not found: {}", archive.display());
            }
        }

        let settings = self.extract_settings(tool).await?;
        let mut task = settings.task(archives.to_vec(), dest);
        let bar = extraction_bar()?;
        task.subscribe(bar_subscriber(bar.clone()));

        let outcome = match task.run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                bar.abandon();
                return Err(e).context("Extraction failed");
            }
        };

        for failed in outcome.failed() {
            println!(
                "Warning: archive tool failed for {} (exit code {:?})",
                failed.source.display(),
                failed.exit_code
            );
        }
        println!(
            "Extracted {} archives into {} ({} files).",
            outcome.archives.len(),
            dest.display(),
            outcome.files_merged
        );
        Ok(())
    }

    pub async fn cmd_extract_game(&self, force: bool) -> Result<()> {
        let layout = self.layout().await?;
        let databases = layout.existing_database_paths();
        if databases.is_empty() {
            bail!(
                "No game databases found under {}",
                layout.game_dir().display()
            );
        }

        let settings = self.extract_settings(None).await?;
        let record_path = layout.game_record_path();
        if !force && is_up_to_date(&record_path, &databases, &settings.game_version).await? {
            println!("Game databases are already extracted and up to date.");
            return Ok(());
        }

        layout.ensure_dirs().await?;
        let mut task = settings.task(databases, layout.game_db_extract_path());
        let bar = extraction_bar()?;
        task.subscribe(bar_subscriber(bar.clone()));

        let pipeline = ExtractionPipeline::new(task, record_path, settings.game_version.clone());
        let outcome = match pipeline.run().await {
            Ok(outcome) => outcome,
            Err(e) => {
                bar.abandon();
                return Err(e).context("Game database extraction failed");
            }
        };

        println!(
            "Extracted {} game databases into {}",
            outcome.extract.archives.len(),
            layout.game_db_extract_path().display()
        );
        println!("Checksum: {}", outcome.record.checksum);
        Ok(())
    }

    // ========== Utility Commands ==========

    pub async fn cmd_hash(&self, dir: &Path, recursive: bool) -> Result<()> {
        let target = dir.to_path_buf();
        let digest = tokio::task::spawn_blocking(move || hash_directory(&target, recursive))
            .await?
            .with_context(|| format!("Failed to hash {}", dir.display()))?;
        println!("{}", digest);
        Ok(())
    }

    pub async fn cmd_record_show(&self, file: &Path) -> Result<()> {
        let record = ExtractInfo::load(file).await?;
        println!("Checksum:     {}", display_or_unset(&record.checksum));
        println!("Game version: {}", display_or_unset(&record.game_version));
        Ok(())
    }

    pub async fn cmd_record_write(&self, file: &Path, checksum: &str, game_version: &str) -> Result<()> {
        ExtractInfo::new(checksum, game_version).save(file).await?;
        println!("Wrote {}", file.display());
        Ok(())
    }

    // ========== Mod Lifecycle Commands ==========

    pub async fn cmd_mod_event(&self, event: ModEvent) -> Result<()> {
        let mut lifecycle = self.lifecycle().await?;
        let bar = if matches!(event, ModEvent::Installed { .. }) {
            let bar = extraction_bar()?;
            lifecycle.subscribe(bar_subscriber(bar.clone()));
            Some(bar)
        } else {
            None
        };

        let outcome = lifecycle.handle(event).await;
        if let (Err(_), Some(bar)) = (&outcome, &bar) {
            bar.abandon();
        }

        match outcome? {
            LifecycleOutcome::Extracted(result) => {
                println!(
                    "Extracted {} databases ({} files).",
                    result.extract.archives.len(),
                    result.extract.files_merged
                );
                println!("Checksum: {}", result.record.checksum);
            }
            LifecycleOutcome::NoDatabases(path) => {
                println!("No databases to extract; created {}", path.display())
            }
            LifecycleOutcome::Removed { directory, record } => {
                if directory || record {
                    println!("Removed extracted data.");
                } else {
                    println!("Nothing was extracted for this mod.");
                }
            }
            LifecycleOutcome::StateLogged => println!("State change recorded."),
        }
        Ok(())
    }

    // ========== Config Commands ==========

    pub async fn cmd_config_show(&self) -> Result<()> {
        let config = self.config.read().await;
        println!("Configuration");
        println!("{:-<40}", "");
        println!("Config file:   {}", config.paths.config_file().display());
        println!(
            "Game dir:      {}",
            config.game_dir.as_deref().unwrap_or("(not set)")
        );
        println!("Game version:  {}", display_or_unset(&config.game_version));
        println!(
            "Archive tool:  {}",
            config.archive_tool.as_deref().unwrap_or("(game default)")
        );
        println!(
            "Tool runner:   {}",
            config.archive_tool_runner.as_deref().unwrap_or("(none)")
        );
        println!("Data dir:      {}", config.data_dir().display());
        println!("Staging root:  {}", config.staging_root().display());
        println!(
            "Strict exits:  {}",
            config.extraction.strict_exit_codes
        );
        Ok(())
    }

    pub async fn cmd_config_set_game_dir(&self, dir: &str) -> Result<()> {
        let path = expand_user_path(dir.trim());
        if !path.is_dir() {
            bail!("Game directory does not exist: {}", path.display());
        }
        if !path.join(crate::game::ARCHIVE_TOOL).is_file() {
            println!(
                "Warning: {} not found in {}",
                crate::game::ARCHIVE_TOOL,
                path.display()
            );
        }

        let mut config = self.config.write().await;
        config.game_dir = Some(path.to_string_lossy().to_string());
        config.save().await?;
        println!("Game directory set to {}", path.display());
        Ok(())
    }

    pub async fn cmd_config_set_tool(&self, tool: &str) -> Result<()> {
        let trimmed = tool.trim();
        if trimmed.is_empty() {
            bail!("Archive tool path cannot be empty");
        }
        let mut config = self.config.write().await;
        config.set_archive_tool(trimmed)?;
        config.save().await?;
        println!("Archive tool set to {}", trimmed);
        Ok(())
    }

    pub async fn cmd_config_set_game_version(&self, version: &str) -> Result<()> {
        let mut config = self.config.write().await;
        config.game_version = version.trim().to_string();
        config.save().await?;
        println!("Game version set to {}", config.game_version);
        Ok(())
    }
}

fn load_tree(dir: &Path, name: Option<&str>) -> Result<DiskTree> {
    match name {
        Some(name) => {
            validate_mod_name(name)?;
            DiskTree::load_named(dir, name)
        }
        None => DiskTree::load(dir),
    }
}

fn display_or_unset(value: &str) -> &str {
    if value.is_empty() {
        "(unset)"
    } else {
        value
    }
}
