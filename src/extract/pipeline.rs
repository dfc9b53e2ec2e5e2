//! Extract, hash, record: the sequence run after a game update or mod install

use super::coordinator::{ExtractOutcome, ExtractionTask};
use super::record::ExtractInfo;
use super::Result;
use crate::hash::hash_files;
use std::path::{Path, PathBuf};

/// An extraction run followed by writing its checksum record
#[derive(Debug)]
pub struct ExtractionPipeline {
    task: ExtractionTask,
    record_path: PathBuf,
    game_version: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub extract: ExtractOutcome,
    pub record: ExtractInfo,
}

impl ExtractionPipeline {
    pub fn new(
        task: ExtractionTask,
        record_path: impl Into<PathBuf>,
        game_version: impl Into<String>,
    ) -> Self {
        Self {
            task,
            record_path: record_path.into(),
            game_version: game_version.into(),
        }
    }

    pub fn task(&self) -> &ExtractionTask {
        &self.task
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// Run the extraction, hash its source archives and write the record
    ///
    /// The record is only written when the extraction succeeded.
    pub async fn run(self) -> Result<PipelineOutcome> {
        let extract = self.task.run().await?;

        let sources = self.task.archives().to_vec();
        let checksum = tokio::task::spawn_blocking(move || hash_files(&sources)).await??;

        let record = ExtractInfo::new(checksum, self.game_version);
        record.save(&self.record_path).await?;
        tracing::info!(
            "[{}] Recorded extract checksum {} in {}",
            extract.run_id,
            record.checksum,
            self.record_path.display()
        );

        Ok(PipelineOutcome { extract, record })
    }
}

/// Whether the record at `record_path` matches `sources` and `game_version`
pub async fn is_up_to_date(
    record_path: &Path,
    sources: &[PathBuf],
    game_version: &str,
) -> Result<bool> {
    let record = ExtractInfo::load(record_path).await?;
    if record.checksum.is_empty() || record.game_version != game_version {
        return Ok(false);
    }

    let sources = sources.to_vec();
    let checksum = tokio::task::spawn_blocking(move || hash_files(&sources)).await??;
    Ok(checksum == record.checksum)
}
