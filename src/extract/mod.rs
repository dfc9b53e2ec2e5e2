//! Database extraction: run the archive tool, merge its output, record what was extracted

pub mod coordinator;
pub mod merge;
pub mod pipeline;
pub mod record;

pub use coordinator::{
    ArchiveOutcome, ArchiveTool, ExtractOutcome, ExtractPhase, ExtractionTask, TOTAL_STEPS,
};
pub use merge::{delete_contents, merge_extracts, move_tree};
pub use pipeline::{is_up_to_date, ExtractionPipeline, PipelineOutcome};
pub use record::ExtractInfo;

use crate::progress::RunId;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractError>;

/// Errors raised while extracting or merging databases
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A run object was started a second time
    #[error("extraction run {0} has already been started; runs can only be started once")]
    AlreadyStarted(RunId),

    /// A path that must be a directory is something else
    #[error("{} exists and is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// The same archive was listed twice in one run
    #[error("archive {} is listed more than once", .0.display())]
    DuplicateArchive(PathBuf),

    /// The archive tool could not be launched
    #[error("failed to launch archive tool {}: {source}", tool.display())]
    Spawn {
        tool: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One or more archive tool processes exited with a failure status
    #[error("archive tool failed for: {}", .0.join(", "))]
    ToolFailed(Vec<String>),

    /// A staging directory could not be created
    #[error("failed to create staging directory: {0}")]
    Staging(#[source] std::io::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal error
    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// Checksum record (de)serialization error
    #[error("record serialization error: {0}")]
    Record(#[from] serde_json::Error),

    /// A blocking worker panicked or was cancelled
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
