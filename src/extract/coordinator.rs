//! Concurrent archive extraction runs
//!
//! A run clears its destination, launches one archive tool process per
//! archive (all of them before any is awaited), tracks completions as they
//! arrive and, once every process has exited, merges the staged output into
//! the destination in the order the archives were given.

use super::merge::{archive_name, delete_contents, merge_extracts, StagedExtract};
use super::{ExtractError, Result};
use crate::progress::{
    EventKind, MultiStepProgress, Progress, ProgressChannel, ProgressHub, RunId, Subscriber,
    TaskEvent,
};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;

/// Index of the last phase
pub const TOTAL_STEPS: usize = 4;

/// Named phases of an extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractPhase {
    Pending,
    ClearingDestination,
    Extracting,
    Merging,
    Done,
}

impl ExtractPhase {
    pub fn step(self) -> usize {
        match self {
            ExtractPhase::Pending => 0,
            ExtractPhase::ClearingDestination => 1,
            ExtractPhase::Extracting => 2,
            ExtractPhase::Merging => 3,
            ExtractPhase::Done => 4,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ExtractPhase::Pending => "Starting Database Extractions...",
            ExtractPhase::ClearingDestination => "Removing Previous Extract(s)",
            ExtractPhase::Extracting => "Extracting Databases",
            ExtractPhase::Merging => "Merging Files",
            ExtractPhase::Done => "Done!",
        }
    }

    /// Build an event snapshot for this phase
    pub fn event(
        self,
        kind: EventKind,
        current: usize,
        max: usize,
        message: impl Into<String>,
    ) -> TaskEvent {
        TaskEvent {
            kind,
            progress: MultiStepProgress::new(
                Progress::new(current, max, message),
                self.step(),
                TOTAL_STEPS,
                self.message(),
            ),
        }
    }
}

/// The external archive extraction tool
///
/// Invoked as `<program> <archive> -database <output dir>`, optionally
/// through a runner such as `wine`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTool {
    program: PathBuf,
    runner: Vec<String>,
}

impl ArchiveTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            runner: Vec::new(),
        }
    }

    /// Launch the tool through `runner` (command followed by its own arguments)
    pub fn with_runner<I, S>(mut self, runner: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.runner = runner.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// The executable actually launched
    pub fn launcher(&self) -> PathBuf {
        match self.runner.first() {
            Some(runner) => PathBuf::from(runner),
            None => self.program.clone(),
        }
    }

    pub fn command(&self, archive: &Path, output: &Path) -> Command {
        let mut command = match self.runner.split_first() {
            Some((runner, runner_args)) => {
                let mut command = Command::new(runner);
                command.args(runner_args).arg(&self.program);
                command
            }
            None => Command::new(&self.program),
        };
        command
            .arg(archive)
            .arg("-database")
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(windows)]
        command.creation_flags(0x0800_0000);
        command
    }
}

/// How one archive tool process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub source: PathBuf,
    pub exit_code: Option<i32>,
    pub success: bool,
}

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOutcome {
    pub run_id: RunId,
    /// In input order
    pub archives: Vec<ArchiveOutcome>,
    /// Top-level destination entries removed before extracting
    pub cleared: usize,
    pub files_merged: usize,
}

impl ExtractOutcome {
    pub fn failed(&self) -> impl Iterator<Item = &ArchiveOutcome> {
        self.archives.iter().filter(|a| !a.success)
    }
}

/// A single-use extraction run
pub struct ExtractionTask {
    tool: ArchiveTool,
    archives: Vec<PathBuf>,
    destination: PathBuf,
    staging_root: Option<PathBuf>,
    strict_exit_codes: bool,
    channel: ProgressChannel,
    started: AtomicBool,
}

impl std::fmt::Debug for ExtractionTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionTask")
            .field("id", &self.id())
            .field("tool", &self.tool)
            .field("archives", &self.archives)
            .field("destination", &self.destination)
            .field("strict_exit_codes", &self.strict_exit_codes)
            .field("started", &self.is_started())
            .finish()
    }
}

impl ExtractionTask {
    pub fn new(tool: ArchiveTool, archives: Vec<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            archives,
            destination: destination.into(),
            staging_root: None,
            strict_exit_codes: true,
            channel: ProgressChannel::new(RunId::new()),
            started: AtomicBool::new(false),
        }
    }

    /// Create staging directories under `root` instead of the system temp dir
    pub fn with_staging_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.staging_root = Some(root.into());
        self
    }

    /// Fail the run when any tool process exits unsuccessfully (default)
    pub fn strict_exit_codes(mut self, strict: bool) -> Self {
        self.strict_exit_codes = strict;
        self
    }

    pub fn with_hub(mut self, hub: ProgressHub) -> Self {
        self.channel = self.channel.with_hub(hub);
        self
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.channel.subscribe(subscriber);
    }

    pub fn id(&self) -> RunId {
        self.channel.run_id()
    }

    pub fn archives(&self) -> &[PathBuf] {
        &self.archives
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Execute the run
    ///
    /// Fails with `AlreadyStarted` on a second call. No destination content
    /// is written until every tool process has exited.
    pub async fn run(&self) -> Result<ExtractOutcome> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ExtractError::AlreadyStarted(self.id()));
        }

        let archives = self.resolve_archives()?;
        let total = archives.len();
        tracing::info!(
            "[{}] Running extracts of {} databases into {}",
            self.id(),
            total,
            self.destination.display()
        );

        let names: Vec<String> = archives.iter().map(|a| archive_name(a)).collect();
        self.channel.emit(ExtractPhase::Pending.event(
            EventKind::Started,
            0,
            total,
            format!("Extracting {}", names.join(", ")),
        ));

        let cleared = self.clear_destination().await?;

        let mut files_merged = 0;
        let mut outcomes = Vec::new();
        if total > 0 {
            let (staged, results) = self.extract_all(&archives).await?;

            let failed: Vec<String> = results
                .iter()
                .filter(|o| !o.success)
                .map(|o| archive_name(&o.source))
                .collect();
            if !failed.is_empty() {
                if self.strict_exit_codes {
                    tracing::error!(
                        "[{}] Archive tool failed for {}; nothing was merged",
                        self.id(),
                        failed.join(", ")
                    );
                    return Err(ExtractError::ToolFailed(failed));
                }
                tracing::warn!(
                    "[{}] Archive tool failed for {}; merging whatever was extracted",
                    self.id(),
                    failed.join(", ")
                );
            }

            tracing::debug!("[{}] Extraction complete, merging in input order", self.id());
            files_merged = merge_extracts(staged, &self.channel).await?;
            outcomes = results;
        }

        self.channel
            .emit(ExtractPhase::Done.event(EventKind::Finished, 1, 1, ""));
        tracing::info!(
            "[{}] Extraction finished: {} archives, {} files merged",
            self.id(),
            total,
            files_merged
        );

        Ok(ExtractOutcome {
            run_id: self.id(),
            archives: outcomes,
            cleared,
            files_merged,
        })
    }

    /// Absolute archive paths, rejecting duplicates
    fn resolve_archives(&self) -> Result<Vec<PathBuf>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.archives.len());
        for archive in &self.archives {
            let absolute = std::path::absolute(archive)?;
            if !seen.insert(absolute.clone()) {
                return Err(ExtractError::DuplicateArchive(absolute));
            }
            resolved.push(absolute);
        }
        Ok(resolved)
    }

    async fn clear_destination(&self) -> Result<usize> {
        match tokio::fs::metadata(&self.destination).await {
            Ok(metadata) if !metadata.is_dir() => {
                Err(ExtractError::NotADirectory(self.destination.clone()))
            }
            Ok(_) => {
                tracing::debug!(
                    "[{}] Deleting contents of {}",
                    self.id(),
                    self.destination.display()
                );
                delete_contents(&self.destination, |done, total, path| {
                    self.channel.emit(ExtractPhase::ClearingDestination.event(
                        EventKind::Progress,
                        done,
                        total,
                        format!("Removed \"{}\"", archive_name(path)),
                    ));
                })
                .await
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.destination).await?;
                Ok(0)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Stage every archive, launch all tool processes, then await them
    async fn extract_all(
        &self,
        archives: &[PathBuf],
    ) -> Result<(Vec<StagedExtract>, Vec<ArchiveOutcome>)> {
        let staging_root = self
            .staging_root
            .clone()
            .unwrap_or_else(std::env::temp_dir);
        tokio::fs::create_dir_all(&staging_root)
            .await
            .map_err(ExtractError::Staging)?;

        let mut staged = Vec::with_capacity(archives.len());
        for source in archives {
            let staging = tempfile::Builder::new()
                .prefix("gdmods-extract-")
                .tempdir_in(&staging_root)
                .map_err(ExtractError::Staging)?;
            staged.push(StagedExtract {
                source: source.clone(),
                staging,
                destination: self.destination.clone(),
            });
        }

        let mut running = FuturesUnordered::new();
        let mut spawn_error = None;
        for (index, extract) in staged.iter().enumerate() {
            match self
                .tool
                .command(&extract.source, extract.staging.path())
                .spawn()
            {
                Ok(child) => {
                    tracing::debug!(
                        "[{}] Started extract of {} to {}",
                        self.id(),
                        extract.source.display(),
                        extract.staging.path().display()
                    );
                    running.push(async move { (index, child.wait_with_output().await) });
                }
                Err(source) => {
                    spawn_error = Some(ExtractError::Spawn {
                        tool: self.tool.launcher(),
                        source,
                    });
                    break;
                }
            }
        }

        if let Some(error) = spawn_error {
            // let already launched processes finish before their staging dirs go away
            while running.next().await.is_some() {}
            return Err(error);
        }

        let total = staged.len();
        let mut remaining: Vec<usize> = (0..total).collect();
        let mut outcomes: Vec<Option<ArchiveOutcome>> = vec![None; total];
        let mut wait_error = None;

        while let Some((index, result)) = running.next().await {
            remaining.retain(|&i| i != index);
            let source = staged[index].source.clone();
            let outcome = match result {
                Ok(output) => {
                    if !output.status.success() {
                        tracing::warn!(
                            "[{}] Archive tool exited with {} for {}: {}",
                            self.id(),
                            output.status,
                            source.display(),
                            String::from_utf8_lossy(&output.stderr).trim()
                        );
                    }
                    ArchiveOutcome {
                        source,
                        exit_code: output.status.code(),
                        success: output.status.success(),
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        "[{}] Failed waiting for archive tool on {}: {}",
                        self.id(),
                        source.display(),
                        e
                    );
                    wait_error.get_or_insert(e);
                    ArchiveOutcome {
                        source,
                        exit_code: None,
                        success: false,
                    }
                }
            };
            tracing::debug!(
                "[{}] Finished extracting {} into {}",
                self.id(),
                outcome.source.display(),
                staged[index].staging.path().display()
            );
            outcomes[index] = Some(outcome);

            let done = total - remaining.len();
            let message = if remaining.is_empty() {
                "Extraction complete. Preparing to merge.".to_string()
            } else {
                let names: Vec<String> = remaining
                    .iter()
                    .map(|&i| archive_name(&staged[i].source))
                    .collect();
                format!("Extracting {}", names.join(", "))
            };
            self.channel.emit(ExtractPhase::Extracting.event(
                EventKind::Progress,
                done,
                total,
                message,
            ));
        }

        if let Some(error) = wait_error {
            return Err(error.into());
        }

        let outcomes = outcomes.into_iter().flatten().collect();
        Ok((staged, outcomes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_steps_and_messages() {
        assert_eq!(ExtractPhase::Pending.step(), 0);
        assert_eq!(ExtractPhase::Done.step(), TOTAL_STEPS);
        assert_eq!(ExtractPhase::Merging.step(), 3);
        let event = ExtractPhase::Extracting.event(EventKind::Progress, 1, 3, "x");
        assert_eq!(
            event.progress.step_status_message(),
            "(2 / 4) Extracting Databases"
        );
    }

    #[test]
    fn test_tool_command_line() {
        let tool = ArchiveTool::new("/games/gd/ArchiveTool.exe").with_runner(["wine"]);
        let command = tool.command(Path::new("/db/database.arz"), Path::new("/tmp/out"));
        let std_command = command.as_std();
        assert_eq!(std_command.get_program(), "wine");
        let args: Vec<_> = std_command.get_args().collect();
        assert_eq!(
            args,
            vec![
                "/games/gd/ArchiveTool.exe",
                "/db/database.arz",
                "-database",
                "/tmp/out"
            ]
        );
        assert_eq!(tool.launcher(), PathBuf::from("wine"));
    }

    #[tokio::test]
    async fn test_duplicate_archives_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.arz");
        let task = ExtractionTask::new(
            ArchiveTool::new("ArchiveTool.exe"),
            vec![archive.clone(), archive],
            dir.path().join("out"),
        );
        let err = task.run().await.unwrap_err();
        assert!(matches!(err, ExtractError::DuplicateArchive(_)));
    }

    #[tokio::test]
    async fn test_empty_run_emits_start_and_finish() {
        let dir = tempfile::tempdir().unwrap();
        let mut task = ExtractionTask::new(
            ArchiveTool::new("ArchiveTool.exe"),
            Vec::new(),
            dir.path().join("out"),
        );
        let events = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = events.clone();
        task.subscribe(std::sync::Arc::new(move |e: &TaskEvent| {
            sink.lock().unwrap().push(e.kind)
        }));

        let outcome = task.run().await.unwrap();
        assert!(outcome.archives.is_empty());
        assert!(dir.path().join("out").is_dir());
        assert_eq!(
            *events.lock().unwrap(),
            vec![EventKind::Started, EventKind::Finished]
        );
    }

    #[tokio::test]
    async fn test_second_start_fails() {
        let dir = tempfile::tempdir().unwrap();
        let task = ExtractionTask::new(
            ArchiveTool::new("ArchiveTool.exe"),
            Vec::new(),
            dir.path().join("out"),
        );
        task.run().await.unwrap();
        assert!(task.is_started());
        let err = task.run().await.unwrap_err();
        assert!(matches!(err, ExtractError::AlreadyStarted(id) if id == task.id()));
    }

    #[tokio::test]
    async fn test_destination_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        std::fs::write(&dest, "not a dir").unwrap();
        let archive = dir.path().join("a.arz");
        std::fs::write(&archive, "A").unwrap();

        let task = ExtractionTask::new(ArchiveTool::new("ArchiveTool.exe"), vec![archive], &dest);
        let err = task.run().await.unwrap_err();
        assert!(matches!(err, ExtractError::NotADirectory(p) if p == dest));
    }

    #[tokio::test]
    async fn test_missing_tool_fails_to_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("a.arz");
        std::fs::write(&archive, "A").unwrap();
        let staging = dir.path().join("staging");

        let task = ExtractionTask::new(
            ArchiveTool::new(dir.path().join("missing").join("ArchiveTool.exe")),
            vec![archive],
            dir.path().join("out"),
        )
        .with_staging_root(&staging);
        let err = task.run().await.unwrap_err();
        assert!(matches!(err, ExtractError::Spawn { .. }));
        assert_eq!(std::fs::read_dir(&staging).unwrap().count(), 0);
    }

    #[cfg(unix)]
    mod with_fake_tool {
        use super::*;
        use std::fs;
        use std::sync::{Arc, Mutex};

        const FAKE_TOOL: &str = r#"
[ "$2" = "-database" ] || exit 64
if [ -f "$1.delay" ]; then sleep "$(cat "$1.delay")"; fi
if [ -f "$1.fail" ]; then echo "cannot read $1" >&2; exit 3; fi
mkdir -p "$3/records"
cp "$1" "$3/records/shared.dbr"
cp "$1" "$3/records/$(basename "$1").dbr"
"#;

        struct Fixture {
            dir: tempfile::TempDir,
        }

        impl Fixture {
            fn new() -> Self {
                let dir = tempfile::tempdir().unwrap();
                fs::write(dir.path().join("fake_tool.sh"), FAKE_TOOL).unwrap();
                fs::create_dir(dir.path().join("staging")).unwrap();
                Self { dir }
            }

            fn tool(&self) -> ArchiveTool {
                ArchiveTool::new(self.dir.path().join("fake_tool.sh")).with_runner(["/bin/sh"])
            }

            fn archive(&self, name: &str, content: &str) -> PathBuf {
                let path = self.dir.path().join(name);
                fs::write(&path, content).unwrap();
                path
            }

            fn mark(&self, archive: &Path, suffix: &str, content: &str) {
                let mut marker = archive.as_os_str().to_owned();
                marker.push(suffix);
                fs::write(PathBuf::from(marker), content).unwrap();
            }

            fn dest(&self) -> PathBuf {
                self.dir.path().join("out")
            }

            fn staging(&self) -> PathBuf {
                self.dir.path().join("staging")
            }

            fn task(&self, archives: Vec<PathBuf>) -> (ExtractionTask, Arc<Mutex<Vec<TaskEvent>>>) {
                let mut task = ExtractionTask::new(self.tool(), archives, self.dest())
                    .with_staging_root(self.staging());
                let events = Arc::new(Mutex::new(Vec::new()));
                let sink = events.clone();
                task.subscribe(Arc::new(move |e: &TaskEvent| sink.lock().unwrap().push(e.clone())));
                (task, events)
            }

            fn read(&self, relative: &str) -> String {
                fs::read_to_string(self.dest().join(relative)).unwrap()
            }
        }

        fn count(events: &[TaskEvent], phase: ExtractPhase) -> usize {
            events
                .iter()
                .filter(|e| e.kind == EventKind::Progress && e.progress.step == phase.step())
                .count()
        }

        #[tokio::test]
        async fn test_event_sequence() {
            let fx = Fixture::new();
            fs::create_dir_all(fx.dest().join("old")).unwrap();
            fs::write(fx.dest().join("stale.dbr"), "stale").unwrap();
            let a = fx.archive("a.arz", "A");
            let b = fx.archive("b.arz", "B");

            let (task, events) = fx.task(vec![a, b]);
            let outcome = task.run().await.unwrap();

            let events = events.lock().unwrap();
            assert_eq!(events.len(), 1 + 2 + 2 + 2 + 1);
            assert_eq!(events[0].kind, EventKind::Started);
            assert_eq!(events[0].progress.progress.message, "Extracting a.arz, b.arz");
            assert_eq!(count(&events, ExtractPhase::ClearingDestination), 2);
            assert_eq!(count(&events, ExtractPhase::Extracting), 2);
            assert_eq!(count(&events, ExtractPhase::Merging), 2);

            let last = events.last().unwrap();
            assert_eq!(last.kind, EventKind::Finished);
            assert!(last.progress.is_complete());

            let extracting: Vec<_> = events
                .iter()
                .filter(|e| e.progress.step == ExtractPhase::Extracting.step())
                .collect();
            assert_eq!(extracting[0].progress.progress.current, 1);
            assert_eq!(extracting[1].progress.progress.current, 2);
            assert_eq!(
                extracting[1].progress.progress.message,
                "Extraction complete. Preparing to merge."
            );

            assert_eq!(outcome.cleared, 2);
            assert_eq!(outcome.files_merged, 4);
            assert!(outcome.archives.iter().all(|a| a.success));
            assert!(!fx.dest().join("stale.dbr").exists());
            assert_eq!(fx.read("records/a.arz.dbr"), "A");
            assert_eq!(fx.read("records/b.arz.dbr"), "B");
            assert_eq!(fs::read_dir(fx.staging()).unwrap().count(), 0);
        }

        #[tokio::test]
        async fn test_merge_follows_input_order_not_completion_order() {
            for delayed in ["a.arz", "b.arz"] {
                let fx = Fixture::new();
                let a = fx.archive("a.arz", "A");
                let b = fx.archive("b.arz", "B");
                let slow = if delayed == "a.arz" { &a } else { &b };
                fx.mark(slow, ".delay", "1");

                let (task, _) = fx.task(vec![a.clone(), b.clone()]);
                task.run().await.unwrap();
                assert_eq!(fx.read("records/shared.dbr"), "B", "{} delayed", delayed);
            }
        }

        #[tokio::test]
        async fn test_completion_messages_name_remaining_archives() {
            let fx = Fixture::new();
            let a = fx.archive("a.arz", "A");
            let b = fx.archive("b.arz", "B");
            fx.mark(&b, ".delay", "1");

            let (task, events) = fx.task(vec![a, b]);
            task.run().await.unwrap();

            let events = events.lock().unwrap();
            let first = events
                .iter()
                .find(|e| e.progress.step == ExtractPhase::Extracting.step())
                .unwrap();
            assert_eq!(first.progress.progress.message, "Extracting b.arz");
        }

        #[tokio::test]
        async fn test_strict_mode_fails_without_merging() {
            let fx = Fixture::new();
            let a = fx.archive("a.arz", "A");
            let b = fx.archive("b.arz", "B");
            fx.mark(&b, ".fail", "");

            let (task, events) = fx.task(vec![a, b]);
            let err = task.run().await.unwrap_err();

            match err {
                ExtractError::ToolFailed(names) => assert_eq!(names, vec!["b.arz".to_string()]),
                other => panic!("unexpected error: {other}"),
            }
            assert!(!fx.dest().join("records").exists());
            assert_eq!(fs::read_dir(fx.staging()).unwrap().count(), 0);
            let events = events.lock().unwrap();
            assert_eq!(count(&events, ExtractPhase::Extracting), 2);
            assert_eq!(count(&events, ExtractPhase::Merging), 0);
            assert!(events.iter().all(|e| e.kind != EventKind::Finished));
        }

        #[tokio::test]
        async fn test_permissive_mode_merges_anyway() {
            let fx = Fixture::new();
            let a = fx.archive("a.arz", "A");
            let b = fx.archive("b.arz", "B");
            fx.mark(&b, ".fail", "");

            let (task, _) = fx.task(vec![a, b]);
            let task = task.strict_exit_codes(false);
            let outcome = task.run().await.unwrap();

            let failed: Vec<_> = outcome.failed().collect();
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].exit_code, Some(3));
            assert_eq!(fx.read("records/shared.dbr"), "A");
        }

        #[tokio::test]
        async fn test_hub_receives_run_events() {
            let fx = Fixture::new();
            let a = fx.archive("a.arz", "A");
            let hub = ProgressHub::new(64);
            let mut rx = hub.subscribe();

            let (task, _) = fx.task(vec![a]);
            let task = task.with_hub(hub);
            task.run().await.unwrap();

            let mut received = Vec::new();
            while let Ok((run, event)) = rx.try_recv() {
                assert_eq!(run, task.id());
                received.push(event.kind);
            }
            assert_eq!(received.len(), 4);
            assert_eq!(received.last(), Some(&EventKind::Finished));
        }
    }
}
