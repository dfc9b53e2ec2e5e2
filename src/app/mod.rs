//! Application state and orchestration

mod actions;

use crate::checker::ModDataChecker;
use crate::config::Config;
use crate::game::GameLayout;
use crate::lifecycle::{ExtractSettings, ModLifecycle};
use crate::progress::{EventKind, ProgressHub, Subscriber, TaskEvent};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Main application struct that orchestrates all components
pub struct App {
    /// Application configuration
    pub config: Arc<RwLock<Config>>,

    /// Progress of every extraction run started by this process
    pub hub: ProgressHub,

    /// Mod tree validator
    pub checker: ModDataChecker,
}

impl App {
    /// Create a new App instance
    pub async fn new(config: Config) -> Result<Self> {
        config.ensure_dirs().context("Failed to create directories")?;
        let hub = ProgressHub::new(config.extraction.progress_buffer.max(1));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            hub,
            checker: ModDataChecker::new(),
        })
    }

    pub async fn layout(&self) -> Result<GameLayout> {
        self.config.read().await.game_layout()
    }

    pub async fn extract_settings(&self, tool_override: Option<&str>) -> Result<ExtractSettings> {
        self.config
            .read()
            .await
            .extract_settings(tool_override, Some(self.hub.clone()))
    }

    pub async fn lifecycle(&self) -> Result<ModLifecycle> {
        let layout = self.layout().await?;
        let settings = self.extract_settings(None).await?;
        Ok(ModLifecycle::new(layout, settings))
    }

    /// Log every event published on the hub until it is closed
    pub fn spawn_hub_logger(&self) -> tokio::task::JoinHandle<()> {
        let mut rx = self.hub.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok((run, event)) => tracing::debug!(
                        "[{}] {} {}/{} {}",
                        run,
                        event.progress.step_status_message(),
                        event.progress.progress.current,
                        event.progress.progress.max,
                        event.progress.progress.message
                    ),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Progress logger skipped {} events", skipped)
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Terminal progress bar for one extraction run
pub(crate) fn extraction_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix} [{bar:40.cyan/blue}] {pos}/{len} | {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("=>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    Ok(bar)
}

/// Subscriber that mirrors run events onto a progress bar
pub(crate) fn bar_subscriber(bar: ProgressBar) -> Subscriber {
    Arc::new(move |event: &TaskEvent| {
        let progress = &event.progress;
        bar.set_length(progress.progress.max as u64);
        bar.set_position(progress.progress.current as u64);
        bar.set_prefix(progress.step_status_message());
        bar.set_message(progress.progress.message.clone());
        if event.kind == EventKind::Finished {
            bar.finish_with_message(progress.step_message.clone());
        }
    })
}
