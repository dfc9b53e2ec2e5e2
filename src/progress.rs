//! Progress reporting for extraction runs
//!
//! Each run owns a `ProgressChannel` with its own subscriber list. Callers
//! that want every run's events subscribe to a shared `ProgressHub` instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Item-level progress snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub current: usize,
    pub max: usize,
    pub message: String,
}

impl Progress {
    pub fn new(current: usize, max: usize, message: impl Into<String>) -> Self {
        Self {
            current,
            max,
            message: message.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current >= self.max
    }
}

/// Progress within one phase of a multi-phase run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiStepProgress {
    pub progress: Progress,
    pub step: usize,
    pub step_max: usize,
    pub step_message: String,
}

impl MultiStepProgress {
    pub fn new(progress: Progress, step: usize, step_max: usize, step_message: impl Into<String>) -> Self {
        Self {
            progress,
            step,
            step_max,
            step_message: step_message.into(),
        }
    }

    /// e.g. `(2 / 4) Extracting Databases`
    pub fn step_status_message(&self) -> String {
        format!("({} / {}) {}", self.step, self.step_max, self.step_message)
    }

    /// True once both the item count and the outermost step are done
    pub fn is_complete(&self) -> bool {
        self.progress.is_complete() && self.step >= self.step_max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Started,
    Progress,
    Finished,
}

/// Immutable event delivered to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub kind: EventKind,
    pub progress: MultiStepProgress,
}

/// Identifier of one extraction run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback invoked for every event of a run
pub type Subscriber = Arc<dyn Fn(&TaskEvent) + Send + Sync>;

/// Broadcast of every run's events, tagged with the run they belong to
#[derive(Debug, Clone)]
pub struct ProgressHub {
    tx: broadcast::Sender<(RunId, TaskEvent)>,
}

impl ProgressHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(RunId, TaskEvent)> {
        self.tx.subscribe()
    }

    fn publish(&self, run: RunId, event: &TaskEvent) {
        // no receivers is fine
        let _ = self.tx.send((run, event.clone()));
    }
}

impl Default for ProgressHub {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Per-run event channel
#[derive(Clone)]
pub struct ProgressChannel {
    run_id: RunId,
    subscribers: Vec<Subscriber>,
    hub: Option<ProgressHub>,
}

impl fmt::Debug for ProgressChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressChannel")
            .field("run_id", &self.run_id)
            .field("subscribers", &self.subscribers.len())
            .field("hub", &self.hub.is_some())
            .finish()
    }
}

impl ProgressChannel {
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            subscribers: Vec::new(),
            hub: None,
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn with_hub(mut self, hub: ProgressHub) -> Self {
        self.hub = Some(hub);
        self
    }

    pub fn subscribe(&mut self, subscriber: Subscriber) {
        self.subscribers.push(subscriber);
    }

    /// Deliver an event to every subscriber, in registration order
    pub fn emit(&self, event: TaskEvent) {
        tracing::trace!(
            "[{}] {:?} {}/{} {}: {}",
            self.run_id,
            event.kind,
            event.progress.progress.current,
            event.progress.progress.max,
            event.progress.step_status_message(),
            event.progress.progress.message
        );
        for subscriber in &self.subscribers {
            subscriber(&event);
        }
        if let Some(hub) = &self.hub {
            hub.publish(self.run_id, &event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn event(current: usize) -> TaskEvent {
        TaskEvent {
            kind: EventKind::Progress,
            progress: MultiStepProgress::new(Progress::new(current, 3, "working"), 2, 4, "Extracting Databases"),
        }
    }

    #[test]
    fn test_step_status_message() {
        let progress = MultiStepProgress::new(Progress::new(1, 2, "x"), 2, 4, "Extracting Databases");
        assert_eq!(progress.step_status_message(), "(2 / 4) Extracting Databases");
        assert!(!progress.is_complete());
        let done = MultiStepProgress::new(Progress::new(1, 1, ""), 4, 4, "Done!");
        assert!(done.is_complete());
    }

    #[test]
    fn test_subscribers_see_events_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut channel = ProgressChannel::new(RunId::new());
        for tag in ["a", "b"] {
            let seen = seen.clone();
            channel.subscribe(Arc::new(move |e: &TaskEvent| {
                seen.lock().unwrap().push((tag, e.progress.progress.current));
            }));
        }
        channel.emit(event(1));
        channel.emit(event(2));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![("a", 1), ("b", 1), ("a", 2), ("b", 2)]
        );
    }

    #[tokio::test]
    async fn test_hub_tags_events_with_run_id() {
        let hub = ProgressHub::default();
        let mut rx = hub.subscribe();
        let first = ProgressChannel::new(RunId::new()).with_hub(hub.clone());
        let second = ProgressChannel::new(RunId::new()).with_hub(hub.clone());
        let unhubbed = ProgressChannel::new(RunId::new());

        first.emit(event(1));
        unhubbed.emit(event(5));
        second.emit(event(2));

        let (run, e) = rx.recv().await.unwrap();
        assert_eq!(run, first.run_id());
        assert_eq!(e.progress.progress.current, 1);
        let (run, e) = rx.recv().await.unwrap();
        assert_eq!(run, second.run_id());
        assert_eq!(e.progress.progress.current, 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
