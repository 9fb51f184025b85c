use crate::{
    history::HistoryStore,
    history_file::{
        HistoryFile,
        LoadedHistory,
    },
    record::{
        MetricRecord,
        SENTINEL,
    },
    source::RemoteMetricSource,
};
use chrono::Utc;
use std::{
    sync::Arc,
    time::Duration,
};
use subreddit_stats_config::Config;
use tokio::sync::watch;
use tokio_util::sync::{
    CancellationToken,
    DropGuard,
};

mod calendar;
mod inner;
mod state;

pub use calendar::{
    Calendar,
    LocalCalendar,
};
use inner::PollLoop;
pub use state::{
    Fault,
    FaultKind,
    FaultState,
    WorkerPhase,
    WorkerSnapshot,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSettings {
    pub refresh_interval: Duration,
    pub history_max: usize,
}

impl From<&Config> for WorkerSettings {
    fn from(config: &Config) -> Self {
        Self {
            refresh_interval: config.refresh_interval(),
            history_max: config.history_max,
        }
    }
}

/// What all workers of a registry share.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub settings: WorkerSettings,
    pub source: Arc<dyn RemoteMetricSource>,
    pub calendar: Arc<dyn Calendar>,
}

impl WorkerContext {
    pub fn new(settings: WorkerSettings, source: Arc<dyn RemoteMetricSource>) -> Self {
        Self {
            settings,
            source,
            calendar: Arc::new(LocalCalendar),
        }
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn Calendar>) -> Self {
        self.calendar = calendar;
        self
    }
}

/// Initial state of a worker, usually read from its history file.
#[derive(Debug, Clone)]
pub struct WorkerSeed {
    pub history: HistoryStore,
    pub subscribers: i64,
}

impl WorkerSeed {
    pub fn empty(history_max: usize) -> Self {
        Self {
            history: HistoryStore::new(history_max),
            subscribers: SENTINEL,
        }
    }
}

impl From<LoadedHistory> for WorkerSeed {
    fn from(loaded: LoadedHistory) -> Self {
        Self {
            history: loaded.history,
            subscribers: loaded.last_subscribers.unwrap_or(SENTINEL),
        }
    }
}

/// Handle of the background task polling one subreddit.
///
/// Clones share the task. Dropping the last clone stops it as if
/// [`PollWorker::shutdown`] had been called.
#[derive(Debug, Clone)]
pub struct PollWorker {
    /// Lower-cased name, used as registry key.
    pub key: String,
    /// Name as found in the history file name or configuration.
    pub name: String,
    pub created: chrono::DateTime<Utc>,
    history_file: HistoryFile,
    snapshot: watch::Receiver<WorkerSnapshot>,
    cancellation: CancellationToken,
    _task_guard: Arc<DropGuard>,
}

impl PartialEq for PollWorker {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl PollWorker {
    /// Starts polling `name` right away. Must be called within a tokio runtime.
    pub fn spawn(name: impl Into<String>, seed: WorkerSeed, history_file: HistoryFile, context: WorkerContext) -> Self {
        let name = name.into();
        let interval = context.settings.refresh_interval;
        let (poll_loop, snapshot) = PollLoop::new(name.clone(), seed, history_file.clone(), context);

        let cancellation = CancellationToken::new();
        let task_guard = cancellation.clone().drop_guard();
        tokio::task::spawn(poll_loop.run(interval, cancellation.clone()));

        Self {
            key: name.to_lowercase(),
            name,
            created: Utc::now(),
            history_file,
            snapshot,
            cancellation,
            _task_guard: Arc::new(task_guard),
        }
    }

    /// Copy of the last published record, including its history.
    pub fn record(&self) -> MetricRecord {
        self.snapshot.borrow().record.clone()
    }

    pub fn snapshot(&self) -> WorkerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn phase(&self) -> WorkerPhase {
        let phase = self.snapshot.borrow().phase;
        if self.cancellation.is_cancelled() && phase != WorkerPhase::Stopped {
            WorkerPhase::ShuttingDown
        } else {
            phase
        }
    }

    pub fn history_file(&self) -> &HistoryFile {
        &self.history_file
    }

    /// Asks the worker to stop after its current cycle. Does not wait.
    pub fn shutdown(&self) {
        if !self.cancellation.is_cancelled() {
            debug!(name = %self.name, "Requesting worker shutdown");
            self.cancellation.cancel();
        }
    }

    /// Resolves once a published snapshot satisfies `f`, or the task is gone.
    pub async fn wait_for(&self, mut f: impl FnMut(&WorkerSnapshot) -> bool) -> WorkerSnapshot {
        let mut receiver = self.snapshot.clone();
        if let Ok(snapshot) = receiver.wait_for(|snapshot| f(snapshot)).await {
            return snapshot.clone();
        }
        let snapshot = receiver.borrow().clone();
        snapshot
    }

    pub async fn stopped(&self) {
        self.wait_for(|snapshot| snapshot.phase == WorkerPhase::Stopped).await;
    }
}
