use crate::{
    history_file::HistoryFile,
    record::MetricRecord,
    worker::{
        FaultState,
        PollWorker,
        WorkerContext,
        WorkerPhase,
        WorkerSeed,
    },
};
use eyre::{
    Context as _,
    Result,
};
use serde::Serialize;
use std::{
    collections::{
        BTreeSet,
        HashMap,
    },
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        PoisonError,
        RwLock,
        RwLockReadGuard,
        RwLockWriteGuard,
    },
};

/// Read-only view of one worker for the status page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub key: String,
    pub name: String,
    pub subscribers: i64,
    pub active_users: i64,
    pub history_len: usize,
    pub phase: WorkerPhase,
    pub cycles: u64,
    pub rotations: u64,
    pub fault: FaultState,
    pub history_file: PathBuf,
}

/// All tracked subreddits, keyed by lower-cased name.
///
/// Entries are added while the service starts and never removed afterwards. Readers
/// only ever get copies of what the workers published.
#[derive(Debug, Clone)]
pub struct Registry {
    context: WorkerContext,
    inner: Arc<RwLock<HashMap<String, PollWorker>>>,
}

impl Registry {
    pub fn new(context: WorkerContext) -> Self {
        Self {
            context,
            inner: Default::default(),
        }
    }

    /// Starts a worker for every `r-<name>-subscribers.txt` in `history_dir` whose
    /// key is not tracked yet, seeded from that file. A file that only survives as its
    /// `.bak` counts too and is restored on load. Returns the number of workers started.
    pub fn discover(&self, history_dir: impl AsRef<Path>) -> Result<usize> {
        let history_dir = history_dir.as_ref();
        info!(dir = ?history_dir, "Detecting subreddit history files");

        let file_names = std::fs::read_dir(history_dir)
            .wrap_err_with(|| format!("Failed to read history directory {history_dir:?}"))?
            .filter_map(|entry| match entry {
                Ok(entry) => {
                    let file_name = entry.file_name().to_string_lossy().into_owned();
                    Some(HistoryFile::live_file_name(&file_name).to_string())
                }
                Err(err) => {
                    warn!(dir = ?history_dir, "Skipping unreadable directory entry: {err}");
                    None
                }
            })
            .collect::<BTreeSet<_>>();

        let mut started = 0;
        for file_name in file_names {
            let Some(name) = HistoryFile::subreddit_from_file_name(&file_name) else {
                trace!(%file_name, "Not a history file");
                continue;
            };
            let history_file = HistoryFile::new(history_dir.join(&file_name));
            if self.start(name, history_file) {
                started += 1;
            }
        }

        info!(started, tracked = self.len(), "History discovery finished");
        Ok(started)
    }

    /// Tracks `name` even without a history file; its file is created in `history_dir`
    /// on the first rotation. Returns `false` if the name was already tracked.
    pub fn track(&self, name: &str, history_dir: impl AsRef<Path>) -> bool {
        let history_file = HistoryFile::for_subreddit(history_dir, name);
        self.start(name, history_file)
    }

    fn start(&self, name: &str, history_file: HistoryFile) -> bool {
        let key = name.to_lowercase();
        let mut workers = self.write();
        if let Some(existing) = workers.get(&key) {
            info!(%key, existing = %existing.name, file = ?history_file.path(), "Subreddit already tracked, ignoring");
            return false;
        }

        let seed = self.seed_from(&history_file);
        info!(%name, %key, records = seed.history.len(), "Starting worker");
        let worker = PollWorker::spawn(name, seed, history_file, self.context.clone());
        workers.insert(key, worker);
        true
    }

    fn seed_from(&self, history_file: &HistoryFile) -> WorkerSeed {
        let history_max = self.context.settings.history_max;
        if !history_file.exists() {
            return WorkerSeed::empty(history_max);
        }
        match history_file.load(history_max) {
            Ok(loaded) => {
                info!(file = ?history_file.path(), records = loaded.records_read, "History records loaded");
                loaded.into()
            }
            Err(err) => {
                error!(file = ?history_file.path(), "Unable to load history, starting empty: {err}");
                WorkerSeed::empty(history_max)
            }
        }
    }

    /// Copy of the current record of `key`, history included. Case-insensitive.
    pub fn lookup(&self, key: &str) -> Option<MetricRecord> {
        self.read().get(&key.to_lowercase()).map(PollWorker::record)
    }

    pub fn get(&self, key: &str) -> Option<PollWorker> {
        self.read().get(&key.to_lowercase()).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys = self.read().keys().cloned().collect::<Vec<_>>();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// One entry per worker, sorted by key.
    pub fn status(&self) -> Vec<WorkerStatus> {
        let mut status = self
            .read()
            .iter()
            .map(|(key, worker)| {
                let snapshot = worker.snapshot();
                WorkerStatus {
                    key: key.clone(),
                    name: worker.name.clone(),
                    subscribers: snapshot.record.subscribers,
                    active_users: snapshot.record.active_users,
                    history_len: snapshot.record.history_len(),
                    phase: worker.phase(),
                    cycles: snapshot.cycles,
                    rotations: snapshot.rotations,
                    fault: snapshot.fault,
                    history_file: worker.history_file().absolute_path(),
                }
            })
            .collect::<Vec<_>>();
        status.sort_by(|a, b| a.key.cmp(&b.key));
        status
    }

    /// Signals every worker to stop and returns without waiting for them.
    pub fn shutdown_all(&self) {
        let workers = self.read();
        info!(count = workers.len(), "Shutting down all workers");
        for worker in workers.values() {
            worker.shutdown();
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, PollWorker>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, PollWorker>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
