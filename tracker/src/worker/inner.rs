use super::{
    WorkerContext,
    WorkerSeed,
};
use crate::{
    history::HistoryStore,
    history_file::{
        HistoryFile,
        HistoryFileError,
    },
    record::MetricRecord,
    source::parse_about_reply,
    worker::state::{
        FaultKind,
        FaultState,
        WorkerPhase,
        WorkerSnapshot,
    },
};
use chrono::{
    NaiveDate,
    Utc,
};
use std::{
    sync::Arc,
    time::Duration,
};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub(super) enum CycleError {
    #[error("fetching metrics failed: {0:#}")]
    Transport(eyre::Report),
    #[error("reply is not a JSON object: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    Persistence(#[from] HistoryFileError),
    #[error("history writer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl CycleError {
    fn kind(&self) -> FaultKind {
        match self {
            CycleError::Transport(_) => FaultKind::Transport,
            CycleError::Payload(_) => FaultKind::Payload,
            CycleError::Persistence(_) => FaultKind::Persistence,
            CycleError::Task(_) => FaultKind::Internal,
        }
    }
}

/// State owned by the polling task of one subreddit.
pub(super) struct PollLoop {
    name: String,
    subscribers: i64,
    active_users: i64,
    history: Arc<HistoryStore>,
    history_file: HistoryFile,
    context: WorkerContext,
    last_persisted: NaiveDate,
    fault: FaultState,
    cycles: u64,
    rotations: u64,
    state_sender: watch::Sender<WorkerSnapshot>,
}

impl PollLoop {
    pub(super) fn new(
        name: String,
        seed: WorkerSeed,
        history_file: HistoryFile,
        context: WorkerContext,
    ) -> (Self, watch::Receiver<WorkerSnapshot>) {
        let history = Arc::new(seed.history);
        let record = MetricRecord {
            subscribers: seed.subscribers,
            ..MetricRecord::new(name.clone())
        }
        .with_history(Arc::clone(&history));
        let (state_sender, state_receiver) = watch::channel(WorkerSnapshot::new(record));
        let last_persisted = context.calendar.today();

        let poll_loop = Self {
            name,
            subscribers: seed.subscribers,
            active_users: crate::record::SENTINEL,
            history,
            history_file,
            context,
            last_persisted,
            fault: FaultState::default(),
            cycles: 0,
            rotations: 0,
            state_sender,
        };
        (poll_loop, state_receiver)
    }

    /// Polls until `cancellation` fires. The first cycle starts right away and a
    /// running cycle is always finished; only the pause between cycles is cut short.
    pub(super) async fn run(mut self, interval: Duration, cancellation: CancellationToken) {
        info!(name = %self.name, ?interval, "Started polling");

        loop {
            self.cycle().await;
            if cancellation.is_cancelled() {
                break;
            }

            tokio::select! {
                biased;
                _ = cancellation.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        self.publish(WorkerPhase::ShuttingDown);
        info!(name = %self.name, cycles = self.cycles, faults = self.fault.count, "Stopped polling");
        self.publish(WorkerPhase::Stopped);
    }

    pub(super) async fn cycle(&mut self) {
        let phase = match self.poll().await {
            Ok(()) => WorkerPhase::Running,
            Err(err) => {
                warn!(name = %self.name, kind = %err.kind(), "Poll cycle failed: {err}");
                self.fault.record(err.kind(), err.to_string(), Utc::now());
                WorkerPhase::Faulted
            }
        };
        self.cycles += 1;
        self.publish(phase);
    }

    async fn poll(&mut self) -> Result<(), CycleError> {
        let reply = self
            .context
            .source
            .fetch(&self.name)
            .await
            .map_err(CycleError::Transport)?;
        if !reply.is_success() {
            warn!(name = %self.name, status = reply.status, body = %reply.body, "Remote API answered with an error status");
        }

        let counts = parse_about_reply(&reply.body)?;
        self.subscribers = counts.subscribers;
        self.active_users = counts.active_users;

        let today = self.context.calendar.today();
        Arc::make_mut(&mut self.history).upsert(today, counts.subscribers);
        info!(
            name = %self.name,
            subscribers = counts.subscribers,
            active_users = counts.active_users,
            "Refreshed"
        );

        if today != self.last_persisted {
            // one attempt per day change, a failed write is retried on the next one
            self.last_persisted = today;
            self.rotations += 1;
            info!(name = %self.name, path = ?self.history_file.path(), "Date changed, rotating history file");

            let history_file = self.history_file.clone();
            let history = Arc::clone(&self.history);
            tokio::task::spawn_blocking(move || history_file.save(&history)).await??;
        }

        Ok(())
    }

    fn publish(&self, phase: WorkerPhase) {
        let record = MetricRecord {
            name: self.name.clone(),
            subscribers: self.subscribers,
            active_users: self.active_users,
            history: Some(Arc::clone(&self.history)),
        };
        self.state_sender.send_replace(WorkerSnapshot {
            record,
            phase,
            fault: self.fault.clone(),
            cycles: self.cycles,
            rotations: self.rotations,
        });
    }
}
