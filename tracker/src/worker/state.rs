use crate::record::MetricRecord;
use chrono::{
    DateTime,
    Utc,
};
use serde::Serialize;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WorkerPhase {
    /// Last cycle succeeded, or no cycle completed yet.
    #[default]
    Running,
    /// Last cycle failed. The worker keeps polling.
    Faulted,
    /// Shutdown was requested, the in-flight cycle may still be running.
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FaultKind {
    /// Request could not be built, sent or read.
    Transport,
    /// Reply was not the JSON document we expect.
    Payload,
    /// History file could not be written.
    Persistence,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fault {
    pub kind: FaultKind,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Faults seen since the worker started. Never reset while the worker runs.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct FaultState {
    pub count: u64,
    pub last: Option<Fault>,
}

impl FaultState {
    pub fn record(&mut self, kind: FaultKind, message: impl Into<String>, at: DateTime<Utc>) {
        self.count += 1;
        self.last = Some(Fault {
            kind,
            message: message.into(),
            at,
        });
    }
}

/// Everything a worker publishes after each cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub record: MetricRecord,
    pub phase: WorkerPhase,
    pub fault: FaultState,
    /// Completed cycles, successful or not.
    pub cycles: u64,
    /// Attempted history file rotations.
    pub rotations: u64,
}

impl WorkerSnapshot {
    pub fn new(record: MetricRecord) -> Self {
        Self {
            record,
            phase: WorkerPhase::Running,
            fault: FaultState::default(),
            cycles: 0,
            rotations: 0,
        }
    }
}
