#[macro_use]
extern crate tracing;

pub mod history;
pub mod history_file;
pub mod record;
pub mod registry;
pub mod source;
pub mod worker;

pub use history::HistoryStore;
pub use history_file::HistoryFile;
pub use record::MetricRecord;
pub use registry::{
    Registry,
    WorkerStatus,
};
pub use source::{
    RedditSource,
    RemoteMetricSource,
};
pub use worker::{
    PollWorker,
    WorkerContext,
    WorkerSettings,
};
