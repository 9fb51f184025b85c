use crate::history::HistoryStore;
use serde::{
    Serialize,
    Serializer,
};
use std::sync::Arc;

/// Count reported while a value is not known yet or could not be determined.
pub const SENTINEL: i64 = -1;

/// Name used for the record handed out when a subreddit is not tracked.
pub const NO_DATA: &str = "No Data";

/// Point-in-time view of one tracked subreddit.
///
/// Records are only ever handed out as copies of the value a worker last published,
/// the history is shared through an `Arc` and never mutated once published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub name: String,
    pub subscribers: i64,
    pub active_users: i64,
    /// Serialized as an empty object when absent, clients always find the key.
    #[serde(rename = "subscriberHistory", serialize_with = "serialize_history")]
    pub history: Option<Arc<HistoryStore>>,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subscribers: SENTINEL,
            active_users: SENTINEL,
            history: None,
        }
    }

    /// The record returned for names nobody tracks.
    pub fn no_data() -> Self {
        Self::new(NO_DATA)
    }

    pub fn with_history(mut self, history: Arc<HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    /// Same counts, history dropped.
    pub fn without_history(&self) -> Self {
        Self {
            name: self.name.clone(),
            subscribers: self.subscribers,
            active_users: self.active_users,
            history: None,
        }
    }

    pub fn subscribers(&self) -> Option<i64> {
        known(self.subscribers)
    }

    pub fn active_users(&self) -> Option<i64> {
        known(self.active_users)
    }

    pub fn history_len(&self) -> usize {
        self.history.as_ref().map_or(0, |history| history.len())
    }
}

fn serialize_history<S: Serializer>(history: &Option<Arc<HistoryStore>>, serializer: S) -> Result<S::Ok, S::Error> {
    match history {
        Some(history) => HistoryStore::serialize(history, serializer),
        None => serializer.collect_map(std::iter::empty::<(String, i64)>()),
    }
}

fn known(value: i64) -> Option<i64> {
    (value != SENTINEL).then_some(value)
}
