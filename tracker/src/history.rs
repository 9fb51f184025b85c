use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Four years of daily samples.
pub const HISTORY_MAX: usize = 365 * 4;

/// Bounded series of daily subscriber samples, ordered by date.
///
/// Inserting a date that is already present overwrites its value. Once the series
/// holds more than `max_len` entries the oldest dates are dropped, so the store
/// always keeps the `max_len` most recent distinct dates it has seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct HistoryStore {
    samples: BTreeMap<NaiveDate, i64>,
    #[serde(skip)]
    max_len: usize,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::new(HISTORY_MAX)
    }
}

impl HistoryStore {
    /// A `max_len` of zero is treated as one; a history that can hold nothing is useless.
    pub fn new(max_len: usize) -> Self {
        Self {
            samples: BTreeMap::new(),
            max_len: max_len.max(1),
        }
    }

    pub fn upsert(&mut self, date: NaiveDate, value: i64) {
        self.samples.insert(date, value);
        while self.samples.len() > self.max_len {
            self.samples.pop_first();
        }
    }

    /// Value of the most recent date in the series.
    pub fn latest(&self) -> Option<i64> {
        self.samples.last_key_value().map(|(_, value)| *value)
    }

    pub fn get(&self, date: &NaiveDate) -> Option<i64> {
        self.samples.get(date).copied()
    }

    /// Ascending `(date, value)` pairs. Every call starts from the oldest entry again.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (NaiveDate, i64)> + ExactSizeIterator + '_ {
        self.into_iter()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.samples.first_key_value().map(|(date, _)| *date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.samples.last_key_value().map(|(date, _)| *date)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl<'a> IntoIterator for &'a HistoryStore {
    type Item = (NaiveDate, i64);
    type IntoIter = std::iter::Map<
        std::collections::btree_map::Iter<'a, NaiveDate, i64>,
        fn((&'a NaiveDate, &'a i64)) -> (NaiveDate, i64),
    >;

    fn into_iter(self) -> Self::IntoIter {
        let copied: fn((&'a NaiveDate, &'a i64)) -> (NaiveDate, i64) = |(date, value)| (*date, *value);
        self.samples.iter().map(copied)
    }
}
