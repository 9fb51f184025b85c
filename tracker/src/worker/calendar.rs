use chrono::NaiveDate;
use std::fmt;

/// Source of the date a sample is filed under.
pub trait Calendar: fmt::Debug + Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Dates in the local time zone of the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCalendar;

impl Calendar for LocalCalendar {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}
