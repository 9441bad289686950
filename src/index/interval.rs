use chrono::{Duration, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Granularity of time-sliced partitions. `None` means the dashboard reads
/// one fixed partition.
#[derive(
    Debug,
    Copy,
    Clone,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Interval {
    #[default]
    None,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

impl Interval {
    pub fn is_time_based(&self) -> bool {
        !matches!(self, Interval::None)
    }

    /// `instant` advanced by one interval; `None` for [`Interval::None`] or on
    /// overflow. Months and years clamp to the end of shorter months.
    pub fn step(&self, instant: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Interval::None => None,
            Interval::Hour => instant.checked_add_signed(Duration::hours(1)),
            Interval::Day => instant.checked_add_signed(Duration::days(1)),
            Interval::Week => instant.checked_add_signed(Duration::weeks(1)),
            Interval::Month => instant.checked_add_months(Months::new(1)),
            Interval::Year => instant.checked_add_months(Months::new(12)),
        }
    }
}
