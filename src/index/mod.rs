//! Time-bucketed index expansion
//!
//! Maps a time window and an [`Interval`] onto the partition names that may
//! hold data for it, keeping only the names the [`PartitionCatalog`] reports
//! as existing.

pub mod catalog;
pub mod interval;
pub mod pattern;

pub use catalog::{ElasticCatalog, PartitionCatalog};
pub use interval::Interval;
pub use pattern::DatePattern;

use crate::network::HttpError;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    /// The interval does not describe time-sliced partitions.
    #[error("interval '{0}' is not expandable")]
    UnsupportedInterval(Interval),

    #[error("partition catalog unavailable: {0}")]
    Catalog(#[from] HttpError),
}

/// Boundary instants of the window `[start, end]` at `interval` granularity.
///
/// Both ends are taken as UTC wall-clock time. The result holds `start`, every
/// step strictly before `end`, then `end` itself.
pub fn expand<Tz: TimeZone>(
    start: &DateTime<Tz>,
    end: &DateTime<Tz>,
    interval: Interval,
) -> Result<Vec<NaiveDateTime>, IndexError> {
    if !interval.is_time_based() {
        return Err(IndexError::UnsupportedInterval(interval));
    }
    let end = end.naive_utc();
    let mut cursor = start.naive_utc();
    let mut range = Vec::new();
    while cursor < end {
        range.push(cursor);
        match interval.step(cursor) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    range.push(end);
    Ok(range)
}

/// Resolves time windows into existing partition names.
#[derive(Clone)]
pub struct IndexExpander {
    catalog: Arc<dyn PartitionCatalog>,
}

impl IndexExpander {
    pub fn new(catalog: Arc<dyn PartitionCatalog>) -> Self {
        Self { catalog }
    }

    /// Existing partitions for the window, newest first.
    pub async fn resolve(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        pattern: &str,
        interval: Interval,
    ) -> Result<Vec<String>, IndexError> {
        let pattern = DatePattern::parse(pattern);
        let possible: Vec<String> = expand(&from, &to, interval)?
            .iter()
            .map(|instant| pattern.format(instant))
            .collect();

        let existing: HashSet<String> = self.catalog.list_partitions().await?.into_iter().collect();
        log::debug!(
            "{} candidate partition(s), {} known to the catalog",
            possible.len(),
            existing.len()
        );

        let mut seen = HashSet::new();
        let mut partitions: Vec<String> = possible
            .into_iter()
            .filter(|name| existing.contains(name) && seen.insert(name.clone()))
            .collect();
        partitions.reverse();
        Ok(partitions)
    }
}
