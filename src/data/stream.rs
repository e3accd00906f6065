//! Time-ordered match stream
//!
//! The only way into the feature pipeline. Construction checks that records
//! are in non-decreasing (date, match_num) order.

use chrono::NaiveDate;

use crate::{MatchRecord, Result, TennisError};

/// Matches sorted by (date, match_num)
#[derive(Debug, Clone, Default)]
pub struct MatchStream {
    records: Vec<MatchRecord>,
}

impl MatchStream {
    /// Wrap already ordered records; fails on the first out-of-order pair
    pub fn new(records: Vec<MatchRecord>) -> Result<Self> {
        if let Some(index) = records
            .windows(2)
            .position(|w| w[1].order_key() < w[0].order_key())
        {
            return Err(TennisError::OrderingViolation {
                index: index + 1,
                previous: records[index].order_key(),
                current: records[index + 1].order_key(),
            });
        }
        Ok(MatchStream { records })
    }

    /// Stable-sort records into stream order; ties keep their input order
    pub fn from_unsorted(mut records: Vec<MatchRecord>) -> Self {
        records.sort_by_key(|m| m.order_key());
        MatchStream { records }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchRecord> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[MatchRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// First and last match dates
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.records.first()?.date, self.records.last()?.date))
    }

    pub fn into_inner(self) -> Vec<MatchRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a MatchStream {
    type Item = &'a MatchRecord;
    type IntoIter = std::slice::Iter<'a, MatchRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
