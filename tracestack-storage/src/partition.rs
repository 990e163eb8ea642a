// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Day-sharded partition resolution
//!
//! Writers shard every table by calendar day, so a query over a time range
//! has to visit one physical partition per day: `<table>_<yyyyMMdd>`.

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use tracestack_core::{utc_offset, Result, TimeRange, TraceStackError, ID_SPLIT};

const PARTITION_DATE_FORMAT: &str = "%Y%m%d";

/// Default upper bound on the days one range may cover
pub const DEFAULT_MAX_RANGE_DAYS: usize = 366;

/// Ordered partition names, earliest day first
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartitionSet(Vec<String>);

impl PartitionSet {
    pub fn new(names: Vec<String>) -> Self {
        Self(names)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Name of the partition holding `table` rows for `day`
pub fn partition_name(table: &str, day: NaiveDate) -> String {
    format!("{}{}{}", table, ID_SPLIT, day.format(PARTITION_DATE_FORMAT))
}

/// Maps time ranges onto partition names.
///
/// The zone is fixed at construction and must match the one the writers
/// used to pick a partition.
#[derive(Debug, Clone, Copy)]
pub struct PartitionResolver {
    zone: FixedOffset,
    max_days: usize,
}

impl Default for PartitionResolver {
    fn default() -> Self {
        Self::utc()
    }
}

impl PartitionResolver {
    pub fn new(zone: FixedOffset) -> Self {
        Self {
            zone,
            max_days: DEFAULT_MAX_RANGE_DAYS,
        }
    }

    pub fn utc() -> Self {
        Self::new(Utc.fix())
    }

    /// Reject ranges covering more than `max_days` days
    pub fn with_max_days(mut self, max_days: usize) -> Self {
        self.max_days = max_days.max(1);
        self
    }

    pub fn with_offset_secs(secs: i32) -> Result<Self> {
        Ok(Self::new(utc_offset(secs)?))
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// Partitions of `table` covering `range`, both end days inclusive.
    ///
    /// An end before the start collapses to the end day alone. A range
    /// wider than the configured maximum is `InvalidTimeRange`.
    pub fn resolve(&self, table: &str, range: &TimeRange) -> Result<PartitionSet> {
        let start = range.start.to_day(&self.zone)?;
        let end = range.end.to_day(&self.zone)?;
        let days = (end - start).num_days() + 1;
        if days > self.max_days as i64 {
            return Err(TraceStackError::InvalidTimeRange(format!(
                "{} to {} spans {} days, more than the {} allowed",
                start, end, days, self.max_days
            )));
        }
        let set = Self::for_days(table, start, end);
        tracing::debug!(table, %start, %end, partitions = set.len(), "Resolved partitions");
        Ok(set)
    }

    pub fn for_days(table: &str, start: NaiveDate, end: NaiveDate) -> PartitionSet {
        if end < start {
            return PartitionSet(vec![partition_name(table, end)]);
        }

        let days = (end - start).num_days() as usize + 1;
        let names = start
            .iter_days()
            .take(days)
            .map(|day| partition_name(table, day))
            .collect();
        PartitionSet(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tracestack_core::TimePoint;

    #[test]
    fn test_single_day() {
        let set = PartitionResolver::utc()
            .resolve("segment", &TimeRange::buckets(20180315000000, 20180315235959))
            .unwrap();
        assert_eq!(set.names(), &["segment_20180315".to_string()]);
    }

    #[test]
    fn test_range_crosses_month() {
        let set = PartitionResolver::utc()
            .resolve("global_trace", &TimeRange::buckets(20180228100000, 20180302000000))
            .unwrap();
        assert_eq!(
            set.names(),
            &[
                "global_trace_20180228".to_string(),
                "global_trace_20180301".to_string(),
                "global_trace_20180302".to_string(),
            ]
        );
    }

    #[test]
    fn test_inverted_range_clamps_to_end_day() {
        let set = PartitionResolver::utc()
            .resolve("segment", &TimeRange::buckets(20180320000000, 20180315000000))
            .unwrap();
        assert_eq!(set.names(), &["segment_20180315".to_string()]);
    }

    #[test]
    fn test_invalid_bucket_is_an_error() {
        let err = PartitionResolver::utc()
            .resolve("segment", &TimeRange::buckets(20180315000000, 20181399000000))
            .unwrap_err();
        assert!(matches!(err, TraceStackError::InvalidTimeRange(_)));
    }

    #[test]
    fn test_millis_use_resolver_zone() {
        // 2018-03-15T20:00:00Z is already the 16th at UTC+8
        let range = TimeRange::at_millis(1_521_144_000_000);
        let utc = PartitionResolver::utc().resolve("segment", &range).unwrap();
        assert_eq!(utc.names(), &["segment_20180315".to_string()]);

        let cst = PartitionResolver::with_offset_secs(8 * 3600)
            .unwrap()
            .resolve("segment", &range)
            .unwrap();
        assert_eq!(cst.names(), &["segment_20180316".to_string()]);
    }

    #[test]
    fn test_mixed_time_points() {
        let range = TimeRange::new(
            TimePoint::Bucket(20180314),
            TimePoint::EpochMillis(1_521_144_000_000),
        );
        let set = PartitionResolver::utc().resolve("t", &range).unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.contains("t_20180314"));
        assert!(set.contains("t_20180315"));
    }

    #[test]
    fn test_range_wider_than_maximum() {
        let resolver = PartitionResolver::utc().with_max_days(31);
        let ok = resolver
            .resolve("segment", &TimeRange::buckets(20180301000000, 20180331235959))
            .unwrap();
        assert_eq!(ok.len(), 31);

        let err = resolver
            .resolve("segment", &TimeRange::buckets(20180301000000, 20180401000000))
            .unwrap_err();
        assert!(matches!(err, TraceStackError::InvalidTimeRange(_)));

        let err = PartitionResolver::utc()
            .resolve("segment", &TimeRange::buckets(10000101, 99991231))
            .unwrap_err();
        assert!(matches!(err, TraceStackError::InvalidTimeRange(_)));
    }

    proptest! {
        #[test]
        fn partition_count_matches_day_span(start in 0i64..20_000, span in 0i64..400) {
            let base = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
            let start_day = base + chrono::Duration::days(start);
            let end_day = start_day + chrono::Duration::days(span);

            let set = PartitionResolver::for_days("seg", start_day, end_day);
            prop_assert_eq!(set.len() as i64, span + 1);
            prop_assert_eq!(set.names()[0].clone(), partition_name("seg", start_day));
            prop_assert_eq!(set.names()[set.len() - 1].clone(), partition_name("seg", end_day));

            let mut sorted = set.names().to_vec();
            sorted.sort();
            prop_assert_eq!(sorted, set.names().to_vec());
        }

        #[test]
        fn inverted_days_yield_end_day(start in 1i64..20_000, back in 1i64..400) {
            let base = NaiveDate::from_ymd_opt(1990, 1, 1).unwrap();
            let start_day = base + chrono::Duration::days(start + 400);
            let end_day = start_day - chrono::Duration::days(back);

            let set = PartitionResolver::for_days("seg", start_day, end_day);
            prop_assert_eq!(set.names(), &[partition_name("seg", end_day)]);
        }
    }
}
