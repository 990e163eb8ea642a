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

//! Time points accepted by the read path and their calendar-day truncation

use crate::error::{Result, TraceStackError};
use chrono::{FixedOffset, NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

/// A point in time as supplied by callers.
///
/// The UI hands over "time buckets" (`yyyyMMdd[HH[mm[ss]]]` packed into a
/// number), while direct trace lookups carry epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePoint {
    EpochMillis(i64),
    Bucket(u64),
}

impl TimePoint {
    /// Truncate to a calendar day in `zone`.
    pub fn to_day(&self, zone: &FixedOffset) -> Result<NaiveDate> {
        match *self {
            TimePoint::EpochMillis(ms) => zone
                .timestamp_millis_opt(ms)
                .single()
                .map(|dt| dt.date_naive())
                .ok_or_else(|| {
                    TraceStackError::InvalidTimeRange(format!(
                        "epoch millis {} out of range",
                        ms
                    ))
                }),
            TimePoint::Bucket(bucket) => {
                let digits = bucket.to_string();
                let day = digits.get(..8).ok_or_else(|| {
                    TraceStackError::InvalidTimeRange(format!(
                        "time bucket {} has fewer than 8 digits",
                        bucket
                    ))
                })?;
                NaiveDate::parse_from_str(day, "%Y%m%d").map_err(|e| {
                    TraceStackError::InvalidTimeRange(format!(
                        "time bucket {} is not a date: {}",
                        bucket, e
                    ))
                })
            }
        }
    }
}

/// Inclusive time range for a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: TimePoint,
    pub end: TimePoint,
}

impl TimeRange {
    pub fn new(start: TimePoint, end: TimePoint) -> Self {
        Self { start, end }
    }

    pub fn buckets(start: u64, end: u64) -> Self {
        Self::new(TimePoint::Bucket(start), TimePoint::Bucket(end))
    }

    pub fn millis(start: i64, end: i64) -> Self {
        Self::new(TimePoint::EpochMillis(start), TimePoint::EpochMillis(end))
    }

    /// A range covering only the instant `ms`
    pub fn at_millis(ms: i64) -> Self {
        Self::millis(ms, ms)
    }
}

/// Build a fixed offset from seconds east of UTC.
pub fn utc_offset(secs: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(secs)
        .ok_or_else(|| TraceStackError::Config(format!("UTC offset {}s out of range", secs)))
}
