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

//! Identifier schemes shared by the read path and the writers
//!
//! These formats are persisted by existing producers, so they are fixed:
//! - Segment-span id: `<segment_id>S<span_id>`
//! - Partition name: `<table>_<yyyyMMdd>`
//! - Multi-part segment id: parts joined by `.`
//! - Query trace id: `<global_trace_id>_<timestamp_ms>[_...]`

use crate::error::{Result, TraceStackError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between a segment id and a span id
pub const SEGMENT_SPAN_SPLIT: &str = "S";

/// Separator used in partition names and query trace ids
pub const ID_SPLIT: &str = "_";

/// Separator between the parts of a [`UniqueId`]
pub const UNIQUE_ID_SPLIT: &str = ".";

/// Build the globally unique id of a span: `segment_id + "S" + span_id`.
pub fn segment_span_id(segment_id: &str, span_id: i32) -> String {
    format!("{}{}{}", segment_id, SEGMENT_SPAN_SPLIT, span_id)
}

/// Multi-part identifier carried by cross-segment references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct UniqueId {
    pub id_parts: Vec<i64>,
}

impl UniqueId {
    pub fn new(id_parts: Vec<i64>) -> Self {
        Self { id_parts }
    }

    /// Render as a segment id. Returns `None` when there are no parts.
    pub fn to_segment_id(&self) -> Option<String> {
        if self.id_parts.is_empty() {
            return None;
        }
        let parts: Vec<String> = self.id_parts.iter().map(|p| p.to_string()).collect();
        Some(parts.join(UNIQUE_ID_SPLIT))
    }
}

impl FromStr for UniqueId {
    type Err = TraceStackError;

    fn from_str(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(TraceStackError::InvalidTraceId(
                "empty multi-part identifier".into(),
            ));
        }
        let id_parts = s
            .split(UNIQUE_ID_SPLIT)
            .map(|part| {
                part.parse::<i64>().map_err(|_| {
                    TraceStackError::InvalidTraceId(format!("bad id part {:?} in {:?}", part, s))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { id_parts })
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_segment_id().unwrap_or_default())
    }
}

/// A trace id as handed to the query layer by the UI.
///
/// The first `_`-separated component is the global trace id stored in the
/// index; the second, when present and numeric, is the epoch millisecond
/// timestamp the trace was started at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceIdentifier {
    pub global_trace_id: String,
    pub timestamp_ms: Option<i64>,
}

impl TraceIdentifier {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let mut parts = raw.split(ID_SPLIT);
        let global_trace_id = match parts.next() {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => return Err(TraceStackError::InvalidTraceId(format!("{:?}", raw))),
        };

        // Only needed when the caller gives no range, so a bad value is not
        // an error here.
        let timestamp_ms = parts.next().and_then(|ts| ts.parse::<i64>().ok());

        Ok(Self {
            global_trace_id,
            timestamp_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_segment_span_id() {
        assert_eq!(segment_span_id("1.2.3", 0), "1.2.3S0");
        assert_eq!(segment_span_id("seg", -1), "segS-1");
    }

    #[test]
    fn test_unique_id_rendering() {
        let id = UniqueId::new(vec![2, 1_527_000_000_000, 7]);
        assert_eq!(id.to_segment_id().as_deref(), Some("2.1527000000000.7"));
        assert_eq!(UniqueId::default().to_segment_id(), None);
    }

    #[test]
    fn test_unique_id_rejects_garbage() {
        assert!("".parse::<UniqueId>().is_err());
        assert!("1..2".parse::<UniqueId>().is_err());
        assert!("1.a".parse::<UniqueId>().is_err());
    }

    #[test]
    fn test_trace_identifier_parse() {
        let id = TraceIdentifier::parse("3.4.5_1527000000000_0").unwrap();
        assert_eq!(id.global_trace_id, "3.4.5");
        assert_eq!(id.timestamp_ms, Some(1_527_000_000_000));

        let bare = TraceIdentifier::parse("3.4.5").unwrap();
        assert_eq!(bare.timestamp_ms, None);
    }

    #[test]
    fn test_trace_identifier_invalid() {
        assert!(TraceIdentifier::parse("").is_err());
        let err = TraceIdentifier::parse("_123").unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_unusable_timestamp_is_absent() {
        let id = TraceIdentifier::parse("abc_notatime").unwrap();
        assert_eq!(id.global_trace_id, "abc");
        assert_eq!(id.timestamp_ms, None);

        let id = TraceIdentifier::parse("abc_").unwrap();
        assert_eq!(id.timestamp_ms, None);
    }

    proptest! {
        #[test]
        fn unique_id_parts_survive_rendering(parts in prop::collection::vec(any::<i64>(), 1..6)) {
            let rendered = UniqueId::new(parts.clone()).to_segment_id().unwrap();
            let parsed: UniqueId = rendered.parse().unwrap();
            prop_assert_eq!(parsed.id_parts, parts);
        }
    }
}
