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

//! Resolved spans returned to the UI layer

use crate::ids::segment_span_id;
use crate::segment::RefType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogEntity {
    pub time: i64,
    pub data: Vec<KeyValue>,
}

/// Cross-segment parent link with its segment id already rendered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reference {
    #[serde(rename = "type")]
    pub ref_type: RefType,
    pub trace_id: String,
    pub parent_segment_id: String,
    pub parent_span_id: i32,
}

impl Reference {
    /// Segment-span id of the parent this reference points at
    pub fn parent_segment_span_id(&self) -> String {
        segment_span_id(&self.parent_segment_id, self.parent_span_id)
    }
}

/// One span of an assembled trace.
///
/// `segment_parent_span_id` starts out as the in-segment parent and is
/// rewritten to the cross-segment parent by the hierarchy builder when the
/// span carries references.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Span {
    pub trace_id: String,
    pub segment_id: String,
    pub span_id: i32,
    pub parent_span_id: i32,
    pub segment_span_id: String,
    pub segment_parent_span_id: String,
    pub start_time: i64,
    pub end_time: i64,
    pub is_error: bool,
    pub layer: String,
    #[serde(rename = "type")]
    pub span_type: String,
    pub peer: String,
    pub operation_name: String,
    pub application_code: String,
    pub component: String,
    pub tags: Vec<KeyValue>,
    pub logs: Vec<LogEntity>,
    pub refs: Vec<Reference>,
    pub is_root: bool,
}

impl Span {
    /// Create a span with its composite ids derived from the segment
    pub fn new(
        trace_id: impl Into<String>,
        segment_id: impl Into<String>,
        span_id: i32,
        parent_span_id: i32,
    ) -> Self {
        let segment_id = segment_id.into();
        Self {
            trace_id: trace_id.into(),
            segment_span_id: segment_span_id(&segment_id, span_id),
            segment_parent_span_id: segment_span_id(&segment_id, parent_span_id),
            segment_id,
            span_id,
            parent_span_id,
            ..Default::default()
        }
    }

    /// Composite id of the in-segment parent, ignoring references
    pub fn local_parent_id(&self) -> String {
        segment_span_id(&self.segment_id, self.parent_span_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_ids() {
        let span = Span::new("t", "1.2", 3, 2);
        assert_eq!(span.segment_span_id, "1.2S3");
        assert_eq!(span.segment_parent_span_id, "1.2S2");
        assert_eq!(span.local_parent_id(), "1.2S2");
    }

    #[test]
    fn test_reference_parent_id() {
        let reference = Reference {
            ref_type: RefType::CrossThread,
            trace_id: "t".into(),
            parent_segment_id: "9.8.7".into(),
            parent_span_id: 4,
        };
        assert_eq!(reference.parent_segment_span_id(), "9.8.7S4");
    }

    #[test]
    fn test_span_serializes_camel_case() {
        let span = Span::new("t", "s", 0, -1);
        let json = serde_json::to_value(&span).unwrap();
        assert_eq!(json["segmentSpanId"], "sS0");
        assert_eq!(json["isRoot"], false);
        assert!(json.get("type").is_some());
    }
}
