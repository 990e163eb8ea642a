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

//! Raw segment records as decoded from storage
//!
//! A segment is written once by one instrumented process and never changes
//! afterwards. The query engine only ever reads it.

use crate::ids::UniqueId;
use serde::{Deserialize, Serialize};

/// Layer a span was recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpanLayer {
    #[default]
    Unknown,
    Database,
    RPCFramework,
    Http,
    MQ,
    Cache,
}

impl SpanLayer {
    pub fn name(&self) -> &'static str {
        match self {
            SpanLayer::Unknown => "Unknown",
            SpanLayer::Database => "Database",
            SpanLayer::RPCFramework => "RPCFramework",
            SpanLayer::Http => "Http",
            SpanLayer::MQ => "MQ",
            SpanLayer::Cache => "Cache",
        }
    }
}

/// Position of a span relative to the process boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpanType {
    Entry,
    Exit,
    #[default]
    Local,
}

impl SpanType {
    pub fn name(&self) -> &'static str {
        match self {
            SpanType::Entry => "Entry",
            SpanType::Exit => "Exit",
            SpanType::Local => "Local",
        }
    }
}

/// Kind of boundary a cross-segment reference crosses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RefType {
    CrossProcess,
    CrossThread,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct KeyWithStringValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogMessage {
    pub time: i64,
    #[serde(default)]
    pub data: Vec<KeyWithStringValue>,
}

/// Link from a span to its parent span in another segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSegmentReference {
    pub ref_type: RefType,
    pub parent_trace_segment_id: UniqueId,
    pub parent_span_id: i32,
}

/// One span as recorded by the agent.
///
/// Peer, operation name and component are either literal strings or
/// dictionary ids. An id of zero means "use the literal".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SpanObject {
    pub span_id: i32,
    pub parent_span_id: i32,
    pub start_time: i64,
    pub end_time: i64,
    #[serde(default)]
    pub refs: Vec<TraceSegmentReference>,
    #[serde(default)]
    pub operation_name_id: i32,
    #[serde(default)]
    pub operation_name: String,
    #[serde(default)]
    pub peer_id: i32,
    #[serde(default)]
    pub peer: String,
    #[serde(default)]
    pub span_type: SpanType,
    #[serde(default)]
    pub span_layer: SpanLayer,
    #[serde(default)]
    pub component_id: i32,
    #[serde(default)]
    pub component: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub tags: Vec<KeyWithStringValue>,
    #[serde(default)]
    pub logs: Vec<LogMessage>,
}

/// A decoded segment
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SegmentObject {
    pub application_id: i32,
    #[serde(default)]
    pub spans: Vec<SpanObject>,
}
