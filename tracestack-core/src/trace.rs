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

//! Assembled traces and trace summaries

use crate::span::Span;
use crate::time::TimeRange;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-fatal condition hit while assembling a trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum AssemblyWarning {
    /// A segment listed by the global index could not be read
    PartialAssembly { segment_id: String, reason: String },
    /// A directory lookup failed after retries and the raw value was kept
    DependencyUnavailable { dependency: String, reason: String },
    /// A reference whose parent segment id could not be reconstructed
    MalformedReference { segment_id: String, span_id: i32 },
}

impl fmt::Display for AssemblyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyWarning::PartialAssembly { segment_id, reason } => {
                write!(f, "segment {} skipped: {}", segment_id, reason)
            }
            AssemblyWarning::DependencyUnavailable { dependency, reason } => {
                write!(f, "{} unavailable: {}", dependency, reason)
            }
            AssemblyWarning::MalformedReference {
                segment_id,
                span_id,
            } => write!(f, "malformed reference on {} span {}", segment_id, span_id),
        }
    }
}

/// A trace rebuilt for one query. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub trace_id: String,
    pub spans: Vec<Span>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<AssemblyWarning>,
}

impl Trace {
    pub fn empty(trace_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            ..Default::default()
        }
    }

    /// True when at least one segment could not be loaded
    pub fn is_partial(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, AssemblyWarning::PartialAssembly { .. }))
    }

    pub fn roots(&self) -> impl Iterator<Item = &Span> {
        self.spans.iter().filter(|s| s.is_root)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceState {
    #[default]
    All,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryOrder {
    #[default]
    ByStartTime,
    ByDuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub from: usize,
    pub limit: usize,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { from: 0, limit: 20 }
    }
}

/// Filters for a trace summary listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceBriefQuery {
    pub time_range: TimeRange,
    #[serde(default)]
    pub min_duration: Option<i64>,
    #[serde(default)]
    pub max_duration: Option<i64>,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub application_id: Option<i32>,
    #[serde(default)]
    pub trace_id: Option<String>,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub state: TraceState,
    #[serde(default)]
    pub order: QueryOrder,
}

impl TraceBriefQuery {
    pub fn new(time_range: TimeRange) -> Self {
        Self {
            time_range,
            min_duration: None,
            max_duration: None,
            operation_name: None,
            application_id: None,
            trace_id: None,
            pagination: Pagination::default(),
            state: TraceState::All,
            order: QueryOrder::ByStartTime,
        }
    }
}

/// One row of a trace listing, keyed by its entry segment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicTrace {
    pub segment_id: String,
    pub operation_name: String,
    pub duration: i64,
    pub start: i64,
    pub is_error: bool,
    pub trace_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceBrief {
    pub traces: Vec<BasicTrace>,
    pub total: usize,
}
