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

//! Tracestack Core
//!
//! Data model, identifier schemes and shared plumbing for rebuilding
//! distributed traces from per-process segments.

pub mod config;
pub mod error;
pub mod ids;
pub mod resilience;
pub mod segment;
pub mod span;
pub mod time;
pub mod trace;

pub use config::{AssemblyConfig, RetryConfig, SiblingOrder, TableConfig, TraceQueryConfig};
pub use error::{Result, TraceStackError};
pub use ids::{
    segment_span_id, TraceIdentifier, UniqueId, ID_SPLIT, SEGMENT_SPAN_SPLIT, UNIQUE_ID_SPLIT,
};
pub use resilience::{Bulkhead, RetryPolicy};
pub use segment::{
    KeyWithStringValue, LogMessage, RefType, SegmentObject, SpanLayer, SpanObject, SpanType,
    TraceSegmentReference,
};
pub use span::{KeyValue, LogEntity, Reference, Span};
pub use time::{utc_offset, TimePoint, TimeRange};
pub use trace::{
    AssemblyWarning, BasicTrace, Pagination, QueryOrder, Trace, TraceBrief, TraceBriefQuery,
    TraceState,
};
