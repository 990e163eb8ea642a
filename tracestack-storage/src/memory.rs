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

//! In-memory backend for development/testing
//!
//! Production deployments plug in a document store or sharded SQL adapter
//! behind the same contracts. Rows are kept per partition so that lookups
//! honour the partition set exactly like a real backend would.

use crate::dao::{GlobalTraceIndex, SegmentDurationIndex, SegmentStore};
use crate::directory::{
    AddressCache, Application, ApplicationCache, ComponentCatalog, ServiceNameCache,
};
use crate::error::StorageResult;
use crate::partition::PartitionSet;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracestack_core::{
    BasicTrace, QueryOrder, SegmentObject, TraceBrief, TraceBriefQuery, TraceState,
};

/// One row of the segment duration table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentDurationRecord {
    pub segment_id: String,
    pub application_id: i32,
    pub service_name: String,
    pub trace_id: String,
    pub duration: i64,
    pub start_time: i64,
    pub end_time: i64,
    pub is_error: bool,
}

#[derive(Debug, Clone)]
struct GlobalTraceRow {
    global_trace_id: String,
    segment_id: String,
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    // partition -> rows, in insertion order
    global_traces: RwLock<HashMap<String, Vec<GlobalTraceRow>>>,
    // partition -> segment_id -> segment
    segments: RwLock<HashMap<String, HashMap<String, SegmentObject>>>,
    // partition -> rows
    durations: RwLock<HashMap<String, Vec<SegmentDurationRecord>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_global_trace(
        &self,
        partition: &str,
        global_trace_id: impl Into<String>,
        segment_id: impl Into<String>,
    ) {
        self.global_traces
            .write()
            .entry(partition.to_string())
            .or_default()
            .push(GlobalTraceRow {
                global_trace_id: global_trace_id.into(),
                segment_id: segment_id.into(),
            });
    }

    pub fn insert_segment(
        &self,
        partition: &str,
        segment_id: impl Into<String>,
        segment: SegmentObject,
    ) {
        self.segments
            .write()
            .entry(partition.to_string())
            .or_default()
            .insert(segment_id.into(), segment);
    }

    pub fn insert_duration(&self, partition: &str, record: SegmentDurationRecord) {
        self.durations
            .write()
            .entry(partition.to_string())
            .or_default()
            .push(record);
    }
}

#[async_trait]
impl GlobalTraceIndex for MemoryBackend {
    async fn segment_ids(
        &self,
        global_trace_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Vec<String>> {
        let rows = self.global_traces.read();
        Ok(partitions
            .iter()
            .filter_map(|p| rows.get(p))
            .flatten()
            .filter(|row| row.global_trace_id == global_trace_id)
            .map(|row| row.segment_id.clone())
            .collect())
    }

    async fn global_trace_ids(
        &self,
        segment_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Vec<String>> {
        let rows = self.global_traces.read();
        Ok(partitions
            .iter()
            .filter_map(|p| rows.get(p))
            .flatten()
            .filter(|row| row.segment_id == segment_id)
            .map(|row| row.global_trace_id.clone())
            .collect())
    }
}

#[async_trait]
impl SegmentStore for MemoryBackend {
    async fn load(
        &self,
        segment_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Option<SegmentObject>> {
        let segments = self.segments.read();
        Ok(partitions
            .iter()
            .filter_map(|p| segments.get(p))
            .find_map(|by_id| by_id.get(segment_id))
            .cloned())
    }
}

#[async_trait]
impl SegmentDurationIndex for MemoryBackend {
    async fn load_top(
        &self,
        partitions: &PartitionSet,
        query: &TraceBriefQuery,
        segment_ids: Option<&[String]>,
    ) -> StorageResult<TraceBrief> {
        let durations = self.durations.read();
        let mut rows: Vec<&SegmentDurationRecord> = partitions
            .iter()
            .filter_map(|p| durations.get(p))
            .flatten()
            .filter(|r| query.min_duration.map_or(true, |min| r.duration >= min))
            .filter(|r| query.max_duration.map_or(true, |max| r.duration <= max))
            .filter(|r| {
                query
                    .operation_name
                    .as_deref()
                    .map_or(true, |op| op.is_empty() || r.service_name.contains(op))
            })
            .filter(|r| {
                query
                    .application_id
                    .map_or(true, |id| id == 0 || r.application_id == id)
            })
            .filter(|r| match query.state {
                TraceState::All => true,
                TraceState::Success => !r.is_error,
                TraceState::Error => r.is_error,
            })
            .filter(|r| segment_ids.map_or(true, |ids| ids.contains(&r.segment_id)))
            .collect();

        match query.order {
            QueryOrder::ByStartTime => rows.sort_by(|a, b| b.start_time.cmp(&a.start_time)),
            QueryOrder::ByDuration => rows.sort_by(|a, b| b.duration.cmp(&a.duration)),
        }

        let total = rows.len();
        let traces = rows
            .into_iter()
            .skip(query.pagination.from)
            .take(query.pagination.limit)
            .map(|r| BasicTrace {
                segment_id: r.segment_id.clone(),
                operation_name: r.service_name.clone(),
                duration: r.duration,
                start: r.start_time,
                is_error: r.is_error,
                trace_ids: Vec::new(),
            })
            .collect();

        Ok(TraceBrief { traces, total })
    }
}

/// Directory of display names keyed by dictionary id
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    addresses: DashMap<i32, String>,
    service_names: DashMap<i32, String>,
    applications: DashMap<i32, Application>,
    components: DashMap<i32, String>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address(self, id: i32, address: impl Into<String>) -> Self {
        self.addresses.insert(id, address.into());
        self
    }

    pub fn with_service_name(self, id: i32, name: impl Into<String>) -> Self {
        self.service_names.insert(id, name.into());
        self
    }

    pub fn with_application(self, id: i32, code: impl Into<String>) -> Self {
        self.applications.insert(
            id,
            Application {
                application_id: id,
                application_code: code.into(),
            },
        );
        self
    }

    pub fn with_component(self, id: i32, name: impl Into<String>) -> Self {
        self.components.insert(id, name.into());
        self
    }
}

#[async_trait]
impl AddressCache for MemoryDirectory {
    async fn address(&self, address_id: i32) -> StorageResult<Option<String>> {
        Ok(self.addresses.get(&address_id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl ServiceNameCache for MemoryDirectory {
    async fn service_name(&self, service_id: i32) -> StorageResult<Option<String>> {
        Ok(self.service_names.get(&service_id).map(|e| e.value().clone()))
    }
}

#[async_trait]
impl ApplicationCache for MemoryDirectory {
    async fn application(&self, application_id: i32) -> StorageResult<Option<Application>> {
        Ok(self
            .applications
            .get(&application_id)
            .map(|e| e.value().clone()))
    }
}

impl ComponentCatalog for MemoryDirectory {
    fn component_name(&self, component_id: i32) -> Option<String> {
        self.components.get(&component_id).map(|e| e.value().clone())
    }
}
