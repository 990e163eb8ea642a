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

//! Read contracts implemented by storage backends
//!
//! Every call is scoped to a [`PartitionSet`]; implementations must not look
//! outside the partitions they are handed.

use crate::error::StorageResult;
use crate::partition::PartitionSet;
use async_trait::async_trait;
use std::sync::Arc;
use tracestack_core::{SegmentObject, TraceBrief, TraceBriefQuery};

/// Index between global trace ids and the segments that carry them
#[async_trait]
pub trait GlobalTraceIndex: Send + Sync {
    /// Segment ids bound to `global_trace_id`, in storage order
    async fn segment_ids(
        &self,
        global_trace_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Vec<String>>;

    /// All global trace ids touching `segment_id`
    async fn global_trace_ids(
        &self,
        segment_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Vec<String>>;
}

/// Raw segment storage
#[async_trait]
pub trait SegmentStore: Send + Sync {
    /// Load and decode one segment. `Ok(None)` when it does not exist.
    async fn load(
        &self,
        segment_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Option<SegmentObject>>;
}

/// Duration-indexed segment summaries backing the trace listing
#[async_trait]
pub trait SegmentDurationIndex: Send + Sync {
    /// Filter, order and page segment summaries.
    ///
    /// When `segment_ids` is given, only those segments are eligible.
    async fn load_top(
        &self,
        partitions: &PartitionSet,
        query: &TraceBriefQuery,
        segment_ids: Option<&[String]>,
    ) -> StorageResult<TraceBrief>;
}

#[async_trait]
impl<T: GlobalTraceIndex + ?Sized> GlobalTraceIndex for Arc<T> {
    async fn segment_ids(
        &self,
        global_trace_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Vec<String>> {
        (**self).segment_ids(global_trace_id, partitions).await
    }

    async fn global_trace_ids(
        &self,
        segment_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Vec<String>> {
        (**self).global_trace_ids(segment_id, partitions).await
    }
}

#[async_trait]
impl<T: SegmentStore + ?Sized> SegmentStore for Arc<T> {
    async fn load(
        &self,
        segment_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Option<SegmentObject>> {
        (**self).load(segment_id, partitions).await
    }
}

#[async_trait]
impl<T: SegmentDurationIndex + ?Sized> SegmentDurationIndex for Arc<T> {
    async fn load_top(
        &self,
        partitions: &PartitionSet,
        query: &TraceBriefQuery,
        segment_ids: Option<&[String]>,
    ) -> StorageResult<TraceBrief> {
        (**self).load_top(partitions, query, segment_ids).await
    }
}
