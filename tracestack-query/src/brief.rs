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

//! Trace listing backed by the segment duration index

use crate::collaborators::Collaborators;
use crate::options::QueryOptions;
use futures::stream::{self, StreamExt};
use tracestack_core::{Result, TableConfig, TraceBrief, TraceBriefQuery, TraceQueryConfig};
use tracestack_storage::{PartitionResolver, PartitionSet};
use tracing::{debug, warn};

pub struct TraceBriefService {
    collaborators: Collaborators,
    resolver: PartitionResolver,
    tables: TableConfig,
    max_in_flight: usize,
}

impl TraceBriefService {
    pub fn new(collaborators: Collaborators, config: &TraceQueryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            collaborators,
            resolver: PartitionResolver::with_offset_secs(config.assembly.utc_offset_secs)?
                .with_max_days(config.assembly.max_range_days),
            tables: config.tables.clone(),
            max_in_flight: config.assembly.max_in_flight,
        })
    }

    pub async fn load_trace_brief(&self, query: &TraceBriefQuery) -> Result<TraceBrief> {
        self.load_trace_brief_with(query, &QueryOptions::default())
            .await
    }

    /// Page through segment summaries matching `query`, each annotated with
    /// the global trace ids it belongs to.
    pub async fn load_trace_brief_with(
        &self,
        query: &TraceBriefQuery,
        options: &QueryOptions,
    ) -> Result<TraceBrief> {
        let index_partitions = self
            .resolver
            .resolve(&self.tables.global_trace, &query.time_range)?;
        let duration_partitions = self
            .resolver
            .resolve(&self.tables.segment_duration, &query.time_range)?;

        options
            .guard(async {
                Ok(self
                    .load(query, &index_partitions, &duration_partitions)
                    .await)
            })
            .await
    }

    async fn load(
        &self,
        query: &TraceBriefQuery,
        index_partitions: &PartitionSet,
        duration_partitions: &PartitionSet,
    ) -> TraceBrief {
        let restriction = match query.trace_id.as_deref().filter(|id| !id.is_empty()) {
            Some(trace_id) => {
                match self
                    .collaborators
                    .global_traces
                    .segment_ids(trace_id, index_partitions)
                    .await
                {
                    Ok(ids) if ids.is_empty() => {
                        debug!(trace_id = %trace_id, "No segments for trace id filter");
                        return TraceBrief::default();
                    }
                    Ok(ids) => Some(ids),
                    Err(e) => {
                        warn!(trace_id = %trace_id, error = %e, "Global trace index unavailable");
                        return TraceBrief::default();
                    }
                }
            }
            None => None,
        };

        let mut brief = match self
            .collaborators
            .segment_durations
            .load_top(duration_partitions, query, restriction.as_deref())
            .await
        {
            Ok(brief) => brief,
            Err(e) => {
                warn!(error = %e, "Segment duration index unavailable");
                return TraceBrief::default();
            }
        };

        let global_traces = &self.collaborators.global_traces;
        let trace_ids: Vec<Vec<String>> = stream::iter(brief.traces.iter())
            .map(|basic| async move {
                global_traces
                    .global_trace_ids(&basic.segment_id, index_partitions)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(
                            segment_id = %basic.segment_id,
                            error = %e,
                            "Could not look up global trace ids"
                        );
                        Vec::new()
                    })
            })
            .buffered(self.max_in_flight)
            .collect()
            .await;

        for (basic, ids) in brief.traces.iter_mut().zip(trace_ids) {
            basic.trace_ids = ids;
        }

        debug!(rows = brief.traces.len(), total = brief.total, "Loaded trace brief");
        brief
    }
}
