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

//! Trace assembly
//!
//! Rebuilds one trace from the segments the global index lists for it:
//! resolve partitions, look up segment ids, fetch segments concurrently
//! while resolving display names for those already fetched, convert spans,
//! then hand the flat span set to the hierarchy builder. Fetches complete in
//! any order; output order is fixed afterwards.

use crate::collaborators::Collaborators;
use crate::enrichment::{Enricher, FetchedSegment, NameResolver, ResolvedNames};
use crate::options::QueryOptions;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::time::Duration;
use tracestack_core::{
    AssemblyWarning, Bulkhead, Result, SegmentObject, TableConfig, TimeRange, Trace,
    TraceIdentifier, TraceQueryConfig, TraceStackError,
};
use tracestack_index::HierarchyBuilder;
use tracestack_storage::{PartitionResolver, PartitionSet};
use tracing::{debug, info, warn};

pub struct TraceAssembler {
    collaborators: Collaborators,
    resolver: PartitionResolver,
    builder: HierarchyBuilder,
    tables: TableConfig,
    max_in_flight: usize,
    fetch_timeout: Duration,
}

impl TraceAssembler {
    pub fn new(collaborators: Collaborators, config: &TraceQueryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            collaborators,
            resolver: PartitionResolver::with_offset_secs(config.assembly.utc_offset_secs)?
                .with_max_days(config.assembly.max_range_days),
            builder: HierarchyBuilder::from_order(config.assembly.sibling_order),
            tables: config.tables.clone(),
            max_in_flight: config.assembly.max_in_flight,
            fetch_timeout: config.assembly.fetch_timeout(),
        })
    }

    /// Replace the hierarchy builder, e.g. to install a custom sibling order
    pub fn with_hierarchy_builder(mut self, builder: HierarchyBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn resolver(&self) -> &PartitionResolver {
        &self.resolver
    }

    pub async fn load_trace(&self, trace_id: &str, range: Option<TimeRange>) -> Result<Trace> {
        self.load_trace_with(trace_id, range, &QueryOptions::default())
            .await
    }

    /// Load and assemble one trace.
    ///
    /// Without an explicit `range` the search covers the day of the
    /// timestamp embedded in `trace_id`. Only malformed input, cancellation
    /// and an elapsed deadline are errors; anything storage-side degrades to
    /// warnings on the returned trace.
    pub async fn load_trace_with(
        &self,
        trace_id: &str,
        range: Option<TimeRange>,
        options: &QueryOptions,
    ) -> Result<Trace> {
        let identifier = TraceIdentifier::parse(trace_id)?;
        let range = match range {
            Some(range) => range,
            None => identifier
                .timestamp_ms
                .map(TimeRange::at_millis)
                .ok_or_else(|| {
                    TraceStackError::InvalidTraceId(format!(
                        "{:?} carries no numeric timestamp and no time range was given",
                        trace_id
                    ))
                })?,
        };

        let index_partitions = self.resolver.resolve(&self.tables.global_trace, &range)?;
        let segment_partitions = self.resolver.resolve(&self.tables.segment, &range)?;

        let global_trace_id = identifier.global_trace_id.as_str();
        options
            .guard(async {
                Ok(self
                    .assemble(global_trace_id, &index_partitions, &segment_partitions)
                    .await)
            })
            .await
            .map_err(|e| {
                warn!(trace_id = %global_trace_id, error = %e, "Trace assembly aborted");
                e
            })
    }

    async fn assemble(
        &self,
        global_trace_id: &str,
        index_partitions: &PartitionSet,
        segment_partitions: &PartitionSet,
    ) -> Trace {
        let mut trace = Trace::empty(global_trace_id);

        let segment_ids = match self
            .collaborators
            .global_traces
            .segment_ids(global_trace_id, index_partitions)
            .await
        {
            Ok(ids) => dedup_in_order(ids),
            Err(e) => {
                warn!(trace_id = %global_trace_id, error = %e, "Global trace index unavailable");
                trace.warnings.push(AssemblyWarning::DependencyUnavailable {
                    dependency: "global trace index".to_string(),
                    reason: e.to_string(),
                });
                return trace;
            }
        };

        if segment_ids.is_empty() {
            debug!(
                trace_id = %global_trace_id,
                partitions = index_partitions.len(),
                "No segments indexed for trace"
            );
            return trace;
        }

        // Fetches and enrichment lookups draw from one per-query budget
        let bulkhead = Bulkhead::new("trace assembly", self.max_in_flight);
        let (fetched, names) = self
            .fetch_and_resolve(&segment_ids, segment_partitions, &bulkhead, &mut trace.warnings)
            .await;

        let spans = Enricher::new(&self.collaborators.directory, &bulkhead).convert(
            global_trace_id,
            &fetched,
            &names,
            &mut trace.warnings,
        );
        trace.spans = self.builder.build(spans);

        info!(
            trace_id = %global_trace_id,
            segments = segment_ids.len(),
            loaded = fetched.len(),
            spans = trace.spans.len(),
            warnings = trace.warnings.len(),
            "Assembled trace"
        );
        trace
    }

    /// Fetch every segment with at most `max_in_flight` outstanding, starting
    /// name lookups for each segment as it arrives. Fetches and lookups share
    /// `bulkhead`. The segments keep the index order of `segment_ids`.
    async fn fetch_and_resolve(
        &self,
        segment_ids: &[String],
        partitions: &PartitionSet,
        bulkhead: &Bulkhead,
        warnings: &mut Vec<AssemblyWarning>,
    ) -> (Vec<FetchedSegment>, ResolvedNames) {
        let mut fetches = stream::iter(segment_ids.iter().enumerate())
            .map(|(idx, segment_id)| async move {
                (idx, segment_id, self.fetch_one(segment_id, partitions, bulkhead).await)
            })
            .buffer_unordered(self.max_in_flight);
        let mut resolver = NameResolver::new(&self.collaborators.directory, bulkhead);

        let mut outcomes = Vec::with_capacity(segment_ids.len());
        loop {
            tokio::select! {
                outcome = fetches.next() => match outcome {
                    Some(outcome) => {
                        if let (_, _, Ok(Some(segment))) = &outcome {
                            resolver.request(segment);
                        }
                        outcomes.push(outcome);
                    }
                    None => break,
                },
                _ = resolver.settle_one(), if resolver.has_pending() => {}
            }
        }
        let (names, lookup_warnings) = resolver.finish().await;
        outcomes.sort_by_key(|(idx, _, _)| *idx);

        let mut fetched = Vec::with_capacity(outcomes.len());
        for (_, segment_id, outcome) in outcomes {
            let reason = match outcome {
                Ok(Some(segment)) => {
                    fetched.push(FetchedSegment {
                        segment_id: segment_id.clone(),
                        segment,
                    });
                    continue;
                }
                Ok(None) => "segment not found".to_string(),
                Err(reason) => reason,
            };
            warn!(segment_id = %segment_id, reason = %reason, "Skipping segment");
            warnings.push(AssemblyWarning::PartialAssembly {
                segment_id: segment_id.clone(),
                reason,
            });
        }
        warnings.extend(lookup_warnings);
        (fetched, names)
    }

    async fn fetch_one(
        &self,
        segment_id: &str,
        partitions: &PartitionSet,
        bulkhead: &Bulkhead,
    ) -> std::result::Result<Option<SegmentObject>, String> {
        let _permit = bulkhead.acquire().await.map_err(|e| e.to_string())?;
        let load = self.collaborators.segments.load(segment_id, partitions);
        match tokio::time::timeout(self.fetch_timeout, load).await {
            Ok(result) => result.map_err(|e| e.to_string()),
            Err(_) => Err(format!("fetch timed out after {:?}", self.fetch_timeout)),
        }
    }
}

fn dedup_in_order(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
