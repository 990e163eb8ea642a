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

//! Query engine facade
//!
//! Wires configuration and collaborators into the assembler and the brief
//! service. Remote collaborators are wrapped in the configured retry policy.

use crate::assembler::TraceAssembler;
use crate::brief::TraceBriefService;
use crate::collaborators::Collaborators;
use crate::options::QueryOptions;
use std::path::PathBuf;
use tracestack_core::{Result, TimeRange, Trace, TraceBrief, TraceBriefQuery, TraceQueryConfig};
use tracestack_index::HierarchyBuilder;
use tracing::info;

pub struct TraceQueryEngine {
    assembler: TraceAssembler,
    briefs: TraceBriefService,
}

impl TraceQueryEngine {
    pub fn new(collaborators: Collaborators, config: TraceQueryConfig) -> Result<Self> {
        config.validate()?;
        let collaborators = collaborators.with_retry(&config.retry.policy());
        info!(
            max_in_flight = config.assembly.max_in_flight,
            fetch_timeout_ms = config.assembly.fetch_timeout_ms,
            utc_offset_secs = config.assembly.utc_offset_secs,
            sibling_order = ?config.assembly.sibling_order,
            retry_attempts = config.retry.max_attempts,
            "Trace query engine ready"
        );
        Ok(Self {
            assembler: TraceAssembler::new(collaborators.clone(), &config)?,
            briefs: TraceBriefService::new(collaborators, &config)?,
        })
    }

    /// Load configuration (file, then environment) and build the engine
    pub fn open(collaborators: Collaborators, config_file: Option<PathBuf>) -> Result<Self> {
        Self::new(collaborators, TraceQueryConfig::load(config_file)?)
    }

    pub fn with_hierarchy_builder(mut self, builder: HierarchyBuilder) -> Self {
        self.assembler = self.assembler.with_hierarchy_builder(builder);
        self
    }

    pub async fn load_trace(&self, trace_id: &str, range: Option<TimeRange>) -> Result<Trace> {
        self.assembler.load_trace(trace_id, range).await
    }

    pub async fn load_trace_with(
        &self,
        trace_id: &str,
        range: Option<TimeRange>,
        options: &QueryOptions,
    ) -> Result<Trace> {
        self.assembler
            .load_trace_with(trace_id, range, options)
            .await
    }

    pub async fn load_trace_brief(&self, query: &TraceBriefQuery) -> Result<TraceBrief> {
        self.briefs.load_trace_brief(query).await
    }

    pub async fn load_trace_brief_with(
        &self,
        query: &TraceBriefQuery,
        options: &QueryOptions,
    ) -> Result<TraceBrief> {
        self.briefs.load_trace_brief_with(query, options).await
    }
}
