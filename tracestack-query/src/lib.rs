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

//! Tracestack Query
//!
//! Read path of the trace store: rebuilds distributed traces from their
//! segments and lists trace summaries.
//!
//! ```no_run
//! use std::sync::Arc;
//! use tracestack_core::TraceQueryConfig;
//! use tracestack_query::{Collaborators, Directory, TraceQueryEngine};
//! use tracestack_storage::{MemoryBackend, MemoryDirectory};
//!
//! # async fn run() -> tracestack_core::Result<()> {
//! let directory = Directory::shared(Arc::new(MemoryDirectory::new()));
//! let collaborators = Collaborators::from_backend(Arc::new(MemoryBackend::new()), directory);
//! let engine = TraceQueryEngine::new(collaborators, TraceQueryConfig::default())?;
//! let trace = engine.load_trace("1.2.3_1521144000000", None).await?;
//! for span in &trace.spans {
//!     println!("{} {}", span.segment_span_id, span.operation_name);
//! }
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod brief;
pub mod collaborators;
pub mod engine;
pub mod enrichment;
pub mod logging;
pub mod options;

pub use assembler::TraceAssembler;
pub use brief::TraceBriefService;
pub use collaborators::{Collaborators, Directory};
pub use engine::TraceQueryEngine;
pub use enrichment::{Enricher, FetchedSegment, NameResolver, ResolvedNames};
pub use logging::{init_tracing, DEFAULT_LOG_FILTER};
pub use options::QueryOptions;
pub use tokio_util::sync::CancellationToken;
