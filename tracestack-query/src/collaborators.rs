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

//! Collaborators the query engine is wired with
//!
//! Handed in at construction; the engine never looks anything up at runtime.

use std::sync::Arc;
use tracestack_core::RetryPolicy;
use tracestack_storage::{
    AddressCache, ApplicationCache, ComponentCatalog, GlobalTraceIndex, Retrying,
    SegmentDurationIndex, SegmentStore, ServiceNameCache,
};

/// Display-name directories used for span enrichment
#[derive(Clone)]
pub struct Directory {
    pub addresses: Arc<dyn AddressCache>,
    pub service_names: Arc<dyn ServiceNameCache>,
    pub applications: Arc<dyn ApplicationCache>,
    pub components: Arc<dyn ComponentCatalog>,
}

impl Directory {
    /// Use one object for every directory
    pub fn shared<D>(directory: Arc<D>) -> Self
    where
        D: AddressCache + ServiceNameCache + ApplicationCache + ComponentCatalog + 'static,
    {
        Self {
            addresses: directory.clone(),
            service_names: directory.clone(),
            applications: directory.clone(),
            components: directory,
        }
    }
}

#[derive(Clone)]
pub struct Collaborators {
    pub global_traces: Arc<dyn GlobalTraceIndex>,
    pub segments: Arc<dyn SegmentStore>,
    pub segment_durations: Arc<dyn SegmentDurationIndex>,
    pub directory: Directory,
}

impl Collaborators {
    /// Use one backend for every storage contract
    pub fn from_backend<B>(backend: Arc<B>, directory: Directory) -> Self
    where
        B: GlobalTraceIndex + SegmentStore + SegmentDurationIndex + 'static,
    {
        Self {
            global_traces: backend.clone(),
            segments: backend.clone(),
            segment_durations: backend,
            directory,
        }
    }

    /// Wrap every remote call in `policy`. The component catalog is local
    /// and left as is.
    pub fn with_retry(self, policy: &RetryPolicy) -> Self {
        let directory = self.directory;
        Self {
            global_traces: Arc::new(Retrying::new(self.global_traces, policy.clone())),
            segments: Arc::new(Retrying::new(self.segments, policy.clone())),
            segment_durations: Arc::new(Retrying::new(self.segment_durations, policy.clone())),
            directory: Directory {
                addresses: Arc::new(Retrying::new(directory.addresses, policy.clone())),
                service_names: Arc::new(Retrying::new(directory.service_names, policy.clone())),
                applications: Arc::new(Retrying::new(directory.applications, policy.clone())),
                components: directory.components,
            },
        }
    }
}
