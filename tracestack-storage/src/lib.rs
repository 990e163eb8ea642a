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

//! Tracestack Storage
//!
//! Partition resolution and the read contracts the query engine consumes.
//! Backends (document stores, sharded SQL) implement the traits in [`dao`]
//! and [`directory`]; [`memory`] holds a reference implementation.

pub mod dao;
pub mod directory;
pub mod error;
pub mod memory;
pub mod partition;
pub mod retry;

pub use dao::{GlobalTraceIndex, SegmentDurationIndex, SegmentStore};
pub use directory::{
    AddressCache, Application, ApplicationCache, ComponentCatalog, ServiceNameCache,
};
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryBackend, MemoryDirectory, SegmentDurationRecord};
pub use partition::{partition_name, PartitionResolver, PartitionSet, DEFAULT_MAX_RANGE_DAYS};
pub use retry::Retrying;
