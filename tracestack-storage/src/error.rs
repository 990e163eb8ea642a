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

//! Storage collaborator error types

use thiserror::Error;

/// Result type for collaborator calls
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Backend could not be reached; worth retrying
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// Record exists but cannot be decoded
    #[error("Segment {segment_id} is corrupt: {reason}")]
    Corrupt { segment_id: String, reason: String },

    /// Any other backend failure
    #[error("Storage error: {0}")]
    Backend(String),
}

impl StorageError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Unavailable(_))
    }
}
