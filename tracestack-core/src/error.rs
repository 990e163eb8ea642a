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

//! Error types shared across the trace query workspace

use std::time::Duration;
use thiserror::Error;

/// Result type for trace query operations
pub type Result<T> = std::result::Result<T, TraceStackError>;

/// Errors surfaced to callers of the query engine.
///
/// Data-availability problems (missing segments, cache misses) never show up
/// here; they degrade to warnings on the assembled trace instead.
#[derive(Debug, Error)]
pub enum TraceStackError {
    /// A time point could not be turned into a calendar day
    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    /// The caller supplied a trace id that cannot be parsed
    #[error("Invalid trace id: {0}")]
    InvalidTraceId(String),

    /// The caller cancelled the query
    #[error("Query cancelled")]
    Cancelled,

    /// The caller-supplied deadline elapsed before assembly finished
    #[error("Query deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<toml::de::Error> for TraceStackError {
    fn from(e: toml::de::Error) -> Self {
        TraceStackError::Config(e.to_string())
    }
}

impl TraceStackError {
    /// Whether the error was caused by bad caller input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            TraceStackError::InvalidTimeRange(_) | TraceStackError::InvalidTraceId(_)
        )
    }
}
