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

//! Per-query deadline and cancellation

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracestack_core::{Result, TraceStackError};

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Upper bound on the whole query
    pub deadline: Option<Duration>,
    /// Cancelled by the caller when the client goes away
    pub cancel: Option<CancellationToken>,
}

impl QueryOptions {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Drive `work` under these options. On cancellation or deadline the
    /// future is dropped, abandoning whatever it still had in flight.
    pub(crate) async fn guard<T, F>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let cancelled = async {
            match &self.cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending::<()>().await,
            }
        };

        let bounded = async {
            match self.deadline {
                Some(deadline) => tokio::time::timeout(deadline, work)
                    .await
                    .map_err(|_| TraceStackError::DeadlineExceeded(deadline))?,
                None => work.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancelled => Err(TraceStackError::Cancelled),
            result = bounded => result,
        }
    }
}
