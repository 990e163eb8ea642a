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

//! Logging bootstrap for binaries embedding the query engine

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub const DEFAULT_LOG_FILTER: &str = "tracestack_query=info,tracestack_storage=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (or [`DEFAULT_LOG_FILTER`]). Fails if a global
/// subscriber is already set.
pub fn init_tracing(default_filter: Option<&str>) -> anyhow::Result<()> {
    let default_filter = default_filter.unwrap_or(DEFAULT_LOG_FILTER);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("a global tracing subscriber is already installed")
}
