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

//! Configuration for the trace query engine
//!
//! Loaded from TOML with environment overrides on top:
//! - TRACESTACK_MAX_IN_FLIGHT: concurrent collaborator calls per query (default: 16)
//! - TRACESTACK_FETCH_TIMEOUT_MS: per-segment fetch timeout (default: 5000)
//! - TRACESTACK_UTC_OFFSET_SECS: offset used to shard by day (default: 0)
//! - TRACESTACK_SIBLING_ORDER: `arrival` or `start_time` (default: arrival)
//! - TRACESTACK_MAX_RANGE_DAYS: widest time range a query may span (default: 366)

use crate::error::{Result, TraceStackError};
use crate::resilience::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_UTC_OFFSET_SECS: i32 = 24 * 3600 - 1;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TraceQueryConfig {
    #[serde(default)]
    pub tables: TableConfig,
    #[serde(default)]
    pub assembly: AssemblyConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Logical table names; partitions append `_yyyyMMdd`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TableConfig {
    #[serde(default = "default_global_trace_table")]
    pub global_trace: String,
    #[serde(default = "default_segment_table")]
    pub segment: String,
    #[serde(default = "default_segment_duration_table")]
    pub segment_duration: String,
}

/// How siblings under one parent are ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiblingOrder {
    /// Order in which spans came back from storage
    #[default]
    Arrival,
    /// Ascending start time, ties keep arrival order
    StartTime,
}

impl std::str::FromStr for SiblingOrder {
    type Err = TraceStackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arrival" => Ok(SiblingOrder::Arrival),
            "start_time" => Ok(SiblingOrder::StartTime),
            other => Err(TraceStackError::Config(format!(
                "unknown sibling order {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssemblyConfig {
    /// Maximum concurrent collaborator calls for one query
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,

    /// Timeout for a single segment fetch
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Offset, in seconds east of UTC, the writers shard days in
    #[serde(default)]
    pub utc_offset_secs: i32,

    #[serde(default)]
    pub sibling_order: SiblingOrder,

    /// Widest time range, in days, a single query may cover
    #[serde(default = "default_max_range_days")]
    pub max_range_days: usize,
}

impl AssemblyConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default = "default_jitter")]
    pub jitter: f64,
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            jitter: self.jitter,
        }
    }
}

// Default values
fn default_global_trace_table() -> String {
    "global_trace".to_string()
}

fn default_segment_table() -> String {
    "segment".to_string()
}

fn default_segment_duration_table() -> String {
    "segment_duration".to_string()
}

fn default_max_in_flight() -> usize {
    16
}

fn default_fetch_timeout_ms() -> u64 {
    5_000
}

fn default_max_range_days() -> usize {
    366
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    2_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_jitter() -> f64 {
    0.1
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            global_trace: default_global_trace_table(),
            segment: default_segment_table(),
            segment_duration: default_segment_duration_table(),
        }
    }
}

impl Default for AssemblyConfig {
    fn default() -> Self {
        Self {
            max_in_flight: default_max_in_flight(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            utc_offset_secs: 0,
            sibling_order: SiblingOrder::Arrival,
            max_range_days: default_max_range_days(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: default_jitter(),
        }
    }
}

impl TraceQueryConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        let config = config.merge_with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides. Only variables that are set take effect.
    pub fn merge_with_env(mut self) -> Result<Self> {
        if let Some(val) = env_parse::<usize>("TRACESTACK_MAX_IN_FLIGHT")? {
            self.assembly.max_in_flight = val;
        }
        if let Some(val) = env_parse::<u64>("TRACESTACK_FETCH_TIMEOUT_MS")? {
            self.assembly.fetch_timeout_ms = val;
        }
        if let Some(val) = env_parse::<i32>("TRACESTACK_UTC_OFFSET_SECS")? {
            self.assembly.utc_offset_secs = val;
        }
        if let Some(val) = env_parse::<usize>("TRACESTACK_MAX_RANGE_DAYS")? {
            self.assembly.max_range_days = val;
        }
        if let Ok(order) = std::env::var("TRACESTACK_SIBLING_ORDER") {
            self.assembly.sibling_order = order.parse()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.assembly.max_in_flight == 0 {
            return Err(TraceStackError::Config(
                "assembly.max_in_flight must be at least 1".into(),
            ));
        }
        if self.assembly.fetch_timeout_ms == 0 {
            return Err(TraceStackError::Config(
                "assembly.fetch_timeout_ms must be at least 1".into(),
            ));
        }
        if self.assembly.max_range_days == 0 {
            return Err(TraceStackError::Config(
                "assembly.max_range_days must be at least 1".into(),
            ));
        }
        if self.assembly.utc_offset_secs.abs() > MAX_UTC_OFFSET_SECS {
            return Err(TraceStackError::Config(format!(
                "assembly.utc_offset_secs {} exceeds one day",
                self.assembly.utc_offset_secs
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(TraceStackError::Config(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        let tables = [
            &self.tables.global_trace,
            &self.tables.segment,
            &self.tables.segment_duration,
        ];
        if tables.iter().any(|t| t.is_empty()) {
            return Err(TraceStackError::Config("table names must not be empty".into()));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| TraceStackError::Config(format!("{} has invalid value {:?}", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = TraceQueryConfig::default();
        assert_eq!(config.tables.global_trace, "global_trace");
        assert_eq!(config.assembly.max_in_flight, 16);
        assert_eq!(config.assembly.sibling_order, SiblingOrder::Arrival);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[tables]
segment = "segment_v2"

[assembly]
max_in_flight = 4
sibling_order = "start_time"
"#
        )
        .unwrap();

        let config = TraceQueryConfig::from_file(file.path()).unwrap();
        assert_eq!(config.tables.segment, "segment_v2");
        assert_eq!(config.tables.global_trace, "global_trace");
        assert_eq!(config.assembly.max_in_flight, 4);
        assert_eq!(config.assembly.fetch_timeout_ms, 5_000);
        assert_eq!(config.assembly.sibling_order, SiblingOrder::StartTime);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[assembly\nmax_in_flight = ").unwrap();
        let err = TraceQueryConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, TraceStackError::Config(_)));
    }

    #[test]
    fn test_validation() {
        let mut config = TraceQueryConfig::default();
        config.assembly.max_in_flight = 0;
        assert!(config.validate().is_err());

        let mut config = TraceQueryConfig::default();
        config.assembly.utc_offset_secs = 90_000;
        assert!(config.validate().is_err());

        let mut config = TraceQueryConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_fetch_timeout_rejected() {
        let mut config = TraceQueryConfig::default();
        config.assembly.fetch_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, TraceStackError::Config(msg) if msg.contains("fetch_timeout_ms")));

        let mut config = TraceQueryConfig::default();
        config.assembly.max_range_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sibling_order_from_str() {
        assert_eq!("Start_Time".parse::<SiblingOrder>().unwrap(), SiblingOrder::StartTime);
        assert!("chronological".parse::<SiblingOrder>().is_err());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = TraceQueryConfig::load(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.tables.segment, "segment");
    }
}
