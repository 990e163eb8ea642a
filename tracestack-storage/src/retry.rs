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

//! Retrying decorator for storage and directory collaborators
//!
//! Only [`StorageError::Unavailable`] is retried. Once attempts run out the
//! last error is handed back and the caller degrades.

use crate::dao::{GlobalTraceIndex, SegmentDurationIndex, SegmentStore};
use crate::directory::{AddressCache, Application, ApplicationCache, ServiceNameCache};
use crate::error::{StorageError, StorageResult};
use crate::partition::PartitionSet;
use async_trait::async_trait;
use tracestack_core::{RetryPolicy, SegmentObject, TraceBrief, TraceBriefQuery};

pub struct Retrying<T> {
    inner: T,
    policy: RetryPolicy,
}

impl<T> Retrying<T> {
    pub fn new(inner: T, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: GlobalTraceIndex> GlobalTraceIndex for Retrying<T> {
    async fn segment_ids(
        &self,
        global_trace_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Vec<String>> {
        self.policy
            .run(StorageError::is_retryable, || {
                self.inner.segment_ids(global_trace_id, partitions)
            })
            .await
    }

    async fn global_trace_ids(
        &self,
        segment_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Vec<String>> {
        self.policy
            .run(StorageError::is_retryable, || {
                self.inner.global_trace_ids(segment_id, partitions)
            })
            .await
    }
}

#[async_trait]
impl<T: SegmentStore> SegmentStore for Retrying<T> {
    async fn load(
        &self,
        segment_id: &str,
        partitions: &PartitionSet,
    ) -> StorageResult<Option<SegmentObject>> {
        self.policy
            .run(StorageError::is_retryable, || {
                self.inner.load(segment_id, partitions)
            })
            .await
    }
}

#[async_trait]
impl<T: SegmentDurationIndex> SegmentDurationIndex for Retrying<T> {
    async fn load_top(
        &self,
        partitions: &PartitionSet,
        query: &TraceBriefQuery,
        segment_ids: Option<&[String]>,
    ) -> StorageResult<TraceBrief> {
        self.policy
            .run(StorageError::is_retryable, || {
                self.inner.load_top(partitions, query, segment_ids)
            })
            .await
    }
}

#[async_trait]
impl<T: AddressCache> AddressCache for Retrying<T> {
    async fn address(&self, address_id: i32) -> StorageResult<Option<String>> {
        self.policy
            .run(StorageError::is_retryable, || self.inner.address(address_id))
            .await
    }
}

#[async_trait]
impl<T: ServiceNameCache> ServiceNameCache for Retrying<T> {
    async fn service_name(&self, service_id: i32) -> StorageResult<Option<String>> {
        self.policy
            .run(StorageError::is_retryable, || {
                self.inner.service_name(service_id)
            })
            .await
    }
}

#[async_trait]
impl<T: ApplicationCache> ApplicationCache for Retrying<T> {
    async fn application(&self, application_id: i32) -> StorageResult<Option<Application>> {
        self.policy
            .run(StorageError::is_retryable, || {
                self.inner.application(application_id)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails with the given error for the first `failures` calls
    struct Flaky {
        calls: AtomicU32,
        failures: u32,
        error: StorageError,
    }

    #[async_trait]
    impl SegmentStore for Flaky {
        async fn load(
            &self,
            _segment_id: &str,
            _partitions: &PartitionSet,
        ) -> StorageResult<Option<SegmentObject>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(Some(SegmentObject::default()))
            }
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter: 0.0,
        }
    }

    fn flaky(failures: u32, error: StorageError) -> Retrying<Flaky> {
        Retrying::new(
            Flaky {
                calls: AtomicU32::new(0),
                failures,
                error,
            },
            fast_policy(),
        )
    }

    #[tokio::test]
    async fn test_recovers_from_unavailable() {
        let store = flaky(2, StorageError::Unavailable("connection refused".into()));
        let segment = store.load("s", &PartitionSet::default()).await.unwrap();
        assert!(segment.is_some());
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = flaky(10, StorageError::Unavailable("down".into()));
        let err = store.load("s", &PartitionSet::default()).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_corrupt_segment_is_not_retried() {
        let store = flaky(
            10,
            StorageError::Corrupt {
                segment_id: "s".into(),
                reason: "truncated".into(),
            },
        );
        assert!(store.load("s", &PartitionSet::default()).await.is_err());
        assert_eq!(store.inner().calls.load(Ordering::SeqCst), 1);
    }
}
