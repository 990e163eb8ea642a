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

//! Span enrichment: raw segment records to display-ready spans
//!
//! Dictionary fields follow the producers' convention: an id of zero means
//! the literal string on the record is authoritative, anything else is looked
//! up. A lookup that misses or fails falls back to the raw value.

use crate::collaborators::Directory;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::collections::{HashMap, HashSet};
use tracestack_core::{
    AssemblyWarning, Bulkhead, KeyValue, LogEntity, Reference, SegmentObject, Span, SpanObject,
};
use tracestack_storage::StorageResult;
use tracing::{debug, warn};

/// A fetched segment waiting to be turned into spans
#[derive(Debug, Clone)]
pub struct FetchedSegment {
    pub segment_id: String,
    pub segment: SegmentObject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum LookupKind {
    Address,
    ServiceName,
    Application,
}

impl LookupKind {
    fn dependency(&self) -> &'static str {
        match self {
            LookupKind::Address => "address cache",
            LookupKind::ServiceName => "service name cache",
            LookupKind::Application => "application cache",
        }
    }
}

type Lookup = (LookupKind, i32, StorageResult<Option<String>>);

/// Display names resolved for one trace
#[derive(Debug, Default)]
pub struct ResolvedNames {
    addresses: HashMap<i32, String>,
    service_names: HashMap<i32, String>,
    application_codes: HashMap<i32, String>,
}

impl ResolvedNames {
    fn slot(&mut self, kind: LookupKind) -> &mut HashMap<i32, String> {
        match kind {
            LookupKind::Address => &mut self.addresses,
            LookupKind::ServiceName => &mut self.service_names,
            LookupKind::Application => &mut self.application_codes,
        }
    }
}

/// Directory lookups for one trace, started segment by segment as the
/// segments arrive. Each distinct non-zero id is looked up once and every
/// lookup holds a bulkhead permit while it runs.
pub struct NameResolver<'a> {
    directory: &'a Directory,
    bulkhead: &'a Bulkhead,
    requested: HashSet<(LookupKind, i32)>,
    pending: FuturesUnordered<BoxFuture<'a, Lookup>>,
    names: ResolvedNames,
    warnings: Vec<AssemblyWarning>,
}

impl<'a> NameResolver<'a> {
    pub fn new(directory: &'a Directory, bulkhead: &'a Bulkhead) -> Self {
        Self {
            directory,
            bulkhead,
            requested: HashSet::new(),
            pending: FuturesUnordered::new(),
            names: ResolvedNames::default(),
            warnings: Vec::new(),
        }
    }

    /// Start lookups for the ids of `segment` not requested before
    pub fn request(&mut self, segment: &SegmentObject) {
        if segment.application_id != 0 {
            self.start(LookupKind::Application, segment.application_id);
        }
        for span in &segment.spans {
            if span.peer_id != 0 {
                self.start(LookupKind::Address, span.peer_id);
            }
            if span.operation_name_id != 0 {
                self.start(LookupKind::ServiceName, span.operation_name_id);
            }
        }
    }

    fn start(&mut self, kind: LookupKind, id: i32) {
        if !self.requested.insert((kind, id)) {
            return;
        }
        let directory = self.directory;
        let bulkhead = self.bulkhead;
        self.pending.push(
            async move {
                let _permit = bulkhead.acquire().await.ok();
                let result = match kind {
                    LookupKind::Address => directory.addresses.address(id).await,
                    LookupKind::ServiceName => directory.service_names.service_name(id).await,
                    LookupKind::Application => directory
                        .applications
                        .application(id)
                        .await
                        .map(|app| app.map(|app| app.application_code)),
                };
                (kind, id, result)
            }
            .boxed(),
        );
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Wait for one outstanding lookup and record it. Returns false when
    /// nothing was outstanding. Cancel safe.
    pub async fn settle_one(&mut self) -> bool {
        match self.pending.next().await {
            Some((kind, id, result)) => {
                self.record(kind, id, result);
                true
            }
            None => false,
        }
    }

    /// Wait for every outstanding lookup
    pub async fn finish(mut self) -> (ResolvedNames, Vec<AssemblyWarning>) {
        while self.settle_one().await {}
        (self.names, self.warnings)
    }

    fn record(&mut self, kind: LookupKind, id: i32, result: StorageResult<Option<String>>) {
        let dependency = kind.dependency();
        match result {
            Ok(Some(name)) => {
                self.names.slot(kind).insert(id, name);
            }
            Ok(None) => debug!(dependency, id, "Directory miss, keeping raw value"),
            Err(e) => {
                warn!(dependency, id, error = %e, "Directory lookup failed, keeping raw value");
                self.warnings.push(AssemblyWarning::DependencyUnavailable {
                    dependency: dependency.to_string(),
                    reason: format!("id {}: {}", id, e),
                });
            }
        }
    }
}

pub struct Enricher<'a> {
    directory: &'a Directory,
    bulkhead: &'a Bulkhead,
}

impl<'a> Enricher<'a> {
    pub fn new(directory: &'a Directory, bulkhead: &'a Bulkhead) -> Self {
        Self {
            directory,
            bulkhead,
        }
    }

    /// Resolve names for `segments`, then convert them.
    pub async fn enrich(
        &self,
        trace_id: &str,
        segments: &[FetchedSegment],
        warnings: &mut Vec<AssemblyWarning>,
    ) -> Vec<Span> {
        let mut resolver = NameResolver::new(self.directory, self.bulkhead);
        for fetched in segments {
            resolver.request(&fetched.segment);
        }
        let (names, lookup_warnings) = resolver.finish().await;
        warnings.extend(lookup_warnings);
        self.convert(trace_id, segments, &names, warnings)
    }

    /// Convert every span of `segments`, in segment then span order.
    pub fn convert(
        &self,
        trace_id: &str,
        segments: &[FetchedSegment],
        names: &ResolvedNames,
        warnings: &mut Vec<AssemblyWarning>,
    ) -> Vec<Span> {
        let mut spans = Vec::with_capacity(segments.iter().map(|s| s.segment.spans.len()).sum());
        for fetched in segments {
            let application_code = names
                .application_codes
                .get(&fetched.segment.application_id)
                .cloned()
                .unwrap_or_else(|| fetched.segment.application_id.to_string());

            for raw in &fetched.segment.spans {
                let span = self.to_span(
                    trace_id,
                    &fetched.segment_id,
                    &application_code,
                    raw,
                    names,
                    warnings,
                );
                spans.push(span);
            }
        }
        spans
    }

    fn to_span(
        &self,
        trace_id: &str,
        segment_id: &str,
        application_code: &str,
        raw: &SpanObject,
        names: &ResolvedNames,
        warnings: &mut Vec<AssemblyWarning>,
    ) -> Span {
        let mut span = Span::new(trace_id, segment_id, raw.span_id, raw.parent_span_id);
        span.start_time = raw.start_time;
        span.end_time = raw.end_time;
        span.is_error = raw.is_error;
        span.layer = raw.span_layer.name().to_string();
        span.span_type = raw.span_type.name().to_string();
        span.application_code = application_code.to_string();

        span.peer = resolve_or_raw(raw.peer_id, &raw.peer, &names.addresses);
        span.operation_name =
            resolve_or_raw(raw.operation_name_id, &raw.operation_name, &names.service_names);
        span.component = if raw.component_id == 0 {
            raw.component.clone()
        } else {
            self.directory
                .components
                .component_name(raw.component_id)
                .unwrap_or_else(|| raw.component.clone())
        };

        for reference in &raw.refs {
            match reference.parent_trace_segment_id.to_segment_id() {
                Some(parent_segment_id) => span.refs.push(Reference {
                    ref_type: reference.ref_type,
                    trace_id: trace_id.to_string(),
                    parent_segment_id,
                    parent_span_id: reference.parent_span_id,
                }),
                None => {
                    warn!(
                        segment_id = %segment_id,
                        span_id = raw.span_id,
                        "Reference has no parent segment id parts, ignoring it"
                    );
                    warnings.push(AssemblyWarning::MalformedReference {
                        segment_id: segment_id.to_string(),
                        span_id: raw.span_id,
                    });
                }
            }
        }

        span.tags = raw
            .tags
            .iter()
            .map(|t| KeyValue::new(t.key.clone(), t.value.clone()))
            .collect();
        span.logs = raw
            .logs
            .iter()
            .map(|log| LogEntity {
                time: log.time,
                data: log
                    .data
                    .iter()
                    .map(|d| KeyValue::new(d.key.clone(), d.value.clone()))
                    .collect(),
            })
            .collect();

        span
    }
}

fn resolve_or_raw(id: i32, raw: &str, resolved: &HashMap<i32, String>) -> String {
    if id == 0 {
        return raw.to_string();
    }
    resolved.get(&id).cloned().unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tracestack_core::{
        KeyWithStringValue, LogMessage, RefType, SpanLayer, SpanType, TraceSegmentReference,
        UniqueId,
    };
    use tracestack_storage::{
        AddressCache, Application, ApplicationCache, ComponentCatalog, MemoryDirectory,
        ServiceNameCache, StorageError,
    };

    fn directory() -> Directory {
        Directory::shared(Arc::new(
            MemoryDirectory::new()
                .with_address(7, "10.0.0.7:3306")
                .with_service_name(11, "/order/create")
                .with_application(2, "order-service")
                .with_component(5, "Mysql"),
        ))
    }

    fn segment(spans: Vec<SpanObject>) -> FetchedSegment {
        FetchedSegment {
            segment_id: "1.2.3".into(),
            segment: SegmentObject {
                application_id: 2,
                spans,
            },
        }
    }

    #[tokio::test]
    async fn test_ids_are_resolved() {
        let raw = SpanObject {
            span_id: 1,
            parent_span_id: 0,
            peer_id: 7,
            operation_name_id: 11,
            component_id: 5,
            span_layer: SpanLayer::Database,
            span_type: SpanType::Exit,
            ..Default::default()
        };
        let directory = directory();
        let bulkhead = Bulkhead::new("test", 4);
        let mut warnings = Vec::new();
        let spans = Enricher::new(&directory, &bulkhead)
            .enrich("t", &[segment(vec![raw])], &mut warnings)
            .await;

        let span = &spans[0];
        assert_eq!(span.peer, "10.0.0.7:3306");
        assert_eq!(span.operation_name, "/order/create");
        assert_eq!(span.application_code, "order-service");
        assert_eq!(span.component, "Mysql");
        assert_eq!(span.layer, "Database");
        assert_eq!(span.span_type, "Exit");
        assert_eq!(span.segment_span_id, "1.2.3S1");
        assert_eq!(span.segment_parent_span_id, "1.2.3S0");
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_zero_ids_use_literals_and_misses_keep_raw() {
        let literal = SpanObject {
            span_id: 0,
            parent_span_id: -1,
            peer: "redis:6379".into(),
            operation_name: "GET".into(),
            component: "Jedis".into(),
            ..Default::default()
        };
        let missing = SpanObject {
            span_id: 1,
            parent_span_id: 0,
            peer_id: 99,
            peer: "raw-peer".into(),
            operation_name_id: 98,
            operation_name: "raw-op".into(),
            component_id: 97,
            component: "raw-component".into(),
            ..Default::default()
        };
        let directory = directory();
        let bulkhead = Bulkhead::new("test", 4);
        let mut warnings = Vec::new();
        let spans = Enricher::new(&directory, &bulkhead)
            .enrich("t", &[segment(vec![literal, missing])], &mut warnings)
            .await;

        assert_eq!(spans[0].peer, "redis:6379");
        assert_eq!(spans[0].operation_name, "GET");
        assert_eq!(spans[0].component, "Jedis");
        assert_eq!(spans[1].peer, "raw-peer");
        assert_eq!(spans[1].operation_name, "raw-op");
        assert_eq!(spans[1].component, "raw-component");
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_references_tags_and_logs() {
        let raw = SpanObject {
            span_id: 0,
            parent_span_id: -1,
            refs: vec![
                TraceSegmentReference {
                    ref_type: RefType::CrossProcess,
                    parent_trace_segment_id: UniqueId::new(vec![4, 5, 6]),
                    parent_span_id: 2,
                },
                TraceSegmentReference {
                    ref_type: RefType::CrossThread,
                    parent_trace_segment_id: UniqueId::default(),
                    parent_span_id: 3,
                },
            ],
            tags: vec![KeyWithStringValue {
                key: "db.statement".into(),
                value: "select 1".into(),
            }],
            logs: vec![LogMessage {
                time: 42,
                data: vec![KeyWithStringValue {
                    key: "event".into(),
                    value: "error".into(),
                }],
            }],
            ..Default::default()
        };
        let directory = directory();
        let bulkhead = Bulkhead::new("test", 4);
        let mut warnings = Vec::new();
        let spans = Enricher::new(&directory, &bulkhead)
            .enrich("t", &[segment(vec![raw])], &mut warnings)
            .await;

        let span = &spans[0];
        assert_eq!(span.refs.len(), 1);
        assert_eq!(span.refs[0].parent_segment_id, "4.5.6");
        assert_eq!(span.refs[0].parent_segment_span_id(), "4.5.6S2");
        assert_eq!(span.tags, vec![KeyValue::new("db.statement", "select 1")]);
        assert_eq!(span.logs[0].time, 42);
        assert_eq!(span.logs[0].data[0].value, "error");
        assert_eq!(
            warnings,
            vec![AssemblyWarning::MalformedReference {
                segment_id: "1.2.3".into(),
                span_id: 0,
            }]
        );
    }

    struct Unreachable;

    #[async_trait]
    impl AddressCache for Unreachable {
        async fn address(&self, _id: i32) -> StorageResult<Option<String>> {
            Err(StorageError::Unavailable("cache down".into()))
        }
    }

    #[async_trait]
    impl ServiceNameCache for Unreachable {
        async fn service_name(&self, _id: i32) -> StorageResult<Option<String>> {
            Err(StorageError::Unavailable("cache down".into()))
        }
    }

    #[async_trait]
    impl ApplicationCache for Unreachable {
        async fn application(&self, _id: i32) -> StorageResult<Option<Application>> {
            Err(StorageError::Unavailable("cache down".into()))
        }
    }

    impl ComponentCatalog for Unreachable {
        fn component_name(&self, _id: i32) -> Option<String> {
            None
        }
    }

    #[tokio::test]
    async fn test_zero_application_id_is_not_looked_up() {
        let raw = SpanObject {
            span_id: 0,
            parent_span_id: -1,
            ..Default::default()
        };
        let fetched = FetchedSegment {
            segment_id: "1.2.3".into(),
            segment: SegmentObject {
                application_id: 0,
                spans: vec![raw],
            },
        };
        // any lookup against this directory would add a warning
        let directory = Directory::shared(Arc::new(Unreachable));
        let bulkhead = Bulkhead::new("test", 4);
        let mut warnings = Vec::new();
        let spans = Enricher::new(&directory, &bulkhead)
            .enrich("t", &[fetched], &mut warnings)
            .await;

        assert_eq!(spans[0].application_code, "0");
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_directory_degrades() {
        let raw = SpanObject {
            span_id: 0,
            parent_span_id: -1,
            peer_id: 7,
            peer: "raw".into(),
            ..Default::default()
        };
        let directory = Directory::shared(Arc::new(Unreachable));
        let bulkhead = Bulkhead::new("test", 4);
        let mut warnings = Vec::new();
        let spans = Enricher::new(&directory, &bulkhead)
            .enrich("t", &[segment(vec![raw])], &mut warnings)
            .await;

        assert_eq!(spans[0].peer, "raw");
        assert_eq!(spans[0].application_code, "2");
        // one failed address lookup and one failed application lookup
        assert_eq!(warnings.len(), 2);
        assert!(warnings
            .iter()
            .all(|w| matches!(w, AssemblyWarning::DependencyUnavailable { .. })));
    }
}
