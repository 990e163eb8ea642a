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

//! Span hierarchy reconstruction
//!
//! Turns the flat span set of a trace into a depth-first ordered forest:
//! 1. Effective parent: the last reference of a span, if any, otherwise its
//!    in-segment parent.
//! 2. Roots: spans whose effective parent is not in the set.
//! 3. Order: each root in discovery order followed by its subtree in
//!    pre-order, siblings in input order unless a comparator is configured.
//!
//! Children are indexed in one pass before traversal, so the whole build is
//! O(n) apart from optional sibling sorting.

use smallvec::SmallVec;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracestack_core::{SiblingOrder, Span};

/// Typical spans have a handful of children; 8 stay inline
const MAX_INLINE_CHILDREN: usize = 8;

type ChildList = SmallVec<[usize; MAX_INLINE_CHILDREN]>;

/// Orders two siblings. Must be a total order; ties keep input order.
pub type SiblingComparator = Arc<dyn Fn(&Span, &Span) -> Ordering + Send + Sync>;

#[derive(Clone, Default)]
pub struct HierarchyBuilder {
    comparator: Option<SiblingComparator>,
}

impl fmt::Debug for HierarchyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HierarchyBuilder")
            .field("custom_sibling_order", &self.comparator.is_some())
            .finish()
    }
}

impl HierarchyBuilder {
    /// Builder that keeps siblings in input order
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_order(order: SiblingOrder) -> Self {
        match order {
            SiblingOrder::Arrival => Self::new(),
            SiblingOrder::StartTime => {
                Self::with_comparator(|a: &Span, b: &Span| a.start_time.cmp(&b.start_time))
            }
        }
    }

    pub fn with_comparator<F>(comparator: F) -> Self
    where
        F: Fn(&Span, &Span) -> Ordering + Send + Sync + 'static,
    {
        Self {
            comparator: Some(Arc::new(comparator)),
        }
    }

    /// Rebuild the hierarchy. Deterministic for a given input order.
    pub fn build(&self, mut spans: Vec<Span>) -> Vec<Span> {
        if spans.is_empty() {
            return spans;
        }

        resolve_effective_parents(&mut spans);
        let roots = mark_roots(&mut spans);
        let children = self.index_children(&spans);
        let order = preorder(&spans, &roots, &children);

        if order.len() < spans.len() {
            tracing::warn!(
                total = spans.len(),
                reachable = order.len(),
                "Spans unreachable from any root (parent cycle), dropping them"
            );
        }

        let mut slots: Vec<Option<Span>> = spans.into_iter().map(Some).collect();
        order
            .into_iter()
            .filter_map(|idx| slots[idx].take())
            .collect()
    }

    /// parent segment-span id -> child indices, in input order
    fn index_children<'a>(&self, spans: &'a [Span]) -> HashMap<&'a str, ChildList> {
        let mut children: HashMap<&str, ChildList> = HashMap::with_capacity(spans.len());
        for (idx, span) in spans.iter().enumerate() {
            children
                .entry(span.segment_parent_span_id.as_str())
                .or_default()
                .push(idx);
        }

        if let Some(cmp) = &self.comparator {
            for list in children.values_mut() {
                // stable, so equal siblings keep arrival order
                list.sort_by(|&a, &b| cmp(&spans[a], &spans[b]));
            }
        }
        children
    }
}

/// Step 1: point spans with references at their cross-segment parent.
/// When several references exist the last one wins.
fn resolve_effective_parents(spans: &mut [Span]) {
    for span in spans.iter_mut() {
        span.segment_parent_span_id = match span.refs.last() {
            Some(reference) => reference.parent_segment_span_id(),
            None => span.local_parent_id(),
        };
    }
}

/// Step 2: flag spans whose parent is not another span of the set.
/// Returns root indices in input order.
fn mark_roots(spans: &mut [Span]) -> Vec<usize> {
    let mut by_id: HashMap<&str, ChildList> = HashMap::with_capacity(spans.len());
    for (idx, span) in spans.iter().enumerate() {
        by_id
            .entry(span.segment_span_id.as_str())
            .or_default()
            .push(idx);
    }

    let flags: Vec<bool> = spans
        .iter()
        .enumerate()
        .map(|(idx, span)| {
            !by_id
                .get(span.segment_parent_span_id.as_str())
                .is_some_and(|owners| owners.iter().any(|&o| o != idx))
        })
        .collect();

    let mut roots = Vec::new();
    for (idx, (span, is_root)) in spans.iter_mut().zip(flags).enumerate() {
        span.is_root = is_root;
        if is_root {
            roots.push(idx);
        }
    }
    roots
}

/// Step 3: pre-order walk from every root. Each span is emitted at most once.
fn preorder(spans: &[Span], roots: &[usize], children: &HashMap<&str, ChildList>) -> Vec<usize> {
    let mut visited = vec![false; spans.len()];
    let mut order = Vec::with_capacity(spans.len());
    let mut stack: Vec<usize> = Vec::new();

    for &root in roots {
        stack.push(root);
        while let Some(idx) = stack.pop() {
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            order.push(idx);

            if let Some(kids) = children.get(spans[idx].segment_span_id.as_str()) {
                // reversed so the first child is popped first
                stack.extend(kids.iter().rev().copied().filter(|&k| !visited[k]));
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracestack_core::{RefType, Reference};

    fn span(segment: &str, id: i32, parent: i32) -> Span {
        Span::new("t", segment, id, parent)
    }

    fn with_ref(mut span: Span, parent_segment: &str, parent_span: i32) -> Span {
        span.refs.push(Reference {
            ref_type: RefType::CrossProcess,
            trace_id: "t".into(),
            parent_segment_id: parent_segment.into(),
            parent_span_id: parent_span,
        });
        span
    }

    fn ids(spans: &[Span]) -> Vec<String> {
        spans.iter().map(|s| s.segment_span_id.clone()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(HierarchyBuilder::new().build(Vec::new()).is_empty());
    }

    #[test]
    fn test_cross_process_reference() {
        let input = vec![
            with_ref(span("S2", 0, -1), "S1", 1),
            span("S1", 0, -1),
            span("S1", 1, 0),
        ];

        let out = HierarchyBuilder::new().build(input);
        assert_eq!(ids(&out), vec!["S1S0", "S1S1", "S2S0"]);
        assert!(out[0].is_root);
        assert!(!out[1].is_root);
        assert!(!out[2].is_root);
        assert_eq!(out[2].segment_parent_span_id, "S1S1");
    }

    #[test]
    fn test_disjoint_roots_keep_input_order() {
        let out = HierarchyBuilder::new().build(vec![span("B", 0, -1), span("A", 0, -1)]);
        assert_eq!(ids(&out), vec!["BS0", "AS0"]);
        assert!(out.iter().all(|s| s.is_root));
    }

    #[test]
    fn test_siblings_follow_input_order() {
        let mut late = span("S", 1, 0);
        late.start_time = 50;
        let mut early = span("S", 2, 0);
        early.start_time = 10;
        let input = vec![span("S", 0, -1), late, early];

        let arrival = HierarchyBuilder::new().build(input.clone());
        assert_eq!(ids(&arrival), vec!["SS0", "SS1", "SS2"]);

        let by_time = HierarchyBuilder::from_order(SiblingOrder::StartTime).build(input);
        assert_eq!(ids(&by_time), vec!["SS0", "SS2", "SS1"]);
    }

    #[test]
    fn test_depth_first_not_breadth_first() {
        let input = vec![
            span("S", 0, -1),
            span("S", 1, 0),
            span("S", 2, 0),
            span("S", 3, 1),
        ];
        let out = HierarchyBuilder::new().build(input);
        assert_eq!(ids(&out), vec!["SS0", "SS1", "SS3", "SS2"]);
    }

    #[test]
    fn test_last_reference_wins() {
        let child = with_ref(with_ref(span("C", 0, -1), "A", 0), "B", 0);
        let input = vec![span("A", 0, -1), span("B", 0, -1), child];

        let out = HierarchyBuilder::new().build(input);
        assert_eq!(ids(&out), vec!["AS0", "BS0", "CS0"]);
        assert_eq!(out[2].segment_parent_span_id, "BS0");
    }

    #[test]
    fn test_missing_parent_makes_root() {
        let out = HierarchyBuilder::new().build(vec![
            with_ref(span("S2", 0, -1), "GONE", 3),
            span("S2", 1, 0),
        ]);
        assert_eq!(ids(&out), vec!["S2S0", "S2S1"]);
        assert!(out[0].is_root);
        assert!(!out[1].is_root);
    }

    #[test]
    fn test_cycle_terminates() {
        // A <-> B through references, plus an unrelated root
        let a = with_ref(span("A", 0, -1), "B", 0);
        let b = with_ref(span("B", 0, -1), "A", 0);
        let out = HierarchyBuilder::new().build(vec![a, b, span("R", 0, -1)]);
        assert_eq!(ids(&out), vec!["RS0"]);
    }

    #[test]
    fn test_self_parent_is_root() {
        let out = HierarchyBuilder::new().build(vec![span("S", 0, 0), span("S", 1, 0)]);
        assert_eq!(ids(&out), vec!["SS0", "SS1"]);
        assert!(out[0].is_root);
    }

    #[test]
    fn test_duplicate_spans_emitted_once_each() {
        let input = vec![span("S", 0, -1), span("S", 1, 0), span("S", 1, 0)];
        let out = HierarchyBuilder::new().build(input);
        assert_eq!(ids(&out), vec!["SS0", "SS1", "SS1"]);
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let input = vec![
            with_ref(span("S2", 0, -1), "S1", 1),
            span("S1", 0, -1),
            span("S1", 1, 0),
            span("X", 0, -1),
        ];
        let builder = HierarchyBuilder::new();
        let first = builder.build(input.clone());
        let second = builder.build(input);
        assert_eq!(first, second);
        assert_eq!(builder.build(first.clone()), first);
    }
}
