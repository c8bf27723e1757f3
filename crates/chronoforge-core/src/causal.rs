//! Vector clocks: the causal ordering primitive for the event store.
//!
//! A [`VectorClock`] maps logical node names to monotonically non-decreasing
//! counters. Comparing two clocks yields a partial order -- two events may be
//! [`CausalOrder::Concurrent`], which is a distinct outcome from
//! [`CausalOrder::Equal`] and must never be collapsed into it by callers.
//!
//! Clocks serialize to and from a plain node-to-counter mapping, which is the
//! representation used on the wire and in the database.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Result of comparing two vector clocks.
///
/// The comparison is a partial order: [`CausalOrder::Concurrent`] means
/// neither clock causally precedes the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CausalOrder {
    /// Every counter is less than or equal, and at least one is strictly less.
    Less,
    /// Every counter is greater than or equal, and at least one is strictly greater.
    Greater,
    /// All counters are equal across the union of nodes.
    Equal,
    /// Some counters are less and some are greater: independent writes.
    Concurrent,
}

impl CausalOrder {
    /// The classification seen from the other clock's perspective.
    ///
    /// `a.order(b)` and `b.order(a)` are always mirrors of one another:
    /// `Less` flips to `Greater` and vice versa, while `Equal` and
    /// `Concurrent` are symmetric.
    pub const fn mirror(self) -> Self {
        match self {
            Self::Less => Self::Greater,
            Self::Greater => Self::Less,
            other => other,
        }
    }
}

/// Per-node counter set capturing the causal history observed by a writer.
///
/// Absent nodes are treated as counter zero. Counters only ever move forward
/// along a causal chain: [`VectorClock::tick`] increments and
/// [`VectorClock::join`] takes the element-wise maximum.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    counters: BTreeMap<String, u64>,
}

impl VectorClock {
    /// Create an empty clock (all counters zero).
    pub const fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
        }
    }

    /// Increment the counter for `node` by one. Chainable.
    pub fn tick(&mut self, node: &str) -> &mut Self {
        let counter = self.counters.entry(node.to_owned()).or_insert(0);
        *counter = counter.saturating_add(1);
        self
    }

    /// Return the counter for `node`, or zero if the node is unknown.
    pub fn get(&self, node: &str) -> u64 {
        self.counters.get(node).copied().unwrap_or(0)
    }

    /// Advance this clock to the element-wise maximum of itself and `other`,
    /// in place.
    ///
    /// After joining, this clock dominates everything either clock knew.
    pub fn join(&mut self, other: &Self) {
        for (node, &counter) in &other.counters {
            let entry = self.counters.entry(node.clone()).or_insert(0);
            *entry = (*entry).max(counter);
        }
    }

    /// Classify this clock against `other` over the union of their nodes.
    ///
    /// Runs in O(number of distinct nodes). All inputs are total; there is
    /// no error case.
    pub fn order(&self, other: &Self) -> CausalOrder {
        let mut less = false;
        let mut more = false;

        for node in self.counters.keys().chain(other.counters.keys()) {
            let a = self.get(node);
            let b = other.get(node);
            less |= a < b;
            more |= a > b;
            if less && more {
                return CausalOrder::Concurrent;
            }
        }

        match (less, more) {
            (false, true) => CausalOrder::Greater,
            (true, false) => CausalOrder::Less,
            _ => CausalOrder::Equal,
        }
    }

    /// The lexicographically greatest node name participating in this clock,
    /// or `None` for an empty clock.
    ///
    /// Used by the projector's deterministic tie-break for concurrent writes.
    pub fn max_node(&self) -> Option<&str> {
        self.counters.keys().next_back().map(String::as_str)
    }

    /// Whether no node has ever ticked this clock.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }
}

impl From<BTreeMap<String, u64>> for VectorClock {
    fn from(counters: BTreeMap<String, u64>) -> Self {
        Self { counters }
    }
}

impl From<VectorClock> for BTreeMap<String, u64> {
    fn from(clock: VectorClock) -> Self {
        clock.counters
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn clock(entries: &[(&str, u64)]) -> VectorClock {
        let mut counters = BTreeMap::new();
        for &(node, c) in entries {
            counters.insert(node.to_owned(), c);
        }
        VectorClock::from(counters)
    }

    #[test]
    fn tick_increments_and_chains() {
        let mut vc = VectorClock::new();
        vc.tick("n1").tick("n1").tick("n2");
        assert_eq!(vc.get("n1"), 2);
        assert_eq!(vc.get("n2"), 1);
        assert_eq!(vc.get("n3"), 0);
    }

    #[test]
    fn order_equal_for_empty_clocks() {
        let a = VectorClock::new();
        let b = VectorClock::new();
        assert_eq!(a.order(&b), CausalOrder::Equal);
    }

    #[test]
    fn order_classifies_less_and_greater() {
        let a = clock(&[("n1", 1)]);
        let b = clock(&[("n1", 2)]);
        assert_eq!(a.order(&b), CausalOrder::Less);
        assert_eq!(b.order(&a), CausalOrder::Greater);
    }

    #[test]
    fn order_detects_concurrency() {
        let a = clock(&[("n1", 1)]);
        let b = clock(&[("n2", 1)]);
        assert_eq!(a.order(&b), CausalOrder::Concurrent);
        assert_eq!(b.order(&a), CausalOrder::Concurrent);
    }

    #[test]
    fn order_treats_absent_nodes_as_zero() {
        let a = clock(&[("n1", 1), ("n2", 1)]);
        let b = clock(&[("n1", 1)]);
        assert_eq!(a.order(&b), CausalOrder::Greater);
        assert_eq!(b.order(&a), CausalOrder::Less);
    }

    #[test]
    fn order_is_a_mirror() {
        let cases = [
            (clock(&[("n1", 1)]), clock(&[("n1", 2)])),
            (clock(&[("n1", 1)]), clock(&[("n2", 1)])),
            (clock(&[("n1", 3), ("n2", 1)]), clock(&[("n1", 3), ("n2", 1)])),
            (clock(&[("n1", 2), ("n2", 1)]), clock(&[("n1", 1), ("n2", 2)])),
        ];
        for (a, b) in cases {
            assert_eq!(a.order(&b).mirror(), b.order(&a));
        }
    }

    #[test]
    fn join_takes_element_wise_max() {
        let mut a = clock(&[("n1", 2), ("n2", 1)]);
        let b = clock(&[("n1", 1), ("n2", 3), ("n3", 1)]);
        a.join(&b);
        assert_eq!(a, clock(&[("n1", 2), ("n2", 3), ("n3", 1)]));
    }

    #[test]
    fn join_is_idempotent() {
        let mut a = clock(&[("n1", 2)]);
        let b = clock(&[("n2", 3)]);
        a.join(&b);
        let once = a.clone();
        a.join(&b);
        assert_eq!(a, once);
    }

    #[test]
    fn join_is_commutative() {
        let a = clock(&[("n1", 2), ("n2", 1)]);
        let b = clock(&[("n2", 3), ("n3", 1)]);

        let mut ab = a.clone();
        ab.join(&b);
        let mut ba = b.clone();
        ba.join(&a);
        assert_eq!(ab, ba);
    }

    #[test]
    fn joined_clock_dominates_both_inputs() {
        let a = clock(&[("n1", 2)]);
        let b = clock(&[("n2", 3)]);
        let mut joined = a.clone();
        joined.join(&b);
        assert!(matches!(
            joined.order(&a),
            CausalOrder::Greater | CausalOrder::Equal
        ));
        assert!(matches!(
            joined.order(&b),
            CausalOrder::Greater | CausalOrder::Equal
        ));
    }

    #[test]
    fn max_node_is_lexicographic() {
        assert_eq!(clock(&[("n1", 1), ("n2", 1)]).max_node(), Some("n2"));
        assert_eq!(clock(&[("alpha", 5), ("beta", 1)]).max_node(), Some("beta"));
        assert_eq!(VectorClock::new().max_node(), None);
    }

    #[test]
    fn serde_round_trips_as_plain_mapping() {
        let vc = clock(&[("n1", 2), ("n2", 1)]);
        let json = serde_json::to_string(&vc).unwrap();
        assert_eq!(json, r#"{"n1":2,"n2":1}"#);
        let back: VectorClock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, vc);
    }
}
