//! Property tests for the invariants spec §8 calls out explicitly: Timeline
//! capacity/ordering, the PCIe bandwidth estimator's monotonicity in width,
//! and JSON string escaping being a right-inverse of parsing. Complements
//! the example-based unit tests next to each implementation rather than
//! replacing them.

use proptest::prelude::*;

use ai_z::core::gpu_telemetry::pcie_estimated_cap_mbps;
use ai_z::core::Timeline;

proptest! {
    /// For any capacity and any push sequence, size never exceeds capacity
    /// and `values().len() == size()`.
    #[test]
    fn timeline_size_never_exceeds_capacity(
        capacity in 0usize..64,
        pushes in prop::collection::vec(-1000.0f64..1000.0, 0..200),
    ) {
        let mut t = Timeline::new(capacity);
        for v in &pushes {
            t.push(*v);
        }
        prop_assert!(t.size() <= capacity.max(0));
        prop_assert!(t.size() <= t.capacity());
        prop_assert_eq!(t.values().len(), t.size());
    }

    /// The values returned are always exactly the last `size()` pushes, in
    /// insertion order.
    #[test]
    fn timeline_values_are_the_last_n_pushes_in_order(
        capacity in 1usize..32,
        pushes in prop::collection::vec(-1000.0f64..1000.0, 0..200),
    ) {
        let mut t = Timeline::new(capacity);
        for v in &pushes {
            t.push(*v);
        }
        let expected: Vec<f64> = pushes
            .iter()
            .rev()
            .take(capacity)
            .rev()
            .copied()
            .collect();
        prop_assert_eq!(t.values(), expected);
    }

    /// Capacity 0 silently drops every push.
    #[test]
    fn zero_capacity_timeline_always_stays_empty(
        pushes in prop::collection::vec(-1000.0f64..1000.0, 0..50),
    ) {
        let mut t = Timeline::new(0);
        for v in &pushes {
            t.push(*v);
        }
        prop_assert_eq!(t.size(), 0);
        prop_assert!(t.values().is_empty());
    }

    /// Estimated PCIe capacity never decreases as lane width increases, for
    /// every supported generation.
    #[test]
    fn pcie_estimate_is_monotonic_in_width(
        generation in 1u32..=5,
        w1 in 1u32..32,
        w2 in 1u32..32,
    ) {
        let (lo, hi) = if w1 <= w2 { (w1, w2) } else { (w2, w1) };
        prop_assert!(pcie_estimated_cap_mbps(generation, lo) <= pcie_estimated_cap_mbps(generation, hi));
    }

    /// `serde_json`'s string escaping round-trips for any string whose only
    /// control characters are `\n`/`\t` (the spec's stated domain for this
    /// property, since arbitrary control bytes aren't valid in the unit's
    /// label/source strings anyway).
    #[test]
    fn json_string_escape_is_right_inverse_of_parse(
        s in "[ -~\\n\\t]{0,64}",
    ) {
        let encoded = serde_json::to_string(&s).unwrap();
        let decoded: String = serde_json::from_str(&encoded).unwrap();
        prop_assert_eq!(decoded, s);
    }
}
