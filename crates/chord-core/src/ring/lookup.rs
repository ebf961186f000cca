//! Successor lookup (spec.md §4.5, C5).
//!
//! Grounded on `original_source/src/chord_impl.c`'s `find_successor()` and
//! `closest_preceding_node()`: the former checks whether the queried id
//! falls in this node's own `(self, successor]` arc before delegating to
//! the latter, which scans the finger table from the highest index down
//! for the closest known node that still precedes the target.

use super::identifier::in_ring;
use super::node_descriptor::NodeDescriptor;
use super::state::RingState;

/// If `id` falls in this node's own `(self, successor]` arc, this node's
/// successor is authoritative for it — no forwarding needed.
pub fn responsible_for(state: &RingState, id: u64) -> Option<NodeDescriptor> {
    let self_id = state.self_descriptor.id;
    let successor = state.successor();
    if in_ring(id, self_id, successor.id, true) {
        Some(successor)
    } else {
        None
    }
}

/// Scans the finger table from the highest index down for the node
/// preceding `id` that is itself furthest from `self` without overshooting
/// it. Falls back to `self` if no finger qualifies (spec.md §4.5: "Returns
/// `self` if none match"), matching `original_source/src/chord_impl.c:283`'s
/// `return self;` base case for a thin or just-joined finger table.
pub fn closest_preceding_node(state: &RingState, id: u64) -> NodeDescriptor {
    let self_id = state.self_descriptor.id;
    for (_, finger) in state.fingers().into_iter().rev() {
        if in_ring(finger.id, self_id, id, false) {
            return finger;
        }
    }
    state.self_descriptor
}

/// A single hop of the recursive lookup, used when this node has been
/// asked to find the successor of `id` and is not itself responsible: the
/// next node to forward to.
pub fn next_hop(state: &RingState, id: u64) -> NodeDescriptor {
    closest_preceding_node(state, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    fn nd_with_id(id: u64, port: u16) -> NodeDescriptor {
        NodeDescriptor {
            id,
            ip: Ipv4Addr::new(127, 0, 0, 1),
            port,
        }
    }

    fn state_with(self_id: u64, successor_id: u64) -> RingState {
        RingState::new(nd_with_id(self_id, 9000), nd_with_id(successor_id, 9001))
    }

    #[test]
    fn responsible_for_within_own_arc() {
        let state = state_with(10, 20);
        assert_eq!(responsible_for(&state, 15).unwrap().id, 20);
        assert_eq!(responsible_for(&state, 20).unwrap().id, 20);
    }

    #[test]
    fn not_responsible_outside_own_arc() {
        let state = state_with(10, 20);
        assert!(responsible_for(&state, 25).is_none());
        assert!(responsible_for(&state, 10).is_none());
    }

    #[test]
    fn closest_preceding_node_prefers_highest_qualifying_finger() {
        let state = state_with(0, 1000);
        state.set_finger(5, nd_with_id(100, 9100));
        state.set_finger(10, nd_with_id(400, 9400));
        state.set_finger(20, nd_with_id(900, 9900)); // not in (0, 800)
        let hop = closest_preceding_node(&state, 800);
        assert_eq!(hop.id, 400);
    }

    #[test]
    fn closest_preceding_node_falls_back_to_self() {
        let state = state_with(0, 1000);
        let hop = closest_preceding_node(&state, 800);
        assert_eq!(hop.id, 0);
    }
}
