//! Ring-membership state (spec.md §4.3, C3): predecessor, successor list,
//! and finger table, each guarded by its own lock.
//!
//! Grounded on the teacher's `vl1::node::Node` and `vl1::peer::Peer`, which
//! hold per-field `parking_lot::Mutex`/`RwLock` rather than one coarse lock
//! around the whole struct, so independent maintenance tasks (stabilize,
//! fix_fingers, check_predecessor) never block on each other.

use super::identifier::M;
use super::node_descriptor::NodeDescriptor;
use super::observer::{NoopObserver, Observer};
use parking_lot::RwLock;
use std::sync::Arc;

/// A node's view of its place in the ring.
///
/// `self_descriptor` and `instance_id` never change after construction and
/// need no lock. Every other field is mutated by exactly one maintenance
/// task under normal operation but may be read by the RPC handlers at any
/// time, hence the per-field `RwLock`.
pub struct RingState {
    pub self_descriptor: NodeDescriptor,
    /// Random per-process run identifier (teacher: `Node::instance_id`),
    /// used only for diagnostics — distinguishing two runs that happen to
    /// bind the same address after a restart, since node identity itself is
    /// derived solely from address and port.
    pub instance_id: u64,
    predecessor: RwLock<Option<NodeDescriptor>>,
    /// Index 0 is the immediate successor; `r` is the configured list
    /// length (spec.md §6's `-r` flag), `1..=r` live entries at steady
    /// state, though it may be shorter while the ring is small or just
    /// converging.
    successor_list: RwLock<Vec<NodeDescriptor>>,
    finger_table: RwLock<Vec<Option<NodeDescriptor>>>,
    /// Cursor into `finger_table` that `fix_fingers` advances round-robin
    /// (spec.md §4.6).
    next_finger: RwLock<usize>,
    /// The node this one joined through, if any; used to re-join the ring
    /// (spec.md §4.6's successor failover) if the successor list is ever
    /// exhausted.
    bootstrap: RwLock<Option<NodeDescriptor>>,
    observer: Arc<dyn Observer>,
}

impl RingState {
    /// Builds state for a freshly created or freshly joined node, with no
    /// diagnostic observer attached. The finger table starts empty (all
    /// `None`); stabilize/fix_fingers fill it in over time.
    pub fn new(self_descriptor: NodeDescriptor, successor: NodeDescriptor) -> Self {
        Self::with_observer(self_descriptor, successor, Arc::new(NoopObserver))
    }

    /// As [`Self::new`], but with a host-supplied [`Observer`] wired in
    /// from the start (SPEC_FULL.md C9).
    pub fn with_observer(
        self_descriptor: NodeDescriptor,
        successor: NodeDescriptor,
        observer: Arc<dyn Observer>,
    ) -> Self {
        Self {
            self_descriptor,
            instance_id: rand::random(),
            predecessor: RwLock::new(None),
            successor_list: RwLock::new(vec![successor]),
            finger_table: RwLock::new(vec![None; M as usize]),
            next_finger: RwLock::new(0),
            bootstrap: RwLock::new(None),
            observer,
        }
    }

    pub fn observer(&self) -> &Arc<dyn Observer> {
        &self.observer
    }

    pub fn bootstrap(&self) -> Option<NodeDescriptor> {
        *self.bootstrap.read()
    }

    pub fn set_bootstrap(&self, bootstrap: Option<NodeDescriptor>) {
        *self.bootstrap.write() = bootstrap;
    }

    pub fn predecessor(&self) -> Option<NodeDescriptor> {
        *self.predecessor.read()
    }

    pub fn set_predecessor(&self, pred: Option<NodeDescriptor>) {
        *self.predecessor.write() = pred;
        self.observer.on_predecessor_changed(pred);
    }

    /// The immediate successor: the ring is degenerate (just this node)
    /// until a successor list is set, which [`Self::new`] guarantees never
    /// happens — there is always at least one entry.
    pub fn successor(&self) -> NodeDescriptor {
        self.successor_list.read()[0]
    }

    pub fn successor_list(&self) -> Vec<NodeDescriptor> {
        self.successor_list.read().clone()
    }

    /// Replaces the successor list wholesale, truncating to `max_len`
    /// entries (spec.md §4.3: the list never grows past the configured
    /// `-r`).
    pub fn set_successor_list(&self, mut list: Vec<NodeDescriptor>, max_len: usize) {
        list.truncate(max_len.max(1));
        if list.is_empty() {
            list.push(self.self_descriptor);
        }
        let old_head = self.successor();
        let new_head = list[0];
        *self.successor_list.write() = list;
        if old_head.id != new_head.id {
            self.observer.on_successor_changed(old_head, new_head);
        }
    }

    pub fn finger(&self, i: usize) -> Option<NodeDescriptor> {
        self.finger_table.read()[i]
    }

    pub fn set_finger(&self, i: usize, nd: NodeDescriptor) {
        self.finger_table.write()[i] = Some(nd);
        self.observer.on_finger_updated(i, nd);
    }

    /// Snapshot of every populated finger entry, grouped with its table
    /// index for `closest_preceding_node` scans.
    pub fn fingers(&self) -> Vec<(usize, NodeDescriptor)> {
        self.finger_table
            .read()
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.map(|nd| (i, nd)))
            .collect()
    }

    /// Advances the `fix_fingers` round-robin cursor and returns the index
    /// to refresh next.
    pub fn next_finger_index(&self) -> usize {
        let mut cursor = self.next_finger.write();
        let i = *cursor;
        *cursor = (i + 1) % (M as usize);
        i
    }
}
