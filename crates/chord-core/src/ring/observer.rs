//! Host-injected diagnostic callbacks (SPEC_FULL.md §2, C9).
//!
//! Grounded on the teacher's `vl1::node::SystemInterface`: a trait of host
//! callbacks with default bodies, implemented by the embedding application
//! and handed to the node at construction time, kept separate from the
//! `tracing` spans this crate also emits for operational logging — an
//! embedder that wants to react to ring-membership transitions (e.g. persist
//! them, drive a metrics counter) implements this trait instead of scraping
//! log output.

use super::node_descriptor::NodeDescriptor;

/// Diagnostic hooks a host application may implement to observe this node's
/// ring-membership state machine. Every method has a no-op default, so a
/// host can override only the events it cares about.
pub trait Observer: Send + Sync {
    /// The predecessor changed: adopted via `NOTIFY`, or cleared after
    /// failing to answer `check_predecessor`.
    fn on_predecessor_changed(&self, _new: Option<NodeDescriptor>) {}

    /// `successor_list[0]` changed, whether `stabilize` adopted a better
    /// successor or failover promoted the next entry after the old one
    /// stopped responding.
    fn on_successor_changed(&self, _old: NodeDescriptor, _new: NodeDescriptor) {}

    /// `fix_fingers` refreshed `finger_table[index]`.
    fn on_finger_updated(&self, _index: usize, _node: NodeDescriptor) {}

    /// A `find_successor` lookup could not complete.
    fn on_lookup_failed(&self, _id: u64) {}
}

/// An [`Observer`] that does nothing; the default when a host does not
/// inject one of its own.
#[derive(Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        successor_changes: AtomicUsize,
    }

    impl Observer for CountingObserver {
        fn on_successor_changed(&self, _old: NodeDescriptor, _new: NodeDescriptor) {
            self.successor_changes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn observer_default_methods_are_callable_and_noop() {
        let observer = NoopObserver;
        observer.on_predecessor_changed(None);
        observer.on_finger_updated(0, NodeDescriptor::new(Ipv4Addr::LOCALHOST, 1));
        observer.on_lookup_failed(42);
    }

    #[test]
    fn custom_observer_overrides_receive_events() {
        let observer = CountingObserver::default();
        let a = NodeDescriptor::new(Ipv4Addr::LOCALHOST, 1);
        let b = NodeDescriptor::new(Ipv4Addr::LOCALHOST, 2);
        observer.on_successor_changed(a, b);
        assert_eq!(observer.successor_changes.load(Ordering::SeqCst), 1);
    }
}
