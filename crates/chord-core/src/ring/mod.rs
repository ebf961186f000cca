//! Ring-membership and lookup state machine (spec.md §4).
//!
//! Submodules follow the teacher's `vl1` layout: one file per concern
//! (identifier arithmetic, wire codec, mutable state, transport, lookup,
//! maintenance, handlers), tied together by [`node::Node`].

pub mod codec;
pub mod handlers;
pub mod identifier;
pub mod lookup;
pub mod maintenance;
pub mod node;
pub mod node_descriptor;
pub mod observer;
pub mod protocol;
pub mod state;
pub mod transport;

pub use node::{Config, Node};
pub use node_descriptor::NodeDescriptor;
pub use observer::{NoopObserver, Observer};
