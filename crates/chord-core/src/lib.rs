//! Ring-membership and lookup state machine for a single Chord DHT node.
//!
//! `ring` holds the protocol implementation; [`ring::Node`] is the crate's
//! main entry point, exposing `create`/`join` and a client-facing `lookup`.
//! Layout mirrors the teacher's library: a thin `lib.rs` re-exporting from
//! purpose-named submodules rather than one flat file.

pub mod error;
pub mod ring;

pub use error::{ChordError, Result};
pub use ring::{Config, Node, NodeDescriptor};

/// Number of bits in the identifier space (spec.md §3).
pub const ID_BITS: u32 = ring::identifier::M;

/// Wire protocol version (spec.md §4.2).
pub const PROTOCOL_VERSION: u16 = ring::protocol::VERSION;
