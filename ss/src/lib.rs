//! SessionStore - generic in-memory keyed record storage
//!
//! Provides an arena of records keyed by UUID with explicit per-key
//! synchronization: mutations to one key are serialized on that key's own
//! lock, while reads and writes of other keys proceed independently. There
//! is no global write lock held across a mutation, so a long-polling
//! reader of one record never stalls a writer of another.
//!
//! The store is deliberately volatile. Records live for the lifetime of
//! the owning process and are dropped with it.

mod store;

pub use store::{Record, Store, StoreError};
