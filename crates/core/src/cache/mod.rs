//! Disk-backed caches for offline reading.
//!
//! Two independent stores share this module but not a keyspace:
//!
//! - Snapshot cache: one HTML file per derived article key, written
//!   atomically, no expiry.
//! - Image store: a bounded in-memory tier over an unbounded disk tier,
//!   keyed by source URL.
//!
//! Absence of an entry is a normal `None`, never an error.

pub mod images;
pub mod snapshots;

pub use images::ImageStore;
pub use snapshots::SnapshotCache;
