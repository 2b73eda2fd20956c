//! Lock-free concurrent hash map built on Harris–Michael ordered lists,
//! with pluggable safe memory reclamation from the `shroud` crate.
//!
//! # Highlights
//!
//! - **Lock-free everything**: insert, lookup, remove, and iteration never
//!   take a lock; a stalled thread cannot block the others.
//! - **Generic reclamation**: the map works with any `shroud::Reclaimer`;
//!   hazard pointers in production, the leaking scheme in tests.
//! - **Stable iterators**: concurrent inserts and removes never invalidate
//!   an iterator; removing the node under a cursor only costs a re-walk of
//!   one bucket.
//!
//! # Example
//!
//! ```rust
//! use shroud::HazardPointer;
//! use shroud_map::HashMap;
//!
//! let map: HashMap<u64, String, HazardPointer, 128> = HashMap::new();
//! map.insert(1, "one".to_string());
//! let (entry, inserted) = map.get_or_insert_with(2, || "two".to_string());
//! assert!(inserted);
//! assert_eq!(entry.value().map(|(k, _)| *k), Some(2));
//! ```

#![warn(missing_docs)]

mod hashmap;

pub use hashmap::{HashMap, Iter};
