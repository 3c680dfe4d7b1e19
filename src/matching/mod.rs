//! Entity normalization and matching.
//!
//! `normalize` turns raw entity lines into comparable [`EntityEntry`]
//! values; `match_entities` tests a record's headers and text against the
//! normalized list. Both are pure — no I/O, no hidden state.

pub mod matcher;
pub mod normalize;

pub use matcher::{SearchText, match_entities};
pub use normalize::{EntityEntry, EntityKind, normalize, normalize_all};
