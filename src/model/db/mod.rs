//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//! - Image blobs are serialised as binary data.

pub mod ballot;
pub mod candidate;
pub mod election;
pub mod results;
pub mod voter;
