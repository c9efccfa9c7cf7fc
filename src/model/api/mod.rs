//! API-compatible types.
//!
//! The types in this module are serialised in an API-friendly way, e.g.:
//!
//! - IDs are serialised as hex strings.
//! - Images are serialised as base64 strings.

pub mod auth;
pub mod ballot;
pub mod candidate;
pub mod election;
pub mod id;
pub mod image;
pub mod results;
pub mod voter;
