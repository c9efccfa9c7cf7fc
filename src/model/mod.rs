//! Data types, split by where they live.
//!
//! - `api`: request and response bodies.
//! - `common`: types shared between the API and the database.
//! - `db`: documents as stored.
//! - `mongodb`: database plumbing.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
