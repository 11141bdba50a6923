//! Core types and trait definitions for the skylabel review service.
//!
//! This crate is free of HTTP, database and image-codec dependencies. The
//! store, API and server crates depend on it; it depends on nothing of
//! theirs.

pub mod candidate;
pub mod error;
pub mod label;
pub mod link;
pub mod page;
pub mod predictions;
pub mod reclassify;
pub mod review;
pub mod store;

pub use error::{Error, Result};
