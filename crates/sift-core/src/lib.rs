//! Core types and trait definitions for the sift keyword index.
//!
//! This crate has no HTTP, queue or database dependencies.
//! It owns the domain model, the store abstraction, and the two pure pieces
//! of the pipeline: reconciliation of extraction batches on the write path
//! and query normalization plus ranking on the read path.

pub mod error;
pub mod normalize;
pub mod page;
pub mod rank;
pub mod reconcile;
pub mod record;
pub mod store;

pub use error::{BoxError, Error, Result, StoreError};
