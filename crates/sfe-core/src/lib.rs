//! Core types and trait definitions for the SFE backend.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Role rules, status transitions, ABC classification, GPS math and dashboard
//! aggregation all live here as plain functions over plain data.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod analytics;
pub mod customer;
pub mod error;
pub mod geo;
pub mod notification;
pub mod org;
pub mod patch;
pub mod store;
pub mod visit;

pub use error::{Error, Result};
