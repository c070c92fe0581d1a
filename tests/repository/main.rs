//! Repository Test Suite
//!
//! The repository contract exercised through the library entities on every
//! backend.

#[path = "../common/mod.rs"]
mod common;

mod concurrency;
mod contract;
mod queries;
mod scenarios;
mod uniqueness;
