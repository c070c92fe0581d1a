//! Migration Test Suite
//!
//! Schema evolution and format conversion of library data, driven through
//! the entity manager.

#[path = "../common/mod.rs"]
mod common;

mod conversion;
mod evolution;
