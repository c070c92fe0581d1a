//! Testing utilities for file-backed storage
//!
//! - **Corruption**: damage a data file the way a crash or bad disk would,
//!   then check that loading reports corruption instead of returning
//!   partial data.
//!
//! # Example
//!
//! ```ignore
//! use nousdata_storage::testing::FileCorruptionTester;
//!
//! let tester = FileCorruptionTester::new("data/author.json");
//! tester.truncate_tail(20)?;
//! let verification = tester.verify_load(&adapter);
//! assert!(verification.reported_corruption);
//! ```

mod corruption;

pub use corruption::{FileCorruptionTester, GarbageResult, LoadVerification, TruncationResult};
