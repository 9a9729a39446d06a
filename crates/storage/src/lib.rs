//! Durable store implementations.
//!
//! [`S3Store`] writes to an S3 (or S3-compatible) bucket and is what the
//! server uses in production. [`MemoryStore`] keeps objects in a map and
//! backs the test suites and the `STORAGE_BACKEND=memory` mode.

pub mod memory;
pub mod s3;

pub use memory::MemoryStore;
pub use s3::{S3Config, S3Store};
