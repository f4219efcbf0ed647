//! Test support for the result relay
//!
//! - [`MemoryBackend`]: in-memory catalog and executor with REPLACE semantics
//! - [`MySQLContainer`]: throwaway MySQL server in docker for integration tests

pub mod container;
pub mod memory;

pub use container::MySQLContainer;
pub use memory::{MemoryBackend, MemoryRow};
