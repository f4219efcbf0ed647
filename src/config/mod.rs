//! Configuration helpers for the command line.

pub mod timestamp;

pub use timestamp::parse_start_ts;
