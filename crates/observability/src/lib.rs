//! Tracing/logging setup shared by the binary and the test suites.

pub mod subscriber;

pub use subscriber::{init, init_for_tests};
