//! Testing utilities and mock implementations
//!
//! Lets the connection layer be exercised without a running server.

pub mod mocks;

pub use mocks::*;
