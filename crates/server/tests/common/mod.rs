//! Common test utilities and fixtures.

pub mod server;

#[allow(unused_imports)]
pub use server::*;
