//! Marketplace REST backend access
//!
//! Translates logical queries into v1/v2 backend requests and executes them
//! with the session token taken from the `up` CLI profile.

pub mod client;
pub mod query;
pub mod types;
