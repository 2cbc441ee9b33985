//! HTTP transport for the Model Context Protocol
//!
//! Routes `/mcp` plus the public health and discovery endpoints.

pub mod handlers;
