//! Model Context Protocol (MCP) server handling and JSON-RPC implementations
//!
//! Provides protocol-level specifics surrounding JSON-RPC validation, negotiation,
//! formatting and routing, plus the stdio transport.

pub mod rpc;
pub mod server;
pub mod stdio;
