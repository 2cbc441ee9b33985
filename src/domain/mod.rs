//! Marketplace tools and resources exposed over the MCP protocol
//!
//! Argument validation, dispatch onto the marketplace client and Markdown
//! rendering of the results.

pub mod format;
pub mod resources;
pub mod tools;
pub mod utils;
