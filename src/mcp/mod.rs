//! MCP (Model Context Protocol) servers as extra tool sources
//!
//! Servers listed in `Config::mcp_servers` are started over stdio at
//! startup; each tool they advertise is registered next to the built-in
//! tools and called through the same registry.

pub mod client;
pub mod tool;

pub use client::{McpConnection, McpToolInfo};
pub use tool::{register_servers, McpTool};
