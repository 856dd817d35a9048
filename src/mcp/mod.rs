//! MCP (Model Context Protocol) server
//!
//! Exposes knowledge base search to editors and agents over stdio.

mod server;
mod tools;
mod types;

pub use server::McpServer;
pub use tools::get_tool_definitions;
pub use types::{McpError, McpRequest, McpResponse, ToolResult};
