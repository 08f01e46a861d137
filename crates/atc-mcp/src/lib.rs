//! atc-mcp library crate.
//!
//! Serves the team coordinator as an MCP tool server: stdio framing, the
//! JSON-RPC loop, tool definitions and their dispatch onto
//! `agent-team-coord-core`. Exposed as a library for integration testing.

pub mod cli;
pub mod commands;
pub mod coordinator;
pub mod framing;
pub mod server;
pub mod tools;

pub use coordinator::{Coordinator, ToolError};
pub use server::McpServer;
