//! MCP (Model Context Protocol) Server Implementation
//!
//! A small MCP server built directly on Tokio and Serde (no external SDK) that
//! exposes picotool operations as tools.
//!
//! # Architecture
//!
//! 1. **Protocol Layer** (`protocol`): JSON-RPC 2.0 message types
//! 2. **Transport Layer** (`transport`): line-delimited stdio framing
//! 3. **Tool Catalog** (`tools`): tool names, descriptions and input schemas
//! 4. **Server Layer** (`server`): request dispatch into the picotool engine

// Protocol layer: JSON-RPC 2.0 message types
pub mod protocol;

// Transport layer: stdio framing
pub mod transport;

// Static tool descriptions and schemas
pub mod tools;

// Server layer: request dispatch
pub mod server;

pub use protocol::{
    CallToolResult, Content, McpError, McpMethod, McpRequest, McpResponse, ServerInfo, Tool,
    ToolCallParams,
};
pub use server::McpServer;
pub use transport::{stdio, Incoming, MessageReader, MessageWriter};
