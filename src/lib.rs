//! picotool MCP Server Library
//!
//! Exposes the Raspberry Pi `picotool` command-line utility as MCP tools:
//! typed tool arguments are turned into picotool command lines, run as child
//! processes, and their output is returned to the client.

pub mod config;
pub mod logging;
pub mod mcp;
pub mod picotool;
