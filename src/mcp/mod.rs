//! Model Context Protocol (MCP) implementation.
//!
//! JSON-RPC message handling, the stdio transport, and tool registration.
//!
//! # Architecture
//!
//! - `protocol` - Core MCP types and message definitions
//! - `server` - Request dispatch and per-request cancellation
//! - `transport` - Newline-delimited stdio transport
//! - `handler` - Tool registry and result helpers

pub mod handler;
pub mod protocol;
pub mod server;
pub mod transport;

pub use handler::McpHandler;
pub use protocol::*;
pub use server::McpServer;
pub use transport::{StdioTransport, Transport};
