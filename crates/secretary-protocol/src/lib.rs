//! Tool-calling protocol spoken by the secretary server.
//!
//! JSON-RPC 2.0 messages, one per line, over a byte stream (stdin/stdout).
//!
//! # Methods
//!
//! - `initialize`: server name, version and capabilities
//! - `notifications/initialized`: acknowledged silently
//! - `ping`: empty result
//! - `tools/list`: [`ListToolsResult`]
//! - `tools/call`: [`CallToolParams`] in, [`CallToolResult`] out
//!
//! # Example
//!
//! ```rust
//! use secretary_protocol::{Request, RequestId, decode_message, encode_message};
//!
//! let request = Request::new(RequestId::Number(1), "ping", None);
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Request = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameReader, FrameWriter, decode_message, encode_message};
pub use types::{
    CallToolParams, CallToolResult, Content, ErrorCode, InitializeResult, ListToolsResult,
    Request, RequestId, Response, RpcError, ServerCapabilities, ServerInfo, ToolDescriptor,
    ToolsCapability,
};

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision reported by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Maximum size of one message line (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;
