//! LSP multiplexer: one long-lived child process per configured language
//! server, diagnostics cache, and 1-based/0-based path and range
//! normalization at the client boundary.

pub mod client;
pub mod error;
pub mod multiplexer;
pub mod servers;
pub mod types;

pub use client::LspClient;
pub use error::LspError;
pub use multiplexer::{CallDirection, LspMultiplexer};
pub use servers::{server_config, servers_for_file, ServerConfig};
pub use types::{CallHierarchyCall, CallHierarchyItem, Diagnostic, Hover, Location, Range, Severity, Symbol};
