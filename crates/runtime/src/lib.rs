//! Switchyard runtime: provider sessions, tool registry, and routing.
//!
//! This crate connects a tool-using agent to any number of tool providers,
//! each running as a separate process that speaks MCP over stdio.
//!
//! # Overview
//!
//! - **Session**: the connection lifecycle for one provider. Connects lazily,
//!   reuses an active connection, and reconnects after a failure.
//! - **ProviderClient**: lists and calls the tools of one provider.
//! - **ToolRegistry**: provider tool descriptions normalized into one schema.
//! - **Orchestrator**: merges every provider's tools and routes each call to
//!   the provider that owns the tool.
//!
//! # Example
//!
//! ```no_run
//! use runtime::{Orchestrator, ServerConfig};
//! use serde_json::{Map, json};
//!
//! # async fn example() -> runtime::Result<()> {
//! let mut orchestrator = Orchestrator::stdio([
//!     ServerConfig::new("filesystem", "npx")
//!         .with_args(["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]),
//!     ServerConfig::new("memory", "npx")
//!         .with_args(["-y", "@modelcontextprotocol/server-memory"]),
//! ])?;
//! orchestrator.initialize().await?;
//!
//! for tool in orchestrator.list_tools() {
//!     println!("{} ({:?})", tool.name, orchestrator.provider_for(&tool.name));
//! }
//!
//! let mut arguments = Map::new();
//! arguments.insert("path".into(), json!("/tmp/notes.txt"));
//! let execution = orchestrator.execute("read_file", arguments).await?;
//! println!("{}: {}", execution.provider, execution.text());
//!
//! orchestrator.close().await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
pub mod mcp;
mod orchestrator;
mod session;
mod tools;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::ProviderClient;
pub use error::{Error, Result};
pub use mcp::{McpClient, ServerConfig, TransportError};
pub use orchestrator::{Execution, Orchestrator};
pub use session::{Session, SessionState};
pub use tools::{PLACEHOLDER_PROPERTY, ParameterSchema, Tool, ToolRegistry, ToolSpec};
pub use transport::{Connector, StdioConnector, Transport};
