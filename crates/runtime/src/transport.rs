//! The seam between sessions and the wire.
//!
//! A [`Connector`] knows how to reach one provider; each call to
//! [`Connector::connect`] yields a fresh [`Transport`] that has already
//! completed the protocol handshake.

use std::future::Future;

use serde_json::{Map, Value};

use crate::mcp::{CallToolResult, McpClient, ServerConfig, Tool, TransportError};

/// A live protocol session with one provider.
pub trait Transport: Send + Sync + 'static {
    /// Enumerate the provider's tools.
    fn list_tools(&self) -> impl Future<Output = Result<Vec<Tool>, TransportError>> + Send;

    /// Invoke one tool.
    fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> impl Future<Output = Result<CallToolResult, TransportError>> + Send;

    /// Release the streams and whatever sits behind them.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// False when the transport is known to be unusable.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// Opens transports to one provider.
pub trait Connector: Send + Sync {
    type Transport: Transport;

    /// Reach the provider and complete the handshake.
    fn connect(&self) -> impl Future<Output = Result<Self::Transport, TransportError>> + Send;
}

impl Transport for McpClient {
    async fn list_tools(&self) -> Result<Vec<Tool>, TransportError> {
        McpClient::list_tools(self).await
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, TransportError> {
        McpClient::call_tool(self, name, arguments).await
    }

    async fn close(&self) -> Result<(), TransportError> {
        McpClient::close(self).await
    }

    fn is_healthy(&self) -> bool {
        McpClient::is_healthy(self)
    }
}

/// Spawns the provider as a subprocess and talks over its stdin/stdout.
#[derive(Debug, Clone)]
pub struct StdioConnector {
    config: ServerConfig,
}

impl StdioConnector {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl Connector for StdioConnector {
    type Transport = McpClient;

    async fn connect(&self) -> Result<McpClient, TransportError> {
        McpClient::spawn(&self.config).await
    }
}
