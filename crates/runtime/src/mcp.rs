//! MCP (Model Context Protocol) client integration.
//!
//! Provider connections are built on the official rmcp SDK. This module adds
//! what the SDK leaves to the caller: a serializable provider descriptor, a
//! per-request timeout, and a health flag for requests that never finished.
//!
//! # Example
//!
//! ```no_run
//! use runtime::mcp::{McpClient, ServerConfig};
//!
//! # async fn example() -> Result<(), runtime::mcp::TransportError> {
//! let config = ServerConfig::new("filesystem", "npx")
//!     .with_args(["-y", "@modelcontextprotocol/server-filesystem", "/tmp"]);
//! let client = McpClient::spawn(&config).await?;
//!
//! for tool in client.list_tools().await? {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! client.close().await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rmcp::ServiceExt;
use rmcp::model::CallToolRequestParams;
use rmcp::service::{Peer, RoleClient, RunningService};
use rmcp::transport::TokioChildProcess;
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::Command;
use tokio::sync::Mutex;

pub use rmcp::model::{CallToolResult, Content, Tool};

/// Boxed error from the MCP SDK.
pub type McpError = Box<dyn std::error::Error + Send + Sync>;

/// Default timeout for a single request, handshake included.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How to start one tool provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment overrides. Empty means the parent environment is inherited as is.
    #[serde(default)]
    pub env: HashMap<String, String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ServerConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            timeout_secs: None,
        }
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Per-request timeout, falling back to [`DEFAULT_TIMEOUT`].
    pub fn timeout(&self) -> Duration {
        self.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// Errors from a provider connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn provider: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("handshake failed: {0}")]
    Handshake(#[source] McpError),

    #[error("request failed: {0}")]
    Request(#[source] McpError),

    #[error("timeout after {0:?} waiting for response")]
    Timeout(Duration),

    /// A previous request was abandoned mid-flight.
    #[error("connection is in an unknown state after an interrupted request")]
    Unhealthy,

    #[error("failed to shut down provider: {0}")]
    Shutdown(#[source] McpError),
}

/// All text blocks of a tool result, joined by newlines.
pub fn joined_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|content| content.raw.as_text())
        .map(|text| text.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Marks the client unhealthy unless the request ran to completion.
struct InFlight<'a> {
    healthy: &'a AtomicBool,
    finished: bool,
}

impl<'a> InFlight<'a> {
    fn start(healthy: &'a AtomicBool) -> Self {
        Self {
            healthy,
            finished: false,
        }
    }

    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.healthy.store(false, Ordering::Release);
        }
    }
}

/// An MCP client connected to one provider.
pub struct McpClient {
    name: String,
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
    timeout: Duration,
    healthy: AtomicBool,
}

impl McpClient {
    /// Spawn the provider process and complete the handshake.
    pub async fn spawn(config: &ServerConfig) -> Result<Self, TransportError> {
        let mut cmd = Command::new(&config.command);
        cmd.args(&config.args).envs(&config.env);

        let transport = TokioChildProcess::new(cmd).map_err(TransportError::Spawn)?;
        tracing::debug!(provider = %config.name, command = %config.command, "spawned provider process");

        Self::handshake(&config.name, config.timeout(), ().serve(transport)).await
    }

    /// Connect over an arbitrary pair of byte streams and complete the handshake.
    pub async fn from_streams<R, W>(
        name: impl Into<String>,
        reader: R,
        writer: W,
        timeout: Duration,
    ) -> Result<Self, TransportError>
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let name = name.into();
        Self::handshake(&name, timeout, ().serve((reader, writer))).await
    }

    async fn handshake<F, E>(name: &str, timeout: Duration, serving: F) -> Result<Self, TransportError>
    where
        F: Future<Output = Result<RunningService<RoleClient, ()>, E>>,
        E: Into<McpError>,
    {
        let service = tokio::time::timeout(timeout, serving)
            .await
            .map_err(|_| TransportError::Timeout(timeout))?
            .map_err(|e| TransportError::Handshake(e.into()))?;

        if let Some(info) = service.peer().peer_info() {
            tracing::debug!(
                provider = name,
                server = %info.server_info.name,
                "handshake complete"
            );
        }

        Ok(Self {
            name: name.to_string(),
            peer: service.peer().clone(),
            service: Mutex::new(Some(service)),
            timeout,
            healthy: AtomicBool::new(true),
        })
    }

    /// Get the provider name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// List every tool the provider exposes, across all pages.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, TransportError> {
        self.request(self.peer.list_all_tools()).await
    }

    /// Call a tool by name.
    ///
    /// A result flagged `is_error` is returned as is; only protocol-level
    /// failures become errors.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, TransportError> {
        let params = CallToolRequestParams {
            name: name.to_string().into(),
            arguments: Some(arguments),
            meta: None,
            task: None,
        };

        self.request(self.peer.call_tool(params)).await
    }

    /// False once a request was abandoned or timed out, or after close.
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }

    /// Stop the service and terminate the provider.
    ///
    /// Calling this more than once is harmless.
    pub async fn close(&self) -> Result<(), TransportError> {
        self.healthy.store(false, Ordering::Release);

        let Some(service) = self.service.lock().await.take() else {
            return Ok(());
        };

        service
            .cancel()
            .await
            .map_err(|e| TransportError::Shutdown(e.into()))?;
        tracing::debug!(provider = %self.name, "provider connection closed");
        Ok(())
    }

    async fn request<T, E, F>(&self, call: F) -> Result<T, TransportError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<McpError>,
    {
        if !self.is_healthy() {
            return Err(TransportError::Unhealthy);
        }

        let in_flight = InFlight::start(&self.healthy);
        let outcome = tokio::time::timeout(self.timeout, call).await;
        match outcome {
            Ok(result) => {
                in_flight.finish();
                result.map_err(|e| TransportError::Request(e.into()))
            }
            Err(_) => {
                tracing::debug!(provider = %self.name, timeout = ?self.timeout, "request timed out");
                Err(TransportError::Timeout(self.timeout))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};

    /// Start an in-process provider that completes the handshake, then answers
    /// every other request through `reply`. `None` means no answer.
    async fn connect_fake<F>(timeout: Duration, reply: F) -> Result<McpClient, TransportError>
    where
        F: Fn(&Value) -> Option<Value> + Send + 'static,
    {
        let (client_out, provider_in) = duplex(64 * 1024);
        let (provider_out, client_in) = duplex(64 * 1024);
        tokio::spawn(serve(provider_in, provider_out, reply));
        McpClient::from_streams("fake", client_in, client_out, timeout).await
    }

    async fn serve<F>(input: DuplexStream, mut output: DuplexStream, reply: F)
    where
        F: Fn(&Value) -> Option<Value>,
    {
        let mut lines = BufReader::new(input).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let message: Value = serde_json::from_str(&line).unwrap();
            if message.get("id").is_none() {
                continue;
            }
            let result = match message["method"].as_str() {
                Some("initialize") => Some(json!({
                    "protocolVersion": "2024-11-05",
                    "capabilities": { "tools": {} },
                    "serverInfo": { "name": "fake-server", "version": "1.0" }
                })),
                _ => reply(&message),
            };
            let Some(result) = result else { continue };
            let response = json!({ "jsonrpc": "2.0", "id": message["id"], "result": result });
            if output
                .write_all(format!("{response}\n").as_bytes())
                .await
                .is_err()
            {
                return;
            }
        }
    }

    #[tokio::test]
    async fn handshake_then_list_tools() {
        let client = connect_fake(DEFAULT_TIMEOUT, |msg| match msg["method"].as_str() {
            Some("tools/list") => Some(json!({
                "tools": [{ "name": "echo", "inputSchema": { "type": "object" } }]
            })),
            _ => None,
        })
        .await
        .unwrap();

        let tools = client.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "echo");
        assert!(client.is_healthy());
    }

    #[tokio::test]
    async fn tool_error_flag_is_a_result() {
        let client = connect_fake(DEFAULT_TIMEOUT, |_| {
            Some(json!({
                "content": [{ "type": "text", "text": "no such file" }],
                "isError": true
            }))
        })
        .await
        .unwrap();

        let result = client.call_tool("read_file", Map::new()).await.unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(joined_text(&result), "no such file");
        assert!(client.is_healthy());
    }

    #[tokio::test]
    async fn handshake_timeout() {
        let (client_out, _provider_in) = duplex(1024);
        let (_provider_out, client_in) = duplex(1024);

        let err = McpClient::from_streams("silent", client_in, client_out, Duration::from_millis(50))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Timeout(_)));
    }

    #[tokio::test]
    async fn timeout_marks_unhealthy() {
        let client = connect_fake(Duration::from_millis(50), |_| None)
            .await
            .unwrap();

        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert!(!client.is_healthy());

        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, TransportError::Unhealthy));
    }

    #[tokio::test]
    async fn abandoned_request_marks_unhealthy() {
        let client = connect_fake(DEFAULT_TIMEOUT, |_| None).await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), client.list_tools()).await;
        assert!(abandoned.is_err());
        assert!(!client.is_healthy());
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let client = connect_fake(DEFAULT_TIMEOUT, |_| None).await.unwrap();

        client.close().await.unwrap();
        client.close().await.unwrap();
        assert!(!client.is_healthy());
    }

    #[tokio::test]
    async fn spawn_missing_binary_fails() {
        let config = ServerConfig::new("missing", "/nonexistent/provider-binary");
        let err = McpClient::spawn(&config).await.err().unwrap();
        assert!(matches!(err, TransportError::Spawn(_)));
    }

    #[test]
    fn server_config_defaults() {
        let config: ServerConfig = serde_json::from_value(json!({
            "name": "memory",
            "command": "npx",
        }))
        .unwrap();
        assert!(config.args.is_empty());
        assert!(config.env.is_empty());
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);

        let config = ServerConfig::new("fs", "npx")
            .with_args(["-y", "server-filesystem"])
            .with_env("ROOT", "/tmp");
        assert_eq!(config.args, ["-y", "server-filesystem"]);
        assert_eq!(config.env["ROOT"], "/tmp");
    }

    #[test]
    fn joined_text_skips_non_text_blocks() {
        let result = CallToolResult::success(vec![
            Content::text("first"),
            Content::image("AAAA", "image/png"),
            Content::text("second"),
        ]);
        assert_eq!(joined_text(&result), "first\nsecond");
    }
}
