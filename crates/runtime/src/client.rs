//! Per-provider facade over a [`Session`].

use serde_json::{Map, Value};

use crate::mcp::{CallToolResult, ServerConfig, Tool};
use crate::session::{Session, SessionState};
use crate::transport::{Connector, StdioConnector, Transport};
use crate::{Error, Result};

/// Lists and calls the tools of one provider.
///
/// Any failure of a protocol call drops the transport it ran on; the next call
/// starts from a fresh connection and handshake.
pub struct ProviderClient<C: Connector> {
    session: Session<C>,
}

impl ProviderClient<StdioConnector> {
    /// A client for a provider launched as a subprocess.
    pub fn stdio(config: ServerConfig) -> Self {
        let name = config.name.clone();
        Self::new(name, StdioConnector::new(config))
    }
}

impl<C: Connector> ProviderClient<C> {
    /// A client for the provider reached through `connector`.
    pub fn new(name: impl Into<String>, connector: C) -> Self {
        Self {
            session: Session::new(name, connector),
        }
    }

    /// Provider name, used as its identity in routing and errors.
    pub fn name(&self) -> &str {
        self.session.provider()
    }

    /// The underlying session.
    pub fn session(&self) -> &Session<C> {
        &self.session
    }

    /// Lifecycle state of the underlying session.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Enumerate the provider's tools.
    pub async fn get_tools(&self) -> Result<Vec<Tool>> {
        let transport = self.session.ensure_session().await?;

        match transport.list_tools().await {
            Ok(tools) => {
                tracing::debug!(provider = %self.name(), count = tools.len(), "retrieved tools");
                Ok(tools)
            }
            Err(source) => {
                self.session.discard(&transport).await;
                Err(Error::ListTools {
                    provider: self.name().to_string(),
                    source,
                })
            }
        }
    }

    /// Invoke a tool and return the provider's raw result.
    pub async fn execute_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult> {
        let transport = self.session.ensure_session().await?;
        tracing::debug!(provider = %self.name(), tool = name, "executing tool");

        match transport.call_tool(name, arguments).await {
            Ok(result) => {
                if result.is_error.unwrap_or(false) {
                    tracing::debug!(provider = %self.name(), tool = name, "tool reported an error");
                }
                Ok(result)
            }
            Err(source) => {
                self.session.discard(&transport).await;
                Err(Error::ToolCall {
                    provider: self.name().to_string(),
                    tool: name.to_string(),
                    source,
                })
            }
        }
    }

    /// Tear the session down, reporting a failure to close the transport.
    pub async fn close(&self) -> Result<()> {
        self.session.shutdown().await
    }
}
