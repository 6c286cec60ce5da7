//! One discovery and invocation surface over many providers.

use std::collections::{HashMap, HashSet};

use futures::future::join_all;
use serde_json::{Map, Value};

use crate::client::ProviderClient;
use crate::mcp::{self, CallToolResult, ServerConfig};
use crate::tools::{PLACEHOLDER_PROPERTY, Tool, ToolRegistry};
use crate::transport::{Connector, StdioConnector};
use crate::{Error, Result};

/// A tool result together with the provider that produced it.
#[derive(Debug, Clone)]
pub struct Execution {
    pub provider: String,
    pub result: CallToolResult,
}

impl Execution {
    /// Text content of the result, one block per line.
    pub fn text(&self) -> String {
        mcp::joined_text(&self.result)
    }

    /// Whether the tool itself reported a failure.
    pub fn is_error(&self) -> bool {
        self.result.is_error.unwrap_or(false)
    }
}

/// Owns every provider client, the merged tool registry, and the routing
/// table from tool name to owning provider.
///
/// The registry and routes are rebuilt by [`Orchestrator::initialize`] and
/// only read afterwards.
pub struct Orchestrator<C: Connector> {
    providers: Vec<ProviderClient<C>>,
    registry: ToolRegistry,
    routes: HashMap<String, usize>,
}

impl Orchestrator<StdioConnector> {
    /// Build an orchestrator over subprocess providers.
    pub fn stdio(configs: impl IntoIterator<Item = ServerConfig>) -> Result<Self> {
        Self::new(configs.into_iter().map(ProviderClient::stdio).collect())
    }
}

impl<C: Connector> Orchestrator<C> {
    /// Provider names must be unique.
    pub fn new(providers: Vec<ProviderClient<C>>) -> Result<Self> {
        let mut names = HashSet::new();
        for provider in &providers {
            if !names.insert(provider.name()) {
                return Err(Error::DuplicateProvider(provider.name().to_string()));
            }
        }

        Ok(Self {
            providers,
            registry: ToolRegistry::new(),
            routes: HashMap::new(),
        })
    }

    /// Provider clients in construction order.
    pub fn providers(&self) -> &[ProviderClient<C>] {
        &self.providers
    }

    /// Look up a provider client by name.
    pub fn provider(&self, name: &str) -> Option<&ProviderClient<C>> {
        self.providers.iter().find(|p| p.name() == name)
    }

    /// The merged registry. Empty until [`Orchestrator::initialize`] succeeds.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Discover every provider's tools and build the routing table.
    ///
    /// All providers are queried concurrently. If any of them fails, or two
    /// providers expose the same tool name, every session is torn down and the
    /// previous registry is left untouched.
    pub async fn initialize(&mut self) -> Result<()> {
        let listings = join_all(self.providers.iter().map(|provider| provider.get_tools())).await;

        match self.merge(listings) {
            Ok((registry, routes)) => {
                tracing::info!(
                    tools = registry.len(),
                    providers = self.providers.len(),
                    "orchestrator initialized"
                );
                self.registry = registry;
                self.routes = routes;
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "orchestrator initialization failed");
                for provider in &self.providers {
                    provider.session().cleanup().await;
                }
                Err(e)
            }
        }
    }

    fn merge(
        &self,
        listings: Vec<Result<Vec<mcp::Tool>>>,
    ) -> Result<(ToolRegistry, HashMap<String, usize>)> {
        let mut registry = ToolRegistry::new();
        let mut routes: HashMap<String, usize> = HashMap::new();

        for (index, listing) in listings.into_iter().enumerate() {
            let tools = listing?;
            let provider = self.providers[index].name();

            for tool in &tools {
                if let Some(&owner) = routes.get(&*tool.name) {
                    if owner != index {
                        return Err(Error::ToolConflict {
                            tool: tool.name.to_string(),
                            first: self.providers[owner].name().to_string(),
                            second: provider.to_string(),
                        });
                    }
                }
            }

            registry.add(&tools)?;
            for tool in &tools {
                routes.insert(tool.name.to_string(), index);
            }
            tracing::debug!(provider, tools = tools.len(), "registered provider tools");
        }

        debug_assert_eq!(registry.len(), routes.len());
        Ok((registry, routes))
    }

    /// Every known tool, sorted by name.
    pub fn list_tools(&self) -> Vec<&Tool> {
        self.registry.list()
    }

    /// Name of the provider that owns `tool`.
    pub fn provider_for(&self, tool: &str) -> Option<&str> {
        self.routes
            .get(tool)
            .map(|&index| self.providers[index].name())
    }

    /// Validate the arguments and forward the call to the owning provider.
    ///
    /// Failed calls are not retried here.
    pub async fn execute(&self, name: &str, mut arguments: Map<String, Value>) -> Result<Execution> {
        let (Some(&index), Some(tool)) = (self.routes.get(name), self.registry.get(name)) else {
            return Err(Error::ToolNotFound(name.to_string()));
        };

        if let Some(argument) = tool.missing_arguments(&arguments).next() {
            return Err(Error::MissingArgument {
                tool: name.to_string(),
                argument: argument.to_string(),
            });
        }

        if tool.has_placeholder() {
            arguments.remove(PLACEHOLDER_PROPERTY);
        }

        let provider = &self.providers[index];
        let result = provider.execute_tool(name, arguments).await?;

        Ok(Execution {
            provider: provider.name().to_string(),
            result,
        })
    }

    /// Tear down every provider's session.
    ///
    /// All providers are attempted even if some fail; the first failure is
    /// returned.
    pub async fn close(&self) -> Result<()> {
        let mut first_error = None;

        for provider in &self.providers {
            if let Err(e) = provider.close().await {
                tracing::warn!(provider = %provider.name(), error = %e, "error closing provider");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
