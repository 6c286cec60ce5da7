//! In-memory providers for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, Value, json};

use crate::mcp::{CallToolResult, Content, Tool, TransportError};
use crate::transport::{Connector, Transport};

/// Shared knobs and counters for a [`MockConnector`] and its transports.
#[derive(Default)]
pub struct MockState {
    pub tools: Mutex<Vec<Tool>>,
    pub connects: AtomicUsize,
    pub handshakes: AtomicUsize,
    pub closes: AtomicUsize,
    pub calls: Mutex<Vec<(String, Map<String, Value>)>>,
    pub fail_connect: AtomicBool,
    pub fail_handshake: AtomicBool,
    pub fail_list: AtomicBool,
    pub fail_next_call: AtomicBool,
    pub fail_close: AtomicBool,
    pub unhealthy: AtomicBool,
    pub handshake_delay: Mutex<Option<Duration>>,
    pub call_delay: Mutex<Option<Duration>>,
}

impl MockState {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn handshakes(&self) -> usize {
        self.handshakes.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct MockConnector {
    pub state: Arc<MockState>,
}

impl MockConnector {
    pub fn with_tools(tools: Vec<Tool>) -> Self {
        let connector = Self::default();
        *connector.state.tools.lock().unwrap() = tools;
        connector
    }
}

pub struct MockTransport {
    state: Arc<MockState>,
}

fn provider_gone() -> TransportError {
    TransportError::Request("provider exited".into())
}

impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self) -> Result<MockTransport, TransportError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::Spawn(std::io::Error::other("spawn refused")));
        }

        let delay = *self.state.handshake_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.handshakes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_handshake.load(Ordering::SeqCst) {
            return Err(TransportError::Handshake("connection reset".into()));
        }

        Ok(MockTransport {
            state: Arc::clone(&self.state),
        })
    }
}

impl Transport for MockTransport {
    async fn list_tools(&self) -> Result<Vec<Tool>, TransportError> {
        if self.state.fail_list.load(Ordering::SeqCst) {
            return Err(provider_gone());
        }
        Ok(self.state.tools.lock().unwrap().clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> Result<CallToolResult, TransportError> {
        let delay = *self.state.call_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.state.fail_next_call.swap(false, Ordering::SeqCst) {
            return Err(provider_gone());
        }
        self.state
            .calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        Ok(CallToolResult::success(vec![Content::text(format!(
            "{name} ok"
        ))]))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_close.load(Ordering::SeqCst) {
            return Err(TransportError::Shutdown("kill failed".into()));
        }
        Ok(())
    }

    fn is_healthy(&self) -> bool {
        !self.state.unhealthy.load(Ordering::SeqCst)
    }
}

/// A raw tool as a provider would report it.
pub fn raw_tool(name: &str, properties: Value, required: &[&str]) -> Tool {
    serde_json::from_value(json!({
        "name": name,
        "description": format!("{name} tool"),
        "inputSchema": {
            "type": "object",
            "properties": properties,
            "required": required,
        },
    }))
    .unwrap()
}
