//! Connection lifecycle for a single provider.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use tokio::sync::Mutex;

use crate::mcp::TransportError;
use crate::transport::{Connector, Transport};
use crate::{Error, Result};

/// Where a [`Session`] is in its lifecycle.
///
/// `Disconnected` is both the initial state and where every teardown lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Disconnected = 0,
    Connecting = 1,
    Active = 2,
    Error = 3,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Active,
            3 => Self::Error,
            _ => Self::Disconnected,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// Owns the live connection to one provider and re-establishes it on demand.
///
/// The transport slot doubles as the connection guard: it stays locked for an
/// entire establishment attempt, so concurrent callers never spawn two
/// providers for the same descriptor. A caller arriving mid-attempt waits and
/// then reuses whatever the attempt produced.
pub struct Session<C: Connector> {
    provider: String,
    connector: C,
    state: AtomicU8,
    transport: Mutex<Option<Arc<C::Transport>>>,
}

impl<C: Connector> Session<C> {
    /// Create a disconnected session. Nothing is spawned until first use.
    pub fn new(provider: impl Into<String>, connector: C) -> Self {
        Self {
            provider: provider.into(),
            connector,
            state: AtomicU8::new(SessionState::Disconnected as u8),
            transport: Mutex::new(None),
        }
    }

    /// Name of the provider this session connects to.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// The connector used to (re)open the transport.
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: SessionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Return an active transport, connecting first if needed.
    ///
    /// An active, healthy transport is returned as is; the handshake is not
    /// repeated.
    pub async fn ensure_session(&self) -> Result<Arc<C::Transport>> {
        let mut slot = self.transport.lock().await;
        self.establish_locked(&mut slot).await?;

        slot.clone()
            .ok_or_else(|| Error::SessionUnavailable(self.provider.clone()))
    }

    /// Connect unless an active, healthy transport already exists.
    pub async fn establish(&self) -> Result<()> {
        let mut slot = self.transport.lock().await;
        self.establish_locked(&mut slot).await
    }

    async fn establish_locked(&self, slot: &mut Option<Arc<C::Transport>>) -> Result<()> {
        if let Some(transport) = slot.as_ref() {
            if self.state() == SessionState::Active && transport.is_healthy() {
                return Ok(());
            }
            tracing::info!(provider = %self.provider, "discarding stale session");
            if let Err(e) = self.teardown(slot).await {
                tracing::warn!(provider = %self.provider, error = %e, "error closing stale session");
            }
        }

        self.set_state(SessionState::Connecting);
        tracing::debug!(provider = %self.provider, "connecting");

        match self.connector.connect().await {
            Ok(transport) => {
                *slot = Some(Arc::new(transport));
                self.set_state(SessionState::Active);
                tracing::info!(provider = %self.provider, "session active");
                Ok(())
            }
            Err(source) => {
                self.set_state(SessionState::Error);
                tracing::error!(provider = %self.provider, error = %source, "failed to establish session");
                Err(Error::Connect {
                    provider: self.provider.clone(),
                    source,
                })
            }
        }
    }

    /// Drop the transport, ignoring errors from closing it.
    ///
    /// Always leaves the session `Disconnected`; safe to call repeatedly.
    pub async fn cleanup(&self) {
        if let Err(e) = self.shutdown().await {
            tracing::warn!(provider = %self.provider, error = %e, "error during session cleanup");
        }
    }

    /// Tear down `failed` if it is still the current transport.
    ///
    /// A caller whose request failed on an older transport must not close the
    /// replacement another caller has since established.
    pub async fn discard(&self, failed: &Arc<C::Transport>) {
        let mut slot = self.transport.lock().await;
        let current = slot
            .as_ref()
            .is_some_and(|transport| Arc::ptr_eq(transport, failed));
        if !current {
            tracing::debug!(provider = %self.provider, "failed transport already replaced");
            return;
        }

        if let Err(e) = self.teardown(&mut slot).await {
            tracing::warn!(provider = %self.provider, error = %e, "error closing failed session");
        }
    }

    /// Like [`Session::cleanup`], but reports a failure to close the transport.
    ///
    /// The session is `Disconnected` afterwards either way.
    pub async fn shutdown(&self) -> Result<()> {
        let mut slot = self.transport.lock().await;
        self.teardown(&mut slot)
            .await
            .map_err(|source| Error::Close {
                provider: self.provider.clone(),
                source,
            })
    }

    async fn teardown(
        &self,
        slot: &mut Option<Arc<C::Transport>>,
    ) -> std::result::Result<(), TransportError> {
        let result = match slot.take() {
            Some(transport) => transport.close().await,
            None => Ok(()),
        };
        self.set_state(SessionState::Disconnected);
        result
    }
}
