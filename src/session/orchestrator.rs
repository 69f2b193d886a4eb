use std::sync::Arc;
use url::Url;

use super::registry::SessionRegistry;
use crate::error::{Error, Result};
use crate::protocol::models::{unix_now, CallRequest, CallSession, CallStatus, ProviderCall};

/// The external voice-calling service that places and reports on calls.
#[async_trait::async_trait]
pub trait CallProvider: Send + Sync {
    async fn create_call(&self, request: &CallRequest) -> Result<ProviderCall>;

    async fn get_status(&self, call_id: &str) -> Result<CallStatus>;
}

/// Accepts call requests, delegates placement to the provider and records
/// accepted calls in the registry.
pub struct CallOrchestrator {
    provider: Arc<dyn CallProvider>,
    registry: Arc<SessionRegistry>,
}

impl CallOrchestrator {
    #[must_use]
    pub fn new(provider: Arc<dyn CallProvider>, registry: Arc<SessionRegistry>) -> Self {
        Self { provider, registry }
    }

    /// Place an outbound call and record the resulting session.
    ///
    /// On provider failure no session is created; the error carries the
    /// provider's sanitized message only.
    ///
    /// # Errors
    /// `InvalidRequest` for empty numbers or an unparseable flow URL,
    /// `Provider` when the provider rejects or cannot be reached.
    pub async fn create(&self, request: CallRequest) -> Result<CallSession> {
        validate(&request)?;

        tracing::info!(
            "Initiating call from {} to {}",
            request.from_number,
            request.to_number
        );

        let placed = self.provider.create_call(&request).await?;

        let session = CallSession {
            id: placed.call_id,
            from_number: request.from_number,
            to_number: request.to_number,
            flow_url: request.flow_url,
            status: placed.status,
            status_callback_url: request.status_callback_url,
            record: request.record,
            created_at: unix_now(),
            transcript: Vec::new(),
        };

        tracing::info!("Call {} created with status {}", session.id, session.status);
        self.registry.insert(session.clone());
        Ok(session)
    }

    /// Current status of a recorded call.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown call id.
    #[allow(clippy::result_large_err)]
    pub fn status(&self, call_id: &str) -> Result<CallStatus> {
        Ok(self.registry.get(call_id)?.status)
    }

    /// Ask the provider for a call's current status and mirror it into the
    /// registry. Status updates normally arrive as webhooks via
    /// [`Self::apply_status_update`]; this is the pull-based fallback.
    ///
    /// # Errors
    /// `NotFound` for an unknown call id, `Provider` when the provider
    /// cannot answer.
    pub async fn refresh_status(&self, call_id: &str) -> Result<CallStatus> {
        // Reject unknown ids locally before asking the provider.
        self.registry.get(call_id)?;
        let status = self.provider.get_status(call_id).await?;
        self.registry.update_status(call_id, status)?;
        Ok(status)
    }

    /// Mirror a provider-reported status update (e.g. from a webhook) into
    /// the registry.
    ///
    /// # Errors
    /// Returns `NotFound` for an unknown call id.
    #[allow(clippy::result_large_err)]
    pub fn apply_status_update(&self, call_id: &str, status: CallStatus) -> Result<()> {
        self.registry.update_status(call_id, status)
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}

#[allow(clippy::result_large_err)]
fn validate(request: &CallRequest) -> Result<()> {
    if request.from_number.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "from_number must not be empty".to_string(),
        ));
    }
    if request.to_number.trim().is_empty() {
        return Err(Error::InvalidRequest(
            "to_number must not be empty".to_string(),
        ));
    }
    Url::parse(&request.flow_url)
        .map_err(|err| Error::InvalidRequest(format!("flow_url is not a valid URL: {err}")))?;
    Ok(())
}
