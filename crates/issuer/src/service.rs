//! Handle creation entry point.

use crate::auth::{AuthContext, NamingAuthority};
use crate::client::{CreateOutcome, HandleClient};
use crate::errors::{IssuerError, Result};
use crate::records::RecordBuilder;
use crate::settings::{IssuerSettings, ServerMode};
use crate::transport::{HandleTransport, StubHandleService, TcpTransport};
use hdl_keys::{decrypt, derive_pass_phrase, load_private_key};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

struct Issuer {
    auth: AuthContext,
    client: HandleClient,
}

/// Creates handles under the configured naming authority.
///
/// The key is loaded and unlocked on first use. If that fails nothing is
/// kept, so the next call tries again with the same settings.
pub struct HandleCreationService {
    settings: IssuerSettings,
    transport: Arc<dyn HandleTransport>,
    issuer: OnceCell<Issuer>,
}

impl HandleCreationService {
    /// Service talking to the transport selected by `settings.server.mode`.
    pub fn new(settings: IssuerSettings) -> Self {
        let transport: Arc<dyn HandleTransport> = match settings.server.mode {
            ServerMode::Tcp => Arc::new(TcpTransport::from_settings(&settings.server)),
            ServerMode::Stub => Arc::new(StubHandleService::new()),
        };
        Self::with_transport(settings, transport)
    }

    pub fn with_transport(settings: IssuerSettings, transport: Arc<dyn HandleTransport>) -> Self {
        Self {
            settings,
            transport,
            issuer: OnceCell::new(),
        }
    }

    pub fn settings(&self) -> &IssuerSettings {
        &self.settings
    }

    pub fn is_initialized(&self) -> bool {
        self.issuer.initialized()
    }

    /// Signing identity, once initialized.
    pub fn auth_context(&self) -> Option<&AuthContext> {
        self.issuer.get().map(|issuer| &issuer.auth)
    }

    /// Build the signing identity now instead of on the first create.
    pub async fn initialize(&self) -> Result<&AuthContext> {
        Ok(&self.issuer().await?.auth)
    }

    async fn issuer(&self) -> Result<&Issuer> {
        self.issuer
            .get_or_try_init(|| async { self.build_issuer() })
            .await
    }

    fn build_issuer(&self) -> Result<Issuer> {
        let authority = self
            .settings
            .naming_authority
            .as_deref()
            .ok_or_else(|| IssuerError::configuration("No naming authority specified!"))
            .and_then(NamingAuthority::new)?;

        let raw = load_private_key(self.settings.private_key_path.as_deref())?;
        let pass_phrase = derive_pass_phrase(&raw, self.settings.pass_phrase())?;
        let key = decrypt(&raw, pass_phrase.as_ref())?;
        let auth = AuthContext::build(authority.as_str(), key)?;

        info!(
            authority = %auth.authority(),
            index = auth.index(),
            transport = %self.transport.describe(),
            "handle issuer initialized"
        );
        Ok(Issuer {
            auth,
            client: HandleClient::new(self.transport.clone()),
        })
    }

    /// Create `suffix` with a public `description`.
    pub async fn create_handle(&self, suffix: &str, description: &str) -> Result<CreateOutcome> {
        let issuer = self.issuer().await?;
        let values =
            RecordBuilder::now().build_values(issuer.auth.admin_record(), description)?;
        let outcome = issuer
            .client
            .submit_create(suffix, &values, &issuer.auth)
            .await?;
        match &outcome {
            CreateOutcome::Success(handle) => info!(%handle, "created handle"),
            CreateOutcome::AlreadyExists => {}
            CreateOutcome::Failure(failure) => {
                debug!(suffix, reason = %failure, "create-handle request failed")
            }
        }
        Ok(outcome)
    }

    /// Forget the signing identity; the next call rebuilds it.
    pub fn reset(&mut self) {
        self.issuer = OnceCell::new();
    }
}
