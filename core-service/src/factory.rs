//! Memoized construction of authenticated service handles.
//!
//! The factory owns three once-cells: one per service handle and one for the
//! shared credential underneath them. The credential cell is the expensive
//! path (source resolution, token load, refresh or interactive
//! authorization); it runs at most once even when both handle accessors race
//! on first use. The cell latches the outcome, success or failure, so a
//! failed acquisition never re-runs and every caller observes the same
//! result.

use crate::error::{CoreError, Result};
use crate::handle::{Credential, ServiceHandle, ServiceKind};
use core_auth::oauth::MANUAL_REDIRECT_URI;
use core_auth::{
    AuthError, ClientConfig, CredentialMode, CredentialSource, InteractiveFlow, OAuthFlowManager,
    ServiceAccountKey, Token, TokenStore,
};
use core_runtime::Settings;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};

/// Builds and memoizes the per-service handles.
pub struct ServiceFactory {
    settings: Settings,
    http: reqwest::Client,
    // Holds the acquisition outcome, not just the success value:
    // `get_or_try_init` would re-run a failed initialization for the next
    // waiter, and the expensive path must execute at most once.
    credential: OnceCell<std::result::Result<Arc<Credential>, CoreError>>,
    docs: OnceCell<ServiceHandle>,
    drive: OnceCell<ServiceHandle>,
}

impl ServiceFactory {
    /// Create a factory over the given settings. No I/O happens until the
    /// first handle is requested.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            http: reqwest::Client::new(),
            credential: OnceCell::new(),
            docs: OnceCell::new(),
            drive: OnceCell::new(),
        }
    }

    /// The handle for one service, constructing it on first use.
    pub async fn handle(&self, kind: ServiceKind) -> Result<&ServiceHandle> {
        let cell = match kind {
            ServiceKind::Docs => &self.docs,
            ServiceKind::Drive => &self.drive,
        };

        cell.get_or_try_init(|| async {
            let credential = self.credential().await?;
            info!(service = %kind, "Constructed service handle");
            Ok::<_, CoreError>(ServiceHandle::new(kind, self.http.clone(), credential))
        })
        .await
    }

    async fn credential(&self) -> Result<Arc<Credential>> {
        let outcome = self
            .credential
            .get_or_init(|| self.acquire_credential())
            .await;
        match outcome {
            Ok(credential) => Ok(Arc::clone(credential)),
            Err(e) => Err(e.clone()),
        }
    }

    #[instrument(skip_all)]
    async fn acquire_credential(&self) -> Result<Arc<Credential>> {
        let source = CredentialSource::resolve(
            self.settings.service_account_path.as_deref(),
            self.settings.client_secrets_path.as_deref(),
        )?;

        match source.mode {
            CredentialMode::ServiceAccount => {
                let path = source.service_account_path.ok_or_else(|| {
                    CoreError::InitializationFailed(
                        "service account mode resolved without a key path".to_string(),
                    )
                })?;
                let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    AuthError::Configuration(format!(
                        "unable to read service account key '{}': {}",
                        path, e
                    ))
                })?;
                let key = ServiceAccountKey::from_json(&data)?;
                info!(client_email = %key.client_email, "Using service account credential");
                Ok(Arc::new(Credential::ServiceAccount(key)))
            }
            CredentialMode::OAuthClient => {
                let path = source.client_secrets_path.ok_or_else(|| {
                    CoreError::InitializationFailed(
                        "oauth client mode resolved without a secrets path".to_string(),
                    )
                })?;
                let data = tokio::fs::read_to_string(&path).await.map_err(|e| {
                    AuthError::Configuration(format!(
                        "unable to read client secrets '{}': {}",
                        path, e
                    ))
                })?;
                let client = ClientConfig::from_json(&data)?;
                let store = TokenStore::new(self.settings.token_path.clone());
                let token = self.obtain_user_token(client, &store).await?;
                Ok(Arc::new(Credential::User(token)))
            }
        }
    }

    /// Produce a usable user token: cached if still valid, refreshed if
    /// expired with a refresh value, otherwise freshly authorized. Whatever
    /// path runs, the returned token is already persisted.
    async fn obtain_user_token(&self, client: ClientConfig, store: &TokenStore) -> Result<Token> {
        match store.load().await {
            Ok(token) if !token.is_expired() => {
                debug!("Using cached token");
                Ok(token)
            }
            Ok(expired) => match expired.refresh_token.clone() {
                Some(refresh) => {
                    info!("Cached token expired, refreshing");
                    let manager = OAuthFlowManager::with_client(
                        client.clone().into_oauth_config(
                            MANUAL_REDIRECT_URI,
                            ServiceKind::combined_scopes(),
                        ),
                        self.http.clone(),
                    );
                    match manager.refresh_token(&refresh).await {
                        Ok(fresh) => {
                            store.save(&fresh).await?;
                            Ok(fresh)
                        }
                        Err(e) => {
                            warn!(error = %e, "Refresh failed, starting interactive authorization");
                            self.run_flow(client, store).await
                        }
                    }
                }
                None => {
                    info!("Cached token expired with no refresh value, starting interactive authorization");
                    self.run_flow(client, store).await
                }
            },
            Err(AuthError::TokenNotFound(reason)) => {
                info!(reason = %reason, "No cached token, starting interactive authorization");
                self.run_flow(client, store).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn run_flow(&self, client: ClientConfig, store: &TokenStore) -> Result<Token> {
        let flow =
            InteractiveFlow::from_settings(self.settings.use_callback, self.settings.callback_port);
        let token = flow
            .authorize(client, &ServiceKind::combined_scopes(), store)
            .await?;
        Ok(token)
    }
}
