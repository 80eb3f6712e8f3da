//! Authenticated service handles.
//!
//! A [`ServiceHandle`] bundles everything a caller needs to talk to one
//! remote service: the shared HTTP client, the resolved credential, and the
//! service's base URL. Handles are cheap to hand out; the expensive work
//! (credential resolution, token acquisition) happens once in the factory.

use core_auth::{ServiceAccountKey, Token};
use std::fmt;
use std::sync::Arc;

/// Scope granting access to the document service.
pub const DOCUMENTS_SCOPE: &str = "https://www.googleapis.com/auth/documents";

/// Scope granting access to the file service.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// The remote services the connector talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    /// Document service (Google Docs API).
    Docs,
    /// File service (Google Drive API).
    Drive,
}

impl ServiceKind {
    /// Base URL of the service's REST API.
    pub fn base_url(&self) -> &'static str {
        match self {
            ServiceKind::Docs => "https://docs.googleapis.com/v1",
            ServiceKind::Drive => "https://www.googleapis.com/drive/v3",
        }
    }

    /// The OAuth scope this service requires.
    pub fn scope(&self) -> &'static str {
        match self {
            ServiceKind::Docs => DOCUMENTS_SCOPE,
            ServiceKind::Drive => DRIVE_SCOPE,
        }
    }

    /// All scopes a shared credential must carry.
    ///
    /// One credential backs every handle, so authorization always requests
    /// the union.
    pub fn combined_scopes() -> Vec<String> {
        vec![DOCUMENTS_SCOPE.to_string(), DRIVE_SCOPE.to_string()]
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Docs => write!(f, "docs"),
            ServiceKind::Drive => write!(f, "drive"),
        }
    }
}

/// The credential backing every handle in the process.
#[derive(Debug, Clone)]
pub enum Credential {
    /// Pre-issued service-account key.
    ServiceAccount(ServiceAccountKey),
    /// Token obtained through the user consent flow.
    User(Token),
}

/// Authenticated client object for one remote service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    kind: ServiceKind,
    http: reqwest::Client,
    credential: Arc<Credential>,
}

impl ServiceHandle {
    pub(crate) fn new(kind: ServiceKind, http: reqwest::Client, credential: Arc<Credential>) -> Self {
        Self {
            kind,
            http,
            credential,
        }
    }

    /// Which service this handle addresses.
    pub fn kind(&self) -> ServiceKind {
        self.kind
    }

    /// Base URL of the service's REST API.
    pub fn base_url(&self) -> &'static str {
        self.kind.base_url()
    }

    /// The shared HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// The credential backing this handle.
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Bearer token for request authorization, when the credential is a
    /// user token. Service-account credentials sign per-request assertions
    /// instead and carry no static bearer value.
    pub fn access_token(&self) -> Option<&str> {
        match self.credential.as_ref() {
            Credential::User(token) => Some(&token.access_token),
            Credential::ServiceAccount(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_distinct_endpoints_and_scopes() {
        assert_ne!(ServiceKind::Docs.base_url(), ServiceKind::Drive.base_url());
        assert_ne!(ServiceKind::Docs.scope(), ServiceKind::Drive.scope());
    }

    #[test]
    fn combined_scopes_cover_both_services() {
        let scopes = ServiceKind::combined_scopes();
        assert!(scopes.contains(&ServiceKind::Docs.scope().to_string()));
        assert!(scopes.contains(&ServiceKind::Drive.scope().to_string()));
    }

    #[test]
    fn user_credential_exposes_bearer_token() {
        let token = Token::new("ya29.bearer".to_string(), None, 3600);
        let handle = ServiceHandle::new(
            ServiceKind::Docs,
            reqwest::Client::new(),
            Arc::new(Credential::User(token)),
        );
        assert_eq!(handle.access_token(), Some("ya29.bearer"));
    }

    #[test]
    fn service_account_credential_has_no_static_bearer() {
        let key = ServiceAccountKey::from_json(
            r#"{
                "type": "service_account",
                "client_email": "svc@demo.iam.gserviceaccount.com",
                "private_key": "pem",
                "token_uri": "https://oauth2.googleapis.com/token"
            }"#,
        )
        .unwrap();
        let handle = ServiceHandle::new(
            ServiceKind::Drive,
            reqwest::Client::new(),
            Arc::new(Credential::ServiceAccount(key)),
        );
        assert_eq!(handle.access_token(), None);
    }
}
