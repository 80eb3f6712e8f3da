//! Token persistence.
//!
//! The token rests in a JSON file owned exclusively by the current process
//! for the duration of a run. Any load failure means "no usable cached
//! token" and is recoverable by running the interactive flow; a save failure
//! is fatal, since an unpersisted token forces re-authorization on every
//! restart.
//!
//! Writes go to a same-directory temp file created with owner-only
//! permissions and are renamed over the target, so a partially written file
//! is never the only copy.

use crate::error::{AuthError, Result};
use crate::types::Token;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// File-backed store for the cached token.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Create a store over the given token file location.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The token file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cached token.
    ///
    /// Any I/O or parse failure surfaces as [`AuthError::TokenNotFound`];
    /// callers treat it as "run the interactive flow", never as fatal.
    pub async fn load(&self) -> Result<Token> {
        let data = tokio::fs::read(&self.path).await.map_err(|e| {
            debug!(path = %self.path.display(), error = %e, "No readable token file");
            AuthError::TokenNotFound(format!("{}: {}", self.path.display(), e))
        })?;

        let token: Token = serde_json::from_slice(&data).map_err(|e| {
            warn!(
                path = %self.path.display(),
                error = %e,
                "Token file exists but could not be parsed"
            );
            AuthError::TokenNotFound(format!("unparseable token file: {}", e))
        })?;

        info!(
            path = %self.path.display(),
            has_refresh_token = token.refresh_token.is_some(),
            "Loaded cached token"
        );

        Ok(token)
    }

    /// Persist a token, replacing any prior content.
    pub async fn save(&self, token: &Token) -> Result<()> {
        let json = serde_json::to_vec_pretty(token)
            .map_err(|e| AuthError::Persistence(format!("token serialization: {}", e)))?;

        let tmp_path = self.temp_path();
        write_owner_only(&tmp_path, &json)
            .await
            .map_err(|e| AuthError::Persistence(format!("{}: {}", tmp_path.display(), e)))?;

        tokio::fs::rename(&tmp_path, &self.path).await.map_err(|e| {
            AuthError::Persistence(format!(
                "renaming {} to {}: {}",
                tmp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        info!(
            path = %self.path.display(),
            has_refresh_token = token.refresh_token.is_some(),
            "Token stored"
        );

        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(unix)]
async fn write_owner_only(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.flush().await
}

#[cfg(not(unix))]
async fn write_owner_only(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .await?;
    file.write_all(data).await?;
    file.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_token() -> Token {
        Token::new(
            "access_token_123".to_string(),
            Some("refresh_token_456".to_string()),
            3600,
        )
    }

    #[tokio::test]
    async fn save_then_load_round_trips_every_field() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        let token = sample_token();
        store.save(&token).await.expect("save should succeed");

        let loaded = store.load().await.expect("load should succeed");
        assert_eq!(loaded, token);
    }

    #[tokio::test]
    async fn load_missing_file_is_token_not_found() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("absent.json"));

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound(_)));
    }

    #[tokio::test]
    async fn load_corrupt_file_is_token_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();

        let store = TokenStore::new(&path);
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, AuthError::TokenNotFound(_)));
    }

    #[tokio::test]
    async fn save_overwrites_previous_token() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));

        store.save(&sample_token()).await.unwrap();

        let replacement = Token::new("new_access".to_string(), None, 7200);
        store.save(&replacement).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.access_token, "new_access");
        assert!(loaded.refresh_token.is_none());
    }

    #[tokio::test]
    async fn save_leaves_no_temp_file_behind() {
        let dir = tempdir().unwrap();
        let store = TokenStore::new(dir.path().join("token.json"));
        store.save(&sample_token()).await.unwrap();

        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        assert_eq!(names, vec!["token.json"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn saved_file_is_owner_read_write_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("token.json");
        let store = TokenStore::new(&path);
        store.save(&sample_token()).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
