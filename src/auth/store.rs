//! Persistent token cache (`~/.polar/tokens.json`).
//!
//! Tokens are stored in plaintext inside the user's home directory. The file
//! is created with owner-only permissions; that directory is the trust
//! boundary. There is no cross-process lock: two CLI invocations logging into
//! the same environment concurrently resolve as last-writer-wins.

use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::error::TokenFileError;
use super::types::{Token, Tokens};

/// Returns the default token cache path (`~/.polar/tokens.json`) when a home
/// directory is available.
pub fn default_token_store_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".polar").join("tokens.json"))
}

/// JSON-file-backed token cache.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole cache, creating an empty `{}` document (and parent
    /// directories) first when the file does not exist yet.
    pub fn read(&self) -> Result<Tokens, TokenFileError> {
        self.ensure_exists()?;
        let text = std::fs::read_to_string(&self.path).map_err(|source| self.access(source))?;
        // Files created by very old builds were empty rather than `{}`.
        if text.trim().is_empty() {
            return Ok(Tokens::default());
        }
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| TokenFileError::Malformed {
                path: self.path.clone(),
                source,
            })?;
        serde_json::from_value(value).map_err(|source| TokenFileError::SchemaMismatch {
            path: self.path.clone(),
            source,
        })
    }

    /// Replace the entry for `token.server`, preserving the other environment.
    pub fn write(&self, token: &Token) -> Result<(), TokenFileError> {
        let mut tokens = self.read()?;
        tokens.set(token.clone());
        self.write_all(&tokens)?;
        debug!(server = %token.server, path = %self.path.display(), "saved token");
        Ok(())
    }

    fn ensure_exists(&self) -> Result<(), TokenFileError> {
        if self.path.exists() {
            return Ok(());
        }
        debug!(path = %self.path.display(), "creating empty token cache");
        self.write_all(&Tokens::default())
    }

    /// Serialize and atomically replace the cache file.
    fn write_all(&self, tokens: &Tokens) -> Result<(), TokenFileError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| self.access(source))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o700));
            }
        }

        let text = serde_json::to_string_pretty(tokens).map_err(|source| {
            TokenFileError::SchemaMismatch {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        let mut options = std::fs::OpenOptions::new();
        options.create(true).truncate(true).write(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&tmp_path).map_err(|source| self.access(source))?;
        file.write_all(text.as_bytes())
            .and_then(|_| file.flush())
            .map_err(|source| self.access(source))?;
        drop(file);
        std::fs::rename(&tmp_path, &self.path).map_err(|source| self.access(source))?;
        Ok(())
    }

    fn access(&self, source: std::io::Error) -> TokenFileError {
        TokenFileError::AccessDenied {
            path: self.path.clone(),
            source,
        }
    }
}
