//! Bearer token storage.
//!
//! The token comes from an external identity provider; this crate only keeps
//! it. [`TokenStore`] is read once at startup and invalidated explicitly on
//! logout or when the service rejects the token. Callers take a copy with
//! [`TokenStore::current`] and hand it to [`crate::HttpApi::new`]; nothing
//! else reads the file.
//!
//! Default location:
//! - **Linux**: `~/.config/article2audio/token`
//! - **macOS**: `~/Library/Application Support/article2audio/token`
//! - **Windows**: `%APPDATA%\article2audio\token`
//!
//! Override by setting `ARTICLE2AUDIO_TOKEN_FILE`.

use crate::api::{HttpApi, VerifiedUser};
use crate::config::ClientConfig;
use crate::error::Article2AudioError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{OnceLock, RwLock};
use tracing::{debug, info, warn};

static GLOBAL: OnceLock<TokenStore> = OnceLock::new();

/// Persisted bearer token.
#[derive(Debug)]
pub struct TokenStore {
    path: PathBuf,
    token: RwLock<Option<String>>,
}

impl TokenStore {
    /// Where the token lives unless a path is given explicitly.
    pub fn default_path() -> PathBuf {
        if let Ok(p) = std::env::var("ARTICLE2AUDIO_TOKEN_FILE") {
            if !p.is_empty() {
                return PathBuf::from(p);
            }
        }

        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(std::env::temp_dir);

        base.join("article2audio").join("token")
    }

    /// Read the token at `path`. A missing or empty file means signed out.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Article2AudioError> {
        let path = path.into();
        let token = match std::fs::read_to_string(&path) {
            Ok(s) => Some(s.trim().to_string()).filter(|t| !t.is_empty()),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => return Err(Article2AudioError::TokenStore { path, source: e }),
        };
        debug!(
            "Token store {}: {}",
            path.display(),
            if token.is_some() { "signed in" } else { "signed out" }
        );
        Ok(Self {
            path,
            token: RwLock::new(token),
        })
    }

    /// Load the process-wide store once; later calls return the same store.
    pub fn init_global(path: impl Into<PathBuf>) -> Result<&'static TokenStore, Article2AudioError> {
        if let Some(store) = GLOBAL.get() {
            return Ok(store);
        }
        let store = Self::load(path)?;
        // Racing initialisers read the same file; whichever wins is fine.
        Ok(GLOBAL.get_or_init(|| store))
    }

    /// The process-wide store, if [`TokenStore::init_global`] ran.
    pub fn global() -> Option<&'static TokenStore> {
        GLOBAL.get()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    /// Persist `token` and make it current.
    pub fn set(&self, token: &str) -> Result<(), Article2AudioError> {
        let token = token.trim();
        if token.is_empty() {
            return self.clear();
        }
        let err = |e| Article2AudioError::TokenStore {
            path: self.path.clone(),
            source: e,
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(err)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, token).map_err(err)?;
        restrict_permissions(&tmp).map_err(err)?;
        std::fs::rename(&tmp, &self.path).map_err(err)?;

        *self.token.write().unwrap_or_else(|e| e.into_inner()) = Some(token.to_string());
        Ok(())
    }

    /// Forget the token, on disk and in memory.
    pub fn clear(&self) -> Result<(), Article2AudioError> {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Article2AudioError::TokenStore {
                path: self.path.clone(),
                source: e,
            }),
        }
    }
}

/// Verify `token` with the service and store it on success.
///
/// A rejected token is cleared from the store so later runs start signed
/// out instead of failing every request.
pub async fn sign_in(
    config: &ClientConfig,
    store: &TokenStore,
    token: &str,
) -> Result<VerifiedUser, Article2AudioError> {
    let api = HttpApi::new(config, None)?;
    match api.verify_token(token).await {
        Ok(user) => {
            store.set(token)?;
            info!("Signed in as {}", user.userid);
            Ok(user)
        }
        Err(e @ Article2AudioError::Unauthorized { .. }) => {
            warn!("Token rejected by the service; clearing stored token");
            store.clear()?;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// Forget the stored token.
pub fn sign_out(store: &TokenStore) -> Result<(), Article2AudioError> {
    store.clear()?;
    info!("Signed out");
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
