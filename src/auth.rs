//! Authentication context and credential storage.
//!
//! Tokens are held in an explicit, shared [`AuthContext`] rather than
//! ambient global state: the REST client reads the access token from it,
//! the refresh path writes through it, and logout clears it. Credentials
//! are persisted to `~/.assistant/credentials.json` so a session
//! survives process restarts.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// The credentials directory name under the home directory.
const CREDENTIALS_DIR: &str = ".assistant";

/// The credentials file name.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Stored authentication credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    /// Bearer access token for REST requests.
    pub access_token: Option<String>,
    /// Refresh token for the one-shot 401 recovery path.
    pub refresh_token: Option<String>,
    /// Access-token expiration as a Unix timestamp (seconds).
    pub expires_at: Option<i64>,
    /// The authenticated user's id.
    pub user_id: Option<String>,
    /// The authenticated user's login name.
    pub username: Option<String>,
}

impl Credentials {
    /// Create new empty credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the credentials carry an access token.
    pub fn has_token(&self) -> bool {
        self.access_token.is_some()
    }

    /// Check if the access token is expired.
    ///
    /// Missing expiration metadata counts as expired so the refresh
    /// path gets a chance to repair the session.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => chrono::Utc::now().timestamp() >= expires_at,
            None => true,
        }
    }

    /// Check if the credentials are usable as-is.
    pub fn is_valid(&self) -> bool {
        self.has_token() && !self.is_expired()
    }
}

/// JWT claims for extracting expiration time.
#[derive(Deserialize)]
struct JwtClaims {
    exp: i64,
}

/// Extract the expiration time from a JWT access token.
///
/// Returns the number of seconds until the token expires, or `None` if
/// the token cannot be parsed. Used when the server omits `expiresIn`.
pub fn jwt_expires_in(access_token: &str) -> Option<u32> {
    let parts: Vec<&str> = access_token.split('.').collect();
    let payload = URL_SAFE_NO_PAD.decode(parts.get(1)?).ok()?;
    let claims: JwtClaims = serde_json::from_slice(&payload).ok()?;
    let now = chrono::Utc::now().timestamp();
    Some((claims.exp - now).max(0) as u32)
}

/// File-backed credential storage.
#[derive(Debug)]
pub struct CredentialsStore {
    /// Path to the credentials file.
    path: PathBuf,
}

impl CredentialsStore {
    /// Create a store rooted at the default location.
    ///
    /// Returns `None` if the home directory cannot be determined.
    pub fn new() -> Option<Self> {
        let home = dirs::home_dir()?;
        Some(Self {
            path: home.join(CREDENTIALS_DIR).join(CREDENTIALS_FILE),
        })
    }

    /// Create a store at an explicit path (used in tests).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the path to the credentials file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load credentials, falling back to empty defaults on any failure.
    pub fn load(&self) -> Credentials {
        if !self.path.exists() {
            return Credentials::default();
        }
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(_) => return Credentials::default(),
        };
        serde_json::from_reader(BufReader::new(file)).unwrap_or_default()
    }

    /// Save credentials, creating the parent directory if needed.
    ///
    /// Returns `true` on success.
    pub fn save(&self, credentials: &Credentials) -> bool {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() && fs::create_dir_all(parent).is_err() {
                return false;
            }
        }
        let file = match File::create(&self.path) {
            Ok(f) => f,
            Err(_) => return false,
        };
        let mut writer = BufWriter::new(file);
        if serde_json::to_writer_pretty(&mut writer, credentials).is_err() {
            return false;
        }
        writer.flush().is_ok()
    }

    /// Remove the credentials file if present.
    pub fn clear(&self) -> bool {
        if !self.path.exists() {
            return true;
        }
        fs::remove_file(&self.path).is_ok()
    }
}

/// Shared handle to the current session's credentials.
///
/// Cloning is cheap; all clones observe the same state. The lock is
/// held only for field reads/writes, never across awaits.
#[derive(Debug, Clone)]
pub struct AuthContext {
    inner: Arc<Mutex<Credentials>>,
    store: Option<Arc<CredentialsStore>>,
}

impl AuthContext {
    /// Create an in-memory context with no persistence.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Credentials::default())),
            store: None,
        }
    }

    /// Create a context hydrated from (and persisted through) a store.
    pub fn with_store(store: CredentialsStore) -> Self {
        let credentials = store.load();
        Self {
            inner: Arc::new(Mutex::new(credentials)),
            store: Some(Arc::new(store)),
        }
    }

    /// Create a context hydrated from the default store location.
    ///
    /// Falls back to an in-memory context if no home directory exists.
    pub fn hydrate() -> Self {
        match CredentialsStore::new() {
            Some(store) => Self::with_store(store),
            None => Self::in_memory(),
        }
    }

    /// Current access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.inner.lock().unwrap().access_token.clone()
    }

    /// Current refresh token, if any.
    pub fn refresh_token(&self) -> Option<String> {
        self.inner.lock().unwrap().refresh_token.clone()
    }

    /// Whether a token is present (regardless of expiry).
    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().unwrap().has_token()
    }

    /// Snapshot of the full credentials.
    pub fn credentials(&self) -> Credentials {
        self.inner.lock().unwrap().clone()
    }

    /// Install a fresh token pair, computing expiry from `expires_in`
    /// or, failing that, from the JWT `exp` claim. Persists through the
    /// store when one is attached.
    pub fn set_tokens(
        &self,
        access_token: String,
        refresh_token: Option<String>,
        expires_in: Option<u32>,
    ) {
        let expires_in = expires_in.or_else(|| jwt_expires_in(&access_token));
        let mut creds = self.inner.lock().unwrap();
        creds.access_token = Some(access_token);
        if let Some(refresh) = refresh_token {
            creds.refresh_token = Some(refresh);
        }
        creds.expires_at = expires_in.map(|s| chrono::Utc::now().timestamp() + s as i64);
        if let Some(store) = &self.store {
            store.save(&creds);
        }
    }

    /// Record the authenticated user's identity.
    pub fn set_user(&self, user_id: Option<String>, username: Option<String>) {
        let mut creds = self.inner.lock().unwrap();
        creds.user_id = user_id;
        creds.username = username;
        if let Some(store) = &self.store {
            store.save(&creds);
        }
    }

    /// Clear the session: wipe in-memory credentials and the store.
    pub fn clear(&self) {
        let mut creds = self.inner.lock().unwrap();
        *creds = Credentials::default();
        if let Some(store) = &self.store {
            store.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_default_is_empty() {
        let creds = Credentials::new();
        assert!(!creds.has_token());
        assert!(creds.is_expired());
        assert!(!creds.is_valid());
    }

    #[test]
    fn test_credentials_valid_when_unexpired() {
        let creds = Credentials {
            access_token: Some("token".to_string()),
            expires_at: Some(chrono::Utc::now().timestamp() + 3600),
            ..Default::default()
        };
        assert!(creds.is_valid());
    }

    #[test]
    fn test_credentials_expired_in_past() {
        let creds = Credentials {
            access_token: Some("token".to_string()),
            expires_at: Some(0),
            ..Default::default()
        };
        assert!(creds.is_expired());
        assert!(!creds.is_valid());
    }

    #[test]
    fn test_jwt_expires_in_invalid_token() {
        assert!(jwt_expires_in("not-a-jwt").is_none());
        assert!(jwt_expires_in("").is_none());
    }

    #[test]
    fn test_jwt_expires_in_valid_token() {
        // Build a token expiring one hour from now
        let exp = chrono::Utc::now().timestamp() + 3600;
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
        let token = format!("header.{}.signature", payload);

        let remaining = jwt_expires_in(&token).unwrap();
        assert!(remaining > 3500 && remaining <= 3600);
    }

    #[test]
    fn test_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsStore::with_path(dir.path().join("creds.json"));

        let creds = Credentials {
            access_token: Some("access".to_string()),
            refresh_token: Some("refresh".to_string()),
            expires_at: Some(123),
            user_id: Some("u1".to_string()),
            username: Some("alice".to_string()),
        };
        assert!(store.save(&creds));
        assert_eq!(store.load(), creds);

        assert!(store.clear());
        assert_eq!(store.load(), Credentials::default());
    }

    #[test]
    fn test_store_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialsStore::with_path(dir.path().join("absent.json"));
        assert_eq!(store.load(), Credentials::default());
    }

    #[test]
    fn test_auth_context_set_and_clear() {
        let ctx = AuthContext::in_memory();
        assert!(!ctx.is_authenticated());

        ctx.set_tokens("access".to_string(), Some("refresh".to_string()), Some(3600));
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.access_token(), Some("access".to_string()));
        assert_eq!(ctx.refresh_token(), Some("refresh".to_string()));
        assert!(ctx.credentials().is_valid());

        ctx.clear();
        assert!(!ctx.is_authenticated());
        assert!(ctx.access_token().is_none());
    }

    #[test]
    fn test_auth_context_refresh_token_preserved() {
        let ctx = AuthContext::in_memory();
        ctx.set_tokens("a1".to_string(), Some("r1".to_string()), Some(60));
        // Rotating only the access token keeps the old refresh token
        ctx.set_tokens("a2".to_string(), None, Some(60));
        assert_eq!(ctx.refresh_token(), Some("r1".to_string()));
    }

    #[test]
    fn test_auth_context_persists_through_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.json");

        let ctx = AuthContext::with_store(CredentialsStore::with_path(path.clone()));
        ctx.set_tokens("access".to_string(), Some("refresh".to_string()), Some(3600));
        ctx.set_user(Some("u1".to_string()), Some("alice".to_string()));

        // A fresh context hydrates the persisted session
        let rehydrated = AuthContext::with_store(CredentialsStore::with_path(path));
        assert_eq!(rehydrated.access_token(), Some("access".to_string()));
        assert_eq!(rehydrated.credentials().username, Some("alice".to_string()));
    }
}
