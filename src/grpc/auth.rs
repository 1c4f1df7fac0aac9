//! Credential lookup and outbound request authentication.
//!
//! Workers calling back into the runtime stamp every request with two
//! metadata fields, `token` and `key`, read from a credential store under
//! the fixed service name [`KEYRING_SERVICE`]. When either secret is
//! missing, requests go out unauthenticated.
//!
//! [`KeyringCredentialStore`] reads the operating system's secret store and
//! is what a deployed worker normally uses.

use crate::error::{ClientError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::interceptor::InterceptedService;
use tonic::service::Interceptor;
use tonic::transport::Channel;
use tonic::{Request, Status};

/// Service name under which worker credentials are stored
pub const KEYRING_SERVICE: &str = "tierkreis_extensions";

/// Channel type used by every runtime stub
pub type AuthChannel = InterceptedService<Channel, CredentialInterceptor>;

/// Token and key pair attached to outbound requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub key: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("key", &"<redacted>")
            .finish()
    }
}

/// A local secret store, looked up by service and user name.
///
/// A missing entry is `Ok(None)`; errors are reserved for a store that
/// cannot be read at all.
pub trait CredentialStore: Send + Sync {
    fn get_password(&self, service: &str, username: &str) -> Result<Option<String>>;
}

/// Read the `token` and `key` secrets; `None` unless both are present.
pub fn lookup_credentials(store: &dyn CredentialStore) -> Result<Option<Credentials>> {
    let Some(token) = store.get_password(KEYRING_SERVICE, "token")? else {
        return Ok(None);
    };
    let Some(key) = store.get_password(KEYRING_SERVICE, "key")? else {
        return Ok(None);
    };
    Ok(Some(Credentials { token, key }))
}

/// Store backed by the platform keyring (Keychain, Credential Manager or
/// the kernel keyring on Linux).
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyringCredentialStore;

impl CredentialStore for KeyringCredentialStore {
    fn get_password(&self, service: &str, username: &str) -> Result<Option<String>> {
        match keyring::Entry::new(service, username)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Store that never has credentials
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCredentials;

impl CredentialStore for NoCredentials {
    fn get_password(&self, _service: &str, _username: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// In-process store, mostly useful for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<HashMap<(String, String), String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `token` and `key` under [`KEYRING_SERVICE`].
    pub fn with_credentials(token: &str, key: &str) -> Self {
        let store = Self::new();
        store.set_password(KEYRING_SERVICE, "token", token);
        store.set_password(KEYRING_SERVICE, "key", key);
        store
    }

    pub fn set_password(&self, service: &str, username: &str, password: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (service.to_string(), username.to_string()),
                password.to_string(),
            );
    }

    pub fn delete_password(&self, service: &str, username: &str) -> Option<String> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(service.to_string(), username.to_string()))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get_password(&self, service: &str, username: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(service.to_string(), username.to_string()))
            .cloned())
    }
}

/// Store backed by environment variables.
///
/// `get_password("tierkreis_extensions", "token")` reads
/// `TIERKREIS_EXTENSIONS_TOKEN`.
#[derive(Clone, Copy, Debug, Default)]
pub struct EnvCredentialStore;

impl EnvCredentialStore {
    pub fn variable_name(service: &str, username: &str) -> String {
        format!("{}_{}", service, username).to_uppercase().replace(['-', '.'], "_")
    }
}

impl CredentialStore for EnvCredentialStore {
    fn get_password(&self, service: &str, username: &str) -> Result<Option<String>> {
        Ok(std::env::var(Self::variable_name(service, username))
            .ok()
            .filter(|value| !value.is_empty()))
    }
}

/// Interceptor stamping `token` and `key` metadata on every request.
///
/// Without credentials it passes requests through untouched.
#[derive(Clone, Default)]
pub struct CredentialInterceptor {
    metadata: Option<(MetadataValue<Ascii>, MetadataValue<Ascii>)>,
}

impl CredentialInterceptor {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(credentials: &Credentials) -> Result<Self> {
        let token = credentials
            .token
            .parse::<MetadataValue<Ascii>>()
            .map_err(|_| ClientError::InvalidCredentials("token is not valid ASCII metadata".to_string()))?;
        let key = credentials
            .key
            .parse::<MetadataValue<Ascii>>()
            .map_err(|_| ClientError::InvalidCredentials("key is not valid ASCII metadata".to_string()))?;
        Ok(Self {
            metadata: Some((token, key)),
        })
    }

    /// Build from whatever `store` holds, skipping injection when a secret is missing.
    pub fn from_store(store: &dyn CredentialStore) -> Result<Self> {
        match lookup_credentials(store)? {
            Some(credentials) => Self::new(&credentials),
            None => Ok(Self::none()),
        }
    }

    pub fn is_active(&self) -> bool {
        self.metadata.is_some()
    }
}

impl fmt::Debug for CredentialInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialInterceptor")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Interceptor for CredentialInterceptor {
    fn call(&mut self, mut request: Request<()>) -> std::result::Result<Request<()>, Status> {
        if let Some((token, key)) = &self.metadata {
            request.metadata_mut().insert("token", token.clone());
            request.metadata_mut().insert("key", key.clone());
        }
        Ok(request)
    }
}
