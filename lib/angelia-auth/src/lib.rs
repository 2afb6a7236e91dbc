use std::future::Future;

use argon2::{
    Argon2,
    password_hash::{PasswordHasher, PasswordVerifier, rand_core::OsRng, SaltString},
};
use thiserror::Error;

use angelia_messenger::authorization::Authenticator;
use angelia_messenger::UserId;

// TODO: deduplicate with angelia-messenger's data_access
macro_rules! async_result {
    ($t:ty) => {
        impl Future<Output = Result<$t, Self::Error>> + Send
    };
}

/// Where PHC-encoded password hashes live, keyed by user id. How a backend
/// maps nicknames to login identities is its own concern, not this crate's.
pub trait CredentialStore: 'static + Send + Sync + Clone {
    type Error: 'static + std::error::Error + Send + Sync;

    fn fetch_credentials(&self, user_id: &UserId) -> async_result!(Option<StoredCredentials>);
    /// Replaces any previous credentials; returns the old ones if present.
    fn store_credentials(&self, user_id: &UserId, credentials: StoredCredentials) -> async_result!(Option<StoredCredentials>);
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential storage failed: {0:#}")]
    Storage(anyhow::Error),
    #[error("password hashing failed: {0}")]
    Hashing(argon2::password_hash::Error),
    #[error("hashing task failed: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Argon2 authenticator over a pluggable credential store. Hashing and
/// verification run on the blocking pool.
#[derive(Clone)]
pub struct PasswordAuthenticator<C> {
    credentials: C,
}

impl<C> PasswordAuthenticator<C> {
    pub fn new(credentials: C) -> Self {
        Self { credentials }
    }
}

impl<C: CredentialStore> Authenticator for PasswordAuthenticator<C> {
    type Error = AuthError;

    async fn verify(&self, user_id: &UserId, password: String) -> Result<bool, AuthError> {
        let stored = self.credentials
            .fetch_credentials(user_id).await
            .map_err(|e| {
                AuthError::Storage(
                    anyhow::Error::new(e).context(format!("couldn't fetch credentials of {user_id}")),
                )
            })?;

        let stored = match stored {
            Some(stored) => stored,
            None => return Ok(false),
        };

        let handle = tokio::task::spawn_blocking(move || {
            let password_hash = stored.phc_string().password_hash();
            Argon2::default().verify_password(password.as_bytes(), &password_hash).is_ok()
        });

        Ok(handle.await?)
    }

    async fn register(&self, user_id: &UserId, password: String) -> Result<(), AuthError> {
        let handle = tokio::task::spawn_blocking(move || {
            let salt = SaltString::generate(OsRng);
            Argon2::default()
                .hash_password(password.as_bytes(), &salt)
                .map(StoredCredentials::from)
        });

        let credentials = handle.await?.map_err(AuthError::Hashing)?;

        self.credentials
            .store_credentials(user_id, credentials).await
            .map_err(|e| {
                AuthError::Storage(
                    anyhow::Error::new(e).context(format!("couldn't store credentials of {user_id}")),
                )
            })?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct StoredCredentials {
    phc_string: password_hash::PasswordHashString,
}

impl StoredCredentials {
    pub fn phc_string(&self) -> &password_hash::PasswordHashString {
        &self.phc_string
    }
}

impl<'a> From<password_hash::PasswordHash<'a>> for StoredCredentials {
    fn from(value: password_hash::PasswordHash<'a>) -> Self {
        StoredCredentials { phc_string: value.into() }
    }
}

impl From<password_hash::PasswordHashString> for StoredCredentials {
    fn from(value: password_hash::PasswordHashString) -> Self {
        StoredCredentials { phc_string: value }
    }
}
