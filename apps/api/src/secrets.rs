//! Server-side store for third-party credentials supplied by users.
//!
//! Credentials live only in `provider_credentials`. They are never echoed back to
//! clients, never logged, and are held as `SecretString` once loaded.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Which external service a stored credential belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// Conversational-agent provider key.
    Agent,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialKind::Agent => "agent",
        }
    }
}

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn put(
        &self,
        user_id: Uuid,
        kind: CredentialKind,
        secret: &SecretString,
    ) -> Result<(), SecretStoreError>;

    async fn get(
        &self,
        user_id: Uuid,
        kind: CredentialKind,
    ) -> Result<Option<SecretString>, SecretStoreError>;

    async fn has(&self, user_id: Uuid, kind: CredentialKind) -> Result<bool, SecretStoreError> {
        Ok(self.get(user_id, kind).await?.is_some())
    }
}

pub struct PgSecretStore {
    pool: PgPool,
}

impl PgSecretStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretStore for PgSecretStore {
    async fn put(
        &self,
        user_id: Uuid,
        kind: CredentialKind,
        secret: &SecretString,
    ) -> Result<(), SecretStoreError> {
        sqlx::query(
            r#"
            INSERT INTO provider_credentials (user_id, provider, secret)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, provider)
            DO UPDATE SET secret = EXCLUDED.secret, updated_at = NOW()
            "#,
        )
        .bind(user_id)
        .bind(kind.as_str())
        .bind(secret.expose_secret())
        .execute(&self.pool)
        .await?;

        info!("Stored {} credential for user {user_id}", kind.as_str());
        Ok(())
    }

    async fn get(
        &self,
        user_id: Uuid,
        kind: CredentialKind,
    ) -> Result<Option<SecretString>, SecretStoreError> {
        let secret: Option<String> = sqlx::query_scalar(
            "SELECT secret FROM provider_credentials WHERE user_id = $1 AND provider = $2",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(secret.map(SecretString::from))
    }

    async fn has(&self, user_id: Uuid, kind: CredentialKind) -> Result<bool, SecretStoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM provider_credentials WHERE user_id = $1 AND provider = $2)",
        )
        .bind(user_id)
        .bind(kind.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}

#[cfg(test)]
pub mod memory {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::RwLock;

    use super::*;

    #[derive(Default)]
    pub struct MemorySecretStore {
        secrets: RwLock<HashMap<(Uuid, CredentialKind), String>>,
        /// Number of lookups, including `has`.
        pub reads: AtomicUsize,
    }

    #[async_trait]
    impl SecretStore for MemorySecretStore {
        async fn put(
            &self,
            user_id: Uuid,
            kind: CredentialKind,
            secret: &SecretString,
        ) -> Result<(), SecretStoreError> {
            self.secrets
                .write()
                .await
                .insert((user_id, kind), secret.expose_secret().to_string());
            Ok(())
        }

        async fn get(
            &self,
            user_id: Uuid,
            kind: CredentialKind,
        ) -> Result<Option<SecretString>, SecretStoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .secrets
                .read()
                .await
                .get(&(user_id, kind))
                .cloned()
                .map(SecretString::from))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemorySecretStore;
    use super::*;

    #[tokio::test]
    async fn test_put_then_get_round_trips_per_user() {
        let store = MemorySecretStore::default();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        store
            .put(alice, CredentialKind::Agent, &SecretString::from("key-a"))
            .await
            .unwrap();

        let got = store.get(alice, CredentialKind::Agent).await.unwrap();
        assert_eq!(got.unwrap().expose_secret(), "key-a");
        assert!(!store.has(bob, CredentialKind::Agent).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites_previous_secret() {
        let store = MemorySecretStore::default();
        let user = Uuid::new_v4();
        for key in ["old", "new"] {
            store
                .put(user, CredentialKind::Agent, &SecretString::from(key))
                .await
                .unwrap();
        }
        let got = store.get(user, CredentialKind::Agent).await.unwrap().unwrap();
        assert_eq!(got.expose_secret(), "new");
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = SecretString::from("sk_live_do_not_print");
        assert!(!format!("{secret:?}").contains("sk_live_do_not_print"));
    }
}
