use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::agents::AgentHandle;
use crate::profiles::models::{ProfileRow, PublicPersonaRow};
use crate::profiles::store::{ProfileStore, StoreError};

/// In-memory `ProfileStore` with switchable write failures.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<Uuid, ProfileRow>>,
    public: RwLock<HashMap<Uuid, PublicPersonaRow>>,
    provisions: RwLock<HashMap<(Uuid, String), AgentHandle>>,
    pub fail_profile_writes: AtomicBool,
    pub fail_public_writes: AtomicBool,
    /// Number of `get_profile` calls.
    pub profile_reads: AtomicUsize,
}

impl MemoryProfileStore {
    pub async fn public_entry(&self, user_id: Uuid) -> Option<PublicPersonaRow> {
        self.public.read().await.get(&user_id).cloned()
    }

    fn check(flag: &AtomicBool) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<ProfileRow>, StoreError> {
        self.profile_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn upsert_profile(&self, profile: &ProfileRow) -> Result<ProfileRow, StoreError> {
        Self::check(&self.fail_profile_writes)?;
        let mut profiles = self.profiles.write().await;
        let mut stored = profile.clone();
        if let Some(existing) = profiles.get(&profile.user_id) {
            stored.random_persona_name = existing.random_persona_name.clone();
            stored.created_at = existing.created_at;
        }
        stored.updated_at = Utc::now();
        profiles.insert(stored.user_id, stored.clone());
        Ok(stored)
    }

    async fn upsert_public(&self, entry: &PublicPersonaRow) -> Result<(), StoreError> {
        Self::check(&self.fail_public_writes)?;
        self.public.write().await.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn delete_public(&self, user_id: Uuid) -> Result<(), StoreError> {
        Self::check(&self.fail_public_writes)?;
        self.public.write().await.remove(&user_id);
        Ok(())
    }

    async fn list_public(&self) -> Result<Vec<PublicPersonaRow>, StoreError> {
        Ok(self.public.read().await.values().cloned().collect())
    }

    async fn find_provision(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<AgentHandle>, StoreError> {
        Ok(self
            .provisions
            .read()
            .await
            .get(&(user_id, idempotency_key.to_string()))
            .cloned())
    }

    async fn record_provision(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
        agent: &AgentHandle,
    ) -> Result<(), StoreError> {
        self.provisions
            .write()
            .await
            .entry((user_id, idempotency_key.to_string()))
            .or_insert_with(|| agent.clone());
        Ok(())
    }
}
