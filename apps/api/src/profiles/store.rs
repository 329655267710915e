use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::agents::AgentHandle;
use crate::profiles::models::{ProfileRow, PublicPersonaRow};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Persistence for profiles, their public projection, and recorded agent provisions.
///
/// Each write is independent; nothing here spans a transaction across tables.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<ProfileRow>, StoreError>;

    /// Insert-or-replace keyed by `user_id`. Returns the stored row.
    async fn upsert_profile(&self, profile: &ProfileRow) -> Result<ProfileRow, StoreError>;

    async fn upsert_public(&self, entry: &PublicPersonaRow) -> Result<(), StoreError>;

    async fn delete_public(&self, user_id: Uuid) -> Result<(), StoreError>;

    async fn list_public(&self) -> Result<Vec<PublicPersonaRow>, StoreError>;

    async fn find_provision(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<AgentHandle>, StoreError>;

    async fn record_provision(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
        agent: &AgentHandle,
    ) -> Result<(), StoreError>;
}

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn get_profile(&self, user_id: Uuid) -> Result<Option<ProfileRow>, StoreError> {
        Ok(
            sqlx::query_as::<_, ProfileRow>("SELECT * FROM profiles WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn upsert_profile(&self, profile: &ProfileRow) -> Result<ProfileRow, StoreError> {
        // random_persona_name and created_at are kept from the first insert.
        Ok(sqlx::query_as::<_, ProfileRow>(
            r#"
            INSERT INTO profiles
                (user_id, first_name, last_name, bio, resume_text, resume_key,
                 avatar_url, is_public, agent_id, random_persona_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (user_id) DO UPDATE SET
                first_name  = EXCLUDED.first_name,
                last_name   = EXCLUDED.last_name,
                bio         = EXCLUDED.bio,
                resume_text = EXCLUDED.resume_text,
                resume_key  = EXCLUDED.resume_key,
                avatar_url  = EXCLUDED.avatar_url,
                is_public   = EXCLUDED.is_public,
                agent_id    = EXCLUDED.agent_id,
                updated_at  = NOW()
            RETURNING *
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.bio)
        .bind(&profile.resume_text)
        .bind(&profile.resume_key)
        .bind(&profile.avatar_url)
        .bind(profile.is_public)
        .bind(&profile.agent_id)
        .bind(&profile.random_persona_name)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn upsert_public(&self, entry: &PublicPersonaRow) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO public_personas (id, first_name, avatar_url, agent_id, random_persona_name)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                first_name          = EXCLUDED.first_name,
                avatar_url          = EXCLUDED.avatar_url,
                agent_id            = EXCLUDED.agent_id,
                random_persona_name = EXCLUDED.random_persona_name,
                updated_at          = NOW()
            "#,
        )
        .bind(entry.id)
        .bind(&entry.first_name)
        .bind(&entry.avatar_url)
        .bind(&entry.agent_id)
        .bind(&entry.random_persona_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_public(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM public_personas WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_public(&self) -> Result<Vec<PublicPersonaRow>, StoreError> {
        Ok(sqlx::query_as::<_, PublicPersonaRow>(
            "SELECT id, first_name, avatar_url, agent_id, random_persona_name FROM public_personas",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_provision(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
    ) -> Result<Option<AgentHandle>, StoreError> {
        let agent_id: Option<String> = sqlx::query_scalar(
            "SELECT agent_id FROM agent_provisions WHERE user_id = $1 AND idempotency_key = $2",
        )
        .bind(user_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(agent_id.map(AgentHandle))
    }

    async fn record_provision(
        &self,
        user_id: Uuid,
        idempotency_key: &str,
        agent: &AgentHandle,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO agent_provisions (user_id, idempotency_key, agent_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, idempotency_key) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(idempotency_key)
        .bind(agent.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
