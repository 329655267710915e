use serde::Serialize;
use tracing::{info, warn};

use crate::profiles::models::{ProfileRow, PublicPersonaRow};
use crate::profiles::store::{ProfileStore, StoreError};

/// What happened to the public projection after a profile write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "reason")]
pub enum ProjectionOutcome {
    Published,
    Withdrawn,
    /// The profile was saved but the public listing is stale until the next write.
    Lagging(String),
}

#[derive(Debug, Clone)]
pub struct PersistOutcome {
    pub profile: ProfileRow,
    pub projection: ProjectionOutcome,
}

/// Upserts the profile, then reconciles its public projection.
///
/// A profile write failure is returned as an error. A projection failure is not:
/// the profile stays written and the outcome reports the listing as lagging.
pub async fn persist_persona(
    store: &dyn ProfileStore,
    profile: &ProfileRow,
) -> Result<PersistOutcome, StoreError> {
    let stored = store.upsert_profile(profile).await?;
    info!(
        "Profile saved for user {} (public: {})",
        stored.user_id, stored.is_public
    );

    let projection = reconcile_projection(store, &stored).await;
    Ok(PersistOutcome {
        profile: stored,
        projection,
    })
}

async fn reconcile_projection(store: &dyn ProfileStore, profile: &ProfileRow) -> ProjectionOutcome {
    let result = if profile.is_public {
        store
            .upsert_public(&PublicPersonaRow::from(profile))
            .await
            .map(|_| ProjectionOutcome::Published)
    } else {
        store
            .delete_public(profile.user_id)
            .await
            .map(|_| ProjectionOutcome::Withdrawn)
    };

    result.unwrap_or_else(|e| {
        warn!(
            "Public listing for user {} not reconciled: {e}",
            profile.user_id
        );
        ProjectionOutcome::Lagging(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use uuid::Uuid;

    use super::*;
    use crate::profiles::memory::MemoryProfileStore;
    use crate::profiles::models::sample_profile;

    #[tokio::test]
    async fn test_public_profile_publishes_matching_entry() {
        let store = MemoryProfileStore::default();
        let profile = sample_profile(Uuid::new_v4(), "Jordan", true);

        let outcome = persist_persona(&store, &profile).await.unwrap();
        assert_eq!(outcome.projection, ProjectionOutcome::Published);

        let entry = store.public_entry(profile.user_id).await.unwrap();
        assert_eq!(entry.first_name, "Jordan");
        assert_eq!(entry.avatar_url, profile.avatar_url);
    }

    #[tokio::test]
    async fn test_private_profile_removes_existing_entry() {
        let store = MemoryProfileStore::default();
        let mut profile = sample_profile(Uuid::new_v4(), "Jordan", true);
        persist_persona(&store, &profile).await.unwrap();
        assert!(store.public_entry(profile.user_id).await.is_some());

        profile.is_public = false;
        let outcome = persist_persona(&store, &profile).await.unwrap();
        assert_eq!(outcome.projection, ProjectionOutcome::Withdrawn);
        assert!(store.public_entry(profile.user_id).await.is_none());
        assert!(store.list_public().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_private_profile_never_published() {
        let store = MemoryProfileStore::default();
        let profile = sample_profile(Uuid::new_v4(), "Sam", false);
        persist_persona(&store, &profile).await.unwrap();
        assert!(store.public_entry(profile.user_id).await.is_none());
    }

    #[tokio::test]
    async fn test_projection_failure_keeps_profile() {
        let store = MemoryProfileStore::default();
        store.fail_public_writes.store(true, Ordering::SeqCst);
        let profile = sample_profile(Uuid::new_v4(), "Jordan", true);

        let outcome = persist_persona(&store, &profile).await.unwrap();
        assert!(matches!(outcome.projection, ProjectionOutcome::Lagging(_)));
        assert!(store.get_profile(profile.user_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_profile_failure_is_fatal_and_skips_projection() {
        let store = MemoryProfileStore::default();
        store.fail_profile_writes.store(true, Ordering::SeqCst);
        let profile = sample_profile(Uuid::new_v4(), "Jordan", true);

        assert!(persist_persona(&store, &profile).await.is_err());
        assert!(store.public_entry(profile.user_id).await.is_none());
    }

    #[tokio::test]
    async fn test_persona_name_kept_across_writes() {
        let store = MemoryProfileStore::default();
        let mut profile = sample_profile(Uuid::new_v4(), "Jordan", true);
        persist_persona(&store, &profile).await.unwrap();

        profile.random_persona_name = "Different Name".into();
        let outcome = persist_persona(&store, &profile).await.unwrap();
        assert_eq!(outcome.profile.random_persona_name, "Curious Otter");
    }
}
