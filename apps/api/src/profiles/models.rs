use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::agents::{chat_link, AgentHandle};

/// A user's persona profile. Keyed by the owning identity; never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProfileRow {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub resume_text: Option<String>,
    pub resume_key: Option<String>,
    pub avatar_url: String,
    pub is_public: bool,
    pub agent_id: Option<String>,
    /// Generated once when the profile is first created.
    pub random_persona_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProfileRow {
    pub fn agent(&self) -> Option<AgentHandle> {
        self.agent_id.clone().map(AgentHandle)
    }
}

/// The unauthenticated projection of a public profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PublicPersonaRow {
    pub id: Uuid,
    pub first_name: String,
    pub avatar_url: String,
    pub agent_id: Option<String>,
    pub random_persona_name: String,
}

impl From<&ProfileRow> for PublicPersonaRow {
    fn from(profile: &ProfileRow) -> Self {
        Self {
            id: profile.user_id,
            first_name: profile.first_name.clone(),
            avatar_url: profile.avatar_url.clone(),
            agent_id: profile.agent_id.clone(),
            random_persona_name: profile.random_persona_name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaStatus {
    Ready,
    PendingSetup,
}

/// What the owner sees of their own profile. Credentials are reduced to a flag.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileView {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub resume_text: Option<String>,
    pub has_resume_file: bool,
    pub avatar_url: String,
    pub is_public: bool,
    pub agent_id: Option<String>,
    pub chat_link: Option<String>,
    pub random_persona_name: String,
    pub status: PersonaStatus,
    pub has_agent_credential: bool,
    pub updated_at: DateTime<Utc>,
}

impl ProfileView {
    pub fn new(profile: ProfileRow, has_agent_credential: bool, app_url: &str) -> Self {
        let chat_link = profile.agent().map(|agent| chat_link(app_url, &agent));
        let status = if profile.agent_id.is_some() {
            PersonaStatus::Ready
        } else {
            PersonaStatus::PendingSetup
        };
        Self {
            user_id: profile.user_id,
            first_name: profile.first_name,
            last_name: profile.last_name,
            bio: profile.bio,
            resume_text: profile.resume_text,
            has_resume_file: profile.resume_key.is_some(),
            avatar_url: profile.avatar_url,
            is_public: profile.is_public,
            agent_id: profile.agent_id,
            chat_link,
            random_persona_name: profile.random_persona_name,
            status,
            has_agent_credential,
            updated_at: profile.updated_at,
        }
    }
}

/// A public listing entry with its chat link resolved.
#[derive(Debug, Clone, Serialize)]
pub struct PublicPersonaView {
    #[serde(flatten)]
    pub persona: PublicPersonaRow,
    pub chat_link: Option<String>,
}

impl PublicPersonaView {
    pub fn new(persona: PublicPersonaRow, app_url: &str) -> Self {
        let chat_link = persona
            .agent_id
            .clone()
            .map(|id| chat_link(app_url, &AgentHandle(id)));
        Self { persona, chat_link }
    }
}

#[cfg(test)]
pub fn sample_profile(user_id: Uuid, first_name: &str, is_public: bool) -> ProfileRow {
    let now = Utc::now();
    ProfileRow {
        user_id,
        first_name: first_name.to_string(),
        last_name: None,
        bio: Some("Builds distributed systems.".to_string()),
        resume_text: None,
        resume_key: None,
        avatar_url: format!("https://avatars.example/{first_name}.png"),
        is_public,
        agent_id: None,
        random_persona_name: "Curious Otter".to_string(),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_copies_safe_fields_only() {
        let mut profile = sample_profile(Uuid::new_v4(), "Jordan", true);
        profile.agent_id = Some("abc123".into());
        let public = PublicPersonaRow::from(&profile);

        assert_eq!(public.id, profile.user_id);
        assert_eq!(public.first_name, "Jordan");
        assert_eq!(public.avatar_url, profile.avatar_url);
        assert_eq!(public.agent_id.as_deref(), Some("abc123"));

        let json = serde_json::to_value(&public).unwrap();
        assert!(json.get("bio").is_none());
        assert!(json.get("last_name").is_none());
    }

    #[test]
    fn test_view_without_agent_is_pending() {
        let view = ProfileView::new(
            sample_profile(Uuid::new_v4(), "Jordan", false),
            true,
            "https://elevenlabs.io",
        );
        assert_eq!(view.status, PersonaStatus::PendingSetup);
        assert!(view.chat_link.is_none());
    }

    #[test]
    fn test_view_with_agent_has_chat_link() {
        let mut profile = sample_profile(Uuid::new_v4(), "Jordan", false);
        profile.agent_id = Some("abc123".into());
        let view = ProfileView::new(profile, false, "https://elevenlabs.io");
        assert_eq!(view.status, PersonaStatus::Ready);
        assert_eq!(
            view.chat_link.as_deref(),
            Some("https://elevenlabs.io/app/talk-to?agent_id=abc123")
        );
    }

    #[test]
    fn test_public_view_flattens_entry() {
        let persona = PublicPersonaRow::from(&sample_profile(Uuid::new_v4(), "Al", true));
        let json = serde_json::to_value(PublicPersonaView::new(persona, "https://x.io")).unwrap();
        assert_eq!(json["first_name"], "Al");
        assert!(json["chat_link"].is_null());
    }
}
