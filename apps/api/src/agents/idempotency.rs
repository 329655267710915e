use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Natural idempotency key for agent creation: identity plus a hash of the content
/// the agent is built from. Two submissions with the same name and grounding text
/// for the same user map to one external agent.
pub fn provisioning_key(user_id: Uuid, display_name: &str, grounding_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(display_name.trim().as_bytes());
    hasher.update([0u8]);
    hasher.update(grounding_text.trim().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Content hash used for resume object keys.
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_inputs_same_key() {
        let user = Uuid::new_v4();
        assert_eq!(
            provisioning_key(user, "Jordan", "Rust engineer"),
            provisioning_key(user, " Jordan", "Rust engineer\n")
        );
    }

    #[test]
    fn test_key_depends_on_every_input() {
        let user = Uuid::new_v4();
        let base = provisioning_key(user, "Jordan", "Rust engineer");
        assert_ne!(base, provisioning_key(Uuid::new_v4(), "Jordan", "Rust engineer"));
        assert_ne!(base, provisioning_key(user, "Jordan L", "Rust engineer"));
        assert_ne!(base, provisioning_key(user, "Jordan", "Go engineer"));
    }

    #[test]
    fn test_field_boundaries_are_unambiguous() {
        let user = Uuid::new_v4();
        assert_ne!(
            provisioning_key(user, "ab", "c"),
            provisioning_key(user, "a", "bc")
        );
    }

    #[test]
    fn test_key_is_hex_sha256() {
        let key = provisioning_key(Uuid::nil(), "a", "b");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
