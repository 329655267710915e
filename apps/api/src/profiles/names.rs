use rand::seq::SliceRandom;
use rand::Rng;

const ADJECTIVES: &[&str] = &[
    "Bright", "Curious", "Steady", "Bold", "Quiet", "Clever", "Nimble", "Patient", "Keen",
    "Candid", "Lucid", "Brave", "Gentle", "Witty", "Calm", "Vivid",
];

const NOUNS: &[&str] = &[
    "Otter", "Falcon", "Maple", "Harbor", "Comet", "Willow", "Lynx", "Cedar", "Heron",
    "Summit", "Ember", "Badger", "Quartz", "Sparrow", "Orchid", "Fjord",
];

const AVATAR_BASE_URL: &str = "https://api.dicebear.com/7.x/thumbs/svg";

/// Two-word display name shown in public listings instead of the person's full name.
pub fn generate_persona_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES.choose(rng).copied().unwrap_or("Bright");
    let noun = NOUNS.choose(rng).copied().unwrap_or("Otter");
    format!("{adjective} {noun}")
}

/// Generated avatar used until the owner sets their own.
pub fn default_avatar_url(seed: &str) -> String {
    let slug: String = seed
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    format!("{AVATAR_BASE_URL}?seed={}", slug.trim_matches('-'))
}
