//! Fallback display names of the form `{Adjective}{Noun}{0-999}`.

use rand::Rng;

pub const ADJECTIVES: [&str; 10] = [
    "Swift", "Bright", "Cool", "Happy", "Lucky", "Smart", "Bold", "Calm", "Epic", "Wild",
];

pub const NOUNS: [&str; 10] = [
    "Panda", "Tiger", "Eagle", "Wolf", "Fox", "Bear", "Lion", "Hawk", "Owl", "Deer",
];

/// Generate a random username using the thread-local RNG.
pub fn generate_username() -> String {
    generate_username_with(&mut rand::thread_rng())
}

pub fn generate_username_with<R: Rng + ?Sized>(rng: &mut R) -> String {
    let adjective = ADJECTIVES[rng.gen_range(0..ADJECTIVES.len())];
    let noun = NOUNS[rng.gen_range(0..NOUNS.len())];
    let number: u16 = rng.gen_range(0..1000);
    format!("{adjective}{noun}{number}")
}

/// Whether `name` could have come from [`generate_username`].
pub fn is_generated_username(name: &str) -> bool {
    ADJECTIVES.iter().any(|adjective| {
        name.strip_prefix(adjective).is_some_and(|rest| {
            NOUNS.iter().any(|noun| {
                rest.strip_prefix(noun).is_some_and(|digits| {
                    (1..=3).contains(&digits.len())
                        && digits.bytes().all(|b| b.is_ascii_digit())
                        && (digits == "0" || !digits.starts_with('0'))
                })
            })
        })
    })
}
