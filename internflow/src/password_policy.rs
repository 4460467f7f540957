//! Password strength rules applied whenever a password is set by an
//! administrator or at registration.

pub const MIN_LENGTH: usize = 8;

/// Bigram similarity at or above which a password resembles an attribute.
const MAX_SIMILARITY: f64 = 0.7;

const COMMON_PASSWORDS: &[&str] = &[
    "123456", "12345678", "123456789", "1234567890", "password", "password1",
    "password123", "qwerty", "qwerty123", "azerty", "azerty123", "abc123",
    "111111", "000000", "iloveyou", "admin", "admin123", "welcome", "welcome1",
    "letmein", "monkey", "dragon", "sunshine", "football", "baseball",
    "princess", "master", "trustno1", "passw0rd", "motdepasse", "soleil",
    "bonjour", "changeme", "secret", "internship", "student",
];

/// Attributes of the account the password must not resemble.
#[derive(Debug, Default, Clone, Copy)]
pub struct UserAttributes<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

/// Returns every rule the password breaks; empty means acceptable.
pub fn check(password: &str, attrs: &UserAttributes<'_>) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(attr) = similar_attribute(password, attrs) {
        errors.push(format!("The password is too similar to the {attr}."));
    }

    if password.chars().count() < MIN_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {MIN_LENGTH} characters."
        ));
    }

    if COMMON_PASSWORDS.contains(&password.to_lowercase().as_str()) {
        errors.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }

    errors
}

fn similar_attribute(password: &str, attrs: &UserAttributes<'_>) -> Option<&'static str> {
    let password = password.to_lowercase();
    let email_local = attrs.email.split('@').next().unwrap_or_default();
    let candidates = [
        ("username", attrs.username),
        ("email address", email_local),
        ("first name", attrs.first_name),
        ("last name", attrs.last_name),
    ];

    candidates.into_iter().find_map(|(label, value)| {
        let value = value.trim().to_lowercase();
        if value.is_empty() {
            return None;
        }
        // The whole value and each of its words, e.g. "a" and "benali" in "a.benali".
        let mut parts = value
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|p| !p.is_empty())
            .chain(std::iter::once(value.as_str()));
        parts.any(|part| too_similar(&password, part)).then_some(label)
    })
}

fn too_similar(password: &str, part: &str) -> bool {
    let password_len = password.chars().count() as f64;
    let part_len = part.chars().count() as f64;
    // A short value inside a much longer password does not count.
    if password_len >= 10.0 * part_len && part_len < MAX_SIMILARITY / 2.0 * password_len {
        return false;
    }
    strsim::sorensen_dice(password, part) >= MAX_SIMILARITY
}
