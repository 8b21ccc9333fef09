//! Input validation rules shared by the lifecycle operations.

use std::sync::LazyLock;

use regex::Regex;

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

/// Basic email format check.
#[must_use]
pub fn valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Names must carry at least two characters (counted, not bytes).
#[must_use]
pub fn valid_name(name: &str) -> bool {
    name.chars().count() >= 2
}

/// Password policy: at least 8 characters with at least one uppercase letter,
/// one digit, and one non-alphanumeric character.
#[must_use]
pub fn strong_password(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_alphanumeric())
}

/// A one-time code must be exactly `digits` decimal characters.
#[must_use]
pub fn valid_code(code: &str, digits: u32) -> bool {
    code.chars().count() == digits as usize && code.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
        assert!(!valid_email(""));
    }

    #[test]
    fn valid_name_counts_characters() {
        assert!(!valid_name("F"));
        assert!(valid_name("Fá"));
        assert!(valid_name("Santos"));
    }

    #[test]
    fn strong_password_requires_all_classes() {
        assert!(strong_password("Senha@123!"));
        assert!(!strong_password("senha@123")); // no uppercase
        assert!(!strong_password("Senha@abc")); // no digit
        assert!(!strong_password("Senha1234")); // no special
        assert!(!strong_password("S@1a")); // too short
    }

    #[test]
    fn valid_code_checks_length_and_digits() {
        assert!(valid_code("012345", 6));
        assert!(!valid_code("12345", 6));
        assert!(!valid_code("1234567", 6));
        assert!(!valid_code("12345a", 6));
    }
}
