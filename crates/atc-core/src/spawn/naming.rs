//! Member name validation and color assignment

use crate::LEAD_NAME;
use thiserror::Error;

/// Maximum length of a member name
pub const MAX_NAME_LEN: usize = 64;

/// Display colors, assigned round-robin by roster size
pub const COLOR_PALETTE: [&str; 8] = [
    "blue", "green", "yellow", "purple", "orange", "pink", "cyan", "red",
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("Agent name must not be empty")]
    Empty,

    #[error("Agent name '{0}' contains invalid characters (allowed: letters, digits, '-', '_')")]
    InvalidCharacters(String),

    #[error("Agent name is {len} characters long; the maximum is 64")]
    TooLong { len: usize },

    #[error("Agent name 'team-lead' is reserved for the team lead")]
    Reserved,
}

/// Check a prospective member name.
pub fn validate_name(name: &str) -> Result<(), NameError> {
    if name.is_empty() {
        return Err(NameError::Empty);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(NameError::InvalidCharacters(name.to_string()));
    }
    let len = name.chars().count();
    if len > MAX_NAME_LEN {
        return Err(NameError::TooLong { len });
    }
    if name == LEAD_NAME {
        return Err(NameError::Reserved);
    }
    Ok(())
}

/// Color for the next member given the current roster size.
pub fn assign_color(roster_len: usize) -> &'static str {
    COLOR_PALETTE[roster_len % COLOR_PALETTE.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        for name in ["alice", "worker-1", "build_bot", "A", &"x".repeat(MAX_NAME_LEN)] {
            assert_eq!(validate_name(name), Ok(()), "{name}");
        }
    }

    #[test]
    fn test_each_failure_is_distinct() {
        assert_eq!(validate_name(""), Err(NameError::Empty));
        assert_eq!(
            validate_name("bad name!"),
            Err(NameError::InvalidCharacters("bad name!".to_string()))
        );
        assert_eq!(
            validate_name(&"a".repeat(65)),
            Err(NameError::TooLong { len: 65 })
        );
        assert_eq!(validate_name("team-lead"), Err(NameError::Reserved));
    }

    #[test]
    fn test_path_like_names_rejected() {
        for name in ["../x", "a/b", "a.b", "a@t1"] {
            assert!(matches!(
                validate_name(name),
                Err(NameError::InvalidCharacters(_))
            ));
        }
    }

    #[test]
    fn test_color_round_robin() {
        assert_eq!(assign_color(0), "blue");
        assert_eq!(assign_color(1), "green");
        assert_eq!(assign_color(COLOR_PALETTE.len()), "blue");
        assert_eq!(assign_color(COLOR_PALETTE.len() + 2), "yellow");
    }
}
