//! Domain models for the organizer.
//!
//! # Responsibility
//! - Define the canonical records for every component (users, expenses,
//!   tasks, goals, dashboard).
//! - Provide field-level validation that runs before every write.
//!
//! # Invariants
//! - Every record is identified by a UUID v4 that is never reused.
//! - Enumerations serialize as snake_case strings, identical in JSON and SQL.

use serde::{Deserialize, Deserializer};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Declares a closed string enumeration shared by JSON and SQLite columns.
macro_rules! db_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        $vis enum $name {
            $($(#[$vmeta])* #[serde(rename = $text)] $variant),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Returns the stable storage/wire name.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parses a storage/wire name.
            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

pub mod category;
pub mod dashboard;
pub mod expense;
pub mod goal;
pub mod money;
pub mod task;
pub mod user;

/// Stable identifier for every persisted record.
pub type RecordId = Uuid;
/// Identifier of an account.
pub type UserId = Uuid;

/// Field-level validation failure.
///
/// `field` names the offending input attribute so HTTP callers can report
/// per-field messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

/// Rejects blank text and text longer than `max_chars`.
pub fn require_text(field: &'static str, value: &str, max_chars: usize) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "this field may not be blank"));
    }
    limit_text(field, value, max_chars)
}

/// Rejects text longer than `max_chars`.
pub fn limit_text(field: &'static str, value: &str, max_chars: usize) -> ValidationResult {
    if value.chars().count() > max_chars {
        return Err(ValidationError::new(
            field,
            format!("ensure this field has no more than {max_chars} characters"),
        ));
    }
    Ok(())
}

/// Rejects ratings outside `1..=10`.
pub fn require_rating(field: &'static str, value: u8) -> ValidationResult {
    if !(1..=10).contains(&value) {
        return Err(ValidationError::new(
            field,
            "rating must be between 1 and 10",
        ));
    }
    Ok(())
}

/// Rejects colors that are not `#RRGGBB`.
pub fn require_hex_color(field: &'static str, value: &str) -> ValidationResult {
    let bytes = value.as_bytes();
    let valid = bytes.len() == 7
        && bytes[0] == b'#'
        && bytes[1..].iter().all(|byte| byte.is_ascii_hexdigit());
    if !valid {
        return Err(ValidationError::new(field, "color must look like #RRGGBB"));
    }
    Ok(())
}

/// Normalizes a comma-separated or list tag input: trimmed, lowercase,
/// deduplicated, original order kept.
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let value = tag.as_ref().trim().to_lowercase();
        if !value.is_empty() && !normalized.contains(&value) {
            normalized.push(value);
        }
    }
    normalized
}

/// Splits a stored comma-separated tag column.
pub fn split_tags(stored: &str) -> Vec<String> {
    normalize_tags(stored.split(','))
}

/// Deserializer for patch fields where `null` and "absent" differ.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`:
/// absent yields `None`, `null` yields `Some(None)`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::{normalize_tags, require_hex_color, require_rating, require_text, split_tags};

    #[test]
    fn text_rules_reject_blank_and_long_values() {
        assert!(require_text("title", "  ", 10).is_err());
        assert!(require_text("title", "abcdefghijk", 10).is_err());
        assert!(require_text("title", "ok", 10).is_ok());
    }

    #[test]
    fn rating_accepts_one_through_ten_only() {
        assert!(require_rating("mood_rating", 0).is_err());
        assert!(require_rating("mood_rating", 1).is_ok());
        assert!(require_rating("mood_rating", 10).is_ok());
        let err = require_rating("mood_rating", 11).unwrap_err();
        assert_eq!(err.field, "mood_rating");
    }

    #[test]
    fn hex_color_requires_hash_and_six_digits() {
        assert!(require_hex_color("color", "#FF5722").is_ok());
        assert!(require_hex_color("color", "FF5722").is_err());
        assert!(require_hex_color("color", "#FF57").is_err());
        assert!(require_hex_color("color", "#GG5722").is_err());
    }

    #[test]
    fn tags_are_trimmed_lowercased_and_deduplicated() {
        assert_eq!(
            normalize_tags([" Work", "home", "WORK", ""]),
            vec!["work".to_string(), "home".to_string()]
        );
        assert_eq!(split_tags("a, b,,A"), vec!["a".to_string(), "b".to_string()]);
        assert!(split_tags("").is_empty());
    }
}
