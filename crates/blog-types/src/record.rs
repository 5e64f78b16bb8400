use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::PublicIdentity;

/// Namespace tag mixed into every blog record address.
pub const NAMESPACE_TAG: &str = "blog";

/// Maximum stored title length in bytes.
pub const MAX_TITLE_LEN: usize = 100;

/// Maximum stored description length in bytes.
pub const MAX_DESCRIPTION_LEN: usize = 500;

/// Maximum length of a single address derivation seed. The title is a seed,
/// so this caps usable titles below [`MAX_TITLE_LEN`].
pub const MAX_SEED_LEN: usize = 32;

/// The key a blog record is addressed by.
///
/// The same `(owner, title)` pair always resolves to the same address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalKey {
    pub owner: PublicIdentity,
    pub title: String,
}

impl LogicalKey {
    pub fn new(owner: PublicIdentity, title: impl Into<String>) -> Self {
        Self {
            owner,
            title: title.into(),
        }
    }
}

/// A persisted blog entry.
///
/// `title` and `owner` take part in address derivation and never change after
/// creation; only `description` is mutable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordState {
    pub owner: PublicIdentity,
    pub title: String,
    pub description: String,
}

impl RecordState {
    pub fn new(
        owner: PublicIdentity,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            owner,
            title: title.into(),
            description: description.into(),
        }
    }

    /// The logical key this record lives under.
    pub fn key(&self) -> LogicalKey {
        LogicalKey::new(self.owner, self.title.clone())
    }
}

/// Titles must be non-empty and fit in a derivation seed.
pub fn validate_title(title: &str) -> Result<(), TypeError> {
    if title.is_empty() {
        return Err(TypeError::EmptyTitle);
    }
    let max = MAX_SEED_LEN.min(MAX_TITLE_LEN);
    if title.len() > max {
        return Err(TypeError::FieldTooLong {
            field: "title",
            max,
            actual: title.len(),
        });
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), TypeError> {
    if description.len() > MAX_DESCRIPTION_LEN {
        return Err(TypeError::FieldTooLong {
            field: "description",
            max: MAX_DESCRIPTION_LEN,
            actual: description.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_at_seed_limit_is_accepted() {
        assert!(validate_title(&"a".repeat(MAX_SEED_LEN)).is_ok());
    }

    #[test]
    fn title_over_seed_limit_is_rejected() {
        let err = validate_title(&"a".repeat(MAX_SEED_LEN + 1)).unwrap_err();
        assert_eq!(
            err,
            TypeError::FieldTooLong {
                field: "title",
                max: MAX_SEED_LEN,
                actual: MAX_SEED_LEN + 1
            }
        );
    }

    #[test]
    fn title_limit_counts_bytes_not_chars() {
        // 11 three-byte characters = 33 bytes
        let title = "\u{20ac}".repeat(11);
        assert_eq!(title.chars().count(), 11);
        assert!(validate_title(&title).is_err());
    }

    #[test]
    fn empty_title_is_rejected() {
        assert_eq!(validate_title(""), Err(TypeError::EmptyTitle));
    }

    #[test]
    fn description_limit() {
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LEN)).is_ok());
        assert!(validate_description(&"d".repeat(MAX_DESCRIPTION_LEN + 1)).is_err());
        assert!(validate_description("").is_ok());
    }

    #[test]
    fn record_key_matches_fields() {
        let owner = PublicIdentity::from_bytes([1; 32]);
        let record = RecordState::new(owner, "Hello", "First post");
        assert_eq!(record.key(), LogicalKey::new(owner, "Hello"));
    }
}
