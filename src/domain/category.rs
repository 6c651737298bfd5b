use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{OwnerId, ValidationError};

pub type CategoryId = Uuid;

/// Color given to categories created without one.
pub const DEFAULT_CATEGORY_COLOR: &str = "#3B82F6";

/// Color of the report bucket for transactions without a category.
pub const UNCATEGORIZED_COLOR: &str = "#6B7280";

/// A named, colored label for income and expense transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub owner: OwnerId,
    pub name: String,
    /// `#RRGGBB`, upper case
    pub color: String,
    pub created_at: DateTime<Utc>,
}

impl Category {
    pub fn new(owner: impl Into<OwnerId>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.into(),
            name: name.into(),
            color: color.into(),
            created_at: Utc::now(),
        }
    }
}

/// Check a `#RRGGBB` color and return it in upper case.
pub fn normalize_color(color: &str) -> Result<String, ValidationError> {
    let trimmed = color.trim();
    let valid = trimmed
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()));
    if !valid {
        return Err(ValidationError::InvalidColor(color.to_string()));
    }
    Ok(trimmed.to_uppercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_color() {
        assert_eq!(normalize_color(" #f97316 "), Ok("#F97316".to_string()));
        assert_eq!(normalize_color(DEFAULT_CATEGORY_COLOR), Ok(DEFAULT_CATEGORY_COLOR.to_string()));
    }

    #[test]
    fn test_invalid_colors() {
        for color in ["F97316", "#F9731", "#F973166", "#GGGGGG", "", "orange"] {
            assert_eq!(
                normalize_color(color),
                Err(ValidationError::InvalidColor(color.to_string())),
                "{}",
                color
            );
        }
    }
}
