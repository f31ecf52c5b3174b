//! Tag model

use serde::{Deserialize, Serialize};

/// Tag entity. Recipes are filtered by tag slug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tag {
    /// Unique identifier
    pub id: i64,
    /// Display name
    pub name: String,
    /// Hex color, `#RRGGBB`
    pub color: String,
    /// URL-friendly slug (unique)
    pub slug: String,
}
