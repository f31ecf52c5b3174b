//! Ingredient model
//!
//! Ingredients are shared reference data: recipes point at them, they are
//! never created or deleted by recipe operations.

use serde::{Deserialize, Serialize};

/// Ingredient entity; `(name, measurement_unit)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

impl Ingredient {
    pub fn new(name: impl Into<String>, measurement_unit: impl Into<String>) -> Self {
        Self {
            id: 0, // Will be set by the database
            name: name.into(),
            measurement_unit: measurement_unit.into(),
        }
    }
}

/// One aggregated line of a shopping list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShoppingListItem {
    pub name: String,
    pub measurement_unit: String,
    /// Sum of the amounts across every recipe in the cart
    pub amount: i64,
}
