//! Shopping list rendering
//!
//! Turns the aggregated cart into the plain-text download:
//!
//! ```text
//! Shopping List
//!
//! flour: 250 g
//! milk: 300 ml
//! ```

use crate::models::ShoppingListItem;

const HEADER: &str = "Shopping List\n\n";

/// A rendered shopping list ready to be sent as an attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShoppingListFile {
    pub filename: String,
    pub content: String,
}

impl ShoppingListFile {
    pub fn new(username: &str, items: &[ShoppingListItem]) -> Self {
        Self {
            filename: shopping_list_filename(username),
            content: render_shopping_list(items),
        }
    }
}

/// `{username}_shopping_list.txt`
pub fn shopping_list_filename(username: &str) -> String {
    format!("{}_shopping_list.txt", username)
}

/// Render items in the order given, one `name: amount unit` line each.
pub fn render_shopping_list(items: &[ShoppingListItem]) -> String {
    let mut out = String::from(HEADER);
    for item in items {
        out.push_str(&format!(
            "{}: {} {}\n",
            item.name, item.amount, item.measurement_unit
        ));
    }
    out
}
