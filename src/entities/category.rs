// 🏷️ Category Entity - optional home for imported groups
//
// Each category owns a category-level context. Groups created under a
// category are placed in that context instead of the system one.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,

    /// Context row owned by this category
    pub context_id: i64,
}

/// Parse the raw `cohort-category` cell into a category id.
///
/// Anything that is not a positive integer cannot name a category.
pub fn parse_category_id(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|id| *id > 0)
}
