//! # Category Resolver
//!
//! Maps ingredient names to shopping-list categories for grouping and
//! ordering. Lookup is an exact match on the trimmed, lowercased name; there
//! is no fuzzy matching. Names without a mapping fall into the
//! "Uncategorized" bucket, which always sorts after every named category.

use std::collections::HashMap;
use tracing::{debug, warn};

use crate::recipe_model::{CategoryId, CategoryRecord, IngredientMapping};

/// Heading used for ingredients without a category
pub const UNCATEGORIZED_LABEL: &str = "Uncategorized";

/// Normalize an ingredient name into its merge/lookup key
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Ordering key for category groups
///
/// Variant order matters: every named category sorts before
/// `Uncategorized`. Named categories order by priority, then by
/// case-insensitive name, then by id so equal names stay deterministic.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CategorySortKey {
    Named {
        priority: i64,
        name: String,
        id: CategoryId,
    },
    Uncategorized,
}

/// Immutable lookup tables built from a config snapshot
#[derive(Debug, Clone, Default)]
pub struct CategoryResolver {
    mappings: HashMap<String, Option<CategoryId>>,
    categories: HashMap<CategoryId, CategoryRecord>,
}

impl CategoryResolver {
    /// Build the resolver from the configured mappings and categories
    ///
    /// When two mappings normalize to the same name the first one wins.
    pub fn new(mappings: &[IngredientMapping], categories: &[CategoryRecord]) -> Self {
        let categories: HashMap<CategoryId, CategoryRecord> = categories
            .iter()
            .map(|category| (category.id, category.clone()))
            .collect();

        let mut table = HashMap::with_capacity(mappings.len());
        for mapping in mappings {
            let key = normalize_name(&mapping.ingredient_name);
            if key.is_empty() {
                continue;
            }
            if table.contains_key(&key) {
                warn!(ingredient = %mapping.ingredient_name, "Duplicate ingredient mapping ignored");
                continue;
            }
            table.insert(key, mapping.category_id);
        }

        Self {
            mappings: table,
            categories,
        }
    }

    /// Category for an ingredient name, or `None` for the uncategorized bucket
    ///
    /// A mapping pointing at a category that no longer exists also resolves
    /// to `None`.
    pub fn resolve(&self, name: &str) -> Option<CategoryId> {
        let category_id = self.mappings.get(&normalize_name(name)).copied().flatten()?;
        if self.categories.contains_key(&category_id) {
            Some(category_id)
        } else {
            debug!(ingredient = %name, category_id, "Mapping refers to unknown category");
            None
        }
    }

    /// Group ordering key for a resolved category
    pub fn sort_key(&self, category_id: Option<CategoryId>) -> CategorySortKey {
        match category_id.and_then(|id| self.categories.get(&id)) {
            Some(category) => CategorySortKey::Named {
                priority: category.priority,
                name: category.name.to_lowercase(),
                id: category.id,
            },
            None => CategorySortKey::Uncategorized,
        }
    }

    /// Display name of a category; unknown ids and `None` get the fallback label
    pub fn category_label(&self, category_id: Option<CategoryId>) -> &str {
        category_id
            .and_then(|id| self.categories.get(&id))
            .map(|category| category.name.as_str())
            .unwrap_or(UNCATEGORIZED_LABEL)
    }

    pub fn mapping_count(&self) -> usize {
        self.mappings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixtures() -> CategoryResolver {
        let categories = vec![
            CategoryRecord { id: 1, name: "Produce".to_string(), priority: 1 },
            CategoryRecord { id: 2, name: "Meat".to_string(), priority: 2 },
            CategoryRecord { id: 3, name: "bakery".to_string(), priority: 2 },
        ];
        let mappings = vec![
            IngredientMapping { ingredient_name: "Onion".to_string(), category_id: Some(1) },
            IngredientMapping { ingredient_name: "Minced meat".to_string(), category_id: Some(2) },
            IngredientMapping { ingredient_name: "onion ".to_string(), category_id: Some(2) },
            IngredientMapping { ingredient_name: "Water".to_string(), category_id: None },
            IngredientMapping { ingredient_name: "Ghost".to_string(), category_id: Some(99) },
        ];
        CategoryResolver::new(&mappings, &categories)
    }

    #[test]
    fn test_resolve_is_case_insensitive() {
        let resolver = fixtures();
        assert_eq!(resolver.resolve("onion"), Some(1));
        assert_eq!(resolver.resolve("  ONION "), Some(1));
        assert_eq!(resolver.resolve("minced MEAT"), Some(2));
    }

    #[test]
    fn test_resolve_fallbacks() {
        let resolver = fixtures();
        assert_eq!(resolver.resolve("xyzfoobar123"), None);
        assert_eq!(resolver.resolve(""), None);
        assert_eq!(resolver.resolve("water"), None);
        assert_eq!(resolver.resolve("ghost"), None);
    }

    #[test]
    fn test_first_duplicate_mapping_wins() {
        let resolver = fixtures();
        assert_eq!(resolver.mapping_count(), 4);
        assert_eq!(resolver.resolve("Onion"), Some(1));
    }

    #[test]
    fn test_sort_key_orders_priority_then_name() {
        let resolver = fixtures();
        let produce = resolver.sort_key(Some(1));
        let meat = resolver.sort_key(Some(2));
        let bakery = resolver.sort_key(Some(3));
        let none = resolver.sort_key(None);

        assert!(produce < meat);
        // same priority: "bakery" < "meat"
        assert!(bakery < meat);
        assert!(meat < none);
        assert_eq!(resolver.sort_key(Some(42)), CategorySortKey::Uncategorized);
    }

    #[test]
    fn test_category_label() {
        let resolver = fixtures();
        assert_eq!(resolver.category_label(Some(1)), "Produce");
        assert_eq!(resolver.category_label(None), UNCATEGORIZED_LABEL);
        assert_eq!(resolver.category_label(Some(99)), UNCATEGORIZED_LABEL);
    }
}
