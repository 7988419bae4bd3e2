//! # Recipe and Menu Data Model
//!
//! Plain data structures shared by the stores, the aggregation engine and the
//! renderer. Everything here is an ephemeral snapshot: the engine receives
//! these values by reference and never mutates them.
//!
//! ## Core Concepts
//!
//! - **Recipe**: a named dish with a default serving count, required
//!   ingredients (scaled with servings) and extras (unscaled checklist items)
//! - **SelectedRecipe**: a recipe chosen for the week with requested servings;
//!   `0` means "from the freezer" and drops the recipe from the shopping list
//! - **StapleEntry**: a pantry item bought every week
//! - **CategoryRecord / IngredientMapping**: shopping-list grouping config
//!
//! ## Usage
//!
//! ```rust
//! use menu_planner::recipe_model::{Recipe, SelectedRecipe};
//!
//! let bolognese = Recipe::new("Pasta Bolognese", 2)
//!     .with_ingredient("Minced meat", 500.0, "g")
//!     .with_ingredient("Pasta", 400.0, "g")
//!     .with_extra("Parmesan", None, "");
//!
//! let selected = SelectedRecipe::new(bolognese, 4);
//! assert_eq!(selected.scale_factor(), 2.0);
//! ```

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::RecipeValidationError;
use crate::quantity::Quantity;

/// Identifier of a shopping-list category
pub type CategoryId = i64;

/// Maximum length of a recipe name, in characters
pub const MAX_RECIPE_NAME_LENGTH: usize = 255;

/// One required ingredient line of a recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeIngredientEntry {
    /// Display name; matched case-insensitively during aggregation
    pub name: String,
    pub quantity: Quantity,
}

/// An optional checklist item attached to a recipe
///
/// Extras are not scaled by servings and default to an amount of 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraEntry {
    pub name: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub unit: String,
}

/// A recipe as read from the recipe store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// URL-safe identifier, unique within the store
    #[serde(default)]
    pub slug: String,

    /// Display name
    pub name: String,

    /// Where the recipe can be found (cookbook, page, website)
    #[serde(default)]
    pub placement: Option<String>,

    /// Servings the ingredient amounts are written for; 0 when unknown
    #[serde(default)]
    pub default_servings: u32,

    /// Ingredients scaled with the requested servings
    #[serde(default)]
    pub ingredients: Vec<RecipeIngredientEntry>,

    /// Unscaled checklist items
    #[serde(default)]
    pub extras: Vec<ExtraEntry>,

    /// Excluded from the menu spinner unless whitelisted
    #[serde(default)]
    pub is_blacklisted: bool,

    #[serde(default)]
    pub is_whitelisted: bool,
}

/// A recipe picked for the week together with the requested servings
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedRecipe {
    pub recipe: Recipe,
    /// Requested servings; `0` = supplied from the freezer
    pub servings: i64,
}

/// A pantry item added to every shopping list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StapleEntry {
    pub name: String,
    pub quantity: Quantity,
}

/// A shopping-list section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: String,
    /// Lower values sort earlier
    #[serde(default)]
    pub priority: i64,
}

/// Assigns an ingredient name to a category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientMapping {
    pub ingredient_name: String,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
}

impl RecipeIngredientEntry {
    pub fn new(name: &str, amount: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            quantity: Quantity::new(amount, unit),
        }
    }
}

impl ExtraEntry {
    pub fn new(name: &str, amount: Option<f64>, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            amount,
            unit: unit.to_string(),
        }
    }

    /// The checklist quantity, defaulting the amount to 1
    pub fn quantity(&self) -> Quantity {
        Quantity::new(self.amount.unwrap_or(1.0), &self.unit)
    }
}

impl Recipe {
    /// Create a recipe with no ingredients; the slug is derived from the name
    pub fn new(name: &str, default_servings: u32) -> Self {
        Self {
            slug: slugify(name),
            name: name.to_string(),
            placement: None,
            default_servings,
            ingredients: Vec::new(),
            extras: Vec::new(),
            is_blacklisted: false,
            is_whitelisted: false,
        }
    }

    /// Add a required ingredient
    pub fn with_ingredient(mut self, name: &str, amount: f64, unit: &str) -> Self {
        self.ingredients
            .push(RecipeIngredientEntry::new(name, amount, unit));
        self
    }

    /// Add an extra checklist item
    pub fn with_extra(mut self, name: &str, amount: Option<f64>, unit: &str) -> Self {
        self.extras.push(ExtraEntry::new(name, amount, unit));
        self
    }

    pub fn with_placement(mut self, placement: &str) -> Self {
        self.placement = Some(placement.to_string());
        self
    }

    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = slug.to_string();
        self
    }

    pub fn blacklisted(mut self) -> Self {
        self.is_blacklisted = true;
        self
    }

    pub fn whitelisted(mut self) -> Self {
        self.is_whitelisted = true;
        self
    }

    /// Servings used as the scaling base; a missing/zero default counts as 1
    pub fn base_servings(&self) -> u32 {
        self.default_servings.max(1)
    }

    /// Whether the menu spinner may suggest this recipe
    pub fn is_spinner_eligible(&self) -> bool {
        !self.is_blacklisted || self.is_whitelisted
    }

    /// Whether `identifier` names this recipe, by slug or by display name
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        self.slug == identifier || self.name.trim() == identifier
    }
}

impl SelectedRecipe {
    pub fn new(recipe: Recipe, servings: i64) -> Self {
        Self { recipe, servings }
    }

    /// Whether the recipe is supplied from the freezer
    pub fn is_frozen(&self) -> bool {
        self.servings == 0
    }

    /// `servings / max(default_servings, 1)`
    pub fn scale_factor(&self) -> f64 {
        self.servings as f64 / self.recipe.base_servings() as f64
    }
}

impl StapleEntry {
    pub fn new(name: &str, amount: f64, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            quantity: Quantity::new(amount, unit),
        }
    }
}

/// Validates a recipe before it is written to a store
///
/// The name is trimmed and must be non-empty and at most 255 characters; at
/// least one required ingredient must have a positive amount; no amount may
/// be NaN or infinite.
pub fn validate_recipe(recipe: &Recipe) -> Result<(), RecipeValidationError> {
    let name = recipe.name.trim();
    if name.is_empty() {
        return Err(RecipeValidationError::EmptyName);
    }
    let length = name.chars().count();
    if length > MAX_RECIPE_NAME_LENGTH {
        return Err(RecipeValidationError::NameTooLong(length));
    }

    for entry in &recipe.ingredients {
        if !entry.quantity.amount.is_finite() {
            return Err(RecipeValidationError::NonFiniteAmount(entry.name.clone()));
        }
    }
    for extra in &recipe.extras {
        if extra.amount.is_some_and(|amount| !amount.is_finite()) {
            return Err(RecipeValidationError::NonFiniteAmount(extra.name.clone()));
        }
    }

    let has_amount = recipe
        .ingredients
        .iter()
        .any(|entry| !entry.name.trim().is_empty() && entry.quantity.is_positive());
    if !has_amount {
        return Err(RecipeValidationError::NoIngredients);
    }

    Ok(())
}

lazy_static! {
    static ref NON_SLUG_CHARS: Regex =
        Regex::new(r"[^\p{L}\p{N}]+").expect("Slug pattern should be valid");
}

/// Turn a display name into a URL-safe slug
///
/// Letters are lowercased, any run of other characters becomes a single `-`.
pub fn slugify(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = NON_SLUG_CHARS.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "recipe".to_string()
    } else {
        slug.to_string()
    }
}

/// Pick a slug not present in `existing`, suffixing `-2`, `-3`, ...
pub fn unique_slug<'a, I>(base: &str, existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: std::collections::HashSet<&str> = existing.into_iter().collect();
    if !taken.contains(base) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}-{suffix}");
        if !taken.contains(candidate.as_str()) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipe_builder() {
        let recipe = Recipe::new("Everyday Chili", 4)
            .with_ingredient("Kidneybønner", 2.0, "dåse")
            .with_extra("Brød", Some(1.0), "stk")
            .with_placement("Red book");

        assert_eq!(recipe.slug, "everyday-chili");
        assert_eq!(recipe.ingredients.len(), 1);
        assert_eq!(recipe.extras.len(), 1);
        assert_eq!(recipe.placement.as_deref(), Some("Red book"));
    }

    #[test]
    fn test_base_servings_never_zero() {
        let recipe = Recipe::new("Soup", 0);
        assert_eq!(recipe.base_servings(), 1);

        let selected = SelectedRecipe::new(recipe, 3);
        assert_eq!(selected.scale_factor(), 3.0);
    }

    #[test]
    fn test_frozen_selection() {
        let selected = SelectedRecipe::new(Recipe::new("Lasagne", 4), 0);
        assert!(selected.is_frozen());
        assert_eq!(selected.scale_factor(), 0.0);
    }

    #[test]
    fn test_extra_defaults_to_one() {
        let extra = ExtraEntry::new("Bread", None, "stk");
        assert_eq!(extra.quantity(), Quantity::new(1.0, "stk"));
    }

    #[test]
    fn test_spinner_eligibility() {
        assert!(Recipe::new("A", 4).is_spinner_eligible());
        assert!(!Recipe::new("B", 4).blacklisted().is_spinner_eligible());
        assert!(Recipe::new("C", 4)
            .blacklisted()
            .whitelisted()
            .is_spinner_eligible());
    }

    #[test]
    fn test_matches_identifier() {
        let recipe = Recipe::new("Pasta Bolognese", 2);
        assert!(recipe.matches_identifier("pasta-bolognese"));
        assert!(recipe.matches_identifier("Pasta Bolognese"));
        assert!(recipe.matches_identifier("  Pasta Bolognese "));
        assert!(!recipe.matches_identifier("pasta bolognese"));
    }

    #[test]
    fn test_recipe_validation() {
        let valid = Recipe::new("Soup", 2).with_ingredient("Carrot", 2.0, "stk");
        assert!(validate_recipe(&valid).is_ok());

        let unnamed = Recipe::new("   ", 2).with_ingredient("Carrot", 2.0, "stk");
        assert_eq!(validate_recipe(&unnamed), Err(RecipeValidationError::EmptyName));

        let long = Recipe::new(&"a".repeat(256), 2).with_ingredient("Carrot", 2.0, "stk");
        assert_eq!(validate_recipe(&long), Err(RecipeValidationError::NameTooLong(256)));

        let empty = Recipe::new("Soup", 2).with_ingredient("Carrot", 0.0, "stk");
        assert_eq!(validate_recipe(&empty), Err(RecipeValidationError::NoIngredients));

        let nan = Recipe::new("Soup", 2)
            .with_ingredient("Carrot", 1.0, "stk")
            .with_extra("Salt", Some(f64::NAN), "");
        assert_eq!(
            validate_recipe(&nan),
            Err(RecipeValidationError::NonFiniteAmount("Salt".to_string()))
        );
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Pasta Bolognese"), "pasta-bolognese");
        assert_eq!(slugify("  Mom's   Lasagna!! "), "mom-s-lasagna");
        assert_eq!(slugify("Rødgrød med fløde"), "rødgrød-med-fløde");
        assert_eq!(slugify("!!!"), "recipe");
    }

    #[test]
    fn test_unique_slug() {
        let existing = ["veggie-delight", "veggie-delight-2"];
        assert_eq!(unique_slug("veggie-delight", existing), "veggie-delight-3");
        assert_eq!(unique_slug("chili", existing), "chili");
        assert!(unique_slug("veggie-delight", existing).starts_with("veggie-delight"));
    }

    #[test]
    fn test_recipe_deserializes_with_defaults() {
        let json = r#"{"name": "Toast", "ingredients": [{"name": "Bread", "quantity": {"amount": 2, "unit": "stk"}}]}"#;
        let recipe: Recipe = serde_json::from_str(json).unwrap();
        assert_eq!(recipe.default_servings, 0);
        assert_eq!(recipe.base_servings(), 1);
        assert!(recipe.extras.is_empty());
        assert!(!recipe.is_blacklisted);
    }
}
