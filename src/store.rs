//! # Recipe and Config Stores
//!
//! The shopping-list pipeline reads recipes and grouping configuration from
//! two collaborators, expressed here as traits:
//!
//! - [`RecipeStore`]: look up recipes by slug or name, list and save them
//! - [`ConfigStore`]: load a [`ConfigSnapshot`] (categories, ingredient
//!   mappings, staples and the staple-section label)
//!
//! This module also owns the boundary normalization of stored payloads:
//! ingredient sets arrive either as arrays of `{name, amount, unit}` or as
//! objects keyed by ingredient name, and amounts may be written with a comma
//! decimal separator. Both are converted into the single typed shape used by
//! the aggregation engine, failing loudly on anything unreadable.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::sync::RwLock;
use tracing::info;

use crate::category_resolver::CategoryResolver;
use crate::quantity::Quantity;
use crate::recipe_model::{
    slugify, unique_slug, validate_recipe, CategoryId, CategoryRecord, ExtraEntry,
    IngredientMapping, Recipe, RecipeIngredientEntry, StapleEntry,
};

/// Staple-section heading used when none is configured
pub const DEFAULT_STAPLE_LABEL: &str = "Staples";

/// Read/write access to recipes
pub trait RecipeStore {
    /// Find a recipe by slug, falling back to its display name
    fn find_recipe(&self, identifier: &str) -> impl Future<Output = Result<Option<Recipe>>> + Send;

    fn list_recipes(&self) -> impl Future<Output = Result<Vec<Recipe>>> + Send;

    /// Validate and store a recipe, returning it with its final unique slug
    fn save_recipe(&self, recipe: Recipe) -> impl Future<Output = Result<Recipe>> + Send;
}

/// Read access to shopping-list configuration
pub trait ConfigStore {
    fn load_config(&self) -> impl Future<Output = Result<ConfigSnapshot>> + Send;
}

/// Categories, mappings, staples and display label at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSnapshot {
    pub categories: Vec<CategoryRecord>,
    pub ingredients: Vec<IngredientMapping>,
    pub staples: Vec<StapleEntry>,
    pub staple_label: String,
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            ingredients: Vec::new(),
            staples: Vec::new(),
            staple_label: DEFAULT_STAPLE_LABEL.to_string(),
        }
    }
}

impl ConfigSnapshot {
    /// Build the category lookup tables for this snapshot
    pub fn resolver(&self) -> CategoryResolver {
        CategoryResolver::new(&self.ingredients, &self.categories)
    }
}

/// Recipes plus configuration, as loaded from a snapshot file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub recipes: Vec<Recipe>,
    pub config: ConfigSnapshot,
}

/// An amount written as a number or as text ("1,5")
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AmountValue {
    Number(f64),
    Text(String),
}

impl AmountValue {
    fn to_f64(&self, ingredient: &str) -> Result<f64> {
        let amount = match self {
            AmountValue::Number(value) => *value,
            AmountValue::Text(text) => text
                .trim()
                .replace(',', ".")
                .parse::<f64>()
                .with_context(|| format!("Unreadable amount '{text}' for '{ingredient}'"))?,
        };
        if !amount.is_finite() {
            bail!("Amount for '{ingredient}' is not a finite number");
        }
        Ok(amount)
    }
}

#[derive(Debug, Deserialize)]
struct AmountPayload {
    #[serde(default)]
    amount: Option<AmountValue>,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NamedAmountPayload {
    name: String,
    #[serde(default)]
    amount: Option<AmountValue>,
    #[serde(default)]
    unit: Option<String>,
}

/// Ingredient sets come in two shapes
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IngredientsPayload {
    List(Vec<NamedAmountPayload>),
    Keyed(serde_json::Map<String, serde_json::Value>),
}

impl Default for IngredientsPayload {
    fn default() -> Self {
        IngredientsPayload::List(Vec::new())
    }
}

impl IngredientsPayload {
    /// Flatten into `(name, amount, unit)` triples, keeping source order
    fn into_triples(self) -> Result<Vec<(String, Option<f64>, String)>> {
        let mut triples = Vec::new();
        match self {
            IngredientsPayload::List(entries) => {
                for entry in entries {
                    let amount = match &entry.amount {
                        Some(value) => Some(value.to_f64(&entry.name)?),
                        None => None,
                    };
                    triples.push((entry.name, amount, entry.unit.unwrap_or_default()));
                }
            }
            IngredientsPayload::Keyed(map) => {
                for (name, value) in map {
                    let payload: AmountPayload = serde_json::from_value(value)
                        .with_context(|| format!("Malformed amount for ingredient '{name}'"))?;
                    let amount = match &payload.amount {
                        Some(value) => Some(value.to_f64(&name)?),
                        None => None,
                    };
                    triples.push((name, amount, payload.unit.unwrap_or_default()));
                }
            }
        }
        Ok(triples)
    }
}

#[derive(Debug, Deserialize)]
struct RecipePayload {
    #[serde(default)]
    slug: Option<String>,
    #[serde(alias = "navn")]
    name: String,
    #[serde(default, alias = "placering")]
    placement: Option<String>,
    #[serde(default, alias = "antal")]
    default_servings: Option<u32>,
    #[serde(default, alias = "ingredienser")]
    ingredients: IngredientsPayload,
    #[serde(default)]
    extras: IngredientsPayload,
    #[serde(default)]
    is_blacklisted: bool,
    #[serde(default)]
    is_whitelisted: bool,
}

impl RecipePayload {
    fn into_recipe(self) -> Result<Recipe> {
        let recipe_name = self.name.clone();
        let mut ingredients = Vec::new();
        for (name, amount, unit) in self.ingredients.into_triples()? {
            let amount = amount
                .ok_or_else(|| anyhow!("Ingredient '{name}' in '{recipe_name}' has no amount"))?;
            ingredients.push(RecipeIngredientEntry {
                name,
                quantity: Quantity { amount, unit },
            });
        }
        let extras = self
            .extras
            .into_triples()?
            .into_iter()
            .map(|(name, amount, unit)| ExtraEntry { name, amount, unit })
            .collect();

        let slug = match self.slug.as_deref().map(str::trim) {
            Some(slug) if !slug.is_empty() => slug.to_string(),
            _ => slugify(&self.name),
        };

        Ok(Recipe {
            slug,
            name: self.name,
            placement: self.placement.filter(|placement| !placement.trim().is_empty()),
            default_servings: self.default_servings.unwrap_or(0),
            ingredients,
            extras,
            is_blacklisted: self.is_blacklisted,
            is_whitelisted: self.is_whitelisted,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MappingPayload {
    #[serde(alias = "ingredient_name")]
    name: String,
    #[serde(default)]
    category_id: Option<CategoryId>,
}

#[derive(Debug, Deserialize)]
struct StaplePayload {
    name: String,
    #[serde(default)]
    amount: Option<AmountValue>,
    #[serde(default)]
    unit: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotPayload {
    #[serde(default)]
    recipes: Vec<RecipePayload>,
    #[serde(default)]
    categories: Vec<CategoryRecord>,
    #[serde(default, alias = "items")]
    ingredients: Vec<MappingPayload>,
    #[serde(default)]
    staples: Vec<StaplePayload>,
    #[serde(default)]
    staple_label: Option<String>,
}

/// Parse a JSON snapshot of recipes and configuration
///
/// Staples without an amount default to 1; an empty label falls back to
/// [`DEFAULT_STAPLE_LABEL`].
pub fn parse_snapshot(json: &str) -> Result<StoreSnapshot> {
    let payload: SnapshotPayload =
        serde_json::from_str(json).context("Failed to parse store snapshot")?;

    let recipes = payload
        .recipes
        .into_iter()
        .map(RecipePayload::into_recipe)
        .collect::<Result<Vec<_>>>()?;

    let staples = payload
        .staples
        .into_iter()
        .map(|staple| {
            let amount = match &staple.amount {
                Some(value) => value.to_f64(&staple.name)?,
                None => 1.0,
            };
            Ok(StapleEntry {
                name: staple.name,
                quantity: Quantity {
                    amount,
                    unit: staple.unit.unwrap_or_default(),
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let ingredients = payload
        .ingredients
        .into_iter()
        .map(|mapping| IngredientMapping {
            ingredient_name: mapping.name,
            category_id: mapping.category_id,
        })
        .collect();

    let staple_label = payload
        .staple_label
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_STAPLE_LABEL.to_string());

    Ok(StoreSnapshot {
        recipes,
        config: ConfigSnapshot {
            categories: payload.categories,
            ingredients,
            staples,
            staple_label,
        },
    })
}

/// Read and parse a snapshot file
pub fn load_snapshot_file(path: &Path) -> Result<StoreSnapshot> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot file {}", path.display()))?;
    parse_snapshot(&json).with_context(|| format!("Invalid snapshot file {}", path.display()))
}

/// Store kept entirely in memory, optionally seeded from a snapshot file
#[derive(Debug, Default)]
pub struct InMemoryStore {
    recipes: RwLock<Vec<Recipe>>,
    config: RwLock<ConfigSnapshot>,
}

impl InMemoryStore {
    pub fn new(recipes: Vec<Recipe>, config: ConfigSnapshot) -> Self {
        Self {
            recipes: RwLock::new(recipes),
            config: RwLock::new(config),
        }
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self::new(snapshot.recipes, snapshot.config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let snapshot = load_snapshot_file(path)?;
        info!(
            path = %path.display(),
            recipes = snapshot.recipes.len(),
            categories = snapshot.config.categories.len(),
            "Loaded snapshot store"
        );
        Ok(Self::from_snapshot(snapshot))
    }
}

impl RecipeStore for InMemoryStore {
    async fn find_recipe(&self, identifier: &str) -> Result<Option<Recipe>> {
        let recipes = self
            .recipes
            .read()
            .map_err(|_| anyhow!("Recipe lock poisoned"))?;
        let identifier = identifier.trim();
        let found = recipes
            .iter()
            .find(|recipe| recipe.slug == identifier)
            .or_else(|| recipes.iter().find(|recipe| recipe.matches_identifier(identifier)));
        Ok(found.cloned())
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let recipes = self
            .recipes
            .read()
            .map_err(|_| anyhow!("Recipe lock poisoned"))?;
        Ok(recipes.clone())
    }

    async fn save_recipe(&self, recipe: Recipe) -> Result<Recipe> {
        validate_recipe(&recipe).context("Recipe failed validation")?;

        let mut recipes = self
            .recipes
            .write()
            .map_err(|_| anyhow!("Recipe lock poisoned"))?;
        let name = recipe.name.trim().to_string();
        if recipes.iter().any(|existing| existing.name.trim() == name) {
            bail!("A recipe named '{name}' already exists");
        }

        let base = if recipe.slug.trim().is_empty() {
            slugify(&name)
        } else {
            recipe.slug.trim().to_string()
        };
        let slug = unique_slug(&base, recipes.iter().map(|existing| existing.slug.as_str()));

        let stored = Recipe { slug, name, ..recipe };
        info!(slug = %stored.slug, "Recipe saved");
        recipes.push(stored.clone());
        Ok(stored)
    }
}

impl ConfigStore for InMemoryStore {
    async fn load_config(&self) -> Result<ConfigSnapshot> {
        let config = self
            .config
            .read()
            .map_err(|_| anyhow!("Config lock poisoned"))?;
        Ok(config.clone())
    }
}
