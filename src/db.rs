use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::Row;
use tracing::{info, warn};

use crate::category_resolver::normalize_name;
use crate::quantity::Quantity;
use crate::recipe_model::{
    slugify, unique_slug, validate_recipe, CategoryId, CategoryRecord, ExtraEntry,
    IngredientMapping, Recipe, RecipeIngredientEntry, StapleEntry,
};
use crate::store::{ConfigSnapshot, ConfigStore, RecipeStore, DEFAULT_STAPLE_LABEL};

/// Settings key for the staple-section heading
pub const STAPLE_LABEL_SETTING: &str = "staple_label";

/// A recipe row together with its bookkeeping columns
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecipe {
    pub id: i64,
    pub recipe: Recipe,
    pub created_at: DateTime<Utc>,
}

/// A staple row
#[derive(Debug, Clone, PartialEq)]
pub struct StoredStaple {
    pub id: i64,
    pub staple: StapleEntry,
}

/// Open a connection pool
pub async fn connect(database_url: &str) -> Result<PgPool> {
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;
    info!("Database connection established");
    Ok(pool)
}

/// Initialize the database schema
pub async fn init_database_schema(pool: &PgPool) -> Result<()> {
    info!("Initializing database schema...");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS recipes (
            id BIGSERIAL PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL UNIQUE,
            placement TEXT,
            default_servings INTEGER NOT NULL DEFAULT 0,
            ingredients JSONB NOT NULL DEFAULT '[]'::jsonb,
            extras JSONB NOT NULL DEFAULT '[]'::jsonb,
            is_blacklisted BOOLEAN NOT NULL DEFAULT FALSE,
            is_whitelisted BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create recipes table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS categories (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            priority BIGINT NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create categories table")?;

    // Keyed by normalized name so lookups match the resolver
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS ingredient_categories (
            ingredient_key TEXT PRIMARY KEY,
            ingredient_name TEXT NOT NULL,
            category_id BIGINT REFERENCES categories(id)
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create ingredient_categories table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS staples (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL,
            amount DOUBLE PRECISION NOT NULL DEFAULT 1,
            unit TEXT NOT NULL DEFAULT ''
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create staples table")?;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .context("Failed to create settings table")?;

    info!("Database schema initialized successfully");
    Ok(())
}

const RECIPE_COLUMNS: &str = "id, slug, name, placement, default_servings, ingredients, extras, \
                              is_blacklisted, is_whitelisted, created_at";

fn stored_recipe_from_row(row: &PgRow) -> Result<StoredRecipe> {
    let default_servings: i32 = row.try_get("default_servings")?;
    let ingredients: Json<Vec<RecipeIngredientEntry>> = row
        .try_get("ingredients")
        .context("Failed to decode recipe ingredients")?;
    let extras: Json<Vec<ExtraEntry>> = row
        .try_get("extras")
        .context("Failed to decode recipe extras")?;

    Ok(StoredRecipe {
        id: row.try_get("id")?,
        recipe: Recipe {
            slug: row.try_get("slug")?,
            name: row.try_get("name")?,
            placement: row.try_get("placement")?,
            default_servings: u32::try_from(default_servings).unwrap_or(0),
            ingredients: ingredients.0,
            extras: extras.0,
            is_blacklisted: row.try_get("is_blacklisted")?,
            is_whitelisted: row.try_get("is_whitelisted")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

fn servings_column(recipe: &Recipe) -> Result<i32> {
    i32::try_from(recipe.default_servings)
        .with_context(|| format!("Default servings out of range for '{}'", recipe.name))
}

/// Insert a validated recipe, assigning a unique slug
pub async fn create_recipe(pool: &PgPool, recipe: &Recipe) -> Result<StoredRecipe> {
    info!("Creating recipe: {}", recipe.name);
    validate_recipe(recipe).context("Recipe failed validation")?;

    let name = recipe.name.trim();
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM recipes WHERE name = $1)")
        .bind(name)
        .fetch_one(pool)
        .await
        .context("Failed to check recipe name")?;
    if exists {
        bail!("A recipe named '{name}' already exists");
    }

    let base = if recipe.slug.trim().is_empty() {
        slugify(name)
    } else {
        recipe.slug.trim().to_string()
    };
    let taken: Vec<String> =
        sqlx::query_scalar("SELECT slug FROM recipes WHERE slug = $1 OR slug LIKE $1 || '-%'")
            .bind(&base)
            .fetch_all(pool)
            .await
            .context("Failed to read existing slugs")?;
    let slug = unique_slug(&base, taken.iter().map(String::as_str));

    let row = sqlx::query(&format!(
        "INSERT INTO recipes (slug, name, placement, default_servings, ingredients, extras, \
                              is_blacklisted, is_whitelisted)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING {RECIPE_COLUMNS}"
    ))
    .bind(&slug)
    .bind(name)
    .bind(&recipe.placement)
    .bind(servings_column(recipe)?)
    .bind(Json(&recipe.ingredients))
    .bind(Json(&recipe.extras))
    .bind(recipe.is_blacklisted)
    .bind(recipe.is_whitelisted)
    .fetch_one(pool)
    .await
    .context("Failed to insert recipe")?;

    let stored = stored_recipe_from_row(&row)?;
    info!("Recipe created with ID: {} (slug {})", stored.id, stored.recipe.slug);
    Ok(stored)
}

/// Read a recipe by slug, falling back to its display name
pub async fn read_recipe(pool: &PgPool, identifier: &str) -> Result<Option<StoredRecipe>> {
    let identifier = identifier.trim();
    info!("Reading recipe: {}", identifier);

    let row = sqlx::query(&format!(
        "SELECT {RECIPE_COLUMNS} FROM recipes
         WHERE slug = $1 OR name = $1
         ORDER BY (slug = $1) DESC
         LIMIT 1"
    ))
    .bind(identifier)
    .fetch_optional(pool)
    .await
    .context("Failed to read recipe")?;

    match row {
        Some(row) => Ok(Some(stored_recipe_from_row(&row)?)),
        None => {
            info!("No recipe found for: {}", identifier);
            Ok(None)
        }
    }
}

/// All recipes ordered by name
pub async fn list_recipes(pool: &PgPool) -> Result<Vec<StoredRecipe>> {
    let rows = sqlx::query(&format!("SELECT {RECIPE_COLUMNS} FROM recipes ORDER BY name"))
        .fetch_all(pool)
        .await
        .context("Failed to list recipes")?;
    rows.iter().map(stored_recipe_from_row).collect()
}

/// Replace the content of the recipe with the given slug; the slug itself is kept
pub async fn update_recipe(pool: &PgPool, slug: &str, recipe: &Recipe) -> Result<bool> {
    info!("Updating recipe: {}", slug);
    validate_recipe(recipe).context("Recipe failed validation")?;

    let result = sqlx::query(
        "UPDATE recipes
         SET name = $2, placement = $3, default_servings = $4, ingredients = $5, extras = $6,
             is_blacklisted = $7, is_whitelisted = $8
         WHERE slug = $1",
    )
    .bind(slug)
    .bind(recipe.name.trim())
    .bind(&recipe.placement)
    .bind(servings_column(recipe)?)
    .bind(Json(&recipe.ingredients))
    .bind(Json(&recipe.extras))
    .bind(recipe.is_blacklisted)
    .bind(recipe.is_whitelisted)
    .execute(pool)
    .await
    .context("Failed to update recipe")?;

    let updated = result.rows_affected() > 0;
    if !updated {
        warn!("No recipe found to update: {}", slug);
    }
    Ok(updated)
}

pub async fn delete_recipe(pool: &PgPool, slug: &str) -> Result<bool> {
    info!("Deleting recipe: {}", slug);
    let result = sqlx::query("DELETE FROM recipes WHERE slug = $1")
        .bind(slug)
        .execute(pool)
        .await
        .context("Failed to delete recipe")?;
    Ok(result.rows_affected() > 0)
}

pub async fn create_category(pool: &PgPool, name: &str, priority: i64) -> Result<CategoryRecord> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Category name must not be empty");
    }
    info!("Creating category: {} (priority {})", name, priority);

    let id: CategoryId =
        sqlx::query_scalar("INSERT INTO categories (name, priority) VALUES ($1, $2) RETURNING id")
            .bind(name)
            .bind(priority)
            .fetch_one(pool)
            .await
            .context("Failed to insert category")?;

    Ok(CategoryRecord {
        id,
        name: name.to_string(),
        priority,
    })
}

pub async fn list_categories(pool: &PgPool) -> Result<Vec<CategoryRecord>> {
    let rows = sqlx::query("SELECT id, name, priority FROM categories ORDER BY priority, name, id")
        .fetch_all(pool)
        .await
        .context("Failed to list categories")?;

    rows.iter()
        .map(|row| {
            Ok(CategoryRecord {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                priority: row.try_get("priority")?,
            })
        })
        .collect()
}

/// Delete a category; refused while any ingredient mapping still points at it
pub async fn delete_category(pool: &PgPool, category_id: CategoryId) -> Result<bool> {
    info!("Deleting category: {}", category_id);

    let references: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM ingredient_categories WHERE category_id = $1")
            .bind(category_id)
            .fetch_one(pool)
            .await
            .context("Failed to count category references")?;
    if references > 0 {
        bail!("Category {category_id} is still used by {references} ingredient mapping(s)");
    }

    let result = sqlx::query("DELETE FROM categories WHERE id = $1")
        .bind(category_id)
        .execute(pool)
        .await
        .context("Failed to delete category")?;
    Ok(result.rows_affected() > 0)
}

/// Insert or replace the category of an ingredient name
pub async fn upsert_ingredient_mapping(
    pool: &PgPool,
    ingredient_name: &str,
    category_id: Option<CategoryId>,
) -> Result<()> {
    let key = normalize_name(ingredient_name);
    if key.is_empty() {
        bail!("Ingredient name must not be empty");
    }
    info!("Mapping ingredient '{}' to category {:?}", ingredient_name, category_id);

    sqlx::query(
        "INSERT INTO ingredient_categories (ingredient_key, ingredient_name, category_id)
         VALUES ($1, $2, $3)
         ON CONFLICT (ingredient_key)
         DO UPDATE SET ingredient_name = EXCLUDED.ingredient_name,
                       category_id = EXCLUDED.category_id",
    )
    .bind(&key)
    .bind(ingredient_name.trim())
    .bind(category_id)
    .execute(pool)
    .await
    .context("Failed to upsert ingredient mapping")?;
    Ok(())
}

pub async fn list_ingredient_mappings(pool: &PgPool) -> Result<Vec<IngredientMapping>> {
    let rows = sqlx::query(
        "SELECT ingredient_name, category_id FROM ingredient_categories ORDER BY ingredient_key",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list ingredient mappings")?;

    rows.iter()
        .map(|row| {
            Ok(IngredientMapping {
                ingredient_name: row.try_get("ingredient_name")?,
                category_id: row.try_get("category_id")?,
            })
        })
        .collect()
}

pub async fn delete_ingredient_mapping(pool: &PgPool, ingredient_name: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM ingredient_categories WHERE ingredient_key = $1")
        .bind(normalize_name(ingredient_name))
        .execute(pool)
        .await
        .context("Failed to delete ingredient mapping")?;
    Ok(result.rows_affected() > 0)
}

pub async fn create_staple(pool: &PgPool, staple: &StapleEntry) -> Result<i64> {
    let name = staple.name.trim();
    if name.is_empty() {
        bail!("Staple name must not be empty");
    }
    if !staple.quantity.amount.is_finite() {
        bail!("Staple amount for '{name}' is not a finite number");
    }
    info!("Creating staple: {}", name);

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO staples (name, amount, unit) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(name)
    .bind(staple.quantity.amount)
    .bind(&staple.quantity.unit)
    .fetch_one(pool)
    .await
    .context("Failed to insert staple")?;
    Ok(id)
}

/// Staples in insertion order
pub async fn list_staples(pool: &PgPool) -> Result<Vec<StoredStaple>> {
    let rows = sqlx::query("SELECT id, name, amount, unit FROM staples ORDER BY id")
        .fetch_all(pool)
        .await
        .context("Failed to list staples")?;

    rows.iter()
        .map(|row| {
            Ok(StoredStaple {
                id: row.try_get("id")?,
                staple: StapleEntry {
                    name: row.try_get("name")?,
                    quantity: Quantity {
                        amount: row.try_get("amount")?,
                        unit: row.try_get("unit")?,
                    },
                },
            })
        })
        .collect()
}

pub async fn delete_staple(pool: &PgPool, staple_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM staples WHERE id = $1")
        .bind(staple_id)
        .execute(pool)
        .await
        .context("Failed to delete staple")?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_setting(pool: &PgPool, key: &str) -> Result<Option<String>> {
    sqlx::query_scalar("SELECT value FROM settings WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to read setting '{key}'"))
}

pub async fn set_setting(pool: &PgPool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES ($1, $2)
         ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await
    .with_context(|| format!("Failed to write setting '{key}'"))?;
    Ok(())
}

/// Read categories, mappings, staples and the staple label in one go
pub async fn load_config_snapshot(pool: &PgPool) -> Result<ConfigSnapshot> {
    let categories = list_categories(pool).await?;
    let ingredients = list_ingredient_mappings(pool).await?;
    let staples = list_staples(pool)
        .await?
        .into_iter()
        .map(|stored| stored.staple)
        .collect();
    let staple_label = get_setting(pool, STAPLE_LABEL_SETTING)
        .await?
        .filter(|label| !label.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_STAPLE_LABEL.to_string());

    Ok(ConfigSnapshot {
        categories,
        ingredients,
        staples,
        staple_label,
    })
}

/// Postgres-backed recipe and config store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        Ok(Self::new(connect(database_url).await?))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

impl RecipeStore for PgStore {
    async fn find_recipe(&self, identifier: &str) -> Result<Option<Recipe>> {
        Ok(read_recipe(&self.pool, identifier)
            .await?
            .map(|stored| stored.recipe))
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        Ok(list_recipes(&self.pool)
            .await?
            .into_iter()
            .map(|stored| stored.recipe)
            .collect())
    }

    async fn save_recipe(&self, recipe: Recipe) -> Result<Recipe> {
        Ok(create_recipe(&self.pool, &recipe).await?.recipe)
    }
}

impl ConfigStore for PgStore {
    async fn load_config(&self) -> Result<ConfigSnapshot> {
        load_config_snapshot(&self.pool).await
    }
}
