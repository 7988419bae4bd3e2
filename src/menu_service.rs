//! # Menu Service
//!
//! Request-level orchestration around the pure aggregation core: parse a
//! menu selection, fetch a consistent snapshot from the stores (each call
//! bounded by a timeout), aggregate, and render the Markdown document.
//!
//! Extras that name another recipe are side dishes (naan with a curry,
//! raita, pita bread). They are looked up in the recipe store and added to
//! the selection as recipes of their own, right after the dish that asked
//! for them. The extra's amount is the side dish's servings, or a number of
//! whole batches when its unit is `recipe`. Extras that match no recipe stay
//! plain checklist items.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDate};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::aggregation::{aggregate, ShoppingList};
use crate::errors::{AggregationError, MenuError};
use crate::markdown::{render_document, RenderOptions};
use crate::recipe_model::{ExtraEntry, Recipe, SelectedRecipe};
use crate::store::{ConfigStore, RecipeStore};

/// Default bound on a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// One requested recipe: a slug or display name plus servings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuChoice {
    pub identifier: String,
    pub servings: i64,
}

impl MenuChoice {
    pub fn new(identifier: &str, servings: i64) -> Self {
        Self {
            identifier: identifier.to_string(),
            servings,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MenuOptions {
    pub store_timeout: Duration,
    pub render: RenderOptions,
}

impl Default for MenuOptions {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            render: RenderOptions::default(),
        }
    }
}

/// Everything produced for one menu request
#[derive(Debug, Clone)]
pub struct GeneratedMenu {
    pub markdown: String,
    pub shopping_list: ShoppingList,
    pub selected: Vec<SelectedRecipe>,
}

/// Parse `{"<recipe>": servings, ...}`, optionally wrapped in `{"menu_data": ...}`
///
/// Key order is preserved. Servings must be JSON integers; range checks
/// are left to the aggregation engine.
pub fn parse_menu_selection(json: &str) -> Result<Vec<MenuChoice>, MenuError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|err| MenuError::MalformedSelection(format!("invalid JSON: {err}")))?;

    let object = match value {
        Value::Object(mut object) => match object.remove("menu_data") {
            Some(Value::Object(inner)) => inner,
            Some(_) => {
                return Err(MenuError::MalformedSelection(
                    "menu_data must be an object".to_string(),
                ))
            }
            None => object,
        },
        _ => {
            return Err(MenuError::MalformedSelection(
                "expected an object of recipe servings".to_string(),
            ))
        }
    };

    object
        .into_iter()
        .map(|(identifier, servings)| match servings.as_i64() {
            Some(servings) => Ok(MenuChoice {
                identifier,
                servings,
            }),
            None => Err(MenuError::MalformedSelection(format!(
                "servings for '{identifier}' must be an integer, got {servings}"
            ))),
        })
        .collect()
}

async fn bounded<T, F>(limit: Duration, operation: &str, call: F) -> Result<T, MenuError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match timeout(limit, call).await {
        Ok(result) => result.map_err(MenuError::Store),
        Err(_) => Err(MenuError::StoreTimeout(operation.to_string())),
    }
}

/// Extra unit meaning "this many whole batches of the side dish"
pub const BATCH_UNIT: &str = "recipe";

/// Servings of a side dish requested through an extra, `None` when it asks for nothing
fn side_dish_servings(extra: &ExtraEntry, side_dish: &Recipe) -> Result<Option<i64>, MenuError> {
    let amount = extra.amount.unwrap_or(1.0);
    if !amount.is_finite() {
        return Err(AggregationError::InvalidQuantity {
            ingredient: extra.name.clone(),
            amount,
        }
        .into());
    }
    let servings = if extra.unit.trim().eq_ignore_ascii_case(BATCH_UNIT) {
        amount * f64::from(side_dish.base_servings())
    } else {
        amount
    };
    if servings <= 0.0 {
        return Ok(None);
    }
    // Servings are whole; anything positive asks for at least one
    Ok(Some(servings.round().max(1.0) as i64))
}

struct PendingDish {
    recipe: Recipe,
    servings: i64,
    /// Slugs from the chosen dish down to this one
    path: Vec<String>,
}

/// Turn one chosen recipe into itself plus its side dishes, depth first
///
/// A side dish already on the current path is not expanded again and stays a
/// plain extra, so cyclic references terminate.
async fn expand_side_dishes<S>(
    store: &S,
    recipe: Recipe,
    servings: i64,
    limit: Duration,
) -> Result<Vec<SelectedRecipe>, MenuError>
where
    S: RecipeStore,
{
    let mut expanded = Vec::new();
    let mut stack = vec![PendingDish {
        path: vec![recipe.slug.clone()],
        recipe,
        servings,
    }];

    while let Some(PendingDish {
        mut recipe,
        servings,
        path,
    }) = stack.pop()
    {
        let mut side_dishes = Vec::new();
        // Frozen dishes keep their extras; the engine drops them anyway
        if servings > 0 {
            let mut plain = Vec::with_capacity(recipe.extras.len());
            for extra in std::mem::take(&mut recipe.extras) {
                let found = bounded(limit, "find_recipe", store.find_recipe(&extra.name)).await?;
                match found {
                    Some(side_dish) if path.contains(&side_dish.slug) => {
                        warn!(recipe = %recipe.name, side_dish = %side_dish.name, "Cyclic side dish kept as a plain extra");
                        plain.push(extra);
                    }
                    Some(side_dish) => {
                        let Some(side_servings) = side_dish_servings(&extra, &side_dish)? else {
                            continue;
                        };
                        debug!(recipe = %recipe.name, side_dish = %side_dish.name, servings = side_servings, "Adding side dish");
                        let mut side_path = path.clone();
                        side_path.push(side_dish.slug.clone());
                        side_dishes.push(PendingDish {
                            recipe: side_dish,
                            servings: side_servings,
                            path: side_path,
                        });
                    }
                    None => plain.push(extra),
                }
            }
            recipe.extras = plain;
        }
        expanded.push(SelectedRecipe::new(recipe, servings));
        stack.extend(side_dishes.into_iter().rev());
    }

    Ok(expanded)
}

/// Build the menu document and shopping list for a selection
pub async fn generate_menu<S>(
    store: &S,
    choices: &[MenuChoice],
    options: &MenuOptions,
) -> Result<GeneratedMenu, MenuError>
where
    S: RecipeStore + ConfigStore,
{
    let config = bounded(options.store_timeout, "load_config", store.load_config()).await?;

    let mut selected = Vec::with_capacity(choices.len());
    for choice in choices {
        let recipe = bounded(
            options.store_timeout,
            "find_recipe",
            store.find_recipe(&choice.identifier),
        )
        .await?
        .ok_or_else(|| MenuError::UnknownRecipe(choice.identifier.clone()))?;
        debug!(recipe = %recipe.name, servings = choice.servings, "Resolved menu choice");
        selected.extend(
            expand_side_dishes(store, recipe, choice.servings, options.store_timeout).await?,
        );
    }

    let resolver = config.resolver();
    let shopping_list = aggregate(&selected, &config.staples, &resolver)?;
    let markdown = render_document(
        &selected,
        &config.staples,
        &config.staple_label,
        &shopping_list,
        &resolver,
        &options.render,
    );

    info!(
        recipes = selected.len(),
        lines = shopping_list.lines.len(),
        conflicts = shopping_list.conflicts().count(),
        "Menu generated"
    );

    Ok(GeneratedMenu {
        markdown,
        shopping_list,
        selected,
    })
}

/// File stem for a menu planned on `date`: `menu_week_WW_YYYY` of the following week
pub fn menu_file_stem(date: NaiveDate) -> String {
    let next_week = (date + ChronoDuration::days(7)).iso_week();
    format!("menu_week_{:02}_{}", next_week.week(), next_week.year())
}
