//! # Aggregation Engine
//!
//! Turns a week's menu selection into one flat, ordered shopping list.
//!
//! ## Pipeline
//!
//! 1. Validate every selection (negative servings and non-finite amounts fail
//!    the whole request) and drop recipes served from the freezer
//! 2. Seed the staples, unscaled, ahead of any recipe
//! 3. Scale each recipe's required ingredients by
//!    `servings / max(default_servings, 1)`; extras are added unscaled
//! 4. Discard contributions with an empty name or an amount `<= 0`
//! 5. Group by trimmed, lowercased name, keeping the first-seen spelling
//! 6. Sum each group per unit; when a group has several units, keep the
//!    largest unit total and flag the line as a conflict
//! 7. Resolve categories and sort by category, then by name
//!
//! The engine is a pure function of its inputs: no I/O, no global state, and
//! the caller's recipes are never modified.

use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::category_resolver::{normalize_name, CategoryResolver, CategorySortKey};
use crate::errors::AggregationError;
use crate::quantity::Quantity;
use crate::recipe_model::{CategoryId, SelectedRecipe, StapleEntry};

/// Where an aggregated line's amounts came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LineSource {
    Staples,
    Recipe(String),
}

/// One entry of the shopping list
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedLine {
    /// First-seen spelling of the ingredient name
    pub name: String,
    pub total_amount: f64,
    pub unit: String,
    pub category_id: Option<CategoryId>,
    /// Units disagreed. Amounts are summed per unit first, so
    /// `total_amount`/`unit` hold the largest per-unit sum, which may be
    /// larger than any single contribution
    pub source_conflict: bool,
    /// Contributors in first-seen order, without duplicates
    pub sources: Vec<LineSource>,
}

/// Whether anything was selected at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ListStatus {
    Ready,
    /// No non-frozen recipe and no staples: nothing to aggregate
    EmptySelection,
}

/// Output of one aggregation run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShoppingList {
    pub lines: Vec<AggregatedLine>,
    pub status: ListStatus,
}

impl ShoppingList {
    fn empty_selection() -> Self {
        Self {
            lines: Vec::new(),
            status: ListStatus::EmptySelection,
        }
    }

    /// True when there is nothing to buy
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &AggregatedLine> {
        self.lines.iter().filter(|line| line.source_conflict)
    }

    /// Find a line by name, case-insensitively
    pub fn line(&self, name: &str) -> Option<&AggregatedLine> {
        let key = normalize_name(name);
        self.lines
            .iter()
            .find(|line| normalize_name(&line.name) == key)
    }

    /// Lines split into consecutive runs sharing a category, in list order
    pub fn grouped(&self) -> Vec<(Option<CategoryId>, Vec<&AggregatedLine>)> {
        let mut groups: Vec<(Option<CategoryId>, Vec<&AggregatedLine>)> = Vec::new();
        for line in &self.lines {
            let continues_run = groups
                .last()
                .is_some_and(|(category_id, _)| *category_id == line.category_id);
            if !continues_run {
                groups.push((line.category_id, Vec::new()));
            }
            if let Some((_, lines)) = groups.last_mut() {
                lines.push(line);
            }
        }
        groups
    }
}

/// Contributions collected under one normalized name
struct IngredientGroup {
    display_name: String,
    /// Per-unit running totals in first-seen unit order
    unit_totals: Vec<(String, f64)>,
    sources: Vec<LineSource>,
}

impl IngredientGroup {
    fn new(display_name: &str) -> Self {
        Self {
            display_name: display_name.to_string(),
            unit_totals: Vec::new(),
            sources: Vec::new(),
        }
    }

    /// Add one contribution; a running total that overflows is an error
    fn add(&mut self, quantity: &Quantity, source: &LineSource) -> Result<(), AggregationError> {
        let total = match self
            .unit_totals
            .iter_mut()
            .find(|(unit, _)| *unit == quantity.unit)
        {
            Some((_, total)) => {
                *total += quantity.amount;
                *total
            }
            None => {
                self.unit_totals
                    .push((quantity.unit.clone(), quantity.amount));
                quantity.amount
            }
        };
        ensure_finite(&self.display_name, total)?;
        if !self.sources.contains(source) {
            self.sources.push(source.clone());
        }
        Ok(())
    }

    /// Pick the representative unit total; ties keep the earlier unit
    fn merge(&self) -> (f64, String, bool) {
        let conflict = self.unit_totals.len() > 1;
        let mut best: Option<&(String, f64)> = None;
        for candidate in &self.unit_totals {
            match best {
                Some((_, best_amount)) if candidate.1 <= *best_amount => {}
                _ => best = Some(candidate),
            }
        }
        match best {
            Some((unit, amount)) => (*amount, unit.clone(), conflict),
            None => (0.0, String::new(), false),
        }
    }
}

/// Insertion-ordered grouping by normalized name
#[derive(Default)]
struct GroupTable {
    index: HashMap<String, usize>,
    groups: Vec<IngredientGroup>,
}

impl GroupTable {
    /// Record one contribution; empty names and non-positive amounts are skipped
    fn contribute(
        &mut self,
        name: &str,
        quantity: &Quantity,
        source: &LineSource,
    ) -> Result<(), AggregationError> {
        let key = normalize_name(name);
        if key.is_empty() || !quantity.is_positive() {
            debug!(ingredient = %name, amount = quantity.amount, "Skipping ingredient without shopping signal");
            return Ok(());
        }
        let position = match self.index.get(&key) {
            Some(&position) => position,
            None => {
                self.groups.push(IngredientGroup::new(name.trim()));
                self.index.insert(key, self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        self.groups[position].add(quantity, source)
    }
}

fn ensure_finite(name: &str, amount: f64) -> Result<(), AggregationError> {
    if amount.is_finite() {
        Ok(())
    } else {
        Err(AggregationError::InvalidQuantity {
            ingredient: name.to_string(),
            amount,
        })
    }
}

/// Validate the whole request before anything is aggregated
fn validate(
    selected: &[SelectedRecipe],
    staples: &[StapleEntry],
) -> Result<(), AggregationError> {
    for selection in selected {
        if selection.servings < 0 {
            return Err(AggregationError::InvalidServings {
                recipe: selection.recipe.name.clone(),
                servings: selection.servings,
            });
        }
    }
    for selection in selected.iter().filter(|s| !s.is_frozen()) {
        for entry in &selection.recipe.ingredients {
            ensure_finite(&entry.name, entry.quantity.amount)?;
        }
        for extra in &selection.recipe.extras {
            if let Some(amount) = extra.amount {
                ensure_finite(&extra.name, amount)?;
            }
        }
    }
    for staple in staples {
        ensure_finite(&staple.name, staple.quantity.amount)?;
    }
    Ok(())
}

/// Aggregate a menu selection and the staples into an ordered shopping list
///
/// Returns a list with [`ListStatus::EmptySelection`] when every recipe is
/// frozen (or none were chosen) and there are no staples.
///
/// # Errors
///
/// - [`AggregationError::InvalidServings`] for negative servings
/// - [`AggregationError::InvalidQuantity`] for NaN or infinite amounts
/// - [`AggregationError::InvalidScaleFactor`] if a scale factor is not finite
pub fn aggregate(
    selected: &[SelectedRecipe],
    staples: &[StapleEntry],
    resolver: &CategoryResolver,
) -> Result<ShoppingList, AggregationError> {
    validate(selected, staples)?;

    let active: Vec<&SelectedRecipe> = selected.iter().filter(|s| !s.is_frozen()).collect();
    if active.is_empty() && staples.is_empty() {
        debug!(
            frozen = selected.len(),
            "Nothing to aggregate: no active recipes and no staples"
        );
        return Ok(ShoppingList::empty_selection());
    }

    let mut table = GroupTable::default();

    for staple in staples {
        table.contribute(&staple.name, &staple.quantity, &LineSource::Staples)?;
    }

    for selection in active {
        let recipe = &selection.recipe;
        let factor = selection.scale_factor();
        let source = LineSource::Recipe(recipe.name.clone());
        debug!(recipe = %recipe.name, servings = selection.servings, factor, "Scaling recipe");

        for entry in &recipe.ingredients {
            let scaled = entry.quantity.scale(factor)?;
            table.contribute(&entry.name, &scaled, &source)?;
        }
        for extra in &recipe.extras {
            table.contribute(&extra.name, &extra.quantity(), &source)?;
        }
    }

    let mut keyed: Vec<(CategorySortKey, String, AggregatedLine)> = table
        .groups
        .into_iter()
        .map(|group| {
            let (total_amount, unit, source_conflict) = group.merge();
            if source_conflict {
                warn!(
                    ingredient = %group.display_name,
                    units = group.unit_totals.len(),
                    chosen_unit = %unit,
                    "Unit conflict, keeping the largest amount"
                );
            }
            let category_id = resolver.resolve(&group.display_name);
            let line = AggregatedLine {
                name: group.display_name,
                total_amount,
                unit,
                category_id,
                source_conflict,
                sources: group.sources,
            };
            (resolver.sort_key(category_id), line.name.to_lowercase(), line)
        })
        .collect();

    keyed.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    let lines: Vec<AggregatedLine> = keyed.into_iter().map(|(_, _, line)| line).collect();
    debug!(lines = lines.len(), "Aggregation finished");

    Ok(ShoppingList {
        lines,
        status: ListStatus::Ready,
    })
}
