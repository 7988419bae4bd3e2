//! # Error Types Module
//!
//! This module defines the error types used by the shopping-list pipeline.
//! Validation failures are reported as a single descriptive error so that a
//! request either aggregates completely or not at all.

/// Errors raised by the aggregation engine and the quantity model
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationError {
    /// A selected recipe asked for a negative number of servings
    InvalidServings { recipe: String, servings: i64 },
    /// A scale factor was negative, infinite or NaN
    InvalidScaleFactor(f64),
    /// An ingredient amount was not a finite number
    InvalidQuantity { ingredient: String, amount: f64 },
}

impl std::fmt::Display for AggregationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationError::InvalidServings { recipe, servings } => {
                write!(f, "Invalid servings for '{recipe}': {servings} (must be >= 0)")
            }
            AggregationError::InvalidScaleFactor(factor) => {
                write!(f, "Invalid scale factor: {factor}")
            }
            AggregationError::InvalidQuantity { ingredient, amount } => {
                write!(f, "Invalid amount for '{ingredient}': {amount}")
            }
        }
    }
}

impl std::error::Error for AggregationError {}

/// Reasons a recipe is refused by the recipe store
#[derive(Debug, Clone, PartialEq)]
pub enum RecipeValidationError {
    EmptyName,
    NameTooLong(usize),
    NoIngredients,
    NonFiniteAmount(String),
}

impl std::fmt::Display for RecipeValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecipeValidationError::EmptyName => write!(f, "Recipe name must not be empty"),
            RecipeValidationError::NameTooLong(len) => {
                write!(f, "Recipe name is too long ({len} characters, max 255)")
            }
            RecipeValidationError::NoIngredients => {
                write!(f, "Recipe needs at least one ingredient with an amount")
            }
            RecipeValidationError::NonFiniteAmount(name) => {
                write!(f, "Ingredient '{name}' has an amount that is not a number")
            }
        }
    }
}

impl std::error::Error for RecipeValidationError {}

/// Errors surfaced while turning a menu request into a shopping list
#[derive(Debug)]
pub enum MenuError {
    /// The selection payload could not be read
    MalformedSelection(String),
    /// No recipe matches the given slug or name
    UnknownRecipe(String),
    /// The aggregation engine rejected the input
    Aggregation(AggregationError),
    /// A store call did not finish within the configured timeout
    StoreTimeout(String),
    /// Store I/O failure
    Store(anyhow::Error),
}

impl std::fmt::Display for MenuError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MenuError::MalformedSelection(msg) => write!(f, "Malformed menu selection: {msg}"),
            MenuError::UnknownRecipe(identifier) => write!(f, "Unknown recipe: {identifier}"),
            MenuError::Aggregation(err) => write!(f, "Aggregation failed: {err}"),
            MenuError::StoreTimeout(operation) => write!(f, "Store timed out during {operation}"),
            MenuError::Store(err) => write!(f, "Store error: {err:#}"),
        }
    }
}

impl std::error::Error for MenuError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MenuError::Aggregation(err) => Some(err),
            MenuError::Store(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<AggregationError> for MenuError {
    fn from(err: AggregationError) -> Self {
        MenuError::Aggregation(err)
    }
}

impl From<anyhow::Error> for MenuError {
    fn from(err: anyhow::Error) -> Self {
        MenuError::Store(err)
    }
}
