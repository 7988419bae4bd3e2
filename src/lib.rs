//! # Menu Planner
//!
//! Plans a weekly menu from a recipe collection and turns it into one
//! consolidated shopping list: ingredient amounts are scaled to the requested
//! servings, merged across recipes and staples, grouped by store category and
//! rendered as Markdown.

pub mod aggregation;
pub mod category_resolver;
pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod markdown;
pub mod menu_service;
pub mod menu_spinner;
pub mod quantity;
pub mod recipe_model;
pub mod store;
