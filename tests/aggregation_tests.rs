//! # Shopping List Tests
//!
//! End-to-end checks of the aggregation engine and renderer through the
//! public API: scaling, merging, unit conflicts, category ordering and the
//! `# Shopping` heading contract.

use menu_planner::aggregation::{aggregate, LineSource, ListStatus, ShoppingList};
use menu_planner::category_resolver::CategoryResolver;
use menu_planner::errors::AggregationError;
use menu_planner::markdown::{
    count_shopping_headings, render_document, split_document, RenderOptions,
};
use menu_planner::recipe_model::{
    CategoryRecord, IngredientMapping, Recipe, SelectedRecipe, StapleEntry,
};

fn grocery_resolver() -> CategoryResolver {
    let categories = vec![
        CategoryRecord { id: 10, name: "Meat".to_string(), priority: 1 },
        CategoryRecord { id: 20, name: "Dry goods".to_string(), priority: 2 },
        CategoryRecord { id: 30, name: "Produce".to_string(), priority: 3 },
    ];
    let mappings = vec![
        IngredientMapping { ingredient_name: "Minced meat".to_string(), category_id: Some(10) },
        IngredientMapping { ingredient_name: "Pasta".to_string(), category_id: Some(20) },
        IngredientMapping { ingredient_name: "Onion".to_string(), category_id: Some(30) },
    ];
    CategoryResolver::new(&mappings, &categories)
}

fn bolognese() -> Recipe {
    Recipe::new("Pasta Bolognese", 2)
        .with_ingredient("Minced meat", 500.0, "g")
        .with_ingredient("Pasta", 400.0, "g")
}

fn render(selected: &[SelectedRecipe], staples: &[StapleEntry], list: &ShoppingList) -> String {
    render_document(
        selected,
        staples,
        "Staples",
        list,
        &grocery_resolver(),
        &RenderOptions::default(),
    )
}

#[test]
fn test_pasta_bolognese_scenario() {
    let selected = vec![SelectedRecipe::new(bolognese(), 4)];
    let staples = vec![StapleEntry::new("Salt", 1.0, "stk")];
    let list = aggregate(&selected, &staples, &grocery_resolver()).unwrap();

    assert_eq!(list.status, ListStatus::Ready);
    let summary: Vec<(&str, f64, &str)> = list
        .lines
        .iter()
        .map(|line| (line.name.as_str(), line.total_amount, line.unit.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("Minced meat", 1000.0, "g"),
            ("Pasta", 800.0, "g"),
            ("Salt", 1.0, "stk"),
        ]
    );
    assert!(list.lines.iter().all(|line| !line.source_conflict));
    assert_eq!(list.line("salt").unwrap().sources, vec![LineSource::Staples]);

    let markdown = render(&selected, &staples, &list);
    assert!(markdown.contains("- Minced meat — 1000 g"));
    assert!(markdown.contains("- Pasta — 800 g"));
    assert!(markdown.contains("## Uncategorized\n\n- Salt — 1 stk"));
}

#[test]
fn test_aggregation_is_idempotent() {
    let selected = vec![
        SelectedRecipe::new(bolognese(), 3),
        SelectedRecipe::new(
            Recipe::new("Onion soup", 4)
                .with_ingredient("Onion", 6.0, "stk")
                .with_ingredient("onion", 1.0, "kg")
                .with_extra("Baguette", None, "stk"),
            2,
        ),
    ];
    let staples = vec![StapleEntry::new("Milk", 2.0, "l")];

    let first = aggregate(&selected, &staples, &grocery_resolver()).unwrap();
    let second = aggregate(&selected, &staples, &grocery_resolver()).unwrap();
    assert_eq!(first, second);
    assert_eq!(render(&selected, &staples, &first), render(&selected, &staples, &second));
}

#[test]
fn test_doubling_servings_doubles_amounts() {
    let single = aggregate(&[SelectedRecipe::new(bolognese(), 3)], &[], &grocery_resolver()).unwrap();
    let double = aggregate(&[SelectedRecipe::new(bolognese(), 6)], &[], &grocery_resolver()).unwrap();

    assert_eq!(single.lines.len(), double.lines.len());
    for (one, two) in single.lines.iter().zip(&double.lines) {
        assert_eq!(one.name, two.name);
        assert_eq!(one.unit, two.unit);
        assert!((two.total_amount - 2.0 * one.total_amount).abs() < 1e-9);
    }
}

#[test]
fn test_frozen_recipes_contribute_nothing() {
    let lasagne = Recipe::new("Lasagne", 4)
        .with_ingredient("Lasagne sheets", 250.0, "g")
        .with_ingredient("Onion", 1.0, "stk")
        .with_extra("Garlic bread", None, "stk");
    let salad = Recipe::new("Salad", 2).with_ingredient("Onion", 1.0, "stk");

    let selected = vec![SelectedRecipe::new(lasagne, 0), SelectedRecipe::new(salad, 2)];
    let list = aggregate(&selected, &[], &grocery_resolver()).unwrap();

    assert!(list.line("Lasagne sheets").is_none());
    assert!(list.line("Garlic bread").is_none());
    let onion = list.line("onion").unwrap();
    assert_eq!(onion.total_amount, 1.0);
    assert_eq!(onion.sources, vec![LineSource::Recipe("Salad".to_string())]);
}

#[test]
fn test_only_frozen_and_no_staples_is_empty_selection() {
    let selected = vec![SelectedRecipe::new(bolognese(), 0)];
    let list = aggregate(&selected, &[], &grocery_resolver()).unwrap();
    assert_eq!(list.status, ListStatus::EmptySelection);
    assert!(list.is_empty());

    let markdown = render(&selected, &[], &list);
    assert!(markdown.contains("- Pasta Bolognese — from freezer"));
    assert!(markdown.contains("_Nothing to buy._"));
    assert_eq!(count_shopping_headings(&markdown), 1);
}

#[test]
fn test_same_unit_contributions_merge() {
    let a = Recipe::new("Soup", 1).with_ingredient("Onion", 200.0, "g");
    let b = Recipe::new("Stew", 1).with_ingredient("onion ", 300.0, "g");
    let list = aggregate(
        &[SelectedRecipe::new(a, 1), SelectedRecipe::new(b, 1)],
        &[],
        &grocery_resolver(),
    )
    .unwrap();

    assert_eq!(list.lines.len(), 1);
    let onion = list.line("onion").unwrap();
    assert_eq!(onion.name, "Onion");
    assert_eq!(onion.total_amount, 500.0);
    assert_eq!(onion.unit, "g");
    assert!(!onion.source_conflict);
}

#[test]
fn test_unit_conflict_keeps_larger_amount() {
    let a = Recipe::new("Curry", 1).with_ingredient("Cream", 1.0, "stk");
    let b = Recipe::new("Gratin", 1).with_ingredient("cream", 2.0, "dl");
    let list = aggregate(
        &[SelectedRecipe::new(a, 1), SelectedRecipe::new(b, 1)],
        &[],
        &grocery_resolver(),
    )
    .unwrap();

    assert_eq!(list.lines.len(), 1);
    let cream = &list.lines[0];
    assert!(cream.source_conflict);
    assert_eq!(cream.total_amount, 2.0);
    assert_eq!(cream.unit, "dl");
    assert_eq!(list.conflicts().count(), 1);
}

#[test]
fn test_unmapped_ingredients_sort_last() {
    let recipe = Recipe::new("Mixed", 1)
        .with_ingredient("Apple", 1.0, "stk")
        .with_ingredient("Onion", 1.0, "stk")
        .with_ingredient("Minced meat", 100.0, "g");
    let selected = vec![SelectedRecipe::new(recipe, 1)];
    let list = aggregate(&selected, &[], &grocery_resolver()).unwrap();

    let names: Vec<&str> = list.lines.iter().map(|line| line.name.as_str()).collect();
    assert_eq!(names, vec!["Minced meat", "Onion", "Apple"]);
    assert_eq!(list.line("apple").unwrap().category_id, None);

    let markdown = render(&selected, &[], &list);
    let meat = markdown.find("## Meat").unwrap();
    let produce = markdown.find("## Produce").unwrap();
    let uncategorized = markdown.find("## Uncategorized").unwrap();
    assert!(meat < produce && produce < uncategorized);
}

#[test]
fn test_rendered_document_splits_on_shopping_heading() {
    let selected = vec![SelectedRecipe::new(bolognese(), 2)];
    let list = aggregate(&selected, &[], &grocery_resolver()).unwrap();
    let markdown = render(&selected, &[], &list);

    assert_eq!(count_shopping_headings(&markdown), 1);
    let (menu, shopping) = split_document(&markdown);
    assert!(menu.starts_with("# Menu"));
    let shopping = shopping.unwrap();
    assert!(shopping.starts_with("# Shopping"));
    assert!(shopping.contains("- Pasta — 400 g"));
}

#[test]
fn test_invalid_input_fails_whole_request() {
    let err = aggregate(&[SelectedRecipe::new(bolognese(), -1)], &[], &grocery_resolver())
        .unwrap_err();
    assert!(matches!(err, AggregationError::InvalidServings { servings: -1, .. }));

    let broken = Recipe::new("Broken", 2).with_ingredient("Flour", f64::NAN, "g");
    let err = aggregate(
        &[SelectedRecipe::new(bolognese(), 2), SelectedRecipe::new(broken, 2)],
        &[],
        &grocery_resolver(),
    )
    .unwrap_err();
    assert!(matches!(err, AggregationError::InvalidQuantity { .. }));
}

#[test]
fn test_inputs_are_not_mutated() {
    let selected = vec![SelectedRecipe::new(bolognese(), 8)];
    let staples = vec![StapleEntry::new("Salt", 1.0, "stk")];
    let before = (selected.clone(), staples.clone());

    aggregate(&selected, &staples, &grocery_resolver()).unwrap();
    assert_eq!((selected, staples), before);
}

#[test]
fn test_tiny_scaled_amounts_never_render_as_zero() {
    let paella = Recipe::new("Paella", 4).with_ingredient("Saffron", 0.01, "g");
    let selected = vec![SelectedRecipe::new(paella, 1)];
    let list = aggregate(&selected, &[], &grocery_resolver()).unwrap();
    let markdown = render(&selected, &[], &list);

    assert!(!markdown.contains("- Saffron — 0 g"));
    assert!(markdown.contains("- Saffron — 0.00"));
}

#[test]
fn test_overflowing_amounts_fail_instead_of_rendering_inf() {
    let recipe = Recipe::new("Big", 2).with_ingredient("Flour", 1e308, "g");
    let err = aggregate(&[SelectedRecipe::new(recipe, 4)], &[], &grocery_resolver()).unwrap_err();
    assert!(matches!(err, AggregationError::InvalidScaleFactor(_)));
}
