//! # Markdown Renderer
//!
//! Formats a menu selection and its shopping list as Markdown. The output is
//! one document with a `# Menu` section followed by a `# Shopping` section.
//!
//! Downstream consumers split the document on the first line matching
//! `^#\s+Shopping` (multiline), so the renderer emits exactly one such line
//! and nothing else at that heading level. Category headings use `##`, and
//! user text is flattened to a single line so a recipe or ingredient name can
//! never start a heading of its own.

use lazy_static::lazy_static;
use regex::Regex;

use crate::aggregation::{AggregatedLine, LineSource, ShoppingList};
use crate::category_resolver::CategoryResolver;
use crate::quantity::{format_amount, Quantity};
use crate::recipe_model::{SelectedRecipe, StapleEntry};

pub const MENU_HEADING: &str = "# Menu";
pub const SHOPPING_HEADING: &str = "# Shopping";

/// Marker appended to lines whose units could not be merged
pub const DEFAULT_CONFLICT_MARKER: &str = "(check units)";
pub const DEFAULT_EMPTY_MESSAGE: &str = "_Nothing to buy._";

lazy_static! {
    static ref SHOPPING_HEADING_RE: Regex =
        Regex::new(r"(?m)^#\s+Shopping").expect("Shopping heading pattern should be valid");
}

/// Presentation switches for the shopping section
#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Append the contributing recipes to each line
    pub show_sources: bool,
    pub conflict_marker: String,
    pub empty_message: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_sources: false,
            conflict_marker: DEFAULT_CONFLICT_MARKER.to_string(),
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
        }
    }
}

/// Collapse whitespace (including newlines) so text stays on one line
fn inline_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn servings_label(servings: i64) -> String {
    match servings {
        0 => "from freezer".to_string(),
        1 => "1 serving".to_string(),
        n => format!("{n} servings"),
    }
}

fn amount_with_unit(amount: f64, unit: &str) -> String {
    let unit = inline_text(unit);
    if unit.is_empty() {
        format_amount(amount)
    } else {
        format!("{} {}", format_amount(amount), unit)
    }
}

/// Render the `# Menu` section: recipes in selection order, then staples
pub fn render_menu_section(
    selected: &[SelectedRecipe],
    staples: &[StapleEntry],
    staple_label: &str,
) -> String {
    let mut output = String::new();
    output.push_str(MENU_HEADING);
    output.push_str("\n\n");

    if selected.is_empty() {
        output.push_str("_No recipes selected._\n");
    }
    for selection in selected {
        output.push_str(&format!(
            "- {} — {}",
            inline_text(&selection.recipe.name),
            servings_label(selection.servings)
        ));
        if let Some(placement) = selection.recipe.placement.as_deref() {
            let placement = inline_text(placement);
            if !placement.is_empty() {
                output.push_str(&format!(" _({placement})_"));
            }
        }
        output.push('\n');
    }

    if !staples.is_empty() {
        let label = inline_text(staple_label);
        output.push_str(&format!("\n## {label}\n\n"));
        for staple in staples {
            let Quantity { amount, unit } = &staple.quantity;
            output.push_str(&format!(
                "- {} — {}\n",
                inline_text(&staple.name),
                amount_with_unit(*amount, unit)
            ));
        }
    }

    output
}

fn render_line(line: &AggregatedLine, options: &RenderOptions) -> String {
    let mut bullet = format!(
        "- {} — {}",
        inline_text(&line.name),
        amount_with_unit(line.total_amount, &line.unit)
    );
    if line.source_conflict {
        bullet.push(' ');
        bullet.push_str(&options.conflict_marker);
    }
    if options.show_sources {
        let recipes: Vec<String> = line
            .sources
            .iter()
            .filter_map(|source| match source {
                LineSource::Recipe(name) => Some(inline_text(name)),
                LineSource::Staples => None,
            })
            .collect();
        if !recipes.is_empty() {
            bullet.push_str(&format!(" _({})_", recipes.join(", ")));
        }
    }
    bullet
}

/// Render the `# Shopping` section grouped under `##` category headings
pub fn render_shopping_section(
    list: &ShoppingList,
    resolver: &CategoryResolver,
    options: &RenderOptions,
) -> String {
    let mut output = String::new();
    output.push_str(SHOPPING_HEADING);
    output.push('\n');

    if list.is_empty() {
        output.push('\n');
        output.push_str(&options.empty_message);
        output.push('\n');
        return output;
    }

    for (category_id, lines) in list.grouped() {
        output.push_str(&format!(
            "\n## {}\n\n",
            inline_text(resolver.category_label(category_id))
        ));
        for line in lines {
            output.push_str(&render_line(line, options));
            output.push('\n');
        }
    }

    output
}

/// Render the complete document: menu section, blank line, shopping section
pub fn render_document(
    selected: &[SelectedRecipe],
    staples: &[StapleEntry],
    staple_label: &str,
    list: &ShoppingList,
    resolver: &CategoryResolver,
    options: &RenderOptions,
) -> String {
    let mut document = render_menu_section(selected, staples, staple_label);
    document.push('\n');
    document.push_str(&render_shopping_section(list, resolver, options));
    document
}

/// Split a rendered document into its menu part and shopping part
///
/// The shopping part starts at the first `# Shopping` heading and includes
/// it. Documents without that heading come back whole as the menu part.
pub fn split_document(markdown: &str) -> (&str, Option<&str>) {
    match SHOPPING_HEADING_RE.find(markdown) {
        Some(found) => (&markdown[..found.start()], Some(&markdown[found.start()..])),
        None => (markdown, None),
    }
}

/// Number of lines matching the shopping heading pattern
pub fn count_shopping_headings(markdown: &str) -> usize {
    SHOPPING_HEADING_RE.find_iter(markdown).count()
}
