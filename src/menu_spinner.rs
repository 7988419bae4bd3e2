//! # Menu Spinner
//!
//! Suggests a random set of recipes for the week. Blacklisted recipes are
//! skipped unless they are also whitelisted.

use rand::Rng;
use tracing::debug;

use crate::recipe_model::Recipe;

/// Number of suggestions per spin
pub const DEFAULT_SPIN_COUNT: usize = 6;

/// Draw up to `count` distinct eligible recipes, uniformly at random
///
/// Returns fewer than `count` recipes when the eligible pool is smaller.
///
/// # Examples
///
/// ```rust
/// use menu_planner::menu_spinner::spin_menu;
/// use menu_planner::recipe_model::Recipe;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let recipes = vec![Recipe::new("Soup", 4), Recipe::new("Chili", 4).blacklisted()];
/// let mut rng = StdRng::seed_from_u64(7);
/// let picks = spin_menu(&recipes, 6, &mut rng);
/// assert_eq!(picks.len(), 1);
/// assert_eq!(picks[0].name, "Soup");
/// ```
pub fn spin_menu<'a, R: Rng + ?Sized>(
    recipes: &'a [Recipe],
    count: usize,
    rng: &mut R,
) -> Vec<&'a Recipe> {
    let mut pool: Vec<&Recipe> = recipes
        .iter()
        .filter(|recipe| recipe.is_spinner_eligible())
        .collect();
    let picks = count.min(pool.len());
    debug!(eligible = pool.len(), picks, "Spinning menu");

    let mut chosen = Vec::with_capacity(picks);
    for _ in 0..picks {
        let index = rng.gen_range(0..pool.len());
        chosen.push(pool.remove(index));
    }
    chosen
}
