use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;

use menu_planner::config::{AppConfig, StoreSource};
use menu_planner::db::{self, PgStore, STAPLE_LABEL_SETTING};
use menu_planner::logging::init_tracing;
use menu_planner::markdown::RenderOptions;
use menu_planner::menu_service::{generate_menu, menu_file_stem, parse_menu_selection, MenuOptions};
use menu_planner::menu_spinner::spin_menu;
use menu_planner::recipe_model::Recipe;
use menu_planner::store::{
    load_snapshot_file, ConfigSnapshot, ConfigStore, InMemoryStore, RecipeStore,
};

#[derive(Parser, Debug)]
#[command(name = "menu-planner", version, about = "Weekly menu and shopping-list generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the menu and shopping list for a selection file
    Generate {
        /// JSON object mapping recipe slug or name to servings
        menu: PathBuf,
        /// Output file (defaults to menu_week_WW_YYYY.md in the output dir)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print to stdout instead of writing a file
        #[arg(long)]
        stdout: bool,
        /// Show which recipes contributed to each line
        #[arg(long)]
        sources: bool,
    },
    /// Suggest random recipes for the week
    Spin {
        #[arg(short, long)]
        count: Option<usize>,
    },
    /// Create the database tables
    InitDb,
    /// Load a JSON snapshot into the database
    Seed { snapshot: PathBuf },
    /// Show the effective configuration
    PrintConfig,
}

/// The configured store backend
enum AnyStore {
    Memory(InMemoryStore),
    Postgres(PgStore),
}

impl AnyStore {
    async fn open(config: &AppConfig) -> Result<Self> {
        match config.store_source()? {
            StoreSource::Snapshot(path) => Ok(AnyStore::Memory(InMemoryStore::from_json_file(&path)?)),
            StoreSource::Database(url) => Ok(AnyStore::Postgres(PgStore::connect(&url).await?)),
        }
    }
}

impl RecipeStore for AnyStore {
    async fn find_recipe(&self, identifier: &str) -> Result<Option<Recipe>> {
        match self {
            AnyStore::Memory(store) => store.find_recipe(identifier).await,
            AnyStore::Postgres(store) => store.find_recipe(identifier).await,
        }
    }

    async fn list_recipes(&self) -> Result<Vec<Recipe>> {
        match self {
            AnyStore::Memory(store) => store.list_recipes().await,
            AnyStore::Postgres(store) => store.list_recipes().await,
        }
    }

    async fn save_recipe(&self, recipe: Recipe) -> Result<Recipe> {
        match self {
            AnyStore::Memory(store) => store.save_recipe(recipe).await,
            AnyStore::Postgres(store) => store.save_recipe(recipe).await,
        }
    }
}

impl ConfigStore for AnyStore {
    async fn load_config(&self) -> Result<ConfigSnapshot> {
        match self {
            AnyStore::Memory(store) => store.load_config().await,
            AnyStore::Postgres(store) => store.load_config().await,
        }
    }
}

async fn run_generate(
    config: &AppConfig,
    menu: &Path,
    output: Option<PathBuf>,
    stdout: bool,
    sources: bool,
) -> Result<()> {
    let selection = std::fs::read_to_string(menu)
        .with_context(|| format!("Failed to read menu selection {}", menu.display()))?;
    let choices = parse_menu_selection(&selection)?;

    let store = AnyStore::open(config).await?;
    let options = MenuOptions {
        store_timeout: config.store_timeout,
        render: RenderOptions {
            show_sources: sources,
            ..RenderOptions::default()
        },
    };
    let generated = generate_menu(&store, &choices, &options).await?;

    if stdout {
        print!("{}", generated.markdown);
        return Ok(());
    }

    let path = output.unwrap_or_else(|| {
        let stem = menu_file_stem(chrono::Local::now().date_naive());
        config.output_dir.join(format!("{stem}.md"))
    });
    std::fs::write(&path, &generated.markdown)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), "Menu written");
    println!("{}", path.display());
    Ok(())
}

async fn run_spin(config: &AppConfig, count: Option<usize>) -> Result<()> {
    let store = AnyStore::open(config).await?;
    let recipes = store.list_recipes().await?;
    let picks = spin_menu(&recipes, count.unwrap_or(config.spin_count), &mut rand::thread_rng());
    for recipe in picks {
        println!("{}\t{}", recipe.slug, recipe.name);
    }
    Ok(())
}

async fn run_seed(config: &AppConfig, snapshot: &Path) -> Result<()> {
    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to seed the database")?;
    let pool = db::connect(url).await?;
    db::init_database_schema(&pool).await?;

    let snapshot = load_snapshot_file(snapshot)?;

    // Snapshot ids are remapped onto freshly created categories
    let mut category_ids = std::collections::HashMap::new();
    for category in &snapshot.config.categories {
        let created = db::create_category(&pool, &category.name, category.priority).await?;
        category_ids.insert(category.id, created.id);
    }
    for mapping in &snapshot.config.ingredients {
        let category_id = mapping
            .category_id
            .and_then(|id| category_ids.get(&id).copied());
        db::upsert_ingredient_mapping(&pool, &mapping.ingredient_name, category_id).await?;
    }
    for staple in &snapshot.config.staples {
        db::create_staple(&pool, staple).await?;
    }
    db::set_setting(&pool, STAPLE_LABEL_SETTING, &snapshot.config.staple_label).await?;

    for recipe in &snapshot.recipes {
        db::create_recipe(&pool, recipe).await?;
    }

    info!(
        recipes = snapshot.recipes.len(),
        categories = snapshot.config.categories.len(),
        staples = snapshot.config.staples.len(),
        "Database seeded"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env()?;
    init_tracing(config.log_format)?;

    match cli.command {
        Command::Generate {
            menu,
            output,
            stdout,
            sources,
        } => run_generate(&config, &menu, output, stdout, sources).await,
        Command::Spin { count } => run_spin(&config, count).await,
        Command::InitDb => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set to initialize the database")?;
            let pool = db::connect(url).await?;
            db::init_database_schema(&pool).await
        }
        Command::Seed { snapshot } => run_seed(&config, &snapshot).await,
        Command::PrintConfig => {
            println!("{config:#?}");
            Ok(())
        }
    }
}
