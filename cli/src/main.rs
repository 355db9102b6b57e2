mod commands;
mod config;
mod openfoodfacts;
mod server;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_delete, cmd_favorite_add, cmd_favorite_list, cmd_favorite_remove, cmd_food_add,
    cmd_food_barcode, cmd_food_list, cmd_food_search, cmd_log, cmd_meals, cmd_summary,
    cmd_update, cmd_user_add, cmd_user_goals, cmd_user_list, cmd_weight_delete,
    cmd_weight_history, cmd_weight_log, cmd_week,
};
use crate::config::Config;
use crate::openfoodfacts::OpenFoodFactsClient;
use caltrack_core::models::UpdateGoals;
use caltrack_core::service::CaltrackService;

#[derive(Parser)]
#[command(
    name = "caltrack",
    version,
    about = "A household nutrition tracker",
    long_about = "Track meals, macros and body weight for everyone in the household.\n\
                  Run `caltrack serve` to expose the same data over a REST API."
)]
struct Cli {
    /// Path to the `SQLite` database (overrides `CALTRACK_DB_PATH`)
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// Manage household members and their goals
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
    /// Manage the food catalog
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Log a food entry for a user
    Log {
        /// User name or ID
        #[arg(short, long)]
        user: String,
        /// Food name to search for (local catalog first, then `OpenFoodFacts`)
        food: Option<String>,
        /// Quantity (e.g. "200g", "500ml", "2 tbsp", "1.5 oz")
        #[arg(short, long)]
        quantity: String,
        /// Meal: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Log directly by catalog food ID (skip search)
        #[arg(long)]
        food_id: Option<i64>,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// List meal entries for a user
    Meals {
        /// User name or ID
        #[arg(short, long)]
        user: String,
        /// Single day (YYYY-MM-DD or today/yesterday)
        #[arg(long)]
        date: Option<String>,
        /// Range start, inclusive
        #[arg(long)]
        from: Option<String>,
        /// Range end, inclusive
        #[arg(long)]
        to: Option<String>,
    },
    /// Update a meal entry (quantity, meal, or date)
    Update {
        /// Entry ID to update
        entry_id: i64,
        /// New quantity (e.g. "200g", "2 tbsp")
        #[arg(short, long)]
        quantity: Option<String>,
        /// New meal: breakfast, lunch, dinner, snack
        #[arg(long)]
        meal: Option<String>,
        /// New date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
    },
    /// Delete a meal entry by ID
    Delete {
        /// Entry ID to delete
        entry_id: i64,
    },
    /// Show a user's daily summary (defaults to today)
    Summary {
        /// User name or ID
        #[arg(short, long)]
        user: String,
        /// Date to show (YYYY-MM-DD, default: today)
        date: Option<String>,
    },
    /// Show a user's totals for the 7 days ending on a date
    Week {
        /// User name or ID
        #[arg(short, long)]
        user: String,
        /// Last day of the window (YYYY-MM-DD, default: today)
        end: Option<String>,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Manage favorite foods
    Favorite {
        #[command(subcommand)]
        command: FavoriteCommands,
    },
}

#[derive(Args)]
struct GoalArgs {
    /// Daily calorie goal
    #[arg(long)]
    calories: Option<i64>,
    /// Daily protein goal in grams
    #[arg(long)]
    protein: Option<i64>,
    /// Daily carbs goal in grams
    #[arg(long)]
    carbs: Option<i64>,
    /// Daily fat goal in grams
    #[arg(long)]
    fat: Option<i64>,
}

impl From<GoalArgs> for UpdateGoals {
    fn from(args: GoalArgs) -> Self {
        Self {
            calorie_goal: args.calories,
            protein_goal_g: args.protein,
            carbs_goal_g: args.carbs,
            fat_goal_g: args.fat,
        }
    }
}

#[derive(Subcommand)]
enum UserCommands {
    /// Add a household member
    Add {
        /// Display name (unique, case-insensitive)
        name: String,
        #[command(flatten)]
        goals: GoalArgs,
    },
    /// List household members
    List,
    /// Show or change a user's daily goals
    Goals {
        /// User name or ID
        user: String,
        #[command(flatten)]
        goals: GoalArgs,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a custom food
    Add {
        /// Food name
        name: String,
        /// Calories per 100g
        #[arg(long)]
        calories: f64,
        /// Protein per 100g
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Carbs per 100g
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Fat per 100g
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Fiber per 100g
        #[arg(long)]
        fiber: Option<f64>,
        /// Sugar per 100g
        #[arg(long)]
        sugar: Option<f64>,
        /// Brand name
        #[arg(long)]
        brand: Option<String>,
        /// Barcode
        #[arg(long)]
        barcode: Option<String>,
    },
    /// List/search the local food catalog
    List {
        /// Search query to filter foods
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Search `OpenFoodFacts` for a food
    Search {
        /// Search query
        query: String,
        /// Result page, starting at 1
        #[arg(long)]
        page: Option<u32>,
        /// Import every result into the local catalog
        #[arg(long)]
        save: bool,
    },
    /// Look up a product by barcode
    Barcode {
        /// Barcode number
        code: String,
        /// Import the product into the local catalog
        #[arg(long)]
        save: bool,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry (replaces any entry for the same day)
    Log {
        /// User name or ID
        #[arg(short, long)]
        user: String,
        /// Weight value (number)
        value: f64,
        /// Unit: kg or lbs (default: kg)
        #[arg(long, default_value = "kg")]
        unit: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Optional note
        #[arg(long)]
        note: Option<String>,
    },
    /// Show weight history, newest first
    History {
        /// User name or ID
        #[arg(short, long)]
        user: String,
        /// Number of entries to show (default: 30)
        #[arg(short, long)]
        limit: Option<i64>,
    },
    /// Delete a weight entry by ID
    Delete {
        /// Weight entry ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum FavoriteCommands {
    /// Mark a catalog food as a favorite
    Add {
        /// User name or ID
        #[arg(short, long)]
        user: String,
        /// Catalog food ID
        food_id: i64,
    },
    /// Remove a favorite
    Remove {
        /// User name or ID
        #[arg(short, long)]
        user: String,
        /// Catalog food ID
        food_id: i64,
    },
    /// List a user's favorites
    List {
        /// User name or ID
        #[arg(short, long)]
        user: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,caltrack=info,caltrack_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    let json = cli.json;

    let svc = CaltrackService::open(&config.db_path)
        .with_context(|| format!("Failed to open database: {}", config.db_path.display()))?;
    let off = OpenFoodFactsClient::new(&config.off_url, config.lookup_timeout)?;

    match cli.command {
        Commands::Serve { port, bind } => server::start_server(svc, off, &config, port, &bind).await,
        Commands::User { command } => match command {
            UserCommands::Add { name, goals } => cmd_user_add(&svc, &name, goals.into(), json),
            UserCommands::List => cmd_user_list(&svc, json),
            UserCommands::Goals { user, goals } => {
                cmd_user_goals(&svc, &user, &goals.into(), json)
            }
        },
        Commands::Food { command } => match command {
            FoodCommands::Add {
                name,
                calories,
                protein,
                carbs,
                fat,
                fiber,
                sugar,
                brand,
                barcode,
            } => cmd_food_add(
                &svc,
                commands::FoodInput {
                    name,
                    brand,
                    barcode,
                    kcal: calories,
                    protein,
                    carbs,
                    fat,
                    fiber,
                    sugar,
                },
                json,
            ),
            FoodCommands::List { search } => cmd_food_list(&svc, search.as_deref(), json),
            FoodCommands::Search { query, page, save } => {
                cmd_food_search(&svc, &off, &query, page, save, json).await
            }
            FoodCommands::Barcode { code, save } => {
                cmd_food_barcode(&svc, &off, &code, save, json).await
            }
        },
        Commands::Log {
            user,
            food,
            quantity,
            meal,
            food_id,
            date,
        } => {
            let args = commands::LogArgs {
                user: &user,
                food: food.as_deref(),
                food_id,
                quantity: &quantity,
                meal: &meal,
                date: date.as_deref(),
            };
            cmd_log(&svc, &off, args, json).await
        }
        Commands::Meals {
            user,
            date,
            from,
            to,
        } => {
            let range = commands::MealRange {
                date: date.as_deref(),
                from: from.as_deref(),
                to: to.as_deref(),
            };
            cmd_meals(&svc, &user, &range, json)
        }
        Commands::Update {
            entry_id,
            quantity,
            meal,
            date,
        } => cmd_update(
            &svc,
            entry_id,
            quantity.as_deref(),
            meal.as_deref(),
            date.as_deref(),
            json,
        ),
        Commands::Delete { entry_id } => cmd_delete(&svc, entry_id, json),
        Commands::Summary { user, date } => cmd_summary(&svc, &user, date.as_deref(), json),
        Commands::Week { user, end } => cmd_week(&svc, &user, end.as_deref(), json),
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                user,
                value,
                unit,
                date,
                note,
            } => {
                let input = commands::WeightInput {
                    user: &user,
                    value,
                    unit: &unit,
                    date: date.as_deref(),
                    note,
                };
                cmd_weight_log(&svc, input, json)
            }
            WeightCommands::History { user, limit } => {
                cmd_weight_history(&svc, &user, limit, json)
            }
            WeightCommands::Delete { id } => cmd_weight_delete(&svc, id, json),
        },
        Commands::Favorite { command } => match command {
            FavoriteCommands::Add { user, food_id } => cmd_favorite_add(&svc, &user, food_id, json),
            FavoriteCommands::Remove { user, food_id } => {
                cmd_favorite_remove(&svc, &user, food_id, json)
            }
            FavoriteCommands::List { user } => cmd_favorite_list(&svc, &user, json),
        },
    }
}
