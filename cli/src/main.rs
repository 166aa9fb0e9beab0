mod api;
mod commands;
mod config;

use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::api::ApiClient;
use crate::commands::{
    ProfileArgs, cmd_bmi, cmd_log_exercise, cmd_log_food, cmd_log_water, cmd_log_weight, cmd_post,
    cmd_profile_clear, cmd_profile_set, cmd_profile_show, cmd_queue_add, cmd_queue_clear,
    cmd_queue_drain, cmd_queue_list, cmd_queue_offline, cmd_queue_online, cmd_queue_retry,
    cmd_targets,
};
use crate::config::Config;
use nutrack_core::service::NutrackService;

const DEFAULT_LOG_FILTER: &str = "nutrack=info,nutrack_core=info";

#[derive(Parser)]
#[command(
    name = "nutrack",
    version,
    about = "Nutrition tracker with health metrics and an offline action queue"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Calculate BMI from a weight and height
    Bmi {
        /// Body weight
        weight: f64,
        /// Height
        height: f64,
        /// Unit for weight: kg or lbs
        #[arg(long, default_value = "kg")]
        weight_unit: String,
        /// Unit for height: cm or in
        #[arg(long, default_value = "cm")]
        height_unit: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show BMR, TDEE, calorie, macro and water targets
    Targets {
        #[command(flatten)]
        profile: ProfileArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the stored biometric profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
    /// Log food, water, exercise or weight (queued while offline)
    Log {
        #[command(subcommand)]
        action: LogAction,
    },
    /// Publish a community post (queued while offline)
    Post {
        /// Post text
        content: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Inspect and control the offline action queue
    Queue {
        #[command(subcommand)]
        action: QueueAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Create or update the profile
    Set {
        #[command(flatten)]
        profile: ProfileArgs,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the stored profile
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the stored profile
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum LogAction {
    /// Log a food entry by food ID
    Food {
        /// Food ID on the backend
        food_id: i64,
        /// Serving size in grams (e.g. "200" or "200g")
        serving: String,
        /// Meal type: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log water intake
    Water {
        /// Amount in ml
        amount_ml: f64,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log an exercise session
    Exercise {
        /// Exercise name
        name: String,
        /// Duration in minutes
        minutes: f64,
        /// Calories burned
        #[arg(long)]
        calories: Option<f64>,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a weigh-in
    Weight {
        /// Weight value
        value: f64,
        /// Unit: kg or lbs
        #[arg(short, long, default_value = "kg")]
        unit: String,
        /// Date to log for (YYYY-MM-DD, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum QueueAction {
    /// List queued actions in send order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a raw action without sending it
    Add {
        /// Action type: food_log, water_log, exercise_log, weight_log, post
        action_type: String,
        /// JSON object payload
        payload: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay queued actions now
    Drain {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Replay queued actions if online
    Retry {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark the network as online and replay the queue
    Online {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark the network as offline so new actions are queued
    Offline {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard every queued action
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
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

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    tracing::debug!(
        data_dir = %config.data_dir.display(),
        db = %config.db_path.display(),
        api = %config.api_url,
        "loaded config"
    );
    let svc = Arc::new(NutrackService::new(&config.db_path.to_string_lossy())?);
    let api = Arc::new(ApiClient::new(&config.api_url, config.api_token.clone())?);

    match cli.command {
        Commands::Bmi {
            weight,
            height,
            weight_unit,
            height_unit,
            json,
        } => cmd_bmi(weight, &weight_unit, height, &height_unit, json),
        Commands::Targets { profile, json } => cmd_targets(&svc, &profile, json),
        Commands::Profile { action } => match action {
            ProfileAction::Set { profile, json } => cmd_profile_set(&svc, &profile, json),
            ProfileAction::Show { json } => cmd_profile_show(&svc, json),
            ProfileAction::Clear { json } => cmd_profile_clear(&svc, json),
        },
        Commands::Log { action } => match action {
            LogAction::Food {
                food_id,
                serving,
                meal,
                date,
                json,
            } => cmd_log_food(&svc, &api, food_id, &serving, &meal, date, json).await,
            LogAction::Water {
                amount_ml,
                date,
                json,
            } => cmd_log_water(&svc, &api, amount_ml, date, json).await,
            LogAction::Exercise {
                name,
                minutes,
                calories,
                date,
                json,
            } => cmd_log_exercise(&svc, &api, &name, minutes, calories, date, json).await,
            LogAction::Weight {
                value,
                unit,
                date,
                notes,
                json,
            } => cmd_log_weight(&svc, &api, value, &unit, date, notes, json).await,
        },
        Commands::Post { content, json } => cmd_post(&svc, &api, &content, json).await,
        Commands::Queue { action } => match action {
            QueueAction::List { json } => cmd_queue_list(&svc, json),
            QueueAction::Add {
                action_type,
                payload,
                json,
            } => cmd_queue_add(&svc, &action_type, &payload, json),
            QueueAction::Drain { json } => cmd_queue_drain(&svc, &api, json).await,
            QueueAction::Retry { json } => cmd_queue_retry(&svc, &api, json).await,
            QueueAction::Online { json } => cmd_queue_online(&svc, &api, json).await,
            QueueAction::Offline { json } => cmd_queue_offline(&svc, &api, json).await,
            QueueAction::Clear { json } => cmd_queue_clear(&svc, json),
        },
    }
}
