//! Tend CLI - log meals, workouts and vault accounts from the terminal
//!
//! Every command works offline against the local database and pushes its
//! changes when the API is reachable.

mod cli;
mod commands;
mod error;


use clap::Parser;
use tend_core::{AccountPatch, ClientConfig, WorkoutPatch};

use crate::cli::{AccountCommands, CalorieCommands, Cli, Commands, WorkoutCommands};
use crate::commands::common::Context;
use crate::commands::{accounts, calories, sync, today, workouts};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tend_cli=info".parse().expect("valid directive"))
                .add_directive("tend_core=warn".parse().expect("valid directive")),
        )
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load(cli.config.as_deref())?
        .with_data_dir(cli.data_dir)
        .with_api_base_url(cli.api_url)?;
    let context = Context::open(config)?;

    match cli.command {
        Commands::Calories(command) => run_calories(&context, command).await,
        Commands::Workouts(command) => run_workouts(&context, command).await,
        Commands::Accounts(command) => run_accounts(&context, command).await,
        Commands::Sync => sync::run_sync(&context).await,
        Commands::Today { date, json } => today::run_today(&context, date.as_deref(), json).await,
    }
}

async fn run_calories(context: &Context, command: CalorieCommands) -> Result<(), CliError> {
    match command {
        CalorieCommands::Add {
            food,
            calories,
            date,
        } => calories::run_add(context, &food, calories, date.as_deref()).await,
        CalorieCommands::List { date, json } => {
            calories::run_list(context, date.as_deref(), json).await
        }
        CalorieCommands::Update {
            id,
            food,
            calories,
        } => calories::run_update(context, &id, food, calories).await,
        CalorieCommands::Delete { id } => calories::run_delete(context, &id).await,
    }
}

async fn run_workouts(context: &Context, command: WorkoutCommands) -> Result<(), CliError> {
    match command {
        WorkoutCommands::Add {
            name,
            duration,
            calories,
            date,
        } => workouts::run_add(context, &name, duration, calories, date.as_deref()).await,
        WorkoutCommands::List { date, json } => {
            workouts::run_list(context, date.as_deref(), json).await
        }
        WorkoutCommands::Update {
            id,
            name,
            duration,
            calories,
        } => {
            let patch = WorkoutPatch {
                name,
                duration,
                calories,
            };
            workouts::run_update(context, &id, patch).await
        }
        WorkoutCommands::Delete { id } => workouts::run_delete(context, &id).await,
    }
}

async fn run_accounts(context: &Context, command: AccountCommands) -> Result<(), CliError> {
    match command {
        AccountCommands::Add {
            service,
            username,
            password,
            group,
        } => accounts::run_add(context, &service, &username, &password, group).await,
        AccountCommands::List {
            group,
            reveal,
            json,
        } => accounts::run_list(context, group.as_deref(), reveal, json).await,
        AccountCommands::Update {
            id,
            service,
            username,
            password,
            group,
        } => {
            let patch = AccountPatch {
                service,
                username,
                password,
                group,
            };
            accounts::run_update(context, &id, patch).await
        }
        AccountCommands::Delete { id } => accounts::run_delete(context, &id).await,
    }
}
