use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tend")]
#[command(about = "Track meals, workouts and accounts, offline first")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding the local database
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,

    /// Base URL of the Tend API (overrides config file and TEND_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    pub api_url: Option<String>,

    /// Path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Food intake log
    #[command(subcommand, alias = "cal")]
    Calories(CalorieCommands),
    /// Workout log
    #[command(subcommand)]
    Workouts(WorkoutCommands),
    /// Password vault
    #[command(subcommand)]
    Accounts(AccountCommands),
    /// Push pending changes and pull every collection
    Sync,
    /// Summarize intake and workouts for a day
    Today {
        /// Day to summarize (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum CalorieCommands {
    /// Log a food entry
    Add {
        /// What was eaten
        food: String,
        /// Energy in kcal
        calories: u32,
        /// Day of the entry (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
    },
    /// List food entries
    List {
        /// Only show entries for this day
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a food entry
    Update {
        /// Entry ID or unique ID prefix
        id: String,
        #[arg(long)]
        food: Option<String>,
        #[arg(long)]
        calories: Option<u32>,
    },
    /// Delete a food entry
    Delete {
        /// Entry ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum WorkoutCommands {
    /// Log a workout
    Add {
        /// Activity name
        name: String,
        /// Duration in minutes
        #[arg(long)]
        duration: u32,
        /// Energy burned in kcal
        #[arg(long, default_value_t = 0)]
        calories: u32,
        /// Day of the workout (defaults to today)
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
    },
    /// List workouts
    List {
        /// Only show workouts for this day
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change a workout
    Update {
        /// Workout ID or unique ID prefix
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long)]
        calories: Option<u32>,
    },
    /// Delete a workout
    Delete {
        /// Workout ID or unique ID prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum AccountCommands {
    /// Store an account
    Add {
        service: String,
        username: String,
        password: String,
        /// Group shown in listings
        #[arg(long)]
        group: Option<String>,
    },
    /// List accounts grouped by group
    List {
        /// Only show this group
        #[arg(long)]
        group: Option<String>,
        /// Print passwords instead of masking them
        #[arg(long)]
        reveal: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change an account
    Update {
        /// Account ID or unique ID prefix
        id: String,
        #[arg(long)]
        service: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        group: Option<String>,
    },
    /// Delete an account
    Delete {
        /// Account ID or unique ID prefix
        id: String,
    },
}
