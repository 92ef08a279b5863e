use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "habitrack",
    about = "Habit Tracking Service with Streaks, Badges & Leaderboards"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the REST API until interrupted
    Serve,
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    Status,
    Doctor,
    /// Record a habit log for a user
    Mark {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        habit: i64,
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value_t = false)]
        missed: bool,
    },
    Stats {
        #[arg(long)]
        user: i64,
    },
    Leaderboard {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    Set { key: String, value: String },
    Get { key: String },
}
