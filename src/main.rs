mod api;
mod cli;
mod config;
mod db;
mod tracker;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::{Config, is_valid_origin};
use crate::db::Database;
use crate::tracker::stats;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => {
            let config = load_or_default_config()?;
            run_service(config).await
        }
        Commands::Config { command } => handle_config_command(command),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Mark {
            user,
            habit,
            date,
            missed,
        } => handle_mark(user, habit, date, !missed),
        Commands::Stats { user } => handle_stats(user),
        Commands::Leaderboard { page } => handle_leaderboard(page),
    }
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_or_default_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let value = config
                .get_value(&key)
                .with_context(|| format!("Unsupported config key: {key}"))?;

            println!("{value}");
            Ok(())
        }
    }
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let counts = database.counts()?;
    let listening = config
        .socket_addr()
        .map(is_port_open)
        .unwrap_or(false);

    println!("habitrack status");
    println!("- db_path: {}", config.db_path.display());
    println!("- api_listening: {listening}");
    println!("- users: {}", counts.users);
    println!("- habits: {}", counts.habits);
    println!("- logs: {}", counts.logs);
    println!(
        "- latest_log_date: {}",
        database
            .latest_log_date()?
            .map(|date| date.to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path()?;
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing".to_string());
    }

    let config = load_or_default_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable".to_string());
        }
    }

    match config.socket_addr() {
        Ok(addr) => println!("[OK] API address valid: {addr}"),
        Err(error) => {
            println!("[WARN] {error}");
            issues.push("invalid api address".to_string());
        }
    }

    let invalid_origins = config
        .allowed_origins
        .iter()
        .filter(|origin| !is_valid_origin(origin))
        .cloned()
        .collect::<Vec<_>>();

    if invalid_origins.is_empty() {
        println!("[OK] CORS origins valid: {}", config.allowed_origins.join(", "));
    } else {
        println!("[WARN] Invalid CORS origins: {}", invalid_origins.join(", "));
        issues.push("invalid cors origin".to_string());
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_mark(user_id: i64, habit_id: i64, date: Option<String>, completed: bool) -> Result<()> {
    let config = load_config()?;
    let mut database = Database::open(&config.db_path)?;
    let habit = database
        .habit(user_id, habit_id)?
        .with_context(|| format!("Habit {habit_id} not found for user {user_id}"))?;

    let today = Local::now().date_naive();
    let date = parse_optional_date(date)?;
    let outcome = tracker::record_completion(&mut database, &habit, date, completed, today)?;

    println!("Logged {} for {}", habit.name, outcome.log.date);
    println!("- current_streak: {}", outcome.current_streak);
    println!("- longest_streak: {}", outcome.longest_streak);
    println!(
        "- badge: {}",
        outcome
            .badge
            .map(|badge| badge.to_string())
            .unwrap_or_else(|| "none".to_string())
    );
    for badge in &outcome.new_badges {
        println!("- earned: {badge}");
    }

    Ok(())
}

fn handle_stats(user_id: i64) -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let user = database
        .user(user_id)?
        .with_context(|| format!("User {user_id} not found"))?;

    let user_stats = tracker::load_user_stats(&database, &user)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&user_stats).context("Failed to serialize stats")?
    );

    Ok(())
}

fn handle_leaderboard(page: usize) -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;
    let ranked = tracker::load_leaderboard(&database)?;
    let page = stats::leaderboard_page(ranked, page, config.leaderboard_page_size);

    println!(
        "Leaderboard page {}/{} ({} users)",
        page.page, page.total_pages, page.total
    );
    for entry in &page.users {
        println!(
            "{:>3}. {} - {} completions, best streak {}",
            entry.rank,
            entry.stats.user_name,
            entry.stats.total_completions,
            entry.stats.best_streak
        );
    }

    Ok(())
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let api_config = Arc::new(config);

    info!("habitrack service started");

    tokio::select! {
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-02-18"))
        })
        .transpose()?
        .map_or_else(|| Ok(Local::now().date_naive()), Ok)
}

fn load_or_default_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}

fn load_config() -> Result<Config> {
    Config::load().with_context(|| {
        "Config file not found. Run `habitrack serve` or `habitrack config set` first.".to_string()
    })
}

fn is_port_open(addr: SocketAddr) -> bool {
    TcpStream::connect_timeout(&addr, Duration::from_millis(250)).is_ok()
}
