//! `safedrive` - CLI for the SafeDrive backend
//!
//! This binary runs the HTTP server and offers a few inspection commands
//! over the configured stores.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use safedrive::cli::{Cli, Command, ConfigCommand};
use safedrive::{init_logging, Config, JsonFileStore, PrototypeService, UserStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match cli.command {
        Command::Config(ConfigCommand::Validate { file }) => {
            handle_validate(file.or(cli.config));
            Ok(())
        }
        command => {
            let config = Config::load_from(cli.config.clone()).context("loading configuration")?;
            match command {
                Command::Serve(serve_cmd) => handle_serve(config, serve_cmd.bind).await,
                Command::Status(status_cmd) => handle_status(&config, status_cmd.json).await,
                Command::Config(config_cmd) => handle_config(&config, &config_cmd),
            }
        }
    }
}

async fn handle_serve(mut config: Config, bind: Option<std::net::SocketAddr>) -> anyhow::Result<()> {
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    safedrive::server::serve(&config)
        .await
        .context("running server")?;
    Ok(())
}

async fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = JsonFileStore::from_config(config).context("opening document store")?;
    let service = PrototypeService::from_config(Arc::new(store), config);
    let current = match service.current().await {
        Ok(view) => Ok(Some(view)),
        Err(safedrive::Error::SnapshotUnavailable) => Ok(None),
        Err(err) => Err(match std::error::Error::source(&err) {
            Some(cause) => format!("{err}: {cause}"),
            None => err.to_string(),
        }),
    };
    let users = UserStore::open(config.users_database_path())
        .and_then(|store| store.count())
        .context("opening user database")?;

    if json {
        let status = serde_json::json!({
            "snapshot_path": config.snapshot_path(),
            "notifications_path": config.notifications_path(),
            "users_database_path": config.users_database_path(),
            "users": users,
            "current": current.as_ref().ok(),
            "error": current.as_ref().err(),
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("safedrive status");
    println!("----------------");
    println!("Snapshot:      {}", config.snapshot_path().display());
    println!("Notifications: {}", config.notifications_path().display());
    println!("Users DB:      {}", config.users_database_path().display());
    println!("Users:         {users}");
    println!();
    match current {
        Ok(Some(view)) => {
            println!("Status:        {}", view.overall_status);
            println!("Version:       {}", view.version);
            if let Some(updated_at) = view.updated_at {
                println!("Updated:       {}", updated_at.to_rfc3339());
            }
            println!("Alerts:        {}", view.notifications.len());
            if let Some(latest) = view.notifications.first() {
                println!(
                    "Latest:        {} {}",
                    latest.timestamp,
                    latest.issues.join(", ")
                );
            }
        }
        Ok(None) => println!("No sensor data recorded yet."),
        Err(message) => println!("Snapshot:      unreadable ({message})"),
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                print_config(config);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_validate(file.clone()),
    }
    Ok(())
}

fn print_config(config: &Config) {
    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Server]");
    println!("  Bind address:       {}", config.server.bind);
    println!("  Base path:          {}", config.server.base_path);
    println!();
    println!("[Storage]");
    println!("  Data directory:     {}", config.data_dir().display());
    println!("  Snapshot file:      {}", config.snapshot_path().display());
    println!("  Notifications file: {}", config.notifications_path().display());
    println!("  Users database:     {}", config.users_database_path().display());
    println!();
    println!("[Retention]");
    println!("  Max notifications:  {}", config.retention.max_notifications);
    println!("  Max age (days):     {}", config.retention.max_age_days);
    println!();
    println!("[Display]");
    match config.display.utc_offset_minutes {
        Some(minutes) => println!("  UTC offset (min):   {minutes}"),
        None => println!("  UTC offset (min):   local"),
    }
}

fn handle_validate(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}
