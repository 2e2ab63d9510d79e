//! Rental CLI - sign in, inspect the session and manage favorites from a terminal.

mod app;
mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use rental_config::{init_logging, init_logging_to_file, Config, Paths};

/// Rental command-line interface.
#[derive(Parser)]
#[command(name = "rental")]
#[command(about = "Rental account and favorites client")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error). Defaults to the configured level
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, credentials and logs. Defaults to ~/.rental
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Also append JSONL logs to <base-dir>/logs/rental.jsonl
    #[arg(long, global = true)]
    log_file: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login {
        email: String,
        #[arg(long, env = "RENTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account and sign in
    Register {
        name: String,
        email: String,
        #[arg(long, env = "RENTAL_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and clear stored credentials
    Logout,
    /// Show the current session
    Status,
    /// Fetch the signed-in user's profile
    Profile,
    /// Manage favorite listings
    Favorites {
        #[command(subcommand)]
        command: FavoritesCommand,
    },
}

#[derive(Subcommand)]
enum FavoritesCommand {
    /// List favorited listings
    List,
    /// Add or remove a listing from favorites
    Toggle { listing_id: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;

    // Initialize logging
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    if cli.log_file {
        init_logging_to_file(level, paths.log_file());
    } else {
        init_logging(level);
    }

    let app = app::App::build(&config, &paths)?;
    app.init().await?;

    let result = match cli.command {
        Commands::Login { email, password } => commands::auth::login(&app, &email, &password).await,
        Commands::Register {
            name,
            email,
            password,
        } => commands::auth::register(&app, &name, &email, &password).await,
        Commands::Logout => commands::auth::logout(&app).await,
        Commands::Status => commands::auth::status(&app),
        Commands::Profile => commands::profile::show(&app).await,
        Commands::Favorites { command } => match command {
            FavoritesCommand::List => commands::favorites::list(&app).await,
            FavoritesCommand::Toggle { listing_id } => {
                commands::favorites::toggle(&app, &listing_id).await
            }
        },
    };

    app.shutdown();
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_favorites_toggle() {
        let cli = Cli::try_parse_from(["rental", "favorites", "toggle", "L42"]).unwrap();
        match cli.command {
            Commands::Favorites {
                command: FavoritesCommand::Toggle { listing_id },
            } => assert_eq!(listing_id, "L42"),
            _ => panic!("expected favorites toggle"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["rental", "status", "--log-level", "debug", "--base-dir", "/tmp/r"])
                .unwrap();
        assert!(matches!(cli.command, Commands::Status));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/r")));
    }

    #[test]
    fn test_login_takes_password_flag() {
        let cli =
            Cli::try_parse_from(["rental", "login", "a@b.com", "--password", "pw"]).unwrap();
        match cli.command {
            Commands::Login { email, password } => {
                assert_eq!(email, "a@b.com");
                assert_eq!(password, "pw");
            }
            _ => panic!("expected login"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["rental"]).is_err());
    }
}
