//! Console entry point.
//!
//! # Responsibility
//! - Load configuration, start logging and open the storage connector.
//! - Run the interactive menu and always shut the connector down afterwards.
//!
//! # Invariants
//! - Command-line flags win over environment variables and the config file.
//! - The merged configuration is validated before anything is opened.
//! - A connector that cannot be opened aborts startup with a failure status.

mod console;

use clap::Parser;
use console::Console;
use log::{error, info};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use usercrud_core::{
    core_version, init_logging, AppConfig, ConfigError, Database, SqliteUserRepository,
    UserService,
};

#[derive(Parser, Default)]
#[command(name = "usercrud", version, about = "Console manager for user records")]
struct Cli {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// SQLite database path (`:memory:` for a throwaway database)
    #[arg(long)]
    db: Option<PathBuf>,
    /// trace|debug|info|warn|error
    #[arg(long)]
    log_level: Option<String>,
    /// Absolute directory for rolling log files
    #[arg(long)]
    log_dir: Option<PathBuf>,
    /// Mirror warnings and errors to stderr when logging to files
    #[arg(long)]
    log_console: bool,
}

/// Loads file and environment settings, then applies command-line flags.
fn resolve_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    with_cli_overrides(config, cli)
}

fn with_cli_overrides(mut config: AppConfig, cli: &Cli) -> Result<AppConfig, ConfigError> {
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.logging.dir = Some(dir.clone());
    }
    if cli.log_console {
        config.logging.console = true;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&config.logging) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }
    info!(
        "event=cli_start module=cli status=ok version={}",
        core_version()
    );

    let db = match Database::from_config(&config.database) {
        Ok(db) => db,
        Err(err) => {
            error!("event=cli_start module=cli status=error error_code=db_unavailable error={err}");
            eprintln!(
                "failed to open database `{}`: {err}",
                config.database.path.display()
            );
            return ExitCode::FAILURE;
        }
    };

    println!("usercrud {}", core_version());
    let service = UserService::new(SqliteUserRepository::new(&db));
    let outcome = Console::new(&service, io::stdin().lock(), io::stdout().lock()).run();

    db.shutdown();
    info!("event=cli_stop module=cli status=ok");
    println!("Application stopped. Goodbye!");

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_stop module=cli status=error error={err}");
            eprintln!("console I/O failed: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{with_cli_overrides, Cli};
    use clap::Parser;
    use std::path::PathBuf;
    use usercrud_core::{AppConfig, ConfigError};

    fn overridden(args: &[&str]) -> Result<AppConfig, ConfigError> {
        let cli = Cli::parse_from(std::iter::once("usercrud").chain(args.iter().copied()));
        with_cli_overrides(AppConfig::default(), &cli)
    }

    #[test]
    fn empty_db_override_fails_validation() {
        let cli = Cli {
            db: Some(PathBuf::new()),
            ..Cli::default()
        };
        let err = with_cli_overrides(AppConfig::default(), &cli).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn empty_db_flag_never_reaches_the_connector() {
        // Either the argument parser or config validation must refuse it.
        if let Ok(cli) = Cli::try_parse_from(["usercrud", "--db", ""]) {
            assert!(with_cli_overrides(AppConfig::default(), &cli).is_err());
        }
    }

    #[test]
    fn flags_override_defaults() {
        let config = overridden(&[
            "--db",
            ":memory:",
            "--log-level",
            "warn",
            "--log-dir",
            "/var/log/usercrud",
            "--log-console",
        ])
        .unwrap();

        assert!(config.database.is_in_memory());
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.dir, Some(PathBuf::from("/var/log/usercrud")));
        assert!(config.logging.console);
    }

    #[test]
    fn absent_flags_keep_loaded_values() {
        let config = overridden(&[]).unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
