use std::process::ExitCode;

use tracing::debug;

use gator::commands::{self, USAGE};
use gator::{AppState, Command, Config, Database};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = Config::default_path();
    let config = match Config::load_or_default(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    if let Err(e) = gator::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        gator::logging::init_console_only(&config.logging.level);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match Command::parse(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("{e}");
            eprintln!();
            eprintln!("{USAGE}");
            return ExitCode::FAILURE;
        }
    };

    let db = match Database::open(&config.database.path).await {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Failed to open database {}: {e}", config.database.path);
            return ExitCode::FAILURE;
        }
    };

    debug!("Running {:?}", command);
    let mut state = AppState::new(config, config_path, db);
    let mut stdout = std::io::stdout();
    match commands::run(&mut state, command, &mut stdout).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
