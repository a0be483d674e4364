//! wharf - service bootstrap entry point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use wharf_app::logging::{self, LoggingConfig};
use wharf_settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "wharf", version, about = "Run wharf with resilient database and cache connections")]
struct Cli {
    /// Settings file; defaults to the platform config directory
    #[arg(short, long, env = "WHARF_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let path = cli.config.or_else(Settings::default_path);

    let settings = match Settings::load(path.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            // Logging is configured from these settings, so report directly
            eprintln!("FATAL: Failed to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _logging = match logging::init(&LoggingConfig::from_settings(&settings)) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("FATAL: Failed to initialize logging: {}", e);
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        env = %settings.general.env,
        service = %settings.general.service_name,
        "starting wharf"
    );

    match wharf_app::run(&settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let error = format!("{:#}", e);
            tracing::error!(error = %error, "wharf stopped with an error");
            ExitCode::FAILURE
        }
    }
}
