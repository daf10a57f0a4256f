use clap::Parser;
use imbalance_trader::cli::{Cli, Commands};
use imbalance_trader::config::Config;
use std::path::Path;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = Path::new(&cli.config);
    let loaded = config_path.exists();
    let config = if loaded {
        Config::load(config_path)?
    } else {
        Config::default().validate()?
    };

    // Initialize telemetry
    imbalance_trader::telemetry::init_telemetry(&config.telemetry)?;
    if !loaded {
        tracing::warn!(path = %cli.config, "Config file not found, using defaults");
    }

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(dry_run = args.dry_run, "Starting trading loop");
            args.execute(config).await?;
        }
        Commands::Replay(args) => {
            tracing::info!(path = ?args.path, "Starting replay");
            args.execute(config).await?;
        }
        Commands::Config => {
            println!("# Effective configuration ({})", cli.config);
            println!("{}", toml::to_string_pretty(&config)?);
            println!("# {}", config.summary_line());
        }
    }

    Ok(())
}
