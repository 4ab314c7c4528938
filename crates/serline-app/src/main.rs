mod cli;
mod monitor;
mod settings;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use settings::Settings;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_deref().unwrap_or("info")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::List => monitor::list_ports(),
        Command::Monitor(args) => {
            let path = cli
                .config
                .or_else(Settings::default_path)
                .context("no config directory on this platform; pass --config")?;
            let mut settings = Settings::load(&path)?;
            args.apply(&mut settings);
            if args.save {
                settings.save(&path)?;
                log::info!("saved settings to {}", path.display());
            }
            monitor::run(&settings)?;
        }
    }

    Ok(())
}
