use anyhow::Result;
use clap::Parser;

use hydroprep::cli::{Cli, Commands};
use hydroprep::commands::{assign, harmonize, hotspot};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match &cli.command {
        #[cfg(feature = "fetch")]
        Commands::Fetch(args) => hydroprep::commands::fetch::run(&cli, args),
        Commands::Harmonize(args) => harmonize::run(&cli, args),
        Commands::Assign(args) => assign::run(&cli, args),
        Commands::Hotspot(args) => hotspot::run(&cli, args),
    }
}
