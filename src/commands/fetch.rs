use anyhow::Result;

use crate::acquire;
use crate::cli::{Cli, FetchArgs};

pub fn run(cli: &Cli, args: &FetchArgs) -> Result<()> {
    acquire::ensure_dir_exists(&args.out)?;
    acquire::run_manifest(&args.out, args.force, cli.verbose)?;
    println!("Fetched hydrography datasets -> {}", args.out.display());
    Ok(())
}
