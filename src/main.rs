use anyhow::Result;
use clap::{Parser, Subcommand};

use ibfx::build;
use ibfx::inspect;

#[derive(Parser)]
#[command(
    name = "ibfx",
    version,
    about = concat!("ibfx: An interleaved Bloom filter index builder for DNA reference collections\nVersion: ", env!("CARGO_PKG_VERSION")),
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a filter from a reference manifest
    Build(build::BuildArgs),

    /// Print the metadata of a built filter
    Inspect(inspect::InspectArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build(args) => {
            build::run(&args)?
        }
        Commands::Inspect(args) => {
            inspect::run(&args)?
        }
    }

    Ok(())
}
