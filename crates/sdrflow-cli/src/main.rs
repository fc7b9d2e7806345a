//! sdrflow CLI - runs and inspects sdrflow dataflow pipelines.

mod commands;
mod nodes;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sdrflow")]
#[command(author, version, about = "sdrflow dataflow engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo pipeline: tone source -> (queue) -> gain -> level meter
    Run(commands::run::RunArgs),

    /// Print the control schema
    Schema(commands::schema::SchemaArgs),

    /// Parse a control query such as "freq=103500000&mono=1"
    Parse(commands::parse::ParseArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => commands::run::run(args),
        Commands::Schema(args) => commands::schema::run(args),
        Commands::Parse(args) => commands::parse::run(args),
    }
}
