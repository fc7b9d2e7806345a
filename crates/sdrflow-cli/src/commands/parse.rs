//! Control query parsing command.

use std::path::PathBuf;

use clap::Args;
use sdrflow_core::MetadataPacket;

use super::common::{init_tracing, load_config};

#[derive(Args)]
pub struct ParseArgs {
    /// Query string, e.g. "freq=103500000&mono=1"
    query: String,

    /// Flow configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the updates as a JSON object
    #[arg(long)]
    json: bool,
}

pub fn run(args: ParseArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config);

    let updates = config.controls.parse_query(&args.query)?;

    if args.json {
        let packet: MetadataPacket = updates.into_iter().collect();
        println!("{}", packet.to_json()?);
    } else {
        for (name, value) in &updates {
            println!("{name} = {value} ({})", value.kind());
        }
    }
    Ok(())
}
