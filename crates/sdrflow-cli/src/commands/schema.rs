//! Control schema listing command.

use std::path::PathBuf;

use clap::Args;
use sdrflow_config::ControlSpec;

use super::common::{init_tracing, load_config};

#[derive(Args)]
pub struct SchemaArgs {
    /// Flow configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn format_range(spec: &ControlSpec) -> String {
    match (spec.min, spec.max) {
        (None, None) => String::new(),
        (min, max) => format!(
            "[{}, {}]",
            min.map_or("-inf".to_string(), |v| v.to_string()),
            max.map_or("+inf".to_string(), |v| v.to_string())
        ),
    }
}

pub fn run(args: SchemaArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    init_tracing(&config);

    println!("Controls ({}):\n", config.controls.len());
    println!("  {:<12} {:<8} RANGE", "NAME", "KIND");
    for (name, spec) in config.controls.iter() {
        println!("  {:<12} {:<8} {}", name, spec.kind.to_string(), format_range(spec));
    }
    Ok(())
}
