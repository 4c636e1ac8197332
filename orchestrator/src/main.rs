use std::{env, fs};

use anyhow::Context;
use orchestrator::{configs::RunConfig, train};

const DEFAULT_CONFIG: &str = "configs/config.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let path = env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let json = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
    let run: RunConfig = serde_json::from_str(&json).with_context(|| format!("parsing {path}"))?;

    let experiment = train(run).await?;
    println!("run outcome saved at {}", experiment.dir().display());
    Ok(())
}
