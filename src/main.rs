//! planner-import: bulk-create Microsoft Planner tasks from a spreadsheet.

mod api;
mod cli;
mod config;
mod ingest;
mod pipeline;
mod records;
mod resolve;

use anyhow::Result;
use clap::Parser;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = cli::Cli::parse();
    cli::run(cli).await
}
