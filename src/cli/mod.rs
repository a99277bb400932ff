//! Command definitions and dispatch

mod buckets;
mod import;
mod plans;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::api::{AuthManager, GraphClient};
use crate::config::Config;
use crate::ingest::MappingOverrides;

#[derive(Parser)]
#[command(name = "planner-import")]
#[command(about = "Bulk-import spreadsheet tasks into Microsoft Planner", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the Planner plans visible to the signed-in user
    Plans,
    /// List the buckets of a plan
    Buckets {
        /// Plan id or title
        plan: String,
    },
    /// Import tasks from a CSV or Excel file into a plan
    Import(ImportArgs),
}

#[derive(Parser)]
pub struct ImportArgs {
    /// Spreadsheet to import (.csv, .xlsx, .xls)
    pub file: PathBuf,

    /// Target plan id or title
    #[arg(short, long)]
    pub plan: String,

    /// Default bucket for records without a matched bucket (defaults to the
    /// plan's first bucket)
    #[arg(short, long)]
    pub bucket: Option<String>,

    /// Preview enrichment without creating anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,

    /// Create buckets named in the sheet that do not exist on the plan
    #[arg(long)]
    pub create_missing_buckets: bool,

    /// Header of the title column (auto-detected when omitted)
    #[arg(long, value_name = "HEADER")]
    pub title_column: Option<String>,

    /// Header of the description column
    #[arg(long, value_name = "HEADER")]
    pub description_column: Option<String>,

    /// Header of the start date column
    #[arg(long, value_name = "HEADER")]
    pub start_date_column: Option<String>,

    /// Header of the due date column
    #[arg(long, value_name = "HEADER")]
    pub due_date_column: Option<String>,

    /// Header of the assignee column
    #[arg(long, value_name = "HEADER")]
    pub assignee_column: Option<String>,

    /// Header of the bucket column
    #[arg(long, value_name = "HEADER")]
    pub bucket_column: Option<String>,

    /// Header of the status column
    #[arg(long, value_name = "HEADER")]
    pub status_column: Option<String>,
}

impl ImportArgs {
    pub fn mapping_overrides(&self) -> MappingOverrides {
        MappingOverrides {
            title: self.title_column.clone(),
            description: self.description_column.clone(),
            start_date: self.start_date_column.clone(),
            due_date: self.due_date_column.clone(),
            assignees: self.assignee_column.clone(),
            bucket: self.bucket_column.clone(),
            status: self.status_column.clone(),
        }
    }
}

/// Authenticate and build a Graph client from the loaded config
async fn connect(config: &Config) -> Result<GraphClient> {
    let auth = AuthManager::new(&config.tenant_id, config.client_ids.clone());
    let token = auth.acquire_token().await?;
    Ok(GraphClient::with_base_url(&config.graph_base_url, token))
}

pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    match cli.command {
        Commands::Plans => plans::handle(&config).await,
        Commands::Buckets { plan } => buckets::handle(&config, &plan).await,
        Commands::Import(args) => import::handle(&config, args).await,
    }
}
