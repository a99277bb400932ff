//! `buckets` command handler

use anyhow::Result;
use colored::*;

use crate::config::Config;

use super::plans::select_plan;

pub async fn handle(config: &Config, plan: &str) -> Result<()> {
    let client = super::connect(config).await?;
    let plans = client.list_plans().await?;
    let plan = select_plan(&plans, plan)?;

    let buckets = client.list_buckets(&plan.id).await?;
    if buckets.is_empty() {
        println!(
            "{}",
            format!("Plan '{}' has no buckets.", plan.qualified_title()).yellow()
        );
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{} bucket(s) in {}:",
            buckets.len(),
            plan.qualified_title()
        )
        .bold()
    );
    for bucket in &buckets {
        println!("  {}  {}", bucket.id.dimmed(), bucket.name);
    }
    Ok(())
}
