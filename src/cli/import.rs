//! `import` command handler
//!
//! Runs the whole pipeline against one file: ingest, normalize, enrich with a
//! preview, confirm, materialize with per-record progress, summarize.

use anyhow::{Context, Result, bail};
use colored::*;
use dialoguer::Confirm;

use crate::api::{Bucket, BoardService, GraphClient};
use crate::config::Config;
use crate::ingest::{ColumnMapping, read_sheet};
use crate::pipeline::{
    BatchResult, EnrichmentCache, LookupOutcome, MaterializeStats, TaskOutcome, enrich,
    materialize_batch,
};
use crate::records::normalize_rows;
use crate::resolve::BucketMatchKind;

use super::ImportArgs;
use super::plans::select_plan;

pub async fn handle(config: &Config, args: ImportArgs) -> Result<()> {
    let sheet = read_sheet(&args.file)?;
    let mapping = ColumnMapping::resolve(&sheet.headers, &args.mapping_overrides())?;
    let (records, warnings) = normalize_rows(&sheet.rows, &mapping);

    for warning in &warnings {
        println!("{} {}", "warning:".yellow(), warning);
    }
    if records.is_empty() {
        bail!("No importable rows in {}", args.file.display());
    }
    println!(
        "Read {} task(s) from {}",
        records.len().to_string().bold(),
        args.file.display()
    );

    let client = super::connect(config).await?;
    let plans = client.list_plans().await?;
    let plan = select_plan(&plans, &args.plan)?;
    let mut available = client.list_buckets(&plan.id).await?;

    let mut cache = EnrichmentCache::new();
    let mut batch = enrich(&records, &client, &available, &mut cache)
        .await
        .context("Enrichment aborted")?;

    if args.create_missing_buckets {
        let missing = cache.unmatched_buckets();
        if !missing.is_empty() && !args.dry_run {
            for name in &missing {
                let bucket = client.create_bucket(&plan.id, name).await?;
                println!("Created bucket {}", bucket.name.green());
                cache.mark_bucket_created(name, &bucket);
                available.push(bucket);
            }
            // Re-derive the batch; every lookup is already cached, so this
            // performs no further remote calls.
            batch = enrich(&records, &client, &available, &mut cache).await?;
        }
    }

    print_preview(&batch);

    if args.dry_run {
        println!("{}", "Dry run - nothing was created.".cyan());
        return Ok(());
    }

    let default_bucket = default_bucket(&client, &plan.id, &available, &args).await?;
    println!(
        "Importing into {} (default bucket: {})",
        plan.qualified_title().bold(),
        default_bucket.name
    );

    if !args.yes {
        let proceed = Confirm::new()
            .with_prompt(format!("Create {} task(s)?", batch.records.len()))
            .default(false)
            .interact()?;
        if !proceed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let total = batch.records.len();
    let (outcomes, stats) = materialize_batch(
        &batch,
        &plan.id,
        &default_bucket.id,
        &client,
        |outcome| print_progress(outcome, total),
    )
    .await
    .context("Import aborted")?;

    print_summary(&outcomes, &stats);
    Ok(())
}

/// Resolve the fallback bucket for records without a matched bucket:
/// `--bucket` by name when given, otherwise the plan's first bucket.
async fn default_bucket(
    client: &GraphClient,
    plan_id: &str,
    available: &[Bucket],
    args: &ImportArgs,
) -> Result<Bucket> {
    match &args.bucket {
        Some(wanted) => {
            if let Some(bucket) = available
                .iter()
                .find(|b| b.name.trim().eq_ignore_ascii_case(wanted.trim()))
            {
                return Ok(bucket.clone());
            }
            if args.create_missing_buckets {
                let bucket = client.create_bucket(plan_id, wanted.trim()).await?;
                println!("Created bucket {}", bucket.name.green());
                return Ok(bucket);
            }
            bail!(
                "Bucket '{}' does not exist on the plan. Existing buckets: {}. \
                 Pass --create-missing-buckets to create it.",
                wanted,
                available
                    .iter()
                    .map(|b| b.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )
        }
        None => match available.first() {
            Some(bucket) => Ok(bucket.clone()),
            None => bail!(
                "The plan has no buckets. Pass --bucket NAME with \
                 --create-missing-buckets to create one."
            ),
        },
    }
}

fn print_preview(batch: &BatchResult) {
    println!();
    println!("{}", "Preview:".bold());
    for record in &batch.records {
        let assignees = match record.assignee_outcome {
            LookupOutcome::NotApplicable => "no assignees".dimmed().to_string(),
            LookupOutcome::Resolved => {
                let names: Vec<&str> = record
                    .assignees
                    .iter()
                    .map(|i| i.display_name.as_str())
                    .collect();
                names.join(", ").green().to_string()
            }
            LookupOutcome::Failed => format!(
                "{} unresolved: {}",
                record.missing_assignees.len(),
                record.missing_assignees.join(", ")
            )
            .red()
            .to_string(),
        };
        let bucket = match &record.bucket {
            None => "default bucket".dimmed().to_string(),
            Some(m) => match m.kind {
                BucketMatchKind::Exact | BucketMatchKind::Created => {
                    m.name.clone().unwrap_or_default().green().to_string()
                }
                BucketMatchKind::Fuzzy => format!(
                    "{} (fuzzy for '{}')",
                    m.name.clone().unwrap_or_default(),
                    m.query
                )
                .yellow()
                .to_string(),
                BucketMatchKind::Unmatched => {
                    format!("'{}' unmatched - default bucket", m.query)
                        .red()
                        .to_string()
                }
            },
        };
        println!("  {} [{}] [{}]", record.record.title, assignees, bucket);
    }

    let s = &batch.stats;
    println!();
    println!(
        "Assignees: {} resolved, {} failed, {} n/a",
        s.assignees_resolved.to_string().green(),
        s.assignees_failed.to_string().red(),
        s.assignees_not_applicable
    );
    println!(
        "Buckets:   {} resolved, {} failed, {} n/a",
        s.buckets_resolved.to_string().green(),
        s.buckets_failed.to_string().red(),
        s.buckets_not_applicable
    );
    println!();
}

fn print_progress(outcome: &TaskOutcome, total: usize) {
    let position = format!("[{}/{}]", outcome.index + 1, total);
    if !outcome.created {
        println!("{} {} {}", position.dimmed(), "failed".red(), outcome.title);
        return;
    }
    let mut notes = Vec::new();
    if !outcome.assigned.is_empty() {
        notes.push(format!("{} assignee(s)", outcome.assigned.len()));
    }
    for error in &outcome.errors {
        notes.push(format!("{} failed: {}", error.step, error.message));
    }
    let suffix = if notes.is_empty() {
        String::new()
    } else {
        format!(" ({})", notes.join("; "))
    };
    println!(
        "{} {} {}{}",
        position.dimmed(),
        "created".green(),
        outcome.title,
        suffix
    );
}

fn print_summary(outcomes: &[TaskOutcome], stats: &MaterializeStats) {
    println!();
    println!("{}", "Summary:".bold());
    println!("  created:            {}", stats.created.to_string().green());
    println!("  failed:             {}", stats.failed.to_string().red());
    println!("  with assignees:     {}", stats.assigned);
    println!("  assignment failed:  {}", stats.assignment_failed);

    let partial: Vec<&TaskOutcome> = outcomes
        .iter()
        .filter(|o| o.created && !o.errors.is_empty())
        .collect();
    if !partial.is_empty() {
        println!();
        println!(
            "{}",
            "Created tasks with failed follow-up steps:".yellow()
        );
        for outcome in partial {
            for error in &outcome.errors {
                println!("  {}: {} - {}", outcome.title, error.step, error.message);
            }
        }
    }
}
