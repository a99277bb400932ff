//! `plans` command handler

use anyhow::Result;
use colored::*;

use crate::api::{GraphClient, PlanSummary};
use crate::config::Config;

pub async fn handle(config: &Config) -> Result<()> {
    let client = super::connect(config).await?;
    let plans = client.list_plans().await?;

    if plans.is_empty() {
        println!("{}", "No plans found for this account.".yellow());
        return Ok(());
    }

    println!("{}", format!("{} plan(s):", plans.len()).bold());
    for plan in &plans {
        println!("  {}  {}", plan.id.dimmed(), plan.qualified_title());
    }
    Ok(())
}

/// Find a plan by id or title. An ambiguous title is an error listing the
/// candidates; picking one silently could target the wrong board.
pub fn select_plan(plans: &[PlanSummary], wanted: &str) -> Result<PlanSummary> {
    if let Some(plan) = plans.iter().find(|p| p.id == wanted) {
        return Ok(plan.clone());
    }

    let matches: Vec<&PlanSummary> = plans
        .iter()
        .filter(|p| p.title.trim().eq_ignore_ascii_case(wanted.trim()))
        .collect();
    match matches.as_slice() {
        [plan] => Ok((*plan).clone()),
        [] => anyhow::bail!(
            "No plan named '{}'. Available plans:\n{}",
            wanted,
            plans
                .iter()
                .map(|p| format!("  {}", p.qualified_title()))
                .collect::<Vec<_>>()
                .join("\n")
        ),
        many => anyhow::bail!(
            "Plan title '{}' is ambiguous. Use the plan id instead:\n{}",
            wanted,
            many.iter()
                .map(|p| format!("  {}  {}", p.id, p.qualified_title()))
                .collect::<Vec<_>>()
                .join("\n")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(id: &str, title: &str, group: &str) -> PlanSummary {
        PlanSummary {
            id: id.to_string(),
            title: title.to_string(),
            group_id: format!("g-{}", group),
            group_name: group.to_string(),
        }
    }

    #[test]
    fn test_select_by_id() {
        let plans = vec![plan("p1", "Roadmap", "Eng"), plan("p2", "Roadmap", "Sales")];
        let found = select_plan(&plans, "p2").unwrap();
        assert_eq!(found.group_name, "Sales");
    }

    #[test]
    fn test_select_by_unique_title_case_insensitive() {
        let plans = vec![plan("p1", "Roadmap", "Eng"), plan("p2", "Backlog", "Eng")];
        let found = select_plan(&plans, "roadmap").unwrap();
        assert_eq!(found.id, "p1");
    }

    #[test]
    fn test_ambiguous_title_is_error() {
        let plans = vec![plan("p1", "Roadmap", "Eng"), plan("p2", "Roadmap", "Sales")];
        let err = select_plan(&plans, "Roadmap").unwrap_err();
        assert!(err.to_string().contains("ambiguous"));
    }

    #[test]
    fn test_unknown_plan_lists_available() {
        let plans = vec![plan("p1", "Roadmap", "Eng")];
        let err = select_plan(&plans, "Nothing").unwrap_err();
        assert!(err.to_string().contains("Roadmap (Eng)"));
    }
}
