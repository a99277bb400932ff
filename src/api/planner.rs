//! Planner board operations: plans, buckets, tasks
//!
//! Task mutation follows the service's optimistic-concurrency contract: every
//! PATCH must carry the ETag of the current resource version in `If-Match`,
//! and the tag is re-fetched immediately before each write rather than reused.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Value, json};

use super::client::{ApiError, GraphClient};
use super::models::{Bucket, GroupRef, ListResponse, Plan, PlanSummary, PlannerTask};

/// Fields for a task creation call
#[derive(Debug, Clone)]
pub struct NewTask {
    pub plan_id: String,
    pub bucket_id: String,
    pub title: String,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
}

/// Format a timestamp the way the board service expects: ISO-8601 with an
/// explicit UTC designator.
pub fn graph_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Remote board operations the materializer runs against
#[async_trait]
pub trait BoardService {
    async fn create_task(&self, task: &NewTask) -> Result<PlannerTask, ApiError>;
    /// Current precondition tag of the task resource
    async fn task_etag(&self, task_id: &str) -> Result<String, ApiError>;
    /// Current precondition tag of the task's detail sub-resource
    async fn task_details_etag(&self, task_id: &str) -> Result<String, ApiError>;
    async fn set_description(
        &self,
        task_id: &str,
        etag: &str,
        description: &str,
    ) -> Result<(), ApiError>;
    async fn set_assignments(
        &self,
        task_id: &str,
        etag: &str,
        user_ids: &[String],
    ) -> Result<(), ApiError>;
    async fn create_bucket(&self, plan_id: &str, name: &str) -> Result<Bucket, ApiError>;
}

impl GraphClient {
    /// List every plan visible to the signed-in user, annotated with its group.
    ///
    /// Goes through joined teams first; if teams access is denied, falls back
    /// to the unified-groups membership query.
    pub async fn list_plans(&self) -> Result<Vec<PlanSummary>, ApiError> {
        let groups = match self.get_json("/me/joinedTeams").await {
            Ok(value) => parse_groups(value)?,
            Err(ApiError::PermissionDenied { message }) => {
                log::warn!("joinedTeams denied ({}), falling back to groups", message);
                let filter = urlencoding::encode("groupTypes/any(c:c eq 'Unified')");
                let path = format!("/me/memberOf?$filter={}", filter);
                parse_groups(self.get_json(&path).await?)?
            }
            Err(e) => return Err(e),
        };

        let mut plans = Vec::new();
        for group in groups {
            let group_name = group
                .display_name
                .clone()
                .unwrap_or_else(|| "Unknown Group".to_string());
            let path = format!("/groups/{}/planner/plans", group.id);
            match self.get_json(&path).await {
                Ok(value) => {
                    let list: ListResponse<Plan> =
                        serde_json::from_value(value).map_err(|e| ApiError::Transient {
                            message: format!("unexpected plan list shape: {}", e),
                        })?;
                    for plan in list.value {
                        plans.push(PlanSummary {
                            id: plan.id,
                            title: plan.title,
                            group_id: group.id.clone(),
                            group_name: group_name.clone(),
                        });
                    }
                }
                Err(e) if e.is_batch_fatal() => return Err(e),
                Err(e) => {
                    // A group without Planner access should not hide the rest
                    log::warn!("Skipping plans of group '{}': {}", group_name, e);
                }
            }
        }
        Ok(plans)
    }

    /// List the buckets of a plan
    pub async fn list_buckets(&self, plan_id: &str) -> Result<Vec<Bucket>, ApiError> {
        let value = self
            .get_json(&format!("/planner/plans/{}/buckets", plan_id))
            .await?;
        let list: ListResponse<Bucket> =
            serde_json::from_value(value).map_err(|e| ApiError::Transient {
                message: format!("unexpected bucket list shape: {}", e),
            })?;
        Ok(list.value)
    }
}

fn parse_groups(value: Value) -> Result<Vec<GroupRef>, ApiError> {
    let list: ListResponse<GroupRef> =
        serde_json::from_value(value).map_err(|e| ApiError::Transient {
            message: format!("unexpected group list shape: {}", e),
        })?;
    Ok(list.value)
}

#[async_trait]
impl BoardService for GraphClient {
    async fn create_task(&self, task: &NewTask) -> Result<PlannerTask, ApiError> {
        let mut body = json!({
            "planId": task.plan_id,
            "bucketId": task.bucket_id,
            "title": task.title,
        });
        if let Some(due) = &task.due_date {
            body["dueDateTime"] = json!(graph_timestamp(due));
        }
        if let Some(start) = &task.start_date {
            body["startDateTime"] = json!(graph_timestamp(start));
        }
        let created = self.post_json("/planner/tasks", &body).await?;
        serde_json::from_value(created).map_err(|e| ApiError::Transient {
            message: format!("unexpected created-task shape: {}", e),
        })
    }

    async fn task_etag(&self, task_id: &str) -> Result<String, ApiError> {
        let (_, etag) = self
            .get_with_etag(&format!("/planner/tasks/{}", task_id))
            .await?;
        Ok(etag)
    }

    async fn task_details_etag(&self, task_id: &str) -> Result<String, ApiError> {
        let (_, etag) = self
            .get_with_etag(&format!("/planner/tasks/{}/details", task_id))
            .await?;
        Ok(etag)
    }

    async fn set_description(
        &self,
        task_id: &str,
        etag: &str,
        description: &str,
    ) -> Result<(), ApiError> {
        self.patch_with_etag(
            &format!("/planner/tasks/{}/details", task_id),
            etag,
            &json!({ "description": description }),
        )
        .await
    }

    async fn set_assignments(
        &self,
        task_id: &str,
        etag: &str,
        user_ids: &[String],
    ) -> Result<(), ApiError> {
        let mut assignments = serde_json::Map::new();
        for user_id in user_ids {
            assignments.insert(
                user_id.clone(),
                json!({
                    "@odata.type": "#microsoft.graph.plannerAssignment",
                    "orderHint": " !",
                }),
            );
        }
        self.patch_with_etag(
            &format!("/planner/tasks/{}", task_id),
            etag,
            &json!({ "assignments": assignments }),
        )
        .await
    }

    async fn create_bucket(&self, plan_id: &str, name: &str) -> Result<Bucket, ApiError> {
        let body = json!({ "planId": plan_id, "name": name });
        let created = self.post_json("/planner/buckets", &body).await?;
        serde_json::from_value(created).map_err(|e| ApiError::Transient {
            message: format!("unexpected created-bucket shape: {}", e),
        })
    }
}
