//! Task materialization: enriched records to board tasks
//!
//! Creation is a multi-step conversation with the board service: create the
//! task, then patch its description onto the detail sub-resource, then patch
//! assignments onto the task itself. Each patch re-fetches the current ETag
//! first. A failed create is terminal for that record; a failed describe or
//! assign leaves a created task behind and is reported, not retried.

use crate::api::client::ApiError;
use crate::api::planner::{BoardService, NewTask};
use crate::resolve::directory::Identity;

use super::enrich::{BatchResult, EnrichedRecord};

/// The materialization step an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Create,
    Describe,
    Assign,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Create => write!(f, "create"),
            Step::Describe => write!(f, "describe"),
            Step::Assign => write!(f, "assign"),
        }
    }
}

/// A non-fatal failure on one step of one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepError {
    pub step: Step,
    pub message: String,
}

impl StepError {
    fn new(step: Step, error: &ApiError) -> StepError {
        StepError {
            step,
            message: error.to_string(),
        }
    }
}

/// What happened to one record during materialization
#[derive(Debug, Clone, PartialEq)]
pub struct TaskOutcome {
    pub index: usize,
    pub title: String,
    /// The task exists on the board, even if a later step failed
    pub created: bool,
    pub task_id: Option<String>,
    /// Identities actually attached to the task
    pub assigned: Vec<Identity>,
    pub errors: Vec<StepError>,
}

impl TaskOutcome {
    pub fn succeeded(&self) -> bool {
        self.created && self.errors.is_empty()
    }
}

/// Batch-level materialization counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeStats {
    pub created: usize,
    pub failed: usize,
    pub assigned: usize,
    pub assignment_failed: usize,
}

impl MaterializeStats {
    pub fn record(&mut self, outcome: &TaskOutcome) {
        if outcome.created {
            self.created += 1;
        } else {
            self.failed += 1;
        }
        if !outcome.assigned.is_empty() {
            self.assigned += 1;
        }
        if outcome.errors.iter().any(|e| e.step == Step::Assign) {
            self.assignment_failed += 1;
        }
    }
}

/// Materialize one enriched record onto the board.
///
/// The bucket is the record's reconciled bucket when it has one, otherwise
/// the caller-supplied default. Only authorization expiry escapes as `Err`;
/// every other failure lands in the returned outcome.
pub async fn materialize(
    record: &EnrichedRecord,
    plan_id: &str,
    default_bucket_id: &str,
    board: &impl BoardService,
) -> Result<TaskOutcome, ApiError> {
    let mut outcome = TaskOutcome {
        index: record.index,
        title: record.record.title.clone(),
        created: false,
        task_id: None,
        assigned: Vec::new(),
        errors: Vec::new(),
    };

    let bucket_id = record
        .bucket
        .as_ref()
        .and_then(|m| m.bucket_id.as_deref())
        .unwrap_or(default_bucket_id);

    let new_task = NewTask {
        plan_id: plan_id.to_string(),
        bucket_id: bucket_id.to_string(),
        title: record.record.title.clone(),
        start_date: record.record.start_date,
        due_date: record.record.due_date,
    };
    let task = match board.create_task(&new_task).await {
        Ok(task) => task,
        Err(e) if e.is_batch_fatal() => return Err(e),
        Err(e) => {
            log::error!("create failed for '{}': {}", record.record.title, e);
            outcome.errors.push(StepError::new(Step::Create, &e));
            return Ok(outcome);
        }
    };
    outcome.created = true;
    outcome.task_id = Some(task.id.clone());

    if !record.record.description.trim().is_empty() {
        match describe(board, &task.id, &record.record.description).await {
            Ok(()) => {}
            Err(e) if e.is_batch_fatal() => return Err(e),
            Err(e) => {
                log::warn!("description failed for '{}': {}", record.record.title, e);
                outcome.errors.push(StepError::new(Step::Describe, &e));
            }
        }
    }

    if !record.assignees.is_empty() {
        match assign(board, &task.id, &record.assignees).await {
            Ok(()) => outcome.assigned = record.assignees.clone(),
            Err(e) if e.is_batch_fatal() => return Err(e),
            Err(e) => {
                log::warn!("assignment failed for '{}': {}", record.record.title, e);
                outcome.errors.push(StepError::new(Step::Assign, &e));
            }
        }
    }

    Ok(outcome)
}

async fn describe(
    board: &impl BoardService,
    task_id: &str,
    description: &str,
) -> Result<(), ApiError> {
    let etag = board.task_details_etag(task_id).await?;
    board.set_description(task_id, &etag, description).await
}

async fn assign(
    board: &impl BoardService,
    task_id: &str,
    assignees: &[Identity],
) -> Result<(), ApiError> {
    let etag = board.task_etag(task_id).await?;
    let user_ids: Vec<String> = assignees.iter().map(|i| i.id.clone()).collect();
    board.set_assignments(task_id, &etag, &user_ids).await
}

/// Materialize a whole enriched batch in record order.
///
/// `on_outcome` is invoked after each record so the caller can report
/// progress as the batch runs.
pub async fn materialize_batch(
    batch: &BatchResult,
    plan_id: &str,
    default_bucket_id: &str,
    board: &impl BoardService,
    mut on_outcome: impl FnMut(&TaskOutcome),
) -> Result<(Vec<TaskOutcome>, MaterializeStats), ApiError> {
    let mut outcomes = Vec::with_capacity(batch.records.len());
    let mut stats = MaterializeStats::default();
    for record in &batch.records {
        let outcome = materialize(record, plan_id, default_bucket_id, board).await?;
        stats.record(&outcome);
        on_outcome(&outcome);
        outcomes.push(outcome);
    }
    Ok((outcomes, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::{Bucket, PlannerTask};
    use crate::pipeline::enrich::{EnrichStats, LookupOutcome};
    use crate::records::TaskRecord;
    use crate::resolve::bucket::BucketMatch;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Create { bucket_id: String, title: String },
        TaskEtag(String),
        DetailsEtag(String),
        SetDescription { etag: String },
        SetAssignments { etag: String, user_ids: Vec<String> },
    }

    /// Board fake: scripted failures per step, call log for assertions.
    #[derive(Default)]
    struct FakeBoard {
        calls: Mutex<Vec<Call>>,
        next_id: Mutex<usize>,
        fail_create: Option<ApiError>,
        fail_details_etag: Option<ApiError>,
        fail_assignments: Option<ApiError>,
    }

    impl FakeBoard {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BoardService for FakeBoard {
        async fn create_task(&self, task: &NewTask) -> Result<PlannerTask, ApiError> {
            self.calls.lock().unwrap().push(Call::Create {
                bucket_id: task.bucket_id.clone(),
                title: task.title.clone(),
            });
            if let Some(e) = &self.fail_create {
                return Err(e.clone());
            }
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            Ok(PlannerTask {
                id: format!("t{}", next),
                title: task.title.clone(),
                plan_id: Some(task.plan_id.clone()),
                bucket_id: Some(task.bucket_id.clone()),
            })
        }

        async fn task_etag(&self, task_id: &str) -> Result<String, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::TaskEtag(task_id.to_string()));
            Ok("W/\"task-tag\"".to_string())
        }

        async fn task_details_etag(&self, task_id: &str) -> Result<String, ApiError> {
            self.calls
                .lock()
                .unwrap()
                .push(Call::DetailsEtag(task_id.to_string()));
            if let Some(e) = &self.fail_details_etag {
                return Err(e.clone());
            }
            Ok("W/\"details-tag\"".to_string())
        }

        async fn set_description(
            &self,
            _task_id: &str,
            etag: &str,
            _description: &str,
        ) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(Call::SetDescription {
                etag: etag.to_string(),
            });
            Ok(())
        }

        async fn set_assignments(
            &self,
            _task_id: &str,
            etag: &str,
            user_ids: &[String],
        ) -> Result<(), ApiError> {
            self.calls.lock().unwrap().push(Call::SetAssignments {
                etag: etag.to_string(),
                user_ids: user_ids.to_vec(),
            });
            if let Some(e) = &self.fail_assignments {
                return Err(e.clone());
            }
            Ok(())
        }

        async fn create_bucket(&self, _plan_id: &str, name: &str) -> Result<Bucket, ApiError> {
            Ok(Bucket::new("b-new", name))
        }
    }

    fn identity(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            display_name: format!("User {}", id),
            mail: None,
            query: format!("User {}", id),
        }
    }

    fn enriched(
        title: &str,
        description: &str,
        assignees: Vec<Identity>,
        bucket: Option<BucketMatch>,
    ) -> EnrichedRecord {
        let assignee_outcome = if assignees.is_empty() {
            LookupOutcome::NotApplicable
        } else {
            LookupOutcome::Resolved
        };
        EnrichedRecord {
            index: 0,
            record: TaskRecord {
                title: title.to_string(),
                description: description.to_string(),
                start_date: None,
                due_date: None,
                assignee_names: assignees.iter().map(|i| i.display_name.clone()).collect(),
                assignee_display: None,
                bucket_name: bucket.as_ref().map(|m| m.query.clone()),
                status: None,
            },
            assignees,
            missing_assignees: Vec::new(),
            bucket,
            assignee_outcome,
            bucket_outcome: LookupOutcome::NotApplicable,
        }
    }

    fn batch(records: Vec<EnrichedRecord>) -> BatchResult {
        BatchResult {
            records,
            stats: EnrichStats::default(),
        }
    }

    #[tokio::test]
    async fn test_full_sequence_refetches_etag_per_patch() {
        let board = FakeBoard::default();
        let record = enriched("Ship it", "Release notes", vec![identity("u1")], None);

        let outcome = materialize(&record, "p1", "b-default", &board)
            .await
            .unwrap();
        assert!(outcome.succeeded());
        assert_eq!(outcome.task_id.as_deref(), Some("t1"));
        assert_eq!(outcome.assigned.len(), 1);

        // create, details etag, describe, task etag, assign, in that order
        assert_eq!(
            board.calls(),
            vec![
                Call::Create {
                    bucket_id: "b-default".to_string(),
                    title: "Ship it".to_string()
                },
                Call::DetailsEtag("t1".to_string()),
                Call::SetDescription {
                    etag: "W/\"details-tag\"".to_string()
                },
                Call::TaskEtag("t1".to_string()),
                Call::SetAssignments {
                    etag: "W/\"task-tag\"".to_string(),
                    user_ids: vec!["u1".to_string()]
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_description_and_no_assignees_skip_patches() {
        let board = FakeBoard::default();
        let record = enriched("Bare task", "  ", Vec::new(), None);

        let outcome = materialize(&record, "p1", "b-default", &board)
            .await
            .unwrap();
        assert!(outcome.succeeded());
        assert_eq!(board.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_matched_bucket_overrides_default() {
        let board = FakeBoard::default();
        let bucket_match = BucketMatch::created("Backlog", &Bucket::new("b7", "Backlog"));
        let record = enriched("Task", "", Vec::new(), Some(bucket_match));

        materialize(&record, "p1", "b-default", &board)
            .await
            .unwrap();
        assert_eq!(
            board.calls()[0],
            Call::Create {
                bucket_id: "b7".to_string(),
                title: "Task".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unmatched_bucket_falls_back_to_default() {
        let board = FakeBoard::default();
        let record = enriched("Task", "", Vec::new(), Some(BucketMatch::unmatched("Nowhere")));

        materialize(&record, "p1", "b-default", &board)
            .await
            .unwrap();
        assert_eq!(
            board.calls()[0],
            Call::Create {
                bucket_id: "b-default".to_string(),
                title: "Task".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_describe_failure_keeps_task_and_continues() {
        let board = FakeBoard {
            fail_details_etag: Some(ApiError::Transient {
                message: "503".to_string(),
            }),
            ..FakeBoard::default()
        };
        let record = enriched("Task", "Some detail", vec![identity("u1")], None);

        let outcome = materialize(&record, "p1", "b-default", &board)
            .await
            .unwrap();
        // the task exists even though describing it failed
        assert!(outcome.created);
        assert!(!outcome.succeeded());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].step, Step::Describe);
        // assignment still ran
        assert_eq!(outcome.assigned.len(), 1);
    }

    #[tokio::test]
    async fn test_assignment_failure_is_reported_not_fatal() {
        let board = FakeBoard {
            fail_assignments: Some(ApiError::Request {
                status: 400,
                message: "bad order hint".to_string(),
            }),
            ..FakeBoard::default()
        };
        let record = enriched("Task", "", vec![identity("u1")], None);

        let outcome = materialize(&record, "p1", "b-default", &board)
            .await
            .unwrap();
        assert!(outcome.created);
        assert!(outcome.assigned.is_empty());
        assert_eq!(outcome.errors[0].step, Step::Assign);
    }

    #[tokio::test]
    async fn test_create_denied_fails_record_but_not_batch() {
        let board = FakeBoard {
            fail_create: Some(ApiError::PermissionDenied {
                message: "forbidden".to_string(),
            }),
            ..FakeBoard::default()
        };
        let records = batch(vec![
            enriched("First", "", Vec::new(), None),
            enriched("Second", "", Vec::new(), None),
        ]);

        let (outcomes, stats) =
            materialize_batch(&records, "p1", "b-default", &board, |_| {})
                .await
                .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(!outcomes[0].created);
        assert_eq!(outcomes[0].errors[0].step, Step::Create);
        assert_eq!(stats.failed, 2);
    }

    #[tokio::test]
    async fn test_auth_expiry_aborts_batch() {
        let board = FakeBoard {
            fail_create: Some(ApiError::AuthExpired),
            ..FakeBoard::default()
        };
        let records = batch(vec![enriched("Task", "", Vec::new(), None)]);

        let err = materialize_batch(&records, "p1", "b-default", &board, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err, ApiError::AuthExpired);
    }

    #[tokio::test]
    async fn test_batch_stats_and_progress_callback() {
        let board = FakeBoard::default();
        let records = batch(vec![
            enriched("A", "", vec![identity("u1")], None),
            enriched("B", "", Vec::new(), None),
        ]);

        let mut seen = Vec::new();
        let (outcomes, stats) =
            materialize_batch(&records, "p1", "b-default", &board, |o| {
                seen.push(o.title.clone());
            })
            .await
            .unwrap();
        assert_eq!(seen, vec!["A", "B"]);
        assert_eq!(outcomes.len(), 2);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.assigned, 1);
        assert_eq!(stats.assignment_failed, 0);
    }
}
