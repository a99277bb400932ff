//! Microsoft Graph API layer
//!
//! Authentication, the HTTP client, wire models, and the two remote
//! capabilities the core consumes: directory search and board operations.

pub mod auth;
pub mod client;
pub mod directory;
pub mod models;
pub mod planner;

pub use auth::{AuthManager, WELL_KNOWN_CLIENT_IDS};
pub use client::{ApiError, GRAPH_BASE_URL, GraphClient};
pub use directory::{DirectorySearch, UserQuery};
pub use models::{Bucket, DirectoryUser, PlanSummary, PlannerTask};
pub use planner::{BoardService, NewTask, graph_timestamp};
