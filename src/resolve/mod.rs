//! Name resolution: free-text assignee and bucket strings to board identities

pub mod bucket;
pub mod directory;
pub mod name;

pub use bucket::{BucketMatch, BucketMatchKind, reconcile};
pub use directory::{Identity, resolve_assignee};
pub use name::ParsedName;
