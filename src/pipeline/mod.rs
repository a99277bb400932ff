//! The import pipeline: ingest -> normalize -> enrich -> materialize
//!
//! Each stage consumes the previous stage's output and produces a new value;
//! nothing mutates upstream data. The per-batch cache lives here and is
//! dropped with the run.

pub mod cache;
pub mod enrich;
pub mod materialize;

pub use cache::EnrichmentCache;
pub use enrich::{BatchResult, EnrichStats, EnrichedRecord, LookupOutcome, enrich};
pub use materialize::{
    MaterializeStats, Step, StepError, TaskOutcome, materialize, materialize_batch,
};
