//! Application use cases / business logic

pub mod ingest;
pub mod schedule;

pub use ingest::{AdapterRegistry, IngestConfig, IngestError, IngestOrchestrator};
pub use schedule::{
    IngestJob, JobState, JobTable, ScheduleEntry, Scheduler, SchedulerConfig, TriggerOutcome,
    default_schedule, schedule_for,
};
