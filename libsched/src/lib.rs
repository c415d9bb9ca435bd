//! Social Scheduler - quota-aware posting to social platforms
//!
//! This library holds the state machinery behind the `sched` CLI: the weekly
//! usage quota, the durable queue of scheduled posts, the post model and the
//! orchestration that hands rendered posts to an external publisher.

pub mod config;
pub mod error;
pub mod logging;
pub mod poster;
pub mod publisher;
pub mod queue;
pub mod scheduling;
pub mod types;
pub mod usage;

// Re-export commonly used types
pub use config::{ConfigStore, Paths, PlatformConfig, Settings};
pub use error::{ConfigError, Result, SchedError, StorageError, ValidationError};
pub use poster::{DispatchReport, PlatformResult, ScheduledRun, Scheduler};
pub use publisher::{PublishOutcome, PublishRequest, Publisher};
pub use queue::ScheduleQueue;
pub use types::{Platform, PlatformTarget, Post, ScheduledRecord};
pub use usage::{Remaining, UsageInfo, UsageTracker};
