//! Durable queue of posts waiting for their schedule time
//!
//! The queue lives in `scheduled.json` as an array of flat records. Every
//! mutation rewrites the whole file.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::{read_json_or_default, write_json};
use crate::error::Result;
use crate::types::{Post, ScheduledRecord};

#[derive(Debug)]
pub struct ScheduleQueue {
    path: PathBuf,
    records: Vec<ScheduledRecord>,
}

impl ScheduleQueue {
    /// Load the queue; a missing or corrupt file yields an empty queue
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = read_json_or_default(&path).unwrap_or_default();
        Self { path, records }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read `scheduled.json`, dropping the in-memory copy
    ///
    /// Other processes may have queued or cancelled posts since this queue
    /// was loaded.
    pub fn reload(&mut self) {
        self.records = read_json_or_default(&self.path).unwrap_or_default();
    }

    /// Append `post`, assigning it a fresh id
    ///
    /// The id is written back into `post` and returned.
    pub fn enqueue(&mut self, post: &mut Post) -> Result<String> {
        let id = generate_id(Utc::now());
        post.id = Some(id.clone());

        self.records.push(post.to_record());
        self.save()?;

        info!(
            "Queued post {} for {}",
            id,
            post.scheduled_time
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "immediate dispatch".to_string())
        );
        Ok(id)
    }

    /// Remove and return every record due at `now`, in enqueue order
    ///
    /// Records with an empty or unparsable time are never due and stay
    /// queued. The pending remainder is persisted before returning, so a
    /// crash during dispatch loses the due posts rather than posting them
    /// twice. The file is left untouched when nothing is due.
    pub fn drain_due(&mut self, now: DateTime<Utc>) -> Result<Vec<ScheduledRecord>> {
        let (due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.records)
            .into_iter()
            .partition(|record| record.scheduled_at().is_some_and(|at| at <= now));

        self.records = pending;
        if due.is_empty() {
            return Ok(due);
        }
        self.save()?;

        debug!(
            "Drained {} due post(s), {} still pending",
            due.len(),
            self.records.len()
        );
        Ok(due)
    }

    pub fn list(&self) -> &[ScheduledRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Remove the record with `id`; returns whether one was found
    pub fn cancel(&mut self, id: &str) -> Result<bool> {
        let before = self.records.len();
        self.records
            .retain(|record| record.id.as_deref() != Some(id));

        if self.records.len() == before {
            return Ok(false);
        }

        self.save()?;
        info!("Cancelled scheduled post {}", id);
        Ok(true)
    }

    /// Remove every record; returns how many were dropped
    pub fn clear(&mut self) -> Result<usize> {
        let count = self.records.len();
        self.records.clear();
        self.save()?;
        Ok(count)
    }

    fn save(&self) -> Result<()> {
        write_json(&self.path, &self.records)
    }
}

/// `post_<unix micros>_<8 hex chars>`
fn generate_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("post_{}_{}", now.timestamp_micros(), &suffix[..8])
}
