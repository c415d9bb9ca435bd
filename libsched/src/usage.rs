//! Weekly usage quota for the free tier
//!
//! Free accounts may publish five platform posts per rolling week. The week is
//! rolled lazily: every quota check first resets the counter if more than
//! seven days have passed since `week_start`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{read_json_or_default, write_json};
use crate::error::Result;
use crate::scheduling::parse_timestamp;

/// Platform posts allowed per window on the free tier
pub const FREE_TIER_LIMIT: u32 = 5;

/// Length of the quota window
pub const WEEK_IN_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Posts left in the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Limited(u32),
    Unlimited,
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Limited(n) => write!(f, "{}", n),
            Remaining::Unlimited => f.write_str("Unlimited"),
        }
    }
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Remaining::Limited(n) => serializer.serialize_u32(*n),
            Remaining::Unlimited => serializer.serialize_str("unlimited"),
        }
    }
}

/// The persisted usage record (`usage.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageState {
    #[serde(default)]
    pub posts_this_week: u32,
    /// Missing or unparsable values read as the Unix epoch, which forces a
    /// reset on the next check
    #[serde(default = "epoch", deserialize_with = "deserialize_week_start")]
    pub week_start: DateTime<Utc>,
    #[serde(default)]
    pub is_premium: bool,
}

impl UsageState {
    pub fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            posts_this_week: 0,
            week_start: now,
            is_premium: false,
        }
    }
}

fn epoch() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

fn deserialize_week_start<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp).unwrap_or_else(epoch))
}

/// Snapshot of the quota for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageInfo {
    pub can_post: bool,
    pub posts_this_week: u32,
    pub remaining: Remaining,
    pub limit: u32,
    pub is_premium: bool,
    pub week_start: DateTime<Utc>,
    pub resets_at: DateTime<Utc>,
}

/// Tracks quota consumption against `usage.json`
///
/// Every mutation rewrites the whole file. There is no locking: two processes
/// sharing a data directory can lose each other's updates.
#[derive(Debug)]
pub struct UsageTracker {
    path: PathBuf,
    state: UsageState,
}

impl UsageTracker {
    /// Load usage state, falling back to a fresh record if the file is
    /// missing or corrupt
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = read_json_or_default(&path).unwrap_or_else(|| UsageState::fresh(Utc::now()));
        Self { path, state }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read `usage.json`, picking up posts recorded by other processes
    pub fn reload(&mut self) {
        self.state =
            read_json_or_default(&self.path).unwrap_or_else(|| UsageState::fresh(Utc::now()));
    }

    pub fn state(&self) -> &UsageState {
        &self.state
    }

    pub fn is_premium(&self) -> bool {
        self.state.is_premium
    }

    /// Check whether a new post may proceed right now
    pub fn can_post(&mut self) -> (bool, Remaining) {
        self.can_post_at(Utc::now())
    }

    /// Check whether a new post may proceed at `now`
    ///
    /// Premium accounts always may. Otherwise the window is rolled first.
    pub fn can_post_at(&mut self, now: DateTime<Utc>) -> (bool, Remaining) {
        if self.state.is_premium {
            return (true, Remaining::Unlimited);
        }

        self.roll_window(now);

        let remaining = FREE_TIER_LIMIT.saturating_sub(self.state.posts_this_week);
        (remaining > 0, Remaining::Limited(remaining))
    }

    /// Record `count` platform posts
    ///
    /// Re-checks the quota itself: returns `Ok(false)` without touching state
    /// when no quota is left. Premium accounts succeed without counting. See
    /// [`UsageTracker::record_post_at`] for counts above the remaining quota.
    pub fn record_post(&mut self, count: u32) -> Result<bool> {
        self.record_post_at(count, Utc::now())
    }

    /// Record `count` platform posts at `now`
    ///
    /// Only the remaining quota being zero is refused. A `count` larger than
    /// what is left is accepted in full, so `posts_this_week` can go past
    /// [`FREE_TIER_LIMIT`]; callers wanting the hard cap must first cut the
    /// count to the remaining quota, as [`crate::Scheduler`] does.
    pub fn record_post_at(&mut self, count: u32, now: DateTime<Utc>) -> Result<bool> {
        if self.state.is_premium {
            return Ok(true);
        }

        let (allowed, remaining) = self.can_post_at(now);
        if !allowed {
            debug!("Refusing to record {} post(s): no quota left", count);
            return Ok(false);
        }

        self.state.posts_this_week += count;
        self.save()?;
        debug!(
            "Recorded {} post(s), {} used this week (had {} left)",
            count, self.state.posts_this_week, remaining
        );
        Ok(true)
    }

    /// Switch to the premium tier
    ///
    /// The token is not verified here; a deployment must check it with the
    /// billing server before calling this.
    pub fn upgrade_to_premium(&mut self, token: Option<&str>) -> Result<bool> {
        debug!("Upgrading to premium (token supplied: {})", token.is_some());
        self.state.is_premium = true;
        self.save()?;
        info!("Account upgraded to premium");
        Ok(true)
    }

    pub fn usage_info(&mut self) -> UsageInfo {
        self.usage_info_at(Utc::now())
    }

    pub fn usage_info_at(&mut self, now: DateTime<Utc>) -> UsageInfo {
        let (can_post, remaining) = self.can_post_at(now);
        UsageInfo {
            can_post,
            posts_this_week: self.state.posts_this_week,
            remaining,
            limit: FREE_TIER_LIMIT,
            is_premium: self.state.is_premium,
            week_start: self.state.week_start,
            resets_at: self.state.week_start + Duration::seconds(WEEK_IN_SECONDS),
        }
    }

    /// Reset the counter if the window has strictly exceeded one week
    fn roll_window(&mut self, now: DateTime<Utc>) {
        if now - self.state.week_start <= Duration::seconds(WEEK_IN_SECONDS) {
            return;
        }

        debug!(
            "Quota window started {} has expired, resetting {} post(s)",
            self.state.week_start, self.state.posts_this_week
        );
        self.state.posts_this_week = 0;
        self.state.week_start = now;

        if let Err(e) = self.save() {
            warn!("Failed to persist quota window reset: {}", e);
        }
    }

    fn save(&self) -> Result<()> {
        write_json(&self.path, &self.state)
    }
}
