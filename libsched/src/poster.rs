//! Dispatch orchestration
//!
//! [`Scheduler`] ties the stores together: it checks the quota, fans a post
//! out to every selected platform concurrently through the [`Publisher`],
//! records usage for the successes, and drains the schedule queue.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{ConfigStore, Paths, PlatformConfig};
use crate::error::{Result, ValidationError};
use crate::publisher::{PublishRequest, Publisher};
use crate::queue::ScheduleQueue;
use crate::types::{expand_platforms, Platform, Post, ScheduledRecord};
use crate::usage::{Remaining, UsageTracker};

/// Result of posting to a single platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformResult {
    pub platform: Platform,
    pub success: bool,
    /// Error message (if failed)
    pub error: Option<String>,
}

impl PlatformResult {
    fn success(platform: Platform) -> Self {
        Self {
            platform,
            success: true,
            error: None,
        }
    }

    fn failure(platform: Platform, error: impl Into<String>) -> Self {
        Self {
            platform,
            success: false,
            error: Some(error.into()),
        }
    }
}

/// What happened to one post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DispatchReport {
    /// No quota left; nothing was attempted
    QuotaExceeded,
    /// Attempts were made for `results`; `skipped` platforms did not fit in
    /// the remaining quota
    Dispatched {
        results: Vec<PlatformResult>,
        skipped: Vec<Platform>,
    },
}

impl DispatchReport {
    pub fn results(&self) -> &[PlatformResult] {
        match self {
            DispatchReport::QuotaExceeded => &[],
            DispatchReport::Dispatched { results, .. } => results,
        }
    }

    pub fn skipped(&self) -> &[Platform] {
        match self {
            DispatchReport::QuotaExceeded => &[],
            DispatchReport::Dispatched { skipped, .. } => skipped,
        }
    }

    pub fn success_count(&self) -> usize {
        self.results().iter().filter(|r| r.success).count()
    }

    /// True when every attempted platform succeeded and none were skipped
    pub fn is_complete_success(&self) -> bool {
        match self {
            DispatchReport::QuotaExceeded => false,
            DispatchReport::Dispatched { results, skipped } => {
                skipped.is_empty() && results.iter().all(|r| r.success)
            }
        }
    }
}

/// One due record processed by [`Scheduler::run_scheduled_at`]
#[derive(Debug, Clone)]
pub struct ScheduledRun {
    pub record: ScheduledRecord,
    /// `Err` when the stored record no longer forms a valid post
    pub outcome: std::result::Result<DispatchReport, ValidationError>,
}

/// Owns the stores and the publisher for one process
pub struct Scheduler {
    config: ConfigStore,
    usage: UsageTracker,
    queue: ScheduleQueue,
    publisher: Box<dyn Publisher>,
    headless: bool,
}

impl Scheduler {
    pub fn new(
        config: ConfigStore,
        usage: UsageTracker,
        queue: ScheduleQueue,
        publisher: Box<dyn Publisher>,
    ) -> Self {
        Self {
            config,
            usage,
            queue,
            publisher,
            headless: true,
        }
    }

    /// Load every store from its file under `paths`
    pub fn open(paths: &Paths, publisher: Box<dyn Publisher>) -> Self {
        Self::new(
            ConfigStore::load(paths.config_file()),
            UsageTracker::load(paths.usage_file()),
            ScheduleQueue::load(paths.schedule_file()),
            publisher,
        )
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    pub fn queue(&self) -> &ScheduleQueue {
        &self.queue
    }

    /// Re-read every store from disk
    ///
    /// A long-lived scheduler calls this before each round so that posts
    /// queued, cancelled or recorded by other `sched` invocations are seen
    /// and not overwritten.
    pub fn reload(&mut self) {
        self.config.reload();
        self.usage.reload();
        self.queue.reload();
    }

    /// Publish `post` to its platforms now
    pub async fn post_now(&mut self, post: &Post) -> Result<DispatchReport> {
        self.post_now_at(post, Utc::now()).await
    }

    /// Publish `post` to its platforms, evaluating the quota at `now`
    ///
    /// When the free tier has fewer posts left than platforms selected, the
    /// platforms at the front of the list win and the rest are skipped.
    /// Usage is recorded once, for the successful attempts only.
    pub async fn post_now_at(&mut self, post: &Post, now: DateTime<Utc>) -> Result<DispatchReport> {
        post.validate()?;

        let mut platforms = expand_platforms(&post.platforms);

        let (allowed, remaining) = self.usage.can_post_at(now);
        if !allowed {
            warn!("Weekly post limit reached; not posting");
            return Ok(DispatchReport::QuotaExceeded);
        }

        let mut skipped = Vec::new();
        if let Remaining::Limited(left) = remaining {
            let left = left as usize;
            if platforms.len() > left {
                skipped = platforms.split_off(left);
                warn!(
                    "Only {} post(s) left this week, skipping {}",
                    left,
                    skipped
                        .iter()
                        .map(|p| p.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
        }

        let config = &self.config;
        let publisher = self.publisher.as_ref();
        let headless = self.headless;

        let futures: Vec<_> = platforms
            .iter()
            .map(|&platform| dispatch_one(platform, post, config.get(platform), publisher, headless))
            .collect();

        let results = join_all(futures).await;

        let successes = results.iter().filter(|r| r.success).count();
        if successes > 0 {
            // Posts already went out; a failed write only loses accounting
            if let Err(e) = self.usage.record_post_at(successes as u32, now) {
                error!("Failed to record {} post(s) in usage: {}", successes, e);
            }
        }

        info!(
            "Posted to {}/{} platform(s)",
            successes,
            results.len()
        );

        Ok(DispatchReport::Dispatched { results, skipped })
    }

    /// Validate `post` and add it to the queue, returning its new id
    pub fn schedule(&mut self, post: &mut Post) -> Result<String> {
        post.validate()?;
        if post.scheduled_time.is_none() {
            return Err(ValidationError::InvalidSchedule(
                "a schedule time is required to queue a post".to_string(),
            )
            .into());
        }
        self.queue.enqueue(post)
    }

    pub async fn run_scheduled(&mut self) -> Result<Vec<ScheduledRun>> {
        self.run_scheduled_at(Utc::now()).await
    }

    /// Dispatch every post due at `now`, one after another in queue order
    ///
    /// The stores are reloaded first. Due records leave the queue before any
    /// dispatch starts. A record that fails to parse is reported and dropped.
    pub async fn run_scheduled_at(&mut self, now: DateTime<Utc>) -> Result<Vec<ScheduledRun>> {
        self.reload();
        let due = self.queue.drain_due(now)?;
        if due.is_empty() {
            return Ok(Vec::new());
        }

        info!("Processing {} due post(s)", due.len());

        let mut runs = Vec::with_capacity(due.len());
        for record in due {
            let outcome = match Post::from_record(&record) {
                Ok(post) => Ok(self.post_now_at(&post, now).await?),
                Err(e) => {
                    warn!(
                        "Dropping scheduled post {}: {}",
                        record.id.as_deref().unwrap_or("<no id>"),
                        e
                    );
                    Err(e)
                }
            };
            runs.push(ScheduledRun { record, outcome });
        }

        Ok(runs)
    }
}

/// Attempt one platform, failing locally when the attempt cannot work
async fn dispatch_one(
    platform: Platform,
    post: &Post,
    credentials: Option<&PlatformConfig>,
    publisher: &dyn Publisher,
    headless: bool,
) -> PlatformResult {
    let credentials = match credentials {
        Some(config) if !config.enabled => {
            return PlatformResult::failure(
                platform,
                format!(
                    "{} is disabled. Run: sched config --platform {}",
                    platform.display_name(),
                    platform
                ),
            );
        }
        Some(config) if config.is_configured() => config.clone(),
        _ => {
            return PlatformResult::failure(
                platform,
                format!(
                    "{} not configured. Run: sched config --platform {}",
                    platform.display_name(),
                    platform
                ),
            );
        }
    };

    if platform.requires_media() && post.media_paths.is_empty() {
        return PlatformResult::failure(
            platform,
            format!("{} requires at least one image", platform.display_name()),
        );
    }

    let request = PublishRequest {
        platform,
        content: post.full_content(platform.character_limit()),
        media_paths: post
            .media_paths
            .iter()
            .take(platform.max_media())
            .cloned()
            .collect(),
        credentials,
        headless,
    };

    info!("Posting to {}", platform.display_name());
    let outcome = publisher.publish(&request).await;

    if outcome.success {
        info!("Posted to {}", platform.display_name());
        PlatformResult::success(platform)
    } else {
        let error = outcome
            .error
            .unwrap_or_else(|| format!("{} publisher reported failure", platform.display_name()));
        warn!("Failed to post to {}: {}", platform.display_name(), error);
        PlatformResult::failure(platform, error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::MockPublisher;
    use crate::types::PlatformTarget;
    use crate::usage::UsageState;
    use chrono::{Duration, TimeZone};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    struct Fixture {
        _temp: TempDir,
        paths: Paths,
        publisher: MockPublisher,
    }

    impl Fixture {
        fn new() -> Self {
            Self::with_publisher(MockPublisher::success())
        }

        fn with_publisher(publisher: MockPublisher) -> Self {
            let temp = TempDir::new().unwrap();
            let paths = Paths::new(temp.path().join("config"), temp.path().join("data"));

            let mut config = ConfigStore::load(paths.config_file());
            for platform in Platform::EVERY {
                config.set(platform, PlatformConfig::new("test@test.com", "secret"));
            }
            config.save().unwrap();

            crate::config::write_json(&paths.usage_file(), &UsageState::fresh(now())).unwrap();

            Self {
                _temp: temp,
                paths,
                publisher,
            }
        }

        fn scheduler(&self) -> Scheduler {
            Scheduler::open(&self.paths, Box::new(self.publisher.clone()))
        }

        fn set_config(&self, platform: Platform, entry: PlatformConfig) {
            let mut config = ConfigStore::load(self.paths.config_file());
            config.set(platform, entry);
            config.save().unwrap();
        }

        fn set_usage(&self, posts_this_week: u32, is_premium: bool) {
            let state = UsageState {
                posts_this_week,
                week_start: now(),
                is_premium,
            };
            crate::config::write_json(&self.paths.usage_file(), &state).unwrap();
        }
    }

    fn post(content: &str, platforms: &[PlatformTarget]) -> Post {
        Post::new(content, platforms.to_vec()).unwrap()
    }

    fn one(platform: Platform) -> PlatformTarget {
        PlatformTarget::One(platform)
    }

    #[tokio::test]
    async fn test_post_to_two_platforms_records_two() {
        let fixture = Fixture::new();
        let mut scheduler = fixture.scheduler();

        let report = scheduler
            .post_now_at(&post("Hello", &[one(Platform::Twitter), one(Platform::Linkedin)]), now())
            .await
            .unwrap();

        assert!(report.is_complete_success());
        assert_eq!(report.success_count(), 2);
        assert_eq!(
            fixture.publisher.platforms(),
            vec![Platform::Twitter, Platform::Linkedin]
        );
        assert_eq!(scheduler.usage().state().posts_this_week, 2);
    }

    #[tokio::test]
    async fn test_quota_exceeded_makes_no_calls() {
        let fixture = Fixture::new();
        fixture.set_usage(5, false);
        let mut scheduler = fixture.scheduler();

        let report = scheduler
            .post_now_at(&post("Hello", &[one(Platform::Twitter)]), now())
            .await
            .unwrap();

        assert_eq!(report, DispatchReport::QuotaExceeded);
        assert_eq!(fixture.publisher.call_count(), 0);
        assert_eq!(scheduler.usage().state().posts_this_week, 5);
    }

    #[tokio::test]
    async fn test_front_platforms_win_when_quota_short() {
        let fixture = Fixture::new();
        fixture.set_usage(4, false);
        let mut scheduler = fixture.scheduler();

        let report = scheduler
            .post_now_at(
                &post("Hello", &[one(Platform::Linkedin), one(Platform::Twitter)]),
                now(),
            )
            .await
            .unwrap();

        assert_eq!(report.results().len(), 1);
        assert_eq!(report.results()[0].platform, Platform::Linkedin);
        assert_eq!(report.skipped(), &[Platform::Twitter]);
        assert!(!report.is_complete_success());
        assert_eq!(fixture.publisher.platforms(), vec![Platform::Linkedin]);
        assert_eq!(scheduler.usage().state().posts_this_week, 5);
    }

    #[tokio::test]
    async fn test_all_expands_to_every_platform() {
        let fixture = Fixture::new();
        let mut scheduler = fixture.scheduler();
        let post = post("Hello", &[PlatformTarget::All]).with_media(vec![PathBuf::from("a.png")]);

        let report = scheduler.post_now_at(&post, now()).await.unwrap();

        let platforms: Vec<_> = report.results().iter().map(|r| r.platform).collect();
        assert_eq!(platforms, Platform::EVERY.to_vec());
        assert_eq!(report.success_count(), 3);
        assert_eq!(scheduler.usage().state().posts_this_week, 3);
    }

    #[tokio::test]
    async fn test_partial_failure_counts_successes_only() {
        let fixture =
            Fixture::with_publisher(MockPublisher::success().failing_on(Platform::Linkedin, "Login failed"));
        let mut scheduler = fixture.scheduler();

        let report = scheduler
            .post_now_at(&post("Hello", &[one(Platform::Twitter), one(Platform::Linkedin)]), now())
            .await
            .unwrap();

        assert_eq!(report.success_count(), 1);
        let failed = &report.results()[1];
        assert_eq!(failed.platform, Platform::Linkedin);
        assert_eq!(failed.error.as_deref(), Some("Login failed"));
        assert_eq!(scheduler.usage().state().posts_this_week, 1);
    }

    #[tokio::test]
    async fn test_no_successes_leaves_usage_untouched() {
        let fixture =
            Fixture::with_publisher(MockPublisher::success().failing_on(Platform::Twitter, "Timed out"));
        let mut scheduler = fixture.scheduler();

        let report = scheduler
            .post_now_at(&post("Hello", &[one(Platform::Twitter)]), now())
            .await
            .unwrap();

        assert_eq!(report.success_count(), 0);
        assert_eq!(scheduler.usage().state().posts_this_week, 0);
    }

    #[tokio::test]
    async fn test_unconfigured_platform_fails_locally() {
        let fixture = Fixture::new();
        fixture.set_config(Platform::Linkedin, PlatformConfig::default());
        let mut scheduler = fixture.scheduler();

        let report = scheduler
            .post_now_at(&post("Hello", &[one(Platform::Linkedin), one(Platform::Twitter)]), now())
            .await
            .unwrap();

        let linkedin = &report.results()[0];
        assert!(!linkedin.success);
        assert_eq!(
            linkedin.error.as_deref(),
            Some("LinkedIn not configured. Run: sched config --platform linkedin")
        );
        assert_eq!(fixture.publisher.platforms(), vec![Platform::Twitter]);
    }

    #[tokio::test]
    async fn test_disabled_platform_fails_locally() {
        let fixture = Fixture::new();
        let mut config = PlatformConfig::new("test@test.com", "secret");
        config.enabled = false;
        fixture.set_config(Platform::Twitter, config);
        let mut scheduler = fixture.scheduler();

        let report = scheduler
            .post_now_at(&post("Hello", &[one(Platform::Twitter)]), now())
            .await
            .unwrap();

        assert!(report.results()[0].error.as_ref().unwrap().contains("disabled"));
        assert_eq!(fixture.publisher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_instagram_requires_media() {
        let fixture = Fixture::new();
        let mut scheduler = fixture.scheduler();

        let report = scheduler
            .post_now_at(&post("Hello", &[one(Platform::Instagram)]), now())
            .await
            .unwrap();

        assert_eq!(
            report.results()[0].error.as_deref(),
            Some("Instagram requires at least one image")
        );
        assert_eq!(fixture.publisher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_content_and_media_rendered_per_platform() {
        let fixture = Fixture::new();
        let mut scheduler = fixture.scheduler();
        let media: Vec<_> = (0..6).map(|i| PathBuf::from(format!("{}.png", i))).collect();
        let post = post(&"x".repeat(300), &[PlatformTarget::All])
            .with_media(media)
            .with_hashtags(["rust"]);

        scheduler.post_now_at(&post, now()).await.unwrap();

        let requests = fixture.publisher.requests();
        let twitter = &requests.iter().find(|r| r.platform == Platform::Twitter).unwrap();
        let linkedin = &requests.iter().find(|r| r.platform == Platform::Linkedin).unwrap();
        let instagram = &requests.iter().find(|r| r.platform == Platform::Instagram).unwrap();

        assert_eq!(twitter.content.chars().count(), 280);
        assert!(twitter.content.ends_with("..."));
        assert_eq!(twitter.media_paths.len(), 4);
        assert!(linkedin.content.ends_with("#rust"));
        assert_eq!(linkedin.media_paths.len(), 6);
        assert_eq!(instagram.media_paths, vec![PathBuf::from("0.png")]);
        assert_eq!(twitter.credentials.email.as_deref(), Some("test@test.com"));
    }

    #[tokio::test]
    async fn test_premium_posts_without_counting() {
        let fixture = Fixture::new();
        fixture.set_usage(7, true);
        let mut scheduler = fixture.scheduler();

        let report = scheduler
            .post_now_at(&post("Hello", &[one(Platform::Twitter), one(Platform::Linkedin)]), now())
            .await
            .unwrap();

        assert!(report.is_complete_success());
        assert_eq!(scheduler.usage().state().posts_this_week, 7);
    }

    #[tokio::test]
    async fn test_schedule_requires_time() {
        let fixture = Fixture::new();
        let mut scheduler = fixture.scheduler();
        let mut unscheduled = post("Hello", &[one(Platform::Twitter)]);

        let err = scheduler.schedule(&mut unscheduled).unwrap_err();
        assert_eq!(err.exit_code(), 3);
        assert!(scheduler.queue().is_empty());
    }

    #[tokio::test]
    async fn test_run_scheduled_dispatches_due_posts() {
        let fixture = Fixture::new();
        let mut scheduler = fixture.scheduler();

        let mut due = post("Due", &[one(Platform::Twitter)]).with_schedule(now() - Duration::minutes(5));
        let mut later = post("Later", &[one(Platform::Linkedin)]).with_schedule(now() + Duration::days(1));
        let due_id = scheduler.schedule(&mut due).unwrap();
        scheduler.schedule(&mut later).unwrap();

        let runs = scheduler.run_scheduled_at(now()).await.unwrap();

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].record.id.as_deref(), Some(due_id.as_str()));
        assert!(runs[0].outcome.as_ref().unwrap().is_complete_success());
        assert_eq!(fixture.publisher.platforms(), vec![Platform::Twitter]);
        assert_eq!(scheduler.queue().len(), 1);
        assert_eq!(scheduler.usage().state().posts_this_week, 1);

        // Nothing left to do at the same instant
        assert!(scheduler.run_scheduled_at(now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_scheduled_keeps_posts_queued_by_other_processes() {
        let fixture = Fixture::new();
        let mut watcher = fixture.scheduler();

        assert!(watcher.run_scheduled_at(now()).await.unwrap().is_empty());

        // A separate `sched post --schedule` while the watcher sleeps
        let mut external = ScheduleQueue::load(fixture.paths.schedule_file());
        let mut tomorrow = post("Tomorrow", &[one(Platform::Twitter)]).with_schedule(now() + Duration::days(1));
        let id = external.enqueue(&mut tomorrow).unwrap();

        assert!(watcher.run_scheduled_at(now()).await.unwrap().is_empty());
        let on_disk = ScheduleQueue::load(fixture.paths.schedule_file());
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk.list()[0].id.as_deref(), Some(id.as_str()));

        let runs = watcher
            .run_scheduled_at(now() + Duration::days(1))
            .await
            .unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].record.id.as_deref(), Some(id.as_str()));
        assert!(ScheduleQueue::load(fixture.paths.schedule_file()).is_empty());
    }

    #[tokio::test]
    async fn test_run_scheduled_keeps_usage_recorded_by_other_processes() {
        let fixture = Fixture::new();
        let mut watcher = fixture.scheduler();

        // Immediate posts from another invocation after the watcher started
        let mut external = UsageTracker::load(fixture.paths.usage_file());
        assert!(external.record_post_at(3, now()).unwrap());

        let mut due = post("Due", &[one(Platform::Twitter)]).with_schedule(now() - Duration::minutes(1));
        ScheduleQueue::load(fixture.paths.schedule_file())
            .enqueue(&mut due)
            .unwrap();

        let runs = watcher.run_scheduled_at(now()).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(watcher.usage().state().posts_this_week, 4);

        let on_disk = UsageTracker::load(fixture.paths.usage_file());
        assert_eq!(on_disk.state().posts_this_week, 4);
    }

    #[tokio::test]
    async fn test_run_scheduled_sees_config_changes() {
        let fixture = Fixture::new();
        let mut watcher = fixture.scheduler();

        let mut disabled = PlatformConfig::new("test@test.com", "secret");
        disabled.enabled = false;
        fixture.set_config(Platform::Twitter, disabled);

        let mut due = post("Due", &[one(Platform::Twitter)]).with_schedule(now() - Duration::minutes(1));
        ScheduleQueue::load(fixture.paths.schedule_file())
            .enqueue(&mut due)
            .unwrap();

        let runs = watcher.run_scheduled_at(now()).await.unwrap();
        let report = runs[0].outcome.as_ref().unwrap();
        assert!(report.results()[0].error.as_ref().unwrap().contains("disabled"));
        assert_eq!(fixture.publisher.call_count(), 0);
    }

    #[tokio::test]
    async fn test_run_scheduled_reports_invalid_records() {
        let fixture = Fixture::new();
        crate::config::write_json(
            &fixture.paths.schedule_file(),
            &vec![
                ScheduledRecord {
                    id: Some("post_1_bad".to_string()),
                    content: "Hello".to_string(),
                    platforms: "facebook".to_string(),
                    scheduled_time: "2024-01-01T00:00:00Z".to_string(),
                    ..Default::default()
                },
                ScheduledRecord {
                    id: Some("post_2_good".to_string()),
                    content: "Hello".to_string(),
                    platforms: "twitter".to_string(),
                    scheduled_time: "2024-01-01T00:00:00Z".to_string(),
                    ..Default::default()
                },
            ],
        )
        .unwrap();
        let mut scheduler = fixture.scheduler();

        let runs = scheduler.run_scheduled_at(now()).await.unwrap();

        assert_eq!(runs.len(), 2);
        assert_eq!(
            runs[0].outcome.as_ref().unwrap_err(),
            &ValidationError::UnknownPlatform("facebook".to_string())
        );
        assert!(runs[1].outcome.as_ref().unwrap().is_complete_success());
        assert!(scheduler.queue().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_dispatch() {
        let fixture = Fixture::with_publisher(
            MockPublisher::success().with_delay(std::time::Duration::from_millis(100)),
        );
        let mut scheduler = fixture.scheduler();
        let post = post("Hello", &[PlatformTarget::All]).with_media(vec![PathBuf::from("a.png")]);

        let start = std::time::Instant::now();
        scheduler.post_now_at(&post, now()).await.unwrap();

        // Three sequential calls would take at least 300ms
        assert!(start.elapsed() < std::time::Duration::from_millis(250));
    }
}
