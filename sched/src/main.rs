//! sched - Schedule social media posts
//!
//! Unix-style front end for the social scheduler: posts to Twitter, LinkedIn
//! and Instagram through an external publisher, within a free-tier quota of
//! five platform posts per week.

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use libsched::logging::{LogFormat, LoggingConfig};
use libsched::publisher::CommandPublisher;
use libsched::scheduling::parse_schedule;
use libsched::types::{parse_hashtags, parse_platforms};
use libsched::{
    ConfigError, ConfigStore, DispatchReport, Paths, Platform, PlatformConfig, Post,
    ScheduleQueue, ScheduledRecord, ScheduledRun, Scheduler, SchedError, Settings, UsageTracker,
    ValidationError,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "sched")]
#[command(version)]
#[command(about = "Schedule social media posts (free tier: 5 posts/week)")]
#[command(long_about = "\
sched - Schedule social media posts

DESCRIPTION:
    sched posts to Twitter, LinkedIn and Instagram, now or at a scheduled
    time. The free tier allows 5 platform posts per rolling week; posting one
    message to three platforms uses three.

    Posting itself is done by an external publisher program configured in
    settings.toml. It receives the request as JSON on stdin and the platform
    name as its last argument.

COMMANDS:
    status          Show tier, weekly usage and configured platforms
    config          Store credentials for a platform
    post            Post now or schedule for later
    import          Import posts from a JSON file
    scheduled       List scheduled posts
    cancel          Remove scheduled posts
    run-scheduled   Post everything that is due
    upgrade         Show or activate premium

USAGE EXAMPLES:
    sched config --platform twitter --email me@example.com
    sched post -c \"Hello world\" -p twitter,linkedin
    sched post -c \"Launch day\" -p all -m launch.png -s \"in 2 hours\"
    sched run-scheduled --watch --poll-interval 60

CONFIGURATION:
    Config directory: ~/.config/social-scheduler (config.json, settings.toml)
    Data directory:   ~/.local/share/social-scheduler (usage.json, scheduled.json)

    Override with environment variables:
        SOCIAL_SCHEDULER_CONFIG_DIR  - Config directory
        SOCIAL_SCHEDULER_DATA_DIR    - Data directory
        SOCIAL_SCHEDULER_LOG_FORMAT  - text, json or pretty
        SOCIAL_SCHEDULER_LOG_LEVEL   - error, warn, info, debug, trace

EXIT CODES:
    0 - Success
    1 - Operation failed (including partial or quota-limited posts)
    2 - Configuration error
    3 - Invalid input (bad platform, schedule, media path or post ID)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format: text, json or pretty
    #[arg(long, global = true, value_name = "FORMAT")]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show tier, weekly usage and platform configuration
    Status {
        /// Output format: text or json
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Store credentials for a platform
    Config {
        /// Platform to configure (twitter, linkedin, instagram)
        #[arg(short, long)]
        platform: String,

        /// Email or username for the platform
        #[arg(short, long)]
        email: Option<String>,

        /// Password for the platform (visible in shell history)
        #[arg(long, conflicts_with = "password_input")]
        password: Option<String>,

        /// Prompt for the password (reads a line from stdin when not a TTY)
        #[arg(long)]
        password_input: bool,

        /// Browser cookies file handed to the publisher
        #[arg(long, value_name = "PATH")]
        cookies_file: Option<PathBuf>,

        /// Keep the credentials but stop posting to this platform
        #[arg(long)]
        disable: bool,
    },

    /// Post now or schedule for later
    Post {
        /// Post content
        #[arg(short, long)]
        content: String,

        /// Platforms, comma-separated: twitter, linkedin, instagram, all
        #[arg(short, long)]
        platforms: String,

        /// Media file (repeatable)
        #[arg(short, long = "media", value_name = "PATH")]
        media: Vec<PathBuf>,

        /// Hashtags, comma-separated
        #[arg(long)]
        hashtags: Option<String>,

        /// Link to include
        #[arg(short, long)]
        link: Option<String>,

        /// Alt text for images
        #[arg(long)]
        alt_text: Option<String>,

        /// Schedule time, e.g. "2025-01-15 14:30", "in 2 hours", "tomorrow 9am"
        #[arg(short, long)]
        schedule: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Show the browser while posting
        #[arg(long)]
        no_headless: bool,

        /// Output format: text or json
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Import posts from a JSON file (array of flat post records)
    Import {
        /// File to import
        file: PathBuf,

        /// Preview without importing
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Show the browser while posting
        #[arg(long)]
        no_headless: bool,
    },

    /// List scheduled posts
    Scheduled {
        /// Output format: text or json
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Remove scheduled posts
    Cancel {
        /// Post ID to cancel
        #[arg(required_unless_present = "all")]
        post_id: Option<String>,

        /// Cancel all scheduled posts
        #[arg(long, conflicts_with = "post_id")]
        all: bool,
    },

    /// Post everything that is due
    RunScheduled {
        /// Keep running and check the queue periodically
        #[arg(long)]
        watch: bool,

        /// Seconds between checks in watch mode
        #[arg(long, default_value_t = 60, value_name = "SECONDS")]
        poll_interval: u64,

        /// Show the browser while posting
        #[arg(long)]
        no_headless: bool,

        /// Output format: text or json
        #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
        format: String,
    },

    /// Show premium information, or activate it with a token
    Upgrade {
        /// License token from your purchase
        #[arg(long)]
        token: Option<String>,
    },
}

/// Resolved directories and settings shared by every command
struct Context {
    paths: Paths,
    settings: Settings,
}

impl Context {
    fn load() -> libsched::Result<Self> {
        let paths = Paths::resolve()?;
        paths.ensure()?;
        let settings = Settings::load_from_path(&paths.settings_file())?;
        Ok(Self { paths, settings })
    }

    fn headless(&self, no_headless: bool) -> bool {
        self.settings.publisher.headless && !no_headless
    }

    /// A scheduler backed by the configured publisher command
    fn scheduler(&self, headless: bool) -> libsched::Result<Scheduler> {
        let publisher = CommandPublisher::from_settings(&self.settings, &self.paths.settings_file())?;
        debug!("Using publisher {}", publisher.program().display());
        Ok(Scheduler::open(&self.paths, Box::new(publisher)).with_headless(headless))
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let code = match Context::load() {
        Ok(ctx) => {
            LoggingConfig::resolve(cli.log_format, cli.verbose, &ctx.settings.logging).init();
            match run(cli, ctx).await {
                Ok(code) => code,
                Err(e) => report_error(&e),
            }
        }
        Err(e) => {
            LoggingConfig::resolve(cli.log_format, cli.verbose, &Default::default()).init();
            report_error(&anyhow::Error::from(e))
        }
    };

    std::process::exit(code);
}

fn report_error(err: &anyhow::Error) -> i32 {
    eprintln!("Error: {}", err);
    exit_code(err)
}

fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(e) = err.downcast_ref::<SchedError>() {
        e.exit_code()
    } else if err.downcast_ref::<ValidationError>().is_some() {
        3
    } else if err.downcast_ref::<ConfigError>().is_some() {
        2
    } else {
        1
    }
}

/// Run the selected command, returning the process exit code
async fn run(cli: Cli, ctx: Context) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Status { format } => cmd_status(&ctx, &format),
        Commands::Config {
            platform,
            email,
            password,
            password_input,
            cookies_file,
            disable,
        } => cmd_config(&ctx, &platform, email, password, password_input, cookies_file, disable),
        Commands::Post {
            content,
            platforms,
            media,
            hashtags,
            link,
            alt_text,
            schedule,
            yes,
            no_headless,
            format,
        } => {
            let post = build_post(
                content,
                &platforms,
                media,
                hashtags.as_deref(),
                link,
                alt_text,
                schedule.as_deref(),
            )?;
            cmd_post(&ctx, post, yes, ctx.headless(no_headless), &format).await
        }
        Commands::Import {
            file,
            dry_run,
            yes,
            no_headless,
        } => cmd_import(&ctx, &file, dry_run, yes, ctx.headless(no_headless)).await,
        Commands::Scheduled { format } => cmd_scheduled(&ctx, &format),
        Commands::Cancel { post_id, all } => cmd_cancel(&ctx, post_id.as_deref(), all),
        Commands::RunScheduled {
            watch,
            poll_interval,
            no_headless,
            format,
        } => {
            let scheduler = ctx.scheduler(ctx.headless(no_headless))?;
            if watch {
                cmd_watch(scheduler, poll_interval, &format).await
            } else {
                cmd_run_scheduled(scheduler, &format).await
            }
        }
        Commands::Upgrade { token } => cmd_upgrade(&ctx, token.as_deref()),
    }
}

// ============================================================================
// status / config / upgrade
// ============================================================================

fn cmd_status(ctx: &Context, format: &str) -> anyhow::Result<i32> {
    let config = ConfigStore::load(ctx.paths.config_file());
    let mut usage = UsageTracker::load(ctx.paths.usage_file());
    let info = usage.usage_info();

    if format == "json" {
        let platforms: Vec<_> = Platform::EVERY
            .iter()
            .map(|&platform| {
                let entry = config.get(platform);
                serde_json::json!({
                    "platform": platform,
                    "configured": config.is_configured(platform),
                    "enabled": entry.map_or(true, |c| c.enabled),
                    "email": entry.and_then(PlatformConfig::masked_email),
                })
            })
            .collect();
        let output = serde_json::json!({ "usage": info, "platforms": platforms });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(0);
    }

    println!("Social Scheduler Status");
    if info.is_premium {
        println!("  Tier:                Premium");
    } else {
        println!("  Tier:                Free ({} posts/week)", info.limit);
    }
    println!("  Posts this week:     {}", info.posts_this_week);
    println!("  Remaining this week: {}", info.remaining);
    println!("  Can post:            {}", if info.can_post { "Yes" } else { "No" });
    if !info.is_premium {
        println!("  Resets:              {}", info.resets_at.format("%Y-%m-%d %H:%M UTC"));
    }

    println!();
    println!("Platforms");
    for platform in Platform::EVERY {
        let status = match config.get(platform) {
            Some(entry) if entry.is_configured() && !entry.enabled => "Disabled",
            Some(entry) if entry.is_configured() => "Configured",
            _ => "Not configured",
        };
        let email = config
            .get(platform)
            .and_then(PlatformConfig::masked_email)
            .unwrap_or_else(|| "-".to_string());
        println!("  {:<10} {:<15} {}", platform.display_name(), status, email);
    }

    Ok(0)
}

fn cmd_config(
    ctx: &Context,
    platform: &str,
    email: Option<String>,
    password: Option<String>,
    password_input: bool,
    cookies_file: Option<PathBuf>,
    disable: bool,
) -> anyhow::Result<i32> {
    let platform: Platform = platform.parse().map_err(SchedError::from)?;
    let mut config = ConfigStore::load(ctx.paths.config_file());
    let mut entry = config.get(platform).cloned().unwrap_or_default();

    if let Some(email) = email {
        entry.email = Some(email);
    } else if entry.email.is_none() && !disable {
        if !is_interactive() {
            anyhow::bail!("Email is required. Pass --email for non-interactive use.");
        }
        let email = prompt_line(&format!("Enter your {} email/username: ", platform.display_name()))?;
        if email.is_empty() {
            anyhow::bail!("Email is required");
        }
        entry.email = Some(email);
    }

    if let Some(password) = password {
        entry.password = Some(password);
    } else if password_input || (entry.password.is_none() && !disable) {
        let password = read_password(platform)?;
        if password.is_empty() {
            anyhow::bail!("Password is required");
        }
        entry.password = Some(password);
    }

    if let Some(cookies_file) = cookies_file {
        entry.cookies_file = Some(cookies_file);
    }
    entry.enabled = !disable;

    config.set(platform, entry.clone());
    config.save()?;

    let state = if entry.enabled { "configured" } else { "disabled" };
    println!(
        "{} {} ({})",
        platform.display_name(),
        state,
        entry.masked_email().unwrap_or_else(|| "no email".to_string())
    );
    println!("Note: credentials are stored in plaintext in {}", config.path().display());
    Ok(0)
}

fn read_password(platform: Platform) -> anyhow::Result<String> {
    if is_interactive() {
        let prompt = format!("Enter your {} password: ", platform.display_name());
        return rpassword::prompt_password(prompt).context("Failed to read password");
    }

    // Automation: first line of stdin
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(&['\r', '\n'][..]).to_string())
}

fn cmd_upgrade(ctx: &Context, token: Option<&str>) -> anyhow::Result<i32> {
    let mut usage = UsageTracker::load(ctx.paths.usage_file());

    if usage.is_premium() {
        println!("Premium is already active: unlimited posts.");
        return Ok(0);
    }

    match token {
        Some(token) => {
            usage.upgrade_to_premium(Some(token))?;
            println!("Upgraded to Premium: unlimited posts.");
        }
        None => {
            println!("Current: Free tier (5 posts/week)");
            println!("Premium: unlimited posts");
            println!();
            println!("Premium features:");
            println!("  - No weekly post limit");
            println!("  - Bulk scheduling via import");
            println!();
            println!("Already purchased? Activate with: sched upgrade --token <TOKEN>");
        }
    }

    Ok(0)
}

// ============================================================================
// post / import
// ============================================================================

fn build_post(
    content: String,
    platforms: &str,
    media: Vec<PathBuf>,
    hashtags: Option<&str>,
    link: Option<String>,
    alt_text: Option<String>,
    schedule: Option<&str>,
) -> libsched::Result<Post> {
    let platforms = parse_platforms(platforms)?;

    for path in &media {
        if !path.exists() {
            return Err(ValidationError::MediaNotFound(path.display().to_string()).into());
        }
    }

    let mut post = Post::new(content, platforms)?.with_media(media);
    if let Some(hashtags) = hashtags {
        post = post.with_hashtags(parse_hashtags(hashtags));
    }
    if let Some(link) = link {
        post = post.with_link(link);
    }
    if let Some(alt_text) = alt_text {
        post = post.with_alt_text(alt_text);
    }
    if let Some(schedule) = schedule {
        post = post.with_schedule(parse_schedule(schedule)?);
    }

    Ok(post)
}

async fn cmd_post(
    ctx: &Context,
    mut post: Post,
    yes: bool,
    headless: bool,
    format: &str,
) -> anyhow::Result<i32> {
    if format == "text" {
        print_summary(&post);
    }

    if let Some(at) = post.scheduled_time {
        let mut queue = ScheduleQueue::load(ctx.paths.schedule_file());
        let id = queue.enqueue(&mut post)?;

        if format == "json" {
            let output = serde_json::json!({ "id": id, "scheduled_time": at });
            println!("{}", serde_json::to_string_pretty(&output)?);
        } else {
            println!("Post scheduled for {} ({})", at.to_rfc3339(), id);
        }
        return Ok(0);
    }

    let mut scheduler = ctx.scheduler(headless)?;

    if !yes && is_interactive() && !confirm("Confirm and post now?")? {
        println!("Post cancelled");
        return Ok(0);
    }

    let report = scheduler.post_now(&post).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(if report.is_complete_success() { 0 } else { 1 })
}

async fn cmd_import(
    ctx: &Context,
    file: &Path,
    dry_run: bool,
    yes: bool,
    headless: bool,
) -> anyhow::Result<i32> {
    let content = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let records: Vec<ScheduledRecord> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of posts", file.display()))?;

    println!("Found {} post(s) in {}", records.len(), file.display());
    for (i, record) in records.iter().enumerate() {
        let scheduled = if record.scheduled_time.trim().is_empty() {
            "Immediate"
        } else {
            record.scheduled_time.as_str()
        };
        println!(
            "  {:>3}  {:<53}  {:<25}  {}",
            i + 1,
            preview(&record.content, 50),
            record.platforms,
            scheduled
        );
    }

    if dry_run {
        println!("Dry run - no changes made");
        return Ok(0);
    }

    if records.is_empty() {
        return Ok(0);
    }

    if !yes && is_interactive() && !confirm(&format!("Import {} post(s)?", records.len()))? {
        println!("Import cancelled");
        return Ok(0);
    }

    let now = Utc::now();
    let mut errors = 0;
    let mut valid = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        match Post::from_record(record) {
            Ok(post) => valid.push(post),
            Err(e) => {
                eprintln!("Post {}: {}", i + 1, e);
                errors += 1;
            }
        }
    }

    let (mut scheduled, immediate): (Vec<Post>, Vec<Post>) = valid
        .into_iter()
        .partition(|post| post.scheduled_time.is_some_and(|at| at > now));

    let mut queue = ScheduleQueue::load(ctx.paths.schedule_file());
    for post in &mut scheduled {
        queue.enqueue(post)?;
    }

    let mut failed_posts = 0;
    if !immediate.is_empty() {
        let mut scheduler = ctx.scheduler(headless)?;
        for post in &immediate {
            println!();
            println!("Posting: {}", preview(&post.content, 40));
            let report = scheduler.post_now(post).await?;
            print_report(&report);
            if !report.is_complete_success() {
                failed_posts += 1;
            }
        }
    }

    println!();
    println!(
        "Imported: {} scheduled, {} immediate",
        scheduled.len(),
        immediate.len()
    );
    if errors > 0 {
        println!("Errors: {}", errors);
    }

    Ok(if errors == 0 && failed_posts == 0 { 0 } else { 1 })
}

fn print_summary(post: &Post) {
    println!("Content:   {}", preview(&post.content, 100));
    println!(
        "Platforms: {}",
        post.platforms
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    );
    if let Some(at) = post.scheduled_time {
        println!("Scheduled: {}", at.to_rfc3339());
    }
    if !post.media_paths.is_empty() {
        println!(
            "Media:     {}",
            post.media_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
}

fn print_report(report: &DispatchReport) {
    match report {
        DispatchReport::QuotaExceeded => {
            println!("Weekly limit reached (5 posts/week). Upgrade with: sched upgrade");
        }
        DispatchReport::Dispatched { results, skipped } => {
            for result in results {
                match &result.error {
                    None => println!("  {}: Success", result.platform),
                    Some(error) => println!("  {}: {}", result.platform, error),
                }
            }
            for platform in skipped {
                println!("  {}: Skipped (weekly limit reached)", platform);
            }
            println!(
                "Posted to {}/{} platform(s)",
                report.success_count(),
                results.len() + skipped.len()
            );
        }
    }
}

// ============================================================================
// scheduled / cancel / run-scheduled
// ============================================================================

fn cmd_scheduled(ctx: &Context, format: &str) -> anyhow::Result<i32> {
    let queue = ScheduleQueue::load(ctx.paths.schedule_file());

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(queue.list())?);
        return Ok(0);
    }

    if queue.is_empty() {
        println!("No scheduled posts found");
        return Ok(0);
    }

    let now = Utc::now();
    for record in queue.list() {
        let when = record
            .scheduled_at()
            .map(|at| format_time_until(now, at))
            .unwrap_or_else(|| "no valid time".to_string());
        println!(
            "{} | {} | {} | {}",
            record.id.as_deref().unwrap_or("-"),
            preview(&record.content, 40),
            record.platforms,
            when
        );
    }

    Ok(0)
}

fn cmd_cancel(ctx: &Context, post_id: Option<&str>, all: bool) -> anyhow::Result<i32> {
    let mut queue = ScheduleQueue::load(ctx.paths.schedule_file());

    if all {
        let count = queue.clear()?;
        println!("Cancelled {} scheduled post(s)", count);
        return Ok(0);
    }

    let post_id = post_id.unwrap_or_default();
    if !queue.cancel(post_id)? {
        return Err(SchedError::from(ValidationError::PostNotFound(post_id.to_string())).into());
    }

    println!("Cancelled {}", post_id);
    Ok(0)
}

async fn cmd_run_scheduled(mut scheduler: Scheduler, format: &str) -> anyhow::Result<i32> {
    let runs = scheduler.run_scheduled().await?;
    print_runs(&runs, format)?;

    let all_ok = runs
        .iter()
        .all(|run| run.outcome.as_ref().is_ok_and(DispatchReport::is_complete_success));
    Ok(if all_ok { 0 } else { 1 })
}

async fn cmd_watch(mut scheduler: Scheduler, poll_interval: u64, format: &str) -> anyhow::Result<i32> {
    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = poll_interval.max(1);
    info!("Watching schedule queue every {}s", poll_interval);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping watch loop");
            break;
        }

        match scheduler.run_scheduled().await {
            Ok(runs) if !runs.is_empty() => print_runs(&runs, format)?,
            Ok(_) => debug!("No posts due, {} pending", scheduler.queue().len()),
            Err(e) => error!("Error processing scheduled posts: {}", e),
        }

        // Sleep until next poll, checking for shutdown every second
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    Ok(0)
}

#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).context("Signal setup failed")?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping after the current round");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> anyhow::Result<()> {
    Ok(())
}

fn print_runs(runs: &[ScheduledRun], format: &str) -> anyhow::Result<()> {
    if format == "json" {
        let output: Vec<_> = runs
            .iter()
            .map(|run| match &run.outcome {
                Ok(report) => serde_json::json!({ "id": run.record.id, "report": report }),
                Err(e) => serde_json::json!({ "id": run.record.id, "error": e.to_string() }),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("No posts due for posting");
        return Ok(());
    }

    println!("Processed {} scheduled post(s)", runs.len());
    for run in runs {
        println!();
        println!(
            "Post {}: {}",
            run.record.id.as_deref().unwrap_or("-"),
            preview(&run.record.content, 40)
        );
        match &run.outcome {
            Ok(report) => print_report(report),
            Err(e) => println!("  Skipped: {}", e),
        }
    }

    Ok(())
}

// ============================================================================
// helpers
// ============================================================================

fn is_interactive() -> bool {
    atty::is(atty::Stream::Stdin)
}

fn prompt_line(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    let answer = prompt_line(&format!("{} [y/N]: ", question))?;
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// First `max_chars` characters, with `...` when cut
fn preview(content: &str, max_chars: usize) -> String {
    let single_line = content.replace('\n', " ");
    if single_line.chars().count() <= max_chars {
        single_line
    } else {
        format!("{}...", single_line.chars().take(max_chars).collect::<String>())
    }
}

/// Format the time until `at` in human-readable form
fn format_time_until(now: DateTime<Utc>, at: DateTime<Utc>) -> String {
    let diff = (at - now).num_seconds();

    if diff < 0 {
        return "overdue".to_string();
    }

    let minutes = diff / 60;
    let hours = minutes / 60;
    let days = hours / 24;

    if days > 0 {
        format!("in {} day{}", days, if days == 1 { "" } else { "s" })
    } else if hours > 0 {
        format!("in {} hour{}", hours, if hours == 1 { "" } else { "s" })
    } else if minutes > 0 {
        format!("in {} minute{}", minutes, if minutes == 1 { "" } else { "s" })
    } else {
        "in <1 minute".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_preview() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("two\nlines", 20), "two lines");
        assert_eq!(preview("abcdefghij", 4), "abcd...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }

    #[test]
    fn test_format_time_until() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert_eq!(format_time_until(now, now - chrono::Duration::minutes(1)), "overdue");
        assert_eq!(format_time_until(now, now + chrono::Duration::seconds(30)), "in <1 minute");
        assert_eq!(format_time_until(now, now + chrono::Duration::minutes(1)), "in 1 minute");
        assert_eq!(format_time_until(now, now + chrono::Duration::hours(5)), "in 5 hours");
        assert_eq!(format_time_until(now, now + chrono::Duration::days(2)), "in 2 days");
    }

    #[test]
    fn test_exit_code_mapping() {
        let validation: anyhow::Error = SchedError::from(ValidationError::NoPlatforms).into();
        assert_eq!(exit_code(&validation), 3);

        let bare_validation: anyhow::Error = ValidationError::EmptyContent.into();
        assert_eq!(exit_code(&bare_validation), 3);

        let config: anyhow::Error = ConfigError::NoPublisher("settings.toml".to_string()).into();
        assert_eq!(exit_code(&config), 2);

        let glue = anyhow::anyhow!("Password is required");
        assert_eq!(exit_code(&glue), 1);
    }

    #[test]
    fn test_cli_parses_post() {
        let cli = Cli::try_parse_from([
            "sched", "post", "-c", "Hello", "-p", "twitter,li", "-m", "a.png", "-m", "b.png", "-y",
        ])
        .unwrap();
        match cli.command {
            Commands::Post { media, yes, .. } => {
                assert_eq!(media, vec![PathBuf::from("a.png"), PathBuf::from("b.png")]);
                assert!(yes);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_cancel_requires_id_or_all() {
        assert!(Cli::try_parse_from(["sched", "cancel"]).is_err());
        assert!(Cli::try_parse_from(["sched", "cancel", "--all"]).is_ok());
        assert!(Cli::try_parse_from(["sched", "cancel", "post_1_abcdef12"]).is_ok());
    }

    #[test]
    fn test_cli_global_log_format() {
        let cli = Cli::try_parse_from(["sched", "status", "--log-format", "json"]).unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        assert!(Cli::try_parse_from(["sched", "status", "--log-format", "xml"]).is_err());
    }
}
