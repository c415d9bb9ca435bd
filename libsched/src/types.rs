//! Core types for the social scheduler

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::scheduling::parse_timestamp;

/// Maximum post content length, in characters
pub const MAX_CONTENT_CHARS: usize = 2000;

/// A concrete platform the publisher can post to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    Linkedin,
    Instagram,
}

impl Platform {
    /// Every concrete platform, in the order `all` expands to
    pub const EVERY: [Platform; 3] = [Platform::Twitter, Platform::Linkedin, Platform::Instagram];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Twitter => "twitter",
            Platform::Linkedin => "linkedin",
            Platform::Instagram => "instagram",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::Twitter => "Twitter",
            Platform::Linkedin => "LinkedIn",
            Platform::Instagram => "Instagram",
        }
    }

    /// Character limit applied when rendering content for this platform
    pub fn character_limit(&self) -> Option<usize> {
        match self {
            Platform::Twitter => Some(280),
            Platform::Linkedin | Platform::Instagram => None,
        }
    }

    /// Maximum number of media files sent with one post
    pub fn max_media(&self) -> usize {
        match self {
            Platform::Twitter => 4,
            Platform::Linkedin => 9,
            Platform::Instagram => 1,
        }
    }

    /// Whether a post without media is rejected by the platform
    pub fn requires_media(&self) -> bool {
        matches!(self, Platform::Instagram)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ValidationError;

    /// Parses a concrete platform. The `all` sentinel is not a platform and is
    /// rejected here; use [`PlatformTarget`] where `all` is meaningful.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<PlatformTarget>()? {
            PlatformTarget::One(platform) => Ok(platform),
            PlatformTarget::All => Err(ValidationError::UnknownPlatform(s.to_string())),
        }
    }
}

/// A platform selection as written by the user: one platform or `all`
///
/// `All` only has meaning until [`expand_platforms`] runs; dispatch code works
/// on [`Platform`] and cannot receive the sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformTarget {
    One(Platform),
    All,
}

impl fmt::Display for PlatformTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformTarget::One(platform) => f.write_str(platform.as_str()),
            PlatformTarget::All => f.write_str("all"),
        }
    }
}

impl FromStr for PlatformTarget {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "twitter" | "x" | "t" => Ok(PlatformTarget::One(Platform::Twitter)),
            "linkedin" | "li" => Ok(PlatformTarget::One(Platform::Linkedin)),
            "instagram" | "ig" | "insta" => Ok(PlatformTarget::One(Platform::Instagram)),
            "all" | "*" => Ok(PlatformTarget::All),
            _ => Err(ValidationError::UnknownPlatform(s.trim().to_string())),
        }
    }
}

impl From<Platform> for PlatformTarget {
    fn from(platform: Platform) -> Self {
        PlatformTarget::One(platform)
    }
}

/// Parse a comma-separated platform list, e.g. `"twitter, li"`
///
/// Empty tokens are ignored. The first unknown token fails the whole parse.
pub fn parse_platforms(value: &str) -> Result<Vec<PlatformTarget>, ValidationError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::parse)
        .collect()
}

/// Resolve targets to the concrete platforms to dispatch to
///
/// Any `all` in the list replaces the whole list with every platform.
/// Explicit duplicates are kept.
pub fn expand_platforms(targets: &[PlatformTarget]) -> Vec<Platform> {
    if targets.contains(&PlatformTarget::All) {
        return Platform::EVERY.to_vec();
    }

    targets
        .iter()
        .filter_map(|target| match target {
            PlatformTarget::One(platform) => Some(*platform),
            PlatformTarget::All => None,
        })
        .collect()
}

/// Parse comma-separated media paths
pub fn parse_media_paths(value: &str) -> Vec<PathBuf> {
    split_list(value).map(PathBuf::from).collect()
}

/// Parse comma-separated hashtags, stripping leading `#`
pub fn parse_hashtags(value: &str) -> Vec<String> {
    split_list(value).filter_map(normalize_hashtag).collect()
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|item| !item.is_empty())
}

fn normalize_hashtag(tag: &str) -> Option<String> {
    let tag = tag.trim().trim_start_matches('#').trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_string())
    }
}

/// A post, either to be published now or stored for later
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    /// Assigned only when the post is enqueued
    pub id: Option<String>,
    pub content: String,
    pub platforms: Vec<PlatformTarget>,
    /// `None` means post immediately
    pub scheduled_time: Option<DateTime<Utc>>,
    pub media_paths: Vec<PathBuf>,
    pub alt_text: Option<String>,
    pub hashtags: Vec<String>,
    pub link: Option<String>,
}

impl Post {
    /// Create a validated post
    pub fn new(
        content: impl Into<String>,
        platforms: Vec<PlatformTarget>,
    ) -> Result<Self, ValidationError> {
        let post = Self {
            id: None,
            content: content.into(),
            platforms,
            scheduled_time: None,
            media_paths: Vec::new(),
            alt_text: None,
            hashtags: Vec::new(),
            link: None,
        };
        post.validate()?;
        Ok(post)
    }

    pub fn with_schedule(mut self, scheduled_time: DateTime<Utc>) -> Self {
        self.scheduled_time = Some(scheduled_time);
        self
    }

    pub fn with_media(mut self, media_paths: Vec<PathBuf>) -> Self {
        self.media_paths = media_paths;
        self
    }

    pub fn with_hashtags<I, S>(mut self, hashtags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.hashtags = hashtags
            .into_iter()
            .filter_map(|tag| normalize_hashtag(tag.as_ref()))
            .collect();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }

    pub fn with_alt_text(mut self, alt_text: impl Into<String>) -> Self {
        self.alt_text = Some(alt_text.into());
        self
    }

    /// Check content bounds and that at least one platform is selected
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.content.trim().is_empty() {
            return Err(ValidationError::EmptyContent);
        }

        let len = self.content.chars().count();
        if len > MAX_CONTENT_CHARS {
            return Err(ValidationError::ContentTooLong {
                len,
                max: MAX_CONTENT_CHARS,
            });
        }

        if self.platforms.is_empty() {
            return Err(ValidationError::NoPlatforms);
        }

        Ok(())
    }

    /// Content followed by a blank line and the hashtags
    ///
    /// With `max_len`, an over-long result is cut to exactly `max_len`
    /// characters, the last three being `...`. The cut may land mid-word.
    pub fn full_content(&self, max_len: Option<usize>) -> String {
        let mut content = self.content.clone();

        if !self.hashtags.is_empty() {
            let tags = self
                .hashtags
                .iter()
                .map(|tag| format!("#{}", tag.trim_start_matches('#')))
                .collect::<Vec<_>>()
                .join(" ");
            content = format!("{}\n\n{}", content, tags).trim().to_string();
        }

        match max_len {
            Some(max) if max > 0 && content.chars().count() > max => {
                let mut truncated: String = content.chars().take(max.saturating_sub(3)).collect();
                truncated.push_str("...");
                truncated.chars().take(max).collect()
            }
            _ => content,
        }
    }

    /// Flatten into the string-keyed record stored in `scheduled.json`
    ///
    /// Multi-value fields are comma-joined, so a path or tag containing a
    /// comma does not survive the round trip.
    pub fn to_record(&self) -> ScheduledRecord {
        ScheduledRecord {
            id: self.id.clone(),
            content: self.content.clone(),
            platforms: join(self.platforms.iter().map(ToString::to_string)),
            scheduled_time: self
                .scheduled_time
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Secs, true))
                .unwrap_or_default(),
            media_paths: join(self.media_paths.iter().map(|p| p.display().to_string())),
            alt_text: self.alt_text.clone().unwrap_or_default(),
            hashtags: self.hashtags.join(","),
            link: self.link.clone().unwrap_or_default(),
        }
    }

    /// Rebuild a validated post from a flat record
    ///
    /// An unparsable schedule time is dropped rather than rejected.
    pub fn from_record(record: &ScheduledRecord) -> Result<Self, ValidationError> {
        let post = Self {
            id: record.id.clone().filter(|id| !id.is_empty()),
            content: record.content.clone(),
            platforms: parse_platforms(&record.platforms)?,
            scheduled_time: record.scheduled_at(),
            media_paths: parse_media_paths(&record.media_paths),
            alt_text: non_empty(&record.alt_text),
            hashtags: parse_hashtags(&record.hashtags),
            link: non_empty(&record.link),
        };
        post.validate()?;
        Ok(post)
    }
}

fn join(items: impl Iterator<Item = String>) -> String {
    items.collect::<Vec<_>>().join(",")
}

fn non_empty(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// A post as persisted in the schedule queue: every field a flat string
///
/// Missing fields read as empty strings, so records written without an `id`
/// still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduledRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub platforms: String,
    pub scheduled_time: String,
    pub media_paths: String,
    pub alt_text: String,
    pub hashtags: String,
    pub link: String,
}

impl ScheduledRecord {
    /// The schedule time, if present and parsable
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.scheduled_time.trim();
        if raw.is_empty() {
            return None;
        }
        parse_timestamp(raw)
    }
}
