//! The seam between the scheduler and whatever performs the actual post
//!
//! Posting to Twitter, LinkedIn and Instagram is done by browser automation
//! that lives outside this crate. The scheduler hands each platform attempt to
//! a [`Publisher`] and only looks at the returned [`PublishOutcome`].
//!
//! # Examples
//!
//! ```no_run
//! use libsched::publisher::{CommandPublisher, PublishRequest, Publisher};
//! use libsched::{Platform, PlatformConfig};
//!
//! # async fn example() {
//! let publisher = CommandPublisher::new("/usr/local/bin/sched-browser");
//! let request = PublishRequest {
//!     platform: Platform::Linkedin,
//!     content: "Hello, LinkedIn!".to_string(),
//!     media_paths: Vec::new(),
//!     credentials: PlatformConfig::new("me@example.com", "secret"),
//!     headless: true,
//! };
//!
//! let outcome = publisher.publish(&request).await;
//! if !outcome.success {
//!     eprintln!("Failed: {}", outcome.error.unwrap_or_default());
//! }
//! # }
//! ```

use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::config::PlatformConfig;
use crate::types::Platform;

pub mod command;

// Available outside tests so the CLI integration tests can drive it too
pub mod mock;

pub use command::CommandPublisher;
pub use mock::MockPublisher;

/// Everything a publisher needs for one platform attempt
///
/// `content` is already rendered for the platform (hashtags appended,
/// truncated to the character limit) and `media_paths` already capped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    pub platform: Platform,
    pub content: String,
    pub media_paths: Vec<PathBuf>,
    pub credentials: PlatformConfig,
    pub headless: bool,
}

/// Result of one platform attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl PublishOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Performs the platform-specific post
///
/// Implementations report failure through [`PublishOutcome`]; they never
/// panic or return an error for a failed post. Cancellation and timeouts are
/// the implementation's concern.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, request: &PublishRequest) -> PublishOutcome;
}
