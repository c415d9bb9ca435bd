//! Publisher backed by an external program
//!
//! The program is invoked as `<program> [args...] <platform>` with the request
//! as JSON on stdin. Exit status 0 means the post went out; anything else is a
//! failure whose message is the program's stderr.

use async_trait::async_trait;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{PublishOutcome, PublishRequest, Publisher};
use crate::config::Settings;
use crate::error::ConfigError;

/// Environment variable telling the program whether to run the browser headless
pub const HEADLESS_ENV: &str = "SOCIAL_SCHEDULER_HEADLESS";

#[derive(Debug, Clone)]
pub struct CommandPublisher {
    program: PathBuf,
    args: Vec<String>,
}

/// JSON document written to the program's stdin
#[derive(Serialize)]
struct CommandPayload<'a> {
    platform: &'a str,
    content: &'a str,
    media_paths: &'a [PathBuf],
    email: Option<&'a str>,
    password: Option<&'a str>,
    cookies_file: Option<&'a Path>,
    headless: bool,
}

impl<'a> From<&'a PublishRequest> for CommandPayload<'a> {
    fn from(request: &'a PublishRequest) -> Self {
        Self {
            platform: request.platform.as_str(),
            content: &request.content,
            media_paths: &request.media_paths,
            email: request.credentials.email.as_deref(),
            password: request.credentials.password.as_deref(),
            cookies_file: request.credentials.cookies_file.as_deref(),
            headless: request.headless,
        }
    }
}

impl CommandPublisher {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Build from `[publisher]` in `settings.toml`
    ///
    /// Fails with [`ConfigError::NoPublisher`] naming `settings_file` when no
    /// command is set.
    pub fn from_settings(settings: &Settings, settings_file: &Path) -> Result<Self, ConfigError> {
        let program = settings
            .publisher_command()
            .ok_or_else(|| ConfigError::NoPublisher(settings_file.display().to_string()))?;
        Ok(Self::new(program).with_args(settings.publisher.args.iter().cloned()))
    }

    /// Arguments placed before the platform name
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    async fn run(&self, request: &PublishRequest) -> Result<PublishOutcome, String> {
        let payload = serde_json::to_vec(&CommandPayload::from(request))
            .map_err(|e| format!("Failed to encode request: {}", e))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(request.platform.as_str())
            .env(HEADLESS_ENV, if request.headless { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("Failed to start {}: {}", self.program.display(), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A program that exits without reading stdin closes the pipe; its
            // exit status still decides the outcome.
            if let Err(e) = stdin.write_all(&payload).await {
                debug!("Publisher closed stdin early: {}", e);
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| format!("Failed to wait for {}: {}", self.program.display(), e))?;

        if output.status.success() {
            return Ok(PublishOutcome::success());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("Publisher exited with {}", output.status)
        } else {
            stderr
        };
        Ok(PublishOutcome::failure(message))
    }
}

#[async_trait]
impl Publisher for CommandPublisher {
    async fn publish(&self, request: &PublishRequest) -> PublishOutcome {
        debug!(
            "Running {} for {}",
            self.program.display(),
            request.platform
        );

        match self.run(request).await {
            Ok(outcome) => outcome,
            Err(message) => {
                warn!("{}", message);
                PublishOutcome::failure(message)
            }
        }
    }
}
