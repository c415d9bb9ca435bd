//! Mock publisher for testing
//!
//! Records every request it receives and can be told to fail for chosen
//! platforms or to delay each call. Clones share their counters, so a test can
//! keep one handle while the scheduler owns another.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use super::{PublishOutcome, PublishRequest, Publisher};
use crate::types::Platform;

#[derive(Debug, Clone, Default)]
pub struct MockPublisher {
    failures: HashMap<Platform, String>,
    delay: Duration,
    requests: Arc<Mutex<Vec<PublishRequest>>>,
}

impl MockPublisher {
    /// A publisher that succeeds for every platform
    pub fn success() -> Self {
        Self::default()
    }

    /// Fail every request for `platform` with `error`
    pub fn failing_on(mut self, platform: Platform, error: &str) -> Self {
        self.failures.insert(platform, error.to_string());
        self
    }

    /// Sleep before answering each request
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of times publish was called
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in call order
    pub fn requests(&self) -> Vec<PublishRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Platforms published to, in call order
    pub fn platforms(&self) -> Vec<Platform> {
        self.requests().iter().map(|r| r.platform).collect()
    }
}

#[async_trait]
impl Publisher for MockPublisher {
    async fn publish(&self, request: &PublishRequest) -> PublishOutcome {
        self.requests.lock().unwrap().push(request.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        match self.failures.get(&request.platform) {
            Some(error) => PublishOutcome::failure(error.clone()),
            None => PublishOutcome::success(),
        }
    }
}
