use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use url::Url;

use crate::error::Result;

/// Build parameters, name to value.
pub type BuildParameters = HashMap<String, String>;

/// What the server knows about a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub name: String,
    /// Number the server will assign to the next build it starts
    pub next_build_number: u64,
    pub last_build_number: Option<u64>,
    pub buildable: bool,
    pub in_queue: bool,
    pub url: Option<String>,
}

/// What the server knows about a single build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub number: u64,
    pub in_progress: bool,
    /// Raw Jenkins result (`SUCCESS`, `FAILURE`, ...); `None` until the build finishes
    pub result: Option<String>,
    pub url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

/// The job-management surface of a Jenkins server.
///
/// Implementations report a missing job or build as
/// [`Error::NotFound`](crate::Error::NotFound); callers rely on that to tell
/// "doesn't exist yet" apart from real failures.
#[async_trait]
pub trait JobService: Send + Sync {
    async fn get_job_info(&self, job: &str) -> Result<JobInfo>;

    /// Queue a build. Returns the queue item location when the server reports one.
    async fn build_job(&self, job: &str, parameters: &BuildParameters) -> Result<Option<Url>>;

    async fn get_build_info(&self, job: &str, number: u64) -> Result<BuildInfo>;

    async fn delete_job(&self, job: &str) -> Result<()>;

    /// Create a job from a verbatim XML config document.
    async fn create_job(&self, job: &str, config_xml: &str) -> Result<()>;
}
