//! Response types for the Jenkins JSON API

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::service::{BuildInfo, JobInfo};

/// Tree filter for job lookups, keeps responses small on big servers.
pub(super) const JOB_TREE: &str = "name,url,buildable,inQueue,nextBuildNumber,lastBuild[number]";

pub(super) const BUILD_TREE: &str = "number,url,result,building,inProgress,timestamp,duration";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct JobResponse {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub buildable: bool,
    #[serde(default)]
    pub in_queue: bool,
    pub next_build_number: u64,
    #[serde(default)]
    pub last_build: Option<BuildRef>,
}

#[derive(Debug, Deserialize)]
pub(super) struct BuildRef {
    pub number: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct BuildResponse {
    pub number: u64,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub result: Option<String>,
    // Freestyle jobs report `building`, pipeline runs also report `inProgress`
    #[serde(default)]
    pub building: bool,
    #[serde(default)]
    pub in_progress: Option<bool>,
    #[serde(default)]
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub duration: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct CrumbResponse {
    pub crumb: String,
    pub crumb_request_field: String,
}

impl From<JobResponse> for JobInfo {
    fn from(job: JobResponse) -> Self {
        Self {
            name: job.name,
            next_build_number: job.next_build_number,
            last_build_number: job.last_build.map(|b| b.number),
            buildable: job.buildable,
            in_queue: job.in_queue,
            url: job.url,
        }
    }
}

impl From<BuildResponse> for BuildInfo {
    fn from(build: BuildResponse) -> Self {
        let timestamp = build
            .timestamp
            .filter(|ms| *ms > 0)
            .and_then(DateTime::<Utc>::from_timestamp_millis);

        #[allow(clippy::cast_sign_loss)]
        let duration_ms = build.duration.unwrap_or(0).max(0) as u64;

        Self {
            number: build.number,
            in_progress: build.building || build.in_progress.unwrap_or(false),
            result: build.result,
            url: build.url,
            timestamp,
            duration_ms,
        }
    }
}
