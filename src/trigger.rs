use std::fmt;
use std::time::Duration;

use log::{debug, info, warn};
use url::Url;

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::providers::jenkins::JenkinsClient;
use crate::service::{BuildParameters, JobService};

/// Delay applied when a polled build has no record on the server yet.
pub const DEFAULT_NOT_FOUND_DELAY: Duration = Duration::from_secs(5);

/// Observed state of a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStatus {
    /// Record exists, not building, no result yet
    Pending,
    InProgress,
    Succeeded,
    Failed,
    Aborted,
    Unstable,
    NotBuilt,
    /// A result string this crate doesn't know, kept as reported
    Other(String),
    /// The server has no record of the build yet
    Unknown,
}

impl BuildStatus {
    /// Maps a Jenkins `result` field. `None` means the build hasn't settled.
    pub fn from_result(result: Option<&str>) -> Self {
        match result {
            None => Self::Pending,
            Some("SUCCESS") => Self::Succeeded,
            Some("FAILURE") => Self::Failed,
            Some("ABORTED") => Self::Aborted,
            Some("UNSTABLE") => Self::Unstable,
            Some("NOT_BUILT") => Self::NotBuilt,
            Some(other) => Self::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded
                | Self::Failed
                | Self::Aborted
                | Self::Unstable
                | Self::NotBuilt
                | Self::Other(_)
        )
    }

    /// The server's result string for terminal states.
    pub fn as_jenkins_result(&self) -> Option<&str> {
        match self {
            Self::Succeeded => Some("SUCCESS"),
            Self::Failed => Some("FAILURE"),
            Self::Aborted => Some("ABORTED"),
            Self::Unstable => Some("UNSTABLE"),
            Self::NotBuilt => Some("NOT_BUILT"),
            Self::Other(result) => Some(result.as_str()),
            Self::Pending | Self::InProgress | Self::Unknown => None,
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::InProgress => f.write_str("in progress"),
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed => f.write_str("failed"),
            Self::Aborted => f.write_str("aborted"),
            Self::Unstable => f.write_str("unstable"),
            Self::NotBuilt => f.write_str("not built"),
            Self::Other(result) => f.write_str(result),
            Self::Unknown => f.write_str("not started"),
        }
    }
}

/// Result of a delete request. Deletion never fails loudly; callers decide
/// whether a missing job or a server error matters to them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    Failed(String),
}

impl DeleteOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

/// A build that was handed to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggeredBuild {
    pub job: String,
    /// Number the build is expected to get. See [`BuildTriggerClient::trigger_build`].
    pub number: u64,
    /// Queue item the server created, when it reported one
    pub queue_item: Option<Url>,
}

/// Triggers builds and observes their status through a [`JobService`].
pub struct BuildTriggerClient<S> {
    service: S,
    not_found_delay: Duration,
}

impl BuildTriggerClient<JenkinsClient> {
    /// Connects to the Jenkins server described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client can't be built.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let client = JenkinsClient::new(settings)?;
        Ok(Self::new(client).with_not_found_delay(settings.not_found_delay))
    }
}

impl<S: JobService> BuildTriggerClient<S> {
    pub fn new(service: S) -> Self {
        Self {
            service,
            not_found_delay: DEFAULT_NOT_FOUND_DELAY,
        }
    }

    #[must_use]
    pub fn with_not_found_delay(mut self, delay: Duration) -> Self {
        self.not_found_delay = delay;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Deletes a job. Never returns an error; the outcome says what happened.
    pub async fn delete_job(&self, job: &str) -> DeleteOutcome {
        match self.service.delete_job(job).await {
            Ok(()) => DeleteOutcome::Deleted,
            Err(Error::NotFound(what)) => {
                warn!("Nothing to delete: {what}");
                DeleteOutcome::NotFound
            }
            Err(e) => {
                warn!("Failed to delete job '{job}': {e}");
                DeleteOutcome::Failed(e.to_string())
            }
        }
    }

    /// Creates a job from an XML config document, passed through unvalidated.
    ///
    /// # Errors
    ///
    /// A rejection by the server (duplicate name, 4xx answer, missing parent
    /// folder) is reported as [`Error::JobCreation`]. Transport, configuration
    /// and server-side (5xx) errors are returned unchanged.
    pub async fn create_job(&self, job: &str, config_xml: &str) -> Result<()> {
        self.service
            .create_job(job, config_xml)
            .await
            .map_err(|e| match e {
                Error::Api { status, .. } if (400..500).contains(&status) => Error::JobCreation {
                    job: job.to_string(),
                    reason: e.to_string(),
                },
                Error::NotFound(_) => Error::JobCreation {
                    job: job.to_string(),
                    reason: e.to_string(),
                },
                other => other,
            })
    }

    /// Queues a build and returns the number it is expected to get.
    ///
    /// The number is the job's `nextBuildNumber` read *before* the build is
    /// submitted. Jenkins has no atomic submit-and-return-number call, so a
    /// build triggered by someone else between the read and the submit takes
    /// that number and the returned one then refers to the wrong build.
    /// [`TriggeredBuild::queue_item`] can be used to resolve the real number
    /// through the queue API when that matters.
    ///
    /// # Errors
    ///
    /// Errors from either the job lookup or the submission are returned as is.
    pub async fn trigger_build(
        &self,
        job: &str,
        parameters: &BuildParameters,
    ) -> Result<TriggeredBuild> {
        let info = self.service.get_job_info(job).await?;
        let number = info.next_build_number;
        debug!("Job '{job}' next build number is {number}, submitting");

        let queue_item = self.service.build_job(job, parameters).await?;
        info!("Triggered job '{job}', expecting build #{number}");

        Ok(TriggeredBuild {
            job: job.to_string(),
            number,
            queue_item,
        })
    }

    /// Takes one observation of a build's status.
    ///
    /// A build the server has no record of yet is reported as
    /// [`BuildStatus::Unknown`] after waiting the not-found delay once. Callers
    /// poll again for further observations.
    ///
    /// # Errors
    ///
    /// Any service error other than not-found.
    pub async fn poll_build_status(&self, job: &str, number: u64) -> Result<BuildStatus> {
        match self.service.get_build_info(job, number).await {
            Ok(build) if build.in_progress => Ok(BuildStatus::InProgress),
            Ok(build) => Ok(BuildStatus::from_result(build.result.as_deref())),
            Err(Error::NotFound(_)) => {
                debug!(
                    "Build #{number} of '{job}' not started, waiting {:?}",
                    self.not_found_delay
                );
                tokio::time::sleep(self.not_found_delay).await;
                Ok(BuildStatus::Unknown)
            }
            Err(e) => Err(e),
        }
    }
}
