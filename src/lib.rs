//! Trigger Jenkins builds and poll their status.
//!
//! [`BuildTriggerClient`] is the entry point. It talks to the server through a
//! [`JobService`]; [`JenkinsClient`] is the HTTP implementation and
//! [`Settings`] resolves where the server is and how to log in.
//!
//! ```no_run
//! use jenkins_build_trigger::{BuildParameters, BuildTriggerClient, ConfigOverrides, Settings};
//!
//! # async fn run() -> jenkins_build_trigger::Result<()> {
//! let settings = Settings::from_env(&ConfigOverrides::default())?;
//! let client = BuildTriggerClient::from_settings(&settings)?;
//!
//! let mut parameters = BuildParameters::new();
//! parameters.insert("BRANCH".to_string(), "main".to_string());
//!
//! let build = client.trigger_build("app", &parameters).await?;
//! let status = client.poll_build_status("app", build.number).await?;
//! println!("build #{} is {status}", build.number);
//! # Ok(())
//! # }
//! ```

mod auth;
mod config;
mod error;
mod providers;
mod service;
mod trigger;

pub use auth::{Credentials, Password};
pub use config::{
    Config, ConfigOverrides, CredentialSource, JenkinsConfig, Settings, PASSWORD_ENV, SERVER_ENV,
    USERNAME_ENV,
};
pub use error::{Error, Result};
pub use providers::JenkinsClient;
pub use service::{BuildInfo, BuildParameters, JobInfo, JobService};
pub use trigger::{
    BuildStatus, BuildTriggerClient, DeleteOutcome, TriggeredBuild, DEFAULT_NOT_FOUND_DELAY,
};
