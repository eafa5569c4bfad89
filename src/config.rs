use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::Credentials;
use crate::error::{Error, Result};

pub const SERVER_ENV: &str = "JENKINS_SERVER";
pub const USERNAME_ENV: &str = "USERNAME";
pub const PASSWORD_ENV: &str = "PASSWORD";

/// Configuration file structure.
///
/// Everything lives under a `[jenkins]` table so the file can be shared with
/// other tooling. Credentials in the file are the last resort; explicit values
/// and environment variables take precedence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    #[serde(default)]
    pub jenkins: JenkinsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct JenkinsConfig {
    /// Jenkins server base URL
    pub server: Option<String>,

    /// Jenkins user name
    pub username: Option<String>,

    /// Jenkins password or API token
    pub password: Option<String>,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How long a status poll waits when the build record doesn't exist yet
    #[serde(default = "default_not_found_delay_secs")]
    pub not_found_delay_secs: u64,

    /// User-Agent header sent with every request
    pub user_agent: Option<String>,
}

impl Default for JenkinsConfig {
    fn default() -> Self {
        Self {
            server: None,
            username: None,
            password: None,
            timeout_secs: default_timeout_secs(),
            not_found_delay_secs: default_not_found_delay_secs(),
            user_agent: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_not_found_delay_secs() -> u64 {
    5
}

fn default_user_agent() -> String {
    format!("jenkins-build-trigger/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./jenkins.toml
    /// 3. ./jenkins.json
    /// 4. ./jenkins.yaml
    /// 5. ./jenkins.yml
    /// 6. `<config dir>/jenkins-build-trigger/config.toml`
    ///
    /// Returns default configuration if no file is found. A path that was
    /// given explicitly must exist.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["jenkins.toml", "jenkins.json", "jenkins.yaml", "jenkins.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(user_config) = user_config_path() {
            if user_config.exists() {
                return Self::load_from_path(&user_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display())),
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display())),
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display())),
            _ => toml::from_str(&contents)
                .ok()
                .or_else(|| serde_json::from_str(&contents).ok())
                .or_else(|| serde_yaml::from_str(&contents).ok())
                .with_context(|| format!("Failed to parse config file: {}", path.display())),
        }
    }
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("jenkins-build-trigger").join("config.toml"))
}

/// Where a setting was found. Sources are tried in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Explicit,
    Environment,
    ConfigFile,
}

impl CredentialSource {
    pub const ORDER: [CredentialSource; 3] = [Self::Explicit, Self::Environment, Self::ConfigFile];
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => f.write_str("explicit parameter"),
            Self::Environment => f.write_str("environment"),
            Self::ConfigFile => f.write_str("config file"),
        }
    }
}

/// Values supplied directly by the caller. They win over every other source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub server_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub config_path: Option<PathBuf>,
}

/// Fully resolved connection settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: Url,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub not_found_delay: Duration,
    pub user_agent: String,
}

impl Settings {
    /// Resolve settings from overrides, the process environment and the
    /// config file, in that order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the config file can't be read or any of
    /// server URL, username or password is missing from every source.
    pub fn from_env(overrides: &ConfigOverrides) -> Result<Self> {
        let file = Config::load(overrides.config_path.as_deref())
            .map_err(|e| Error::Config(format!("{e:#}")))?;

        Self::resolve(overrides, |name| std::env::var(name).ok(), &file)
    }

    /// Resolve settings with an injected environment lookup.
    pub fn resolve<F>(overrides: &ConfigOverrides, env: F, file: &Config) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jenkins = &file.jenkins;

        let server = resolve_field(
            "server URL",
            SERVER_ENV,
            overrides.server_url.as_deref(),
            &env,
            jenkins.server.as_deref(),
        )?;
        let username = resolve_field(
            "username",
            USERNAME_ENV,
            overrides.username.as_deref(),
            &env,
            jenkins.username.as_deref(),
        )?;
        let password = resolve_field(
            "password",
            PASSWORD_ENV,
            overrides.password.as_deref(),
            &env,
            jenkins.password.as_deref(),
        )?;

        Ok(Self {
            server_url: parse_server_url(&server)?,
            credentials: Credentials::new(username, password),
            timeout: Duration::from_secs(jenkins.timeout_secs),
            not_found_delay: Duration::from_secs(jenkins.not_found_delay_secs),
            user_agent: jenkins.user_agent.clone().unwrap_or_else(default_user_agent),
        })
    }
}

fn resolve_field<F>(
    field: &str,
    env_var: &str,
    explicit: Option<&str>,
    env: &F,
    file: Option<&str>,
) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    for source in CredentialSource::ORDER {
        let value = match source {
            CredentialSource::Explicit => explicit.map(str::to_owned),
            CredentialSource::Environment => env(env_var),
            CredentialSource::ConfigFile => file.map(str::to_owned),
        };

        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            debug!("Resolved {field} from {source}");
            return Ok(value);
        }
    }

    Err(Error::Config(format!(
        "missing {field}: tried {}, ${env_var} and the [jenkins] table of a config file",
        CredentialSource::Explicit
    )))
}

/// Parse the server URL, forcing a trailing slash so relative joins keep any
/// context path (e.g. `https://ci.example.com/jenkins/`).
fn parse_server_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("Invalid Jenkins server URL '{raw}': {e}")))?;

    if url.cannot_be_a_base() {
        return Err(Error::Config(format!(
            "Jenkins server URL '{raw}' cannot be used as a base URL"
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}
