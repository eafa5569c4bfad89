//! Jenkins REST client

use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::sync::OnceCell;
use url::Url;

use crate::auth::Credentials;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::service::{BuildInfo, BuildParameters, JobInfo, JobService};

use super::types::{BuildResponse, CrumbResponse, JobResponse, BUILD_TREE, JOB_TREE};

const ERROR_PREVIEW_LEN: usize = 300;

#[derive(Debug, Clone)]
struct Crumb {
    field: String,
    value: String,
}

/// [`JobService`] backed by the Jenkins JSON REST API.
///
/// Every request carries basic auth. POSTs also carry the CSRF crumb, fetched
/// once and reused for the lifetime of the client together with the session
/// cookie it was issued for.
pub struct JenkinsClient {
    client: Client,
    base_url: Url,
    credentials: Credentials,
    crumb: OnceCell<Option<Crumb>>,
}

impl JenkinsClient {
    /// Creates a client for the server described by `settings`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client can't be built.
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.timeout)
            .redirect(reqwest::redirect::Policy::none())
            // Crumbs are bound to the session that issued them
            .cookie_store(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: settings.server_url.clone(),
            credentials: settings.credentials.clone(),
            crumb: OnceCell::new(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Builds `<base>/job/a/job/b/<tail...>` for a folder-qualified job name.
    fn endpoint(&self, job: &str, tail: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| Error::Config(format!("'{}' cannot be a base URL", self.base_url)))?;
            segments.pop_if_empty();
            for part in job.split('/').filter(|p| !p.is_empty()) {
                segments.push("job").push(part);
            }
            segments.extend(tail);
        }
        Ok(url)
    }

    fn job_api_url(&self, job: &str) -> Result<Url> {
        let mut url = self.endpoint(job, &["api", "json"])?;
        url.query_pairs_mut().append_pair("tree", JOB_TREE);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        self.send_checked(request, what, false).await
    }

    /// Like [`send`](Self::send), but a redirect also counts as success.
    /// Jenkins answers most form POSTs with one; redirects aren't followed.
    async fn send_form(&self, request: RequestBuilder, what: &str) -> Result<Response> {
        self.send_checked(request, what, true).await
    }

    async fn send_checked(
        &self,
        request: RequestBuilder,
        what: &str,
        accept_redirect: bool,
    ) -> Result<Response> {
        let response = self.credentials.apply(request).send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(what.to_string()));
        }

        if status.is_success() || (accept_redirect && status.is_redirection()) {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(Error::Api {
            status: status.as_u16(),
            message: summarize_error(&error_text, what),
        })
    }

    async fn crumb(&self) -> Result<Option<&Crumb>> {
        self.crumb
            .get_or_try_init(|| self.fetch_crumb())
            .await
            .map(Option::as_ref)
    }

    async fn fetch_crumb(&self) -> Result<Option<Crumb>> {
        let url = self.endpoint("", &["crumbIssuer", "api", "json"])?;

        match self.send(self.client.get(url), "crumb issuer").await {
            Ok(response) => {
                let crumb: CrumbResponse = response.json().await?;
                debug!("Using CSRF crumb header {}", crumb.crumb_request_field);
                Ok(Some(Crumb {
                    field: crumb.crumb_request_field,
                    value: crumb.crumb,
                }))
            }
            Err(Error::NotFound(_)) => {
                debug!("No crumb issuer, CSRF protection is disabled");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn post(&self, url: Url) -> Result<RequestBuilder> {
        let mut request = self.client.post(url);
        if let Some(crumb) = self.crumb().await? {
            request = request.header(crumb.field.as_str(), crumb.value.as_str());
        }
        Ok(request)
    }

    /// Whether the job exists. Only a 404 counts as "no"; other errors propagate.
    pub async fn job_exists(&self, job: &str) -> Result<bool> {
        match self.get_job_info(job).await {
            Ok(_) => Ok(true),
            Err(Error::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn queue_location(&self, response: &Response) -> Option<Url> {
        let location = response.headers().get(LOCATION)?.to_str().ok()?;
        Url::parse(location)
            .or_else(|_| self.base_url.join(location))
            .ok()
    }
}

#[async_trait]
impl JobService for JenkinsClient {
    async fn get_job_info(&self, job: &str) -> Result<JobInfo> {
        let url = self.job_api_url(job)?;
        debug!("Fetching job info: {url}");

        let response = self
            .send(self.client.get(url), &format!("job '{job}'"))
            .await?;
        let job: JobResponse = response.json().await?;

        Ok(job.into())
    }

    async fn build_job(&self, job: &str, parameters: &BuildParameters) -> Result<Option<Url>> {
        let url = if parameters.is_empty() {
            self.endpoint(job, &["build"])?
        } else {
            self.endpoint(job, &["buildWithParameters"])?
        };

        debug!("Triggering build: {url} ({} parameters)", parameters.len());

        let mut request = self.post(url).await?;
        if !parameters.is_empty() {
            request = request.form(parameters);
        }

        let response = self.send_form(request, &format!("job '{job}'")).await?;
        let queue_item = self.queue_location(&response);

        info!("Queued build for job '{job}'");
        Ok(queue_item)
    }

    async fn get_build_info(&self, job: &str, number: u64) -> Result<BuildInfo> {
        let build = number.to_string();
        let mut url = self.endpoint(job, &[build.as_str(), "api", "json"])?;
        url.query_pairs_mut().append_pair("tree", BUILD_TREE);
        debug!("Fetching build info: {url}");

        let response = self
            .send(self.client.get(url), &format!("build #{number} of job '{job}'"))
            .await?;
        let build: BuildResponse = response.json().await?;

        Ok(build.into())
    }

    async fn delete_job(&self, job: &str) -> Result<()> {
        let url = self.endpoint(job, &["doDelete"])?;
        debug!("Deleting job: {url}");

        let request = self.post(url).await?;
        self.send_form(request, &format!("job '{job}'")).await?;

        if self.job_exists(job).await? {
            return Err(Error::JobStillExists {
                job: job.to_string(),
            });
        }

        info!("Deleted job '{job}'");
        Ok(())
    }

    async fn create_job(&self, job: &str, config_xml: &str) -> Result<()> {
        if self.job_exists(job).await? {
            return Err(Error::JobCreation {
                job: job.to_string(),
                reason: "job already exists".to_string(),
            });
        }

        let (folder, leaf) = job.rsplit_once('/').unwrap_or(("", job));
        let mut url = self.endpoint(folder, &["createItem"])?;
        url.query_pairs_mut().append_pair("name", leaf);
        debug!("Creating job: {url}");

        let request = self
            .post(url)
            .await?
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(config_xml.to_owned());
        self.send_form(request, &format!("folder for job '{job}'")).await?;

        if !self.job_exists(job).await? {
            return Err(Error::JobCreation {
                job: job.to_string(),
                reason: "server accepted the request but the job does not exist".to_string(),
            });
        }

        info!("Created job '{job}'");
        Ok(())
    }
}

/// Shortens an error body for display; Jenkins error pages are full HTML documents.
fn summarize_error(body: &str, what: &str) -> String {
    if body.contains("<!DOCTYPE html>") || body.contains("<html") {
        return format!("request for {what} failed, see the Jenkins log for details");
    }

    let body = body.trim();
    if body.chars().count() > ERROR_PREVIEW_LEN {
        let preview: String = body.chars().take(ERROR_PREVIEW_LEN).collect();
        format!("{preview}...")
    } else {
        body.to_string()
    }
}
