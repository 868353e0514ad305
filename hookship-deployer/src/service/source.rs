//! Source fetch service
//!
//! Clones a repository into a run's workspace. Remote sources must live on
//! the configured source host; credentials are injected into http(s) URLs
//! for that host only and are scrubbed from any error text.

use async_trait::async_trait;
use hookship_core::PipelineError;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::{Credentials, DEFAULT_SOURCE_HOST};
use crate::process;

/// Service trait for fetching a repository's source
#[async_trait]
pub trait SourceService: Send + Sync {
    /// Checks out `source_url` into the empty directory `dest`
    async fn fetch(
        &self,
        source_url: &str,
        credentials: &Credentials,
        dest: &Path,
    ) -> Result<(), PipelineError>;
}

/// `git clone` implementation of SourceService
pub struct GitSourceService {
    source_host: String,
}

impl GitSourceService {
    /// Creates a service that only clones remotes on `source_host`
    pub fn new(source_host: impl Into<String>) -> Self {
        Self {
            source_host: source_host.into().to_lowercase(),
        }
    }
}

impl Default for GitSourceService {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE_HOST)
    }
}

#[async_trait]
impl SourceService for GitSourceService {
    async fn fetch(
        &self,
        source_url: &str,
        credentials: &Credentials,
        dest: &Path,
    ) -> Result<(), PipelineError> {
        match remote_host(source_url) {
            Some(host) if host != self.source_host => {
                warn!("Refusing to clone {}: host is not {}", source_url, self.source_host);
                return Err(PipelineError::FetchFailed(format!(
                    "source host '{}' is not the configured host '{}'",
                    host, self.source_host
                )));
            }
            _ => {}
        }

        info!("Cloning {} into {}", source_url, dest.display());

        let remote = authenticated_url(source_url, credentials, &self.source_host)?;

        process::run(
            Command::new("git")
                .env("GIT_TERMINAL_PROMPT", "0")
                .args(["clone", "--quiet", "--"])
                .arg(&remote)
                .arg(dest),
            None,
        )
        .await
        .map_err(|e| {
            PipelineError::FetchFailed(redact(&e.to_string(), &remote, source_url, credentials))
        })?;

        debug!("Cloned {}", source_url);
        Ok(())
    }
}

/// Lowercased host of a remote source, or None for local sources
///
/// Unparsable scheme URLs yield an empty host so they never match.
fn remote_host(source_url: &str) -> Option<String> {
    if source_url.starts_with('/') || source_url.starts_with("file://") {
        return None;
    }

    if source_url.contains("://") {
        let host = reqwest::Url::parse(source_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_lowercase));
        return Some(host.unwrap_or_default());
    }

    // scp-style user@host:path
    let host = source_url
        .split_once('@')
        .and_then(|(_, rest)| rest.split_once(':'))
        .map(|(host, _)| host.to_lowercase());
    Some(host.unwrap_or_default())
}

/// Adds credentials to an http(s) URL on `source_host` that does not
/// already carry a user
///
/// Other remote forms and other hosts are returned unchanged.
fn authenticated_url(
    source_url: &str,
    credentials: &Credentials,
    source_host: &str,
) -> Result<String, PipelineError> {
    if !source_url.starts_with("https://") && !source_url.starts_with("http://") {
        return Ok(source_url.to_string());
    }

    let mut url = reqwest::Url::parse(source_url).map_err(|e| {
        PipelineError::FetchFailed(format!("invalid source URL '{}': {}", source_url, e))
    })?;

    let trusted = url
        .host_str()
        .is_some_and(|host| host.eq_ignore_ascii_case(source_host));
    if !trusted || !url.username().is_empty() || credentials.username.is_empty() {
        return Ok(url.to_string());
    }

    let cannot_carry = || {
        PipelineError::FetchFailed(format!(
            "source URL '{}' cannot carry credentials",
            source_url
        ))
    };
    url.set_username(&credentials.username)
        .map_err(|_| cannot_carry())?;
    url.set_password(Some(&credentials.password))
        .map_err(|_| cannot_carry())?;

    Ok(url.to_string())
}

/// Removes the authenticated remote and the raw password from a message
fn redact(message: &str, remote: &str, source_url: &str, credentials: &Credentials) -> String {
    let mut redacted = message.replace(remote, source_url);
    if !credentials.password.is_empty() {
        redacted = redacted.replace(&credentials.password, "***");
    }
    redacted
}
