//! Deployer configuration
//!
//! Every value the pipeline needs is loaded once at startup into an
//! immutable [`Config`] that is handed to the orchestrator. Missing required
//! values fail fast with [`PipelineError::ConfigMissing`]; optional values
//! that are set but unparsable fail with [`PipelineError::ConfigInvalid`].

use hookship_core::PipelineError;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use crate::pipeline::{RetryPolicy, TriggerPolicy};

/// Host whose remotes receive the source credentials unless overridden
pub const DEFAULT_SOURCE_HOST: &str = "github.com";

/// Username/password pair for the registry or the source host
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Per-stage time limits
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub fetch: Duration,
    pub version: Duration,
    pub auth: Duration,
    pub pull: Duration,
    pub build: Duration,
    pub push: Duration,
    pub deploy: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            fetch: Duration::from_secs(300),
            version: Duration::from_secs(30),
            auth: Duration::from_secs(60),
            pull: Duration::from_secs(300),
            build: Duration::from_secs(1800),
            push: Duration::from_secs(600),
            deploy: Duration::from_secs(60),
        }
    }
}

/// Deployer configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Registry login; the username is also the image namespace
    pub registry: Credentials,

    /// Source host login used for clones
    pub source: Credentials,

    /// Only remotes on this host receive the source credentials
    pub source_host: String,

    /// Update authority base URL (e.g., "http://localhost:9090")
    pub update_url: String,

    /// Directory under which per-run workspaces are created
    pub workspace_root: PathBuf,

    /// Address the webhook ingress listens on
    pub bind_addr: String,

    /// What to do with a trigger for a repository that already has a run
    pub trigger_policy: TriggerPolicy,

    /// Max runs executing at once across all repositories
    pub max_parallel_runs: usize,

    pub timeouts: StageTimeouts,

    /// Bounded retry for registry pushes
    pub push_retry: RetryPolicy,

    /// How long a registry login is reused before logging in again
    pub auth_ttl: Duration,

    /// How long shutdown waits for cancelled runs to wind down
    pub shutdown_grace: Duration,
}

impl Config {
    /// Creates a new configuration with defaults for every optional value
    pub fn new(registry: Credentials, source: Credentials, update_url: String) -> Self {
        Self {
            registry,
            source,
            source_host: DEFAULT_SOURCE_HOST.to_string(),
            update_url,
            workspace_root: std::env::temp_dir().join("hookship"),
            bind_addr: "0.0.0.0:8080".to_string(),
            trigger_policy: TriggerPolicy::Queue,
            max_parallel_runs: 4,
            timeouts: StageTimeouts::default(),
            push_retry: RetryPolicy::default(),
            auth_ttl: Duration::from_secs(3600),
            shutdown_grace: Duration::from_secs(120),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Required:
    /// - HOOKSHIP_REGISTRY_USER, HOOKSHIP_REGISTRY_PASSWORD
    /// - HOOKSHIP_SOURCE_USER, HOOKSHIP_SOURCE_PASSWORD
    /// - HOOKSHIP_UPDATE_URL
    ///
    /// Optional (set but unparsable values are errors):
    /// - HOOKSHIP_SOURCE_HOST (default: github.com)
    /// - HOOKSHIP_WORKSPACE_ROOT (default: <tmp>/hookship)
    /// - HOOKSHIP_BIND_ADDR (default: 0.0.0.0:8080)
    /// - HOOKSHIP_TRIGGER_POLICY (queue | reject, default: queue)
    /// - HOOKSHIP_MAX_PARALLEL_RUNS (default: 4)
    /// - HOOKSHIP_{FETCH,VERSION,AUTH,PULL,BUILD,PUSH,DEPLOY}_TIMEOUT (seconds)
    /// - HOOKSHIP_PUSH_MAX_ATTEMPTS (default: 3)
    /// - HOOKSHIP_AUTH_TTL (seconds, default: 3600)
    /// - HOOKSHIP_SHUTDOWN_GRACE (seconds, default: 120)
    pub fn from_env() -> Result<Self, PipelineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PipelineError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut missing = Vec::new();
        let mut required = |key: &str| match lookup(key).filter(|v| !v.is_empty()) {
            Some(value) => value,
            None => {
                missing.push(key.to_string());
                String::new()
            }
        };

        let registry_user = required("HOOKSHIP_REGISTRY_USER");
        let registry_password = required("HOOKSHIP_REGISTRY_PASSWORD");
        let source_user = required("HOOKSHIP_SOURCE_USER");
        let source_password = required("HOOKSHIP_SOURCE_PASSWORD");
        let update_url = required("HOOKSHIP_UPDATE_URL");

        if !missing.is_empty() {
            return Err(PipelineError::ConfigMissing(missing));
        }

        let mut config = Self::new(
            Credentials::new(registry_user, registry_password),
            Credentials::new(source_user, source_password),
            update_url,
        );

        if let Some(host) = lookup("HOOKSHIP_SOURCE_HOST").filter(|v| !v.is_empty()) {
            config.source_host = host.to_lowercase();
        }

        if let Some(root) = lookup("HOOKSHIP_WORKSPACE_ROOT").filter(|v| !v.is_empty()) {
            config.workspace_root = PathBuf::from(root);
        }

        if let Some(addr) = lookup("HOOKSHIP_BIND_ADDR").filter(|v| !v.is_empty()) {
            config.bind_addr = addr;
        }

        let mut optional = Optional::new(&lookup);

        config.trigger_policy = optional.parsed("HOOKSHIP_TRIGGER_POLICY", config.trigger_policy);
        config.max_parallel_runs =
            optional.parsed("HOOKSHIP_MAX_PARALLEL_RUNS", config.max_parallel_runs);

        let timeouts = &mut config.timeouts;
        timeouts.fetch = optional.seconds("HOOKSHIP_FETCH_TIMEOUT", timeouts.fetch);
        timeouts.version = optional.seconds("HOOKSHIP_VERSION_TIMEOUT", timeouts.version);
        timeouts.auth = optional.seconds("HOOKSHIP_AUTH_TIMEOUT", timeouts.auth);
        timeouts.pull = optional.seconds("HOOKSHIP_PULL_TIMEOUT", timeouts.pull);
        timeouts.build = optional.seconds("HOOKSHIP_BUILD_TIMEOUT", timeouts.build);
        timeouts.push = optional.seconds("HOOKSHIP_PUSH_TIMEOUT", timeouts.push);
        timeouts.deploy = optional.seconds("HOOKSHIP_DEPLOY_TIMEOUT", timeouts.deploy);

        config.push_retry.max_attempts =
            optional.parsed("HOOKSHIP_PUSH_MAX_ATTEMPTS", config.push_retry.max_attempts);
        config.auth_ttl = optional.seconds("HOOKSHIP_AUTH_TTL", config.auth_ttl);
        config.shutdown_grace = optional.seconds("HOOKSHIP_SHUTDOWN_GRACE", config.shutdown_grace);

        if !optional.invalid.is_empty() {
            return Err(PipelineError::ConfigInvalid(optional.invalid));
        }

        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.registry.username.is_empty() || self.registry.password.is_empty() {
            anyhow::bail!("registry credentials cannot be empty");
        }

        if self.source.username.is_empty() || self.source.password.is_empty() {
            anyhow::bail!("source credentials cannot be empty");
        }

        if !self.update_url.starts_with("http://") && !self.update_url.starts_with("https://") {
            anyhow::bail!("update_url must start with http:// or https://");
        }

        if self.source_host.is_empty() || self.source_host.contains(['/', '@', ':']) {
            anyhow::bail!("source_host must be a bare host name");
        }

        if self.workspace_root.as_os_str().is_empty() {
            anyhow::bail!("workspace_root cannot be empty");
        }

        if self.max_parallel_runs == 0 {
            anyhow::bail!("max_parallel_runs must be greater than 0");
        }

        if self.push_retry.max_attempts == 0 {
            anyhow::bail!("push max attempts must be greater than 0");
        }

        let t = &self.timeouts;
        for (name, limit) in [
            ("fetch", t.fetch),
            ("version", t.version),
            ("auth", t.auth),
            ("pull", t.pull),
            ("build", t.build),
            ("push", t.push),
            ("deploy", t.deploy),
        ] {
            if limit.is_zero() {
                anyhow::bail!("{} timeout must be greater than 0", name);
            }
        }

        Ok(())
    }
}

/// Optional variables, collecting every set but unparsable value
struct Optional<'a, F> {
    lookup: &'a F,
    invalid: Vec<String>,
}

impl<'a, F> Optional<'a, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn new(lookup: &'a F) -> Self {
        Self {
            lookup,
            invalid: Vec::new(),
        }
    }

    /// Parses `key`, keeping `default` when unset
    fn parsed<T: FromStr>(&mut self, key: &str, default: T) -> T {
        match (self.lookup)(key) {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                self.invalid.push(format!("{}='{}'", key, raw));
                default
            }),
            None => default,
        }
    }

    fn seconds(&mut self, key: &str, default: Duration) -> Duration {
        Duration::from_secs(self.parsed(key, default.as_secs()))
    }
}
