//! Image domain types

use serde::{Serialize, Serializer};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Tag of the image currently deployed for a service
pub const LATEST_TAG: &str = "latest";

/// Version derived from a repository's first-parent commit count
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VersionNumber(u64);

impl VersionNumber {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for VersionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registry image reference, rendered as `user/repository:tag`
///
/// Equality and hashing go through the rendered form.
#[derive(Debug, Clone)]
pub struct ImageRef {
    registry_user: String,
    repository_name: String,
    tag: String,
}

impl ImageRef {
    pub fn new(
        registry_user: impl Into<String>,
        repository_name: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            registry_user: registry_user.into(),
            repository_name: repository_name.into(),
            tag: tag.into(),
        }
    }

    /// Candidate image for a version
    pub fn versioned(registry_user: &str, repository_name: &str, version: VersionNumber) -> Self {
        Self::new(registry_user, repository_name, version.to_string())
    }

    /// Image currently deployed for a repository
    pub fn latest(registry_user: &str, repository_name: &str) -> Self {
        Self::new(registry_user, repository_name, LATEST_TAG)
    }

    pub fn registry_user(&self) -> &str {
        &self.registry_user
    }

    pub fn repository_name(&self) -> &str {
        &self.repository_name
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Renders the reference as `user/repository:tag`
    pub fn render(&self) -> String {
        format!(
            "{}/{}:{}",
            self.registry_user, self.repository_name, self.tag
        )
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl FromStr for ImageRef {
    type Err = String;

    /// Parses `user/repository:tag`; a missing tag means `latest`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (user, rest) = s
            .split_once('/')
            .ok_or_else(|| format!("image '{}' must look like user/repository:tag", s))?;
        let (name, tag) = rest.split_once(':').unwrap_or((rest, LATEST_TAG));

        if user.is_empty() || name.is_empty() || tag.is_empty() || name.contains('/') {
            return Err(format!("image '{}' must look like user/repository:tag", s));
        }

        Ok(Self::new(user, name, tag))
    }
}

impl PartialEq for ImageRef {
    fn eq(&self, other: &Self) -> bool {
        self.render() == other.render()
    }
}

impl Eq for ImageRef {}

impl Hash for ImageRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.render().hash(state);
    }
}

impl Serialize for ImageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.render())
    }
}
