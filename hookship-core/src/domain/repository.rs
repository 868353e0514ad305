//! Repository domain types

use serde::Serialize;
use std::fmt;

use crate::error::PipelineError;

/// Longest accepted repository name
pub const MAX_NAME_LEN: usize = 100;

/// URL schemes accepted for source fetches
const SOURCE_SCHEMES: &[&str] = &["https://", "http://", "ssh://", "git://", "file://"];

/// A repository to build and deploy
///
/// The name doubles as the workspace key, the image repository name and the
/// service name, so it is validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRef {
    name: String,
    source_url: String,
}

impl RepositoryRef {
    /// Creates a validated repository reference
    pub fn new(
        name: impl Into<String>,
        source_url: impl Into<String>,
    ) -> Result<Self, PipelineError> {
        let name = name.into();
        let source_url = source_url.into();

        validate_name(&name)?;
        validate_source_url(&source_url)?;

        Ok(Self { name, source_url })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.source_url)
    }
}

/// Checks a repository name against the allow-list
///
/// Names follow the registry path-component grammar
/// `[a-z0-9]+((\.|_|__|-+)[a-z0-9]+)*` and are at most [`MAX_NAME_LEN`]
/// bytes long. Registry repository components must be lowercase, so
/// uppercase is refused rather than folded.
pub fn validate_name(name: &str) -> Result<(), PipelineError> {
    let invalid = |reason: &str| {
        Err(PipelineError::InvalidRepository(format!(
            "name '{}' {}",
            name, reason
        )))
    };

    if name.is_empty() {
        return invalid("is empty");
    }

    if name.len() > MAX_NAME_LEN {
        return invalid("is too long");
    }

    if let Some(bad) = name.chars().find(|c| !is_alnum(*c) && !is_separator(*c)) {
        return invalid(&format!("contains disallowed character '{}'", bad));
    }

    let mut separator = String::new();
    for (i, c) in name.chars().enumerate() {
        if is_separator(c) {
            if i == 0 {
                return invalid("must start with a lowercase letter or digit");
            }
            separator.push(c);
            continue;
        }

        if !separator.is_empty() {
            if !is_valid_separator(&separator) {
                return invalid(&format!("has invalid separator '{}'", separator));
            }
            separator.clear();
        }
    }

    if !separator.is_empty() {
        return invalid("must end with a lowercase letter or digit");
    }

    Ok(())
}

fn is_alnum(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit()
}

fn is_separator(c: char) -> bool {
    matches!(c, '.' | '_' | '-')
}

/// `.`, `_`, `__` or any run of dashes
fn is_valid_separator(separator: &str) -> bool {
    matches!(separator, "." | "_" | "__") || separator.chars().all(|c| c == '-')
}

/// Checks that a source URL is non-empty and uses a fetchable form
///
/// Accepts scheme URLs from [`SOURCE_SCHEMES`], scp-style `user@host:path`
/// remotes and absolute local paths.
pub fn validate_source_url(url: &str) -> Result<(), PipelineError> {
    if url.trim().is_empty() {
        return Err(PipelineError::InvalidRepository(
            "source URL is empty".to_string(),
        ));
    }

    if url.chars().any(char::is_whitespace) {
        return Err(PipelineError::InvalidRepository(format!(
            "source URL '{}' contains whitespace",
            url
        )));
    }

    let scheme_url = SOURCE_SCHEMES
        .iter()
        .any(|scheme| url.starts_with(scheme) && url.len() > scheme.len());
    let scp_like = url
        .split_once('@')
        .is_some_and(|(user, rest)| !user.is_empty() && rest.contains(':'));
    let local_path = url.starts_with('/');

    if scheme_url || scp_like || local_path {
        Ok(())
    } else {
        Err(PipelineError::InvalidRepository(format!(
            "source URL '{}' is not a supported remote",
            url
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_conventional_names() {
        for name in [
            "svc-a", "api", "web_1", "my.service", "0day", "a__b", "a--b", "a---b", "a.b-c_d",
        ] {
            assert!(validate_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_rejects_unsafe_names() {
        for name in [
            "",
            "../etc",
            "a/b",
            "Svc",
            "-svc",
            ".hidden",
            "svc-",
            "svc.",
            "a..b",
            "svc a",
            "svc:latest",
            "svc_",
            "_svc",
            "a._b",
            "a.-b",
            "a-.b",
            "a___b",
            "a_-b",
            "a-_b",
        ] {
            assert!(validate_name(name).is_err(), "{:?} should be rejected", name);
        }
    }

    #[test]
    fn test_rejects_overlong_name() {
        let name = "a".repeat(MAX_NAME_LEN + 1);
        assert!(validate_name(&name).is_err());
        assert!(validate_name(&"a".repeat(MAX_NAME_LEN)).is_ok());
    }

    #[test]
    fn test_source_url_forms() {
        assert!(validate_source_url("https://src/svc-a").is_ok());
        assert!(validate_source_url("git@github.com:acme/svc-a.git").is_ok());
        assert!(validate_source_url("/srv/git/svc-a").is_ok());
        assert!(validate_source_url("").is_err());
        assert!(validate_source_url("https://").is_err());
        assert!(validate_source_url("svc-a").is_err());
        assert!(validate_source_url("https://src/svc a").is_err());
    }

    #[test]
    fn test_new_validates_both_fields() {
        let repo = RepositoryRef::new("svc-a", "https://src/svc-a").unwrap();
        assert_eq!(repo.name(), "svc-a");
        assert_eq!(repo.source_url(), "https://src/svc-a");

        assert!(matches!(
            RepositoryRef::new("svc-a", ""),
            Err(PipelineError::InvalidRepository(_))
        ));
        assert!(matches!(
            RepositoryRef::new("../svc", "https://src/svc"),
            Err(PipelineError::InvalidRepository(_))
        ));
    }
}
