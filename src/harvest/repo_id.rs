use crate::Result;
use core::cmp::Ordering;
use core::fmt::{Display, Formatter};
use ohno::{IntoAppError, bail};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use url::Url;

/// An `owner/name` pair addressing one hosted repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    full_name: Arc<str>,
}

impl RepoId {
    /// Build an identifier from its two segments.
    ///
    /// A trailing `.git` is stripped from the name. Segments may only contain ASCII
    /// alphanumerics, `-`, `_` and `.`, and may not be `.` or `..`.
    pub fn from_parts(owner: &str, name: &str) -> Result<Self> {
        let name = name.strip_suffix(".git").unwrap_or(name);

        for (what, segment) in [("owner", owner), ("name", name)] {
            if segment.is_empty() {
                bail!("invalid repository identifier '{owner}/{name}': empty {what}");
            }

            if segment == "." || segment == ".." {
                bail!("invalid repository identifier '{owner}/{name}': {what} may not be '{segment}'");
            }

            if let Some(c) = segment.chars().find(|c| !is_segment_char(*c)) {
                bail!("invalid repository identifier '{owner}/{name}': unexpected character {c:?} in {what}");
            }
        }

        Ok(Self {
            full_name: Arc::from(format!("{owner}/{name}")),
        })
    }

    /// Parse an `owner/name` string.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let Some((owner, name)) = s.split_once('/') else {
            bail!("invalid repository identifier '{s}': expected 'owner/name'");
        };

        Self::from_parts(owner, name.trim_end_matches('/'))
    }

    /// Extract the identifier from a repository URL such as `https://github.com/owner/name/tree/main`.
    pub fn from_url(url: &Url) -> Result<Self> {
        let segments: Vec<_> = url.path_segments().map(Iterator::collect).unwrap_or_default();

        match segments.as_slice() {
            [owner, name, ..] => Self::from_parts(owner, name),
            _ => bail!("invalid repository URL format: {url}"),
        }
    }

    /// Accept either a repository URL or a bare `owner/name`.
    pub fn from_reference(reference: &str) -> Result<Self> {
        let reference = reference.trim();
        if reference.starts_with("https://") || reference.starts_with("http://") {
            let url = Url::parse(reference).into_app_err_with(|| format!("parsing repository URL '{reference}'"))?;
            Self::from_url(&url)
        } else {
            Self::parse(reference)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.full_name
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        self.segments().0
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.segments().1
    }

    fn segments(&self) -> (&str, &str) {
        self.full_name.split_once('/').unwrap_or((&*self.full_name, ""))
    }
}

const fn is_segment_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

impl Display for RepoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.full_name)
    }
}

impl PartialOrd for RepoId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RepoId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl TryFrom<String> for RepoId {
    type Error = ohno::AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RepoId> for String {
    fn from(value: RepoId) -> Self {
        value.full_name.to_string()
    }
}
