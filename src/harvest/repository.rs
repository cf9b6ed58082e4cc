use crate::Result;
use ohno::IntoAppError;
use serde::Deserialize;

/// The subset of the repository resource this tool reads.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub stargazers_count: u64,

    #[serde(default)]
    pub default_branch: Option<String>,
}

impl Repository {
    /// Decode a repository resource body. A body without a star count is malformed.
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body).into_app_err("malformed repository response")
    }
}
