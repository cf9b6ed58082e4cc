//! Discovery of repository references inside free-form text.

use super::RepoId;
use crate::Result;
use ohno::IntoAppError;
use regex::Regex;

const LOG_TARGET: &str = " extractor";

/// Host whose links are recognized when no other host is configured.
pub const DEFAULT_LINK_HOST: &str = "github.com";

/// Recognizes parenthesized repository links of the form `(https://<host>/<owner>/<name>)`,
/// which is how Markdown documents embed link targets.
#[derive(Debug, Clone)]
pub struct Extractor {
    pattern: Regex,
}

impl Extractor {
    /// Create an extractor for links pointing at `host`.
    pub fn new(host: &str) -> Result<Self> {
        let source = format!(r"\(https?://{}/([^\s/()]+?)/([^\s/()]+?)/?\)", regex::escape(host));
        let pattern = Regex::new(&source).into_app_err_with(|| format!("building link pattern for host '{host}'"))?;
        Ok(Self { pattern })
    }

    /// Lazily yield every identifier referenced in `text`, in order of appearance and including repeats.
    ///
    /// Calling this again with the same text restarts the scan and yields the same sequence.
    pub fn extract<'a>(&'a self, text: &'a str) -> impl Iterator<Item = RepoId> + 'a {
        self.pattern.captures_iter(text).filter_map(|caps| {
            let owner = caps.get(1)?.as_str();
            let name = caps.get(2)?.as_str();
            match RepoId::from_parts(owner, name) {
                Ok(id) => Some(id),
                Err(e) => {
                    log::trace!(target: LOG_TARGET, "Skipping link candidate: {e:#}");
                    None
                }
            }
        })
    }
}
