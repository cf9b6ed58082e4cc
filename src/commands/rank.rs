use super::common::{ColorMode, LogLevel, init_logging};
use super::config::Config;
use super::{Host, ProgressReporter};
use crate::Result;
use crate::harvest::{
    CacheStore, DiskCache, Extractor, FetchResult, Fetcher, Harvester, HttpTransport, MemoryCache, Progress, RepoId, RequestTracker,
    Source, Transport, rank, unique, unique_in_order,
};
use camino::Utf8PathBuf;
use clap::Parser;
use core::time::Duration;
use directories::BaseDirs;
use ohno::{IntoAppError, app_err};
use owo_colors::OwoColorize;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

const LOG_TARGET: &str = "      rank";

/// Width of the identifier column in console output.
const ID_COLUMN_WIDTH: usize = 50;

#[derive(Parser, Debug)]
pub struct RankArgs {
    /// Awesome list repository (format: `owner/name` or `https://github.com/owner/name`)
    #[arg(value_name = "SOURCE", required_unless_present = "file")]
    pub source: Option<String>,

    /// Read the awesome list from a local Markdown file instead of a repository
    #[arg(long, value_name = "PATH")]
    pub file: Option<Utf8PathBuf>,

    /// Number of ranked repositories to print
    #[arg(long, short = 'n', value_name = "N", default_value_t = 10)]
    pub count: usize,

    /// Only fetch the first N unique repositories found in the list
    #[arg(long, value_name = "N")]
    pub process_count: Option<usize>,

    /// Path to configuration file (default is `awesome-rank.toml`)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Directory where API responses are cached
    #[arg(long, value_name = "PATH", conflicts_with = "no_cache")]
    pub cache_dir: Option<Utf8PathBuf>,

    /// Keep responses in memory only, for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Ignore cached data and fetch everything fresh
    #[arg(long)]
    pub ignore_cached: bool,

    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Write the ranking to a JSON file instead of the terminal
    #[arg(long, value_name = "PATH")]
    pub json: Option<Utf8PathBuf>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,
}

pub async fn process_rank<H: Host>(host: &mut H, args: &RankArgs) -> Result<()> {
    init_logging(args.log_level);

    let cwd = std::env::current_dir().into_app_err("determining the current directory")?;
    let base_dir = Utf8PathBuf::try_from(cwd).into_app_err("the current directory is not valid UTF-8")?;
    let config = Config::load(&base_dir, args.config.as_deref())?;

    let source = if let Some(path) = &args.file {
        Source::File(path.clone())
    } else {
        let reference = args.source.as_deref().ok_or_else(|| app_err!("no awesome list repository was given"))?;
        Source::Repository(RepoId::from_reference(reference)?)
    };

    let cache: Arc<dyn CacheStore> = if args.no_cache {
        Arc::new(MemoryCache::new())
    } else {
        let dir = cache_dir(args.cache_dir.as_ref())?;
        log::debug!(target: LOG_TARGET, "Using cache directory '{}'", dir.display());
        Arc::new(DiskCache::open(dir, args.ignore_cached).await?)
    };

    let transport = HttpTransport::new(args.github_token.as_deref(), config.request_timeout)?;
    let harvester = Harvester::new(Fetcher::new(transport, cache, &config.fetch_settings())?);

    // the bar only shows up when it won't interleave with log lines
    let delay = if args.log_level == LogLevel::None {
        Duration::from_millis(300)
    } else {
        Duration::from_hours(365 * 24)
    };

    let progress: Arc<dyn Progress> = Arc::new(ProgressReporter::new(delay, args.color.enabled_for(&std::io::stderr())));
    let tracker = RequestTracker::new(&progress);

    let result = collect_ranking(&harvester, &source, &config, args, &tracker).await;
    progress.done();

    let (total, ranked) = result?;
    if total == 0 {
        let _ = writeln!(host.error(), "No repository links were found in '{source}'");
        return Ok(());
    }

    if let Some(path) = &args.json {
        let json = serde_json::to_string_pretty(&ranked).into_app_err("serializing the ranking")?;
        fs::write(path, json).into_app_err_with(|| format!("writing JSON report to '{path}'"))?;
        log::info!(target: LOG_TARGET, "Wrote {} ranked repositories to '{path}'", ranked.len());
    } else {
        let use_colors = args.color.enabled_for(&std::io::stdout());
        let mut output = host.output();
        for (index, result) in ranked.iter().enumerate() {
            let _ = writeln!(output, "{}", format_line(index + 1, result, &config.link_host, use_colors));
        }
    }

    Ok(())
}

/// Load the list, harvest every unique repository it links to, and rank them.
///
/// Returns the number of repositories harvested alongside the top entries.
async fn collect_ranking<T: Transport, C: CacheStore>(
    harvester: &Harvester<T, C>,
    source: &Source,
    config: &Config,
    args: &RankArgs,
    tracker: &RequestTracker,
) -> Result<(usize, Vec<FetchResult>)> {
    let text = source.load(harvester.fetcher(), &config.raw_base_url, tracker).await?;

    let extractor = Extractor::new(&config.link_host)?;
    let ids: Vec<RepoId> = match args.process_count {
        Some(cap) => unique_in_order(extractor.extract(&text)).into_iter().take(cap).collect(),
        None => unique(extractor.extract(&text)).into_iter().collect(),
    };
    log::info!(target: LOG_TARGET, "Found {} unique repositories in '{source}'", ids.len());

    let total = ids.len();
    let results = harvester.harvest(ids, tracker).await?;
    Ok((total, rank(results, Some(args.count))))
}

fn cache_dir(requested: Option<&Utf8PathBuf>) -> Result<PathBuf> {
    if let Some(path) = requested {
        return Ok(path.as_std_path().to_path_buf());
    }

    Ok(BaseDirs::new()
        .into_app_err("could not determine cache directory")?
        .cache_dir()
        .join("awesome-rank"))
}

fn format_line(rank: usize, result: &FetchResult, link_host: &str, use_colors: bool) -> String {
    let id = result.identifier.as_str();
    let stars = format!("{:<7}", result.metric);
    let id_column = format!("{id:<ID_COLUMN_WIDTH$}");
    let link = format!("(https://{link_host}/{id})");
    let marker = if result.present { "" } else { " [unavailable]" };

    if use_colors {
        format!("{rank:>3}. {} {} {}{}", stars.yellow(), id_column.bold(), link.dimmed(), marker.red())
    } else {
        format!("{rank:>3}. {stars} {id_column} {link}{marker}")
    }
}
