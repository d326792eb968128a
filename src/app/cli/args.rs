//! Command-line arguments
//!
//! One clap parse over the full argument set. Values also present in the
//! configuration file (log level, format, color) are merged by the startup
//! layer with command-line values taking precedence.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "scmscan")]
#[command(about = "Scan hosted repositories for commits, merge requests, and contributors")]
#[command(version)]
pub struct Args {
    /// Repository URLs to scan (repeat for multiple repositories)
    #[arg(short = 'r', long = "repo-url", value_name = "URL", required = true)]
    pub repo_url: Vec<String>,

    /// Repository display name override (single repository only)
    #[arg(long = "repo-name", value_name = "NAME")]
    pub repo_name: Option<String>,

    /// SCM platform hosting the repositories
    #[arg(short = 't', long = "tool", value_name = "TOOL", default_value = "github")]
    pub tool: String,

    /// Branch to scan instead of the default branch
    #[arg(short = 'b', long = "branch", value_name = "BRANCH")]
    pub branch: Option<String>,

    /// Username for platforms that authenticate with username plus token
    #[arg(long = "username", value_name = "USER")]
    pub username: Option<String>,

    /// API token; falls back to the SCMSCAN_TOKEN environment variable
    #[arg(long = "token", value_name = "TOKEN")]
    pub token: Option<String>,

    /// API base URL override (required for Bitbucket Server)
    #[arg(long = "base-url", value_name = "URL")]
    pub base_url: Option<String>,

    /// Tool configuration identity stamped onto scanned records
    #[arg(long = "tool-config-id", value_name = "ID", default_value = "default")]
    pub tool_config_id: String,

    /// Start date/time for filtering (ISO 8601 or relative)
    #[arg(
        short = 'S',
        long = "since",
        value_name = "DATE_TIME",
        help = "Start date/time (YYYY-MM-DD or relative: 'yesterday', '1 week ago')"
    )]
    pub since: Option<String>,

    /// End date/time for filtering (ISO 8601 or relative)
    #[arg(
        short = 'U',
        long = "until",
        value_name = "DATE_TIME",
        help = "End date/time (YYYY-MM-DD or relative: 'today', '1 hour ago')"
    )]
    pub until: Option<String>,

    /// Watermark left by the previous scan, applied by the incremental strategy
    #[arg(long = "last-scan-from", value_name = "DATE_TIME")]
    pub last_scan_from: Option<String>,

    /// Fetch strategy
    #[arg(long = "strategy", value_name = "STRATEGY", default_value = "full", value_parser = ["full", "incremental"])]
    pub strategy: String,

    /// Maximum commits and merge requests to fetch per category (0 = unlimited)
    #[arg(short = 'C', long = "limit", value_name = "COUNT", default_value_t = 0)]
    pub limit: usize,

    /// Page size requested from platform list endpoints
    #[arg(long = "per-page", value_name = "COUNT")]
    pub per_page: Option<usize>,

    /// Directory to write scan results to as JSON
    #[arg(short = 'O', long = "out", value_name = "DIR")]
    pub out: Option<PathBuf>,

    /// Configuration file path
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Log level
    #[arg(short = 'l', long = "log-level", value_name = "LEVEL", value_parser = ["trace", "debug", "info", "warn", "error", "off"])]
    pub log_level: Option<String>,

    /// Log file path
    #[arg(short = 'f', long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log output format
    #[arg(short = 'o', long = "log-format", value_name = "FORMAT", value_parser = ["text", "ext", "json"])]
    pub log_format: Option<String>,

    /// Force colored output
    #[arg(long = "color", conflicts_with = "no_color")]
    pub color: bool,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,
}

impl Args {
    /// Parse with help styling applied; exits the process on usage errors
    pub fn parse_styled(color_enabled: bool) -> Self {
        use clap::{CommandFactory, FromArgMatches};

        let long_version = format!(
            "{} (built {} from {})",
            env!("CARGO_PKG_VERSION"),
            crate::core::version::build_time(),
            crate::core::version::git_hash()
        );
        let command = Args::command()
            .styles(crate::core::styles::palette_to_clap(color_enabled))
            .long_version(long_version);
        let matches = command.get_matches();
        match Args::from_arg_matches(&matches) {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }
}

/// Pre-parse scan of argv for the color flags
///
/// Help styling must be decided before clap runs, so these two flags are
/// read directly. The last occurrence wins, matching clap's own override
/// behaviour.
pub fn color_requested() -> Option<bool> {
    let mut requested = None;
    for arg in std::env::args() {
        match arg.as_str() {
            "--color" => requested = Some(true),
            "--no-color" => requested = Some(false),
            _ => {}
        }
    }
    requested
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_invocation_uses_defaults() {
        let args =
            Args::try_parse_from(["scmscan", "--repo-url", "https://github.com/acme/widgets"])
                .unwrap();

        assert_eq!(args.repo_url, ["https://github.com/acme/widgets"]);
        assert_eq!(args.tool, "github");
        assert_eq!(args.strategy, "full");
        assert_eq!(args.tool_config_id, "default");
        assert_eq!(args.limit, 0);
        assert!(args.per_page.is_none());
        assert!(args.out.is_none());
        assert!(!args.color);
        assert!(!args.no_color);
    }

    #[test]
    fn test_repeated_repo_urls_accumulate() {
        let args = Args::try_parse_from([
            "scmscan",
            "-r",
            "https://github.com/acme/widgets",
            "-r",
            "https://github.com/acme/gadgets",
        ])
        .unwrap();

        assert_eq!(args.repo_url.len(), 2);
    }

    #[test]
    fn test_repo_url_is_required() {
        let result = Args::try_parse_from(["scmscan", "--tool", "gitlab"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_color_flags_conflict() {
        let result = Args::try_parse_from([
            "scmscan",
            "--repo-url",
            "https://github.com/acme/widgets",
            "--color",
            "--no-color",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_strategy_rejected() {
        let result = Args::try_parse_from([
            "scmscan",
            "--repo-url",
            "https://github.com/acme/widgets",
            "--strategy",
            "weekly",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let result = Args::try_parse_from([
            "scmscan",
            "--repo-url",
            "https://github.com/acme/widgets",
            "--log-level",
            "verbose",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_scan_options_parse() {
        let args = Args::try_parse_from([
            "scmscan",
            "-r",
            "https://example.com/bitbucket/projects/OPS/repos/infra",
            "-t",
            "bitbucket_server",
            "--base-url",
            "https://example.com/bitbucket",
            "-b",
            "develop",
            "-S",
            "2024-01-01",
            "-U",
            "2024-06-01",
            "--strategy",
            "incremental",
            "-C",
            "500",
            "--per-page",
            "25",
            "-O",
            "/tmp/scan-out",
        ])
        .unwrap();

        assert_eq!(args.tool, "bitbucket_server");
        assert_eq!(
            args.base_url.as_deref(),
            Some("https://example.com/bitbucket")
        );
        assert_eq!(args.branch.as_deref(), Some("develop"));
        assert_eq!(args.since.as_deref(), Some("2024-01-01"));
        assert_eq!(args.strategy, "incremental");
        assert_eq!(args.limit, 500);
        assert_eq!(args.per_page, Some(25));
        assert_eq!(args.out, Some(PathBuf::from("/tmp/scan-out")));
    }
}
