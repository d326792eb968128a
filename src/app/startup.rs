//! Application startup
//!
//! Parses arguments, loads configuration, initialises logging, and runs one
//! scan per requested repository concurrently. Exit status: 0 when every
//! scan succeeded, 1 when any scan failed, 2 for configuration errors.

use std::io::IsTerminal;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::cli::args::{color_requested, Args};
use crate::app::summary;
use crate::core::config::AppConfig;
use crate::core::date_parser::parse_date;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::shutdown::ShutdownCoordinator;
use crate::core::time::SystemClock;
use crate::platform::registry::{default_monitors, AdapterRegistry};
use crate::ratelimit::service::RateLimitService;
use crate::scan::executor::ScanCommandExecutor;
use crate::scan::persistence::{JsonExportPersistence, MemoryPersistence, PersistenceService};
use crate::scan::request::{FetchStrategy, ScanRequest};
use crate::scan::types::ScanResult;
use crate::scm::error::{ScmError, ScmResult};
use crate::scm::tool::parse_tool;

const TOKEN_ENV_VAR: &str = "SCMSCAN_TOKEN";

pub fn run() -> ExitCode {
    let help_color = color_requested().unwrap_or_else(|| std::io::stdout().is_terminal());
    let args = Args::parse_styled(help_color);

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start the async runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run_async(args))
}

async fn run_async(args: Args) -> ExitCode {
    let config = match AppConfig::load(args.config_file.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(2);
        }
    };

    // CLI flags beat the config file; the config file beats TTY detection
    let color_enabled = color_requested()
        .or(config.color)
        .unwrap_or_else(|| std::io::stderr().is_terminal());

    let log_file = args.log_file.as_ref().map(|p| p.display().to_string());
    if let Err(e) = init_logging(
        args.log_level.as_deref().or(config.log_level.as_deref()),
        args.log_format.as_deref().or(config.log_format.as_deref()),
        log_file.as_deref().or(config.log_file.as_deref()),
        color_enabled,
    ) {
        eprintln!("Failed to initialise logging: {}", e);
        return ExitCode::FAILURE;
    }

    match execute_scans(&args, &config, color_enabled).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log_error_with_context(&e, "Scan startup failed");
            ExitCode::from(2)
        }
    }
}

async fn execute_scans(args: &Args, config: &AppConfig, color_enabled: bool) -> ScmResult<bool> {
    let requests = build_requests(args, config)?;

    let registry = Arc::new(AdapterRegistry::with_defaults(&config.http)?);
    let monitors = default_monitors(&config.http)?;
    let rate_limits = Arc::new(RateLimitService::new(
        config.rate_limit.clone(),
        monitors,
        Arc::new(SystemClock),
    ));
    let persistence: Arc<dyn PersistenceService> = match &args.out {
        Some(dir) => Arc::new(JsonExportPersistence::new(dir)),
        None => Arc::new(MemoryPersistence::new()),
    };
    let executor = Arc::new(ScanCommandExecutor::new(
        registry,
        rate_limits,
        persistence,
        Arc::new(SystemClock),
    ));

    let (coordinator, _shutdown_rx) = ShutdownCoordinator::new();
    coordinator.install_signal_handlers();
    let cancel = coordinator.cancel_flag();

    log::info!(
        "Scanning {} {}",
        requests.len(),
        if requests.len() == 1 {
            "repository"
        } else {
            "repositories"
        }
    );

    let scans = requests.iter().map(|request| {
        let executor = executor.clone();
        let cancel = cancel.clone();
        async move { executor.execute(request, cancel).await }
    });
    let results: Vec<ScanResult> = futures::future::join_all(scans).await;

    summary::print_summary(&results, color_enabled);
    if let Some(dir) = &args.out {
        log::info!("Scan results written to {}", dir.display());
    }

    Ok(results.iter().all(|result| result.success))
}

/// Build one validated scan request per URL
///
/// Fails on the first configuration problem so nothing starts against a
/// half-valid argument set.
fn build_requests(args: &Args, config: &AppConfig) -> ScmResult<Vec<ScanRequest>> {
    let tool = parse_tool(&args.tool)?;
    let since = parse_date_option(args.since.as_deref())?;
    let until = parse_date_option(args.until.as_deref())?;
    let last_scan_from = parse_date_option(args.last_scan_from.as_deref())?;
    let strategy: FetchStrategy =
        args.strategy
            .parse()
            .map_err(|_| ScmError::Configuration {
                message: format!("Unknown fetch strategy '{}'", args.strategy),
            })?;
    let token = args
        .token
        .clone()
        .or_else(|| std::env::var(TOKEN_ENV_VAR).ok());
    let per_page = args.per_page.unwrap_or(config.http.per_page);
    let single = args.repo_url.len() == 1;

    let mut requests = Vec::with_capacity(args.repo_url.len());
    for url in &args.repo_url {
        let mut builder = ScanRequest::builder(url, tool)
            .tool_config_id(args.tool_config_id.clone())
            .branch(args.branch.clone())
            .username(args.username.clone())
            .token(token.clone())
            .base_url(args.base_url.clone())
            .since(since)
            .until(until)
            .last_scan_from(last_scan_from)
            .strategy(strategy)
            .limit(args.limit)
            .per_page(per_page);
        if single {
            builder = builder.repository_name(args.repo_name.clone());
        }
        let request = builder.build();
        request.validate()?;
        requests.push(request);
    }
    Ok(requests)
}

fn parse_date_option(value: Option<&str>) -> ScmResult<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_date(raw)
            .map(Some)
            .map_err(|message| ScmError::Configuration { message }),
        None => Ok(None),
    }
}
