//! Subcommand implementations.

use crate::cli::{CheckArgs, SimulateArgs};
use crate::output::Report;
use adwatch_browser::engine::page_path;
use adwatch_browser::{BrowserEngine, ChromiumEnvironment, PageStorage, PageSurface};
use adwatch_core::config::path_is_under;
use adwatch_core::{AppConfig, DetectionConfig, EnforcementPolicy, MemoryStore};
use adwatch_probe::{Aggregator, FilterListPolicy, ProbeRegistry, SimulatedEnvironment};
use adwatch_session::{DetectionController, Enforcer};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Rules used by `simulate` when no list is given. Covers the bait each
/// built-in probe inserts, so a healthy probe set reports a detection.
pub const BUILTIN_FILTERS: &str = "\
! adwatch built-in filters
##.adsbox
##.pub_300x250
##.text-ad
##.ad-wrapper
##.adsbygoogle
##.banner_ad
||pagead2.googlesyndication.com^
";

const CHOICE_POLL: Duration = Duration::from_millis(500);

/// Load the page, run one controller check and enforce the verdict.
pub async fn check(mut config: AppConfig, args: &CheckArgs) -> Result<Report> {
    if let Some(methods) = &args.methods {
        config.detection.methods.clone_from(methods);
    }
    if let Some(policy) = args.policy {
        config.detection.policy = policy;
    }
    if args.headful {
        config.browser.headless = false;
    }
    config.detection.validate().context("invalid detection config")?;

    let path = page_path(&args.url)?;
    let engine = BrowserEngine::launch(&config.browser)
        .await
        .context("failed to launch Chromium")?;
    let page = engine
        .open(&args.url)
        .await
        .with_context(|| format!("failed to load {}", args.url))?;

    let aggregator = Aggregator::new(
        Arc::new(ProbeRegistry::from_config(&config.detection)),
        Arc::new(ChromiumEnvironment::new(page.clone())),
    );
    let durable = Arc::new(PageStorage::local(page.clone()));
    let controller = DetectionController::new(
        config.detection.clone(),
        aggregator,
        Arc::new(PageStorage::session(page.clone())),
        durable.clone(),
    );
    let surface = Arc::new(PageSurface::new(
        page.clone(),
        config.detection.modal_container_id.clone(),
    ));
    let enforcer = Enforcer::new(&config.detection, surface.clone(), durable);
    enforcer.restore_choice().await;

    // Give the page's own ad code the same head start a visitor's browser gets
    tokio::time::sleep(config.detection.check_delay()).await;
    let outcome = controller.check(&path).await;

    let mut report = Report::new(&args.url, &path, &outcome, controller.state().is_blocked);
    report.actions = enforcer.apply(&controller.state()).await?;

    if path_is_under(&path, &config.detection.interstitial_path) {
        let query = path.split_once('?').map_or("", |(_, q)| q);
        let resolved = enforcer.resolve_interstitial(query, &controller).await?;
        report = report.with_interstitial(resolved);
    }

    if args.headful && config.detection.policy == EnforcementPolicy::Soft && report.blocked {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(args.wait);
        while tokio::time::Instant::now() < deadline {
            if let Some(choice) = surface.take_choice().await? {
                tracing::info!(choice = choice.as_str(), "visitor answered the modal");
                if let Some(rerun) = enforcer.choose(choice, &controller).await? {
                    report = Report::new(&args.url, &path, &rerun, controller.state().is_blocked);
                }
                break;
            }
            tokio::time::sleep(CHOICE_POLL).await;
        }
    }

    if !args.headful {
        enforcer.shutdown().await?;
        engine.close().await?;
    }
    Ok(report)
}

/// Run the probes against a simulated page filtered by a list.
pub async fn simulate(mut config: AppConfig, args: &SimulateArgs) -> Result<Report> {
    if let Some(methods) = &args.methods {
        config.detection.methods.clone_from(methods);
    }

    let (source, policy) = match &args.filters {
        Some(file) => {
            let contents = tokio::fs::read_to_string(file)
                .await
                .with_context(|| format!("failed to read filter list {}", file.display()))?;
            (file.display().to_string(), FilterListPolicy::from_list(&contents))
        }
        None => ("built-in filters".to_string(), FilterListPolicy::from_list(BUILTIN_FILTERS)),
    };
    tracing::info!(source = %source, rules = policy.rule_count(), "simulating page");

    let aggregator = Aggregator::new(
        Arc::new(ProbeRegistry::from_config(&config.detection)),
        Arc::new(SimulatedEnvironment::new(policy)),
    );
    let detection = DetectionConfig {
        check_delay_ms: 0,
        cooldown_ms: 0,
        exclude_paths: Vec::new(),
        ..config.detection
    };
    let controller = DetectionController::new(
        detection,
        aggregator,
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    );

    let outcome = controller.check("/").await;
    Ok(Report::new(source, "/", &outcome, controller.state().is_blocked))
}
