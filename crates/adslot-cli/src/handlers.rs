//! Command handlers.

use crate::commands::DemoArgs;
use crate::config::CliConfig;
use adslot_cache::{AdLifecycleCache, MetricsSnapshot, SimulatedConfig, SimulatedProvider, UiThread};
use adslot_core::{AdNotification, AdRequestSpec, AdStatus, DisplaySurface, NotificationSink};
use console::style;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Slack on top of the configured load timeout and display time before the
/// demo gives up waiting for a notification.
const WAIT_GRACE: Duration = Duration::from_secs(2);

/// What a demo run observed.
#[derive(Debug, Clone)]
pub struct DemoReport {
    pub spec: AdRequestSpec,
    pub load: AdStatus,
    pub show: Option<AdStatus>,
    pub metrics: MetricsSnapshot,
}

/// Load then show one ad, printing every notification.
pub async fn demo(config: &CliConfig, args: DemoArgs) -> Result<(), Box<dyn std::error::Error>> {
    let report = run_demo(config, &args).await?;

    println!();
    println!(
        "{} ({}, {})",
        style(report.spec.identifier()).bold(),
        report.spec.placement_id(),
        report.spec.ad_kind()
    );
    match (&report.load, &report.show) {
        (AdStatus::LoadSuccess, Some(AdStatus::ShowClosed)) => {
            println!("{} Ad shown and dismissed", style("✓").green())
        }
        (AdStatus::LoadSuccess, Some(status)) => {
            println!("{} Display ended with {}", style("✗").red(), status)
        }
        (status, _) => println!("{} Load ended with {}", style("✗").red(), status),
    }

    let m = report.metrics;
    println!(
        "  provider requests: {}  shown: {}  dismissed: {}  failures: {}",
        m.provider_requests,
        m.shown,
        m.dismissed,
        m.load_failures + m.show_failures
    );
    Ok(())
}

pub async fn run_demo(
    config: &CliConfig,
    args: &DemoArgs,
) -> Result<DemoReport, Box<dyn std::error::Error>> {
    let spec = resolve_spec(config, args);
    let provider_config = provider_config(&config.provider, args);
    let display_time = Duration::from_millis(provider_config.display_ms);

    let ui = Arc::new(UiThread::spawn(&config.cache.ui_thread_name)?);
    let provider = Arc::new(SimulatedProvider::new(provider_config)?);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let sink: Arc<dyn NotificationSink> = Arc::new(move |notification: AdNotification| {
        println!("{}", render(&notification));
        let _ = tx.send(notification);
    });

    let cache = AdLifecycleCache::builder()
        .config(config.cache.clone())
        .provider(provider)
        .executor(ui)
        .sink(sink)
        .build()?;

    println!(
        "Loading {} ad for {} ({})",
        spec.ad_kind(),
        style(spec.identifier()).bold(),
        spec.placement_id()
    );
    let disposition = cache.load(&spec)?;
    debug!(?disposition, "Load requested");

    let load = wait_for(&mut rx, spec.load_timeout() + WAIT_GRACE, |status| {
        matches!(status, AdStatus::LoadSuccess | AdStatus::LoadFail(_))
    })
    .await?;

    let show = if load == AdStatus::LoadSuccess {
        let disposition = cache.show(&spec, DisplaySurface::detached("terminal"))?;
        debug!(?disposition, "Show requested");

        let outcome = wait_for(&mut rx, display_time + WAIT_GRACE, |status| {
            matches!(status, AdStatus::ShowClosed | AdStatus::ShowFail(_))
        })
        .await?;
        Some(outcome)
    } else {
        None
    };

    Ok(DemoReport {
        spec,
        load,
        show,
        metrics: cache.metrics().snapshot(),
    })
}

/// Pick the request spec named on the command line, falling back to the
/// first configured placement.
fn resolve_spec(config: &CliConfig, args: &DemoArgs) -> AdRequestSpec {
    let mut spec = match args.placement.as_deref() {
        Some(name) => config
            .find_placement(name)
            .cloned()
            .unwrap_or_else(|| AdRequestSpec::new("cli", name)),
        None => config
            .placements
            .first()
            .cloned()
            .unwrap_or_else(|| AdRequestSpec::new("cli", "demo/interstitial")),
    };

    if let Some(kind) = args.kind {
        spec = spec.with_kind(kind.into());
    }
    if let Some(ms) = args.timeout_ms {
        spec = spec.with_load_timeout(Duration::from_millis(ms));
    }
    spec
}

fn provider_config(base: &SimulatedConfig, args: &DemoArgs) -> SimulatedConfig {
    let mut config = base.clone();
    if let Some(ms) = args.latency_ms {
        config.latency_ms = ms;
    }
    if let Some(ms) = args.display_ms {
        config.display_ms = ms;
    }
    if args.load_error.is_some() {
        config.load_error_code = args.load_error;
    }
    if args.show_error.is_some() {
        config.show_error_code = args.show_error;
    }
    config
}

async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<AdNotification>,
    within: Duration,
    done: impl Fn(&AdStatus) -> bool,
) -> Result<AdStatus, Box<dyn std::error::Error>> {
    let deadline = tokio::time::Instant::now() + within;
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(notification)) if done(&notification.status) => {
                return Ok(notification.status);
            }
            Ok(Some(_)) => continue,
            Ok(None) => return Err("notification channel closed".into()),
            Err(_) => {
                return Err(format!("no outcome within {} ms", within.as_millis()).into());
            }
        }
    }
}

fn render(notification: &AdNotification) -> String {
    let status = notification.status.name();
    let status = if notification.status.is_failure() {
        style(status).red()
    } else if notification.status == AdStatus::Loading {
        style(status).yellow()
    } else {
        style(status).green()
    };

    match notification.message() {
        Some(message) => format!(
            "  [{}] {} {}",
            notification.identifier,
            status,
            style(message).dim()
        ),
        None => format!("  [{}] {}", notification.identifier, status),
    }
}

/// List configured placements.
pub fn list_placements(config: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.placements.is_empty() {
        println!("No placements configured");
        return Ok(());
    }

    println!(
        "{:<20} {:<30} {:<22} {:>10}",
        "IDENTIFIER", "PLACEMENT", "KIND", "TIMEOUT"
    );
    for spec in &config.placements {
        println!(
            "{:<20} {:<30} {:<22} {:>8}ms",
            spec.identifier(),
            spec.placement_id(),
            spec.ad_kind().to_string(),
            spec.load_timeout().as_millis()
        );
    }
    Ok(())
}

/// Show configuration.
pub fn show_config(config: &CliConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Current configuration:");
    print!("{}", serde_yaml::to_string(config)?);

    if let Ok(path) = CliConfig::config_path() {
        println!("\nConfig file: {}", path.display());
    }
    Ok(())
}

/// Print the configuration file path.
pub fn config_path() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", CliConfig::config_path()?.display());
    Ok(())
}

/// Write a default configuration file.
pub fn init_config(force: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = CliConfig::config_path()?;
    if path.exists() && !force {
        println!(
            "{} {} already exists (use --force to overwrite)",
            style("!").yellow(),
            path.display()
        );
        return Ok(());
    }

    CliConfig::default().save()?;
    println!("{} Created {}", style("✓").green(), path.display());
    Ok(())
}
