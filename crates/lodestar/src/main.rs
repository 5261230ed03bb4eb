use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use lodestar_common::WaitPolicy;
use lodestar_engine::ai::{AiBackend, HttpAiBackend, SuggestionAdapter};
use lodestar_engine::config::{AiProvider, ConfigLoader, LodestarConfig};
use lodestar_engine::driver::Driver;
use lodestar_engine::execution::{CommandRunner, ExecutionError, ExecutionJob, Healer, HealingLoop};
use lodestar_engine::{HealingHistory, Resolver, validate_page_state};
use lodestar_h::HeadlessDriver;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "lodestar", version, about = "Self-healing element resolution for browser tests")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (defaults to ./lodestar.yaml, then ~/.lodestar/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Launch browser in visible mode (not headless)
    #[arg(long, global = true)]
    visible: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve element descriptions on a page and print the winning locators
    Find {
        #[arg(long)]
        url: String,

        /// When navigation counts as finished
        #[arg(long, value_enum, default_value_t = WaitArg::Load)]
        wait: WaitArg,

        /// Test name recorded with any healing this run performs
        #[arg(long)]
        test_name: Option<String>,

        /// Natural-language element descriptions
        #[arg(required = true)]
        descriptions: Vec<String>,
    },
    /// Check a page against an expected visual state using a vision model
    Check {
        #[arg(long)]
        url: String,

        #[arg(long, value_enum, default_value_t = WaitArg::Load)]
        wait: WaitArg,

        /// Expected state, e.g. "dashboard with the user menu visible"
        #[arg(long)]
        expect: String,
    },
    /// Run a test script, healing it between failed attempts
    Run {
        script: PathBuf,

        /// File with the requirements the script was written from
        #[arg(long)]
        requirements: Option<PathBuf>,

        /// Override the configured attempt budget
        #[arg(long)]
        max_attempts: Option<u32>,

        /// Print the execution report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print healing statistics from the history file
    Stats,
}

#[derive(Clone, Copy, ValueEnum)]
enum WaitArg {
    Load,
    DomContentLoaded,
    NetworkIdle,
}

impl From<WaitArg> for WaitPolicy {
    fn from(arg: WaitArg) -> Self {
        match arg {
            WaitArg::Load => WaitPolicy::Load,
            WaitArg::DomContentLoaded => WaitPolicy::DomContentLoaded,
            WaitArg::NetworkIdle => WaitPolicy::NetworkIdle,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries results.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref()).await?;

    match args.command {
        Command::Find {
            url,
            wait,
            test_name,
            descriptions,
        } => {
            let target = Target {
                url: &url,
                wait: wait.into(),
                visible: args.visible,
            };
            find(&config, target, test_name, &descriptions).await
        }
        Command::Check { url, wait, expect } => {
            let target = Target {
                url: &url,
                wait: wait.into(),
                visible: args.visible,
            };
            check(&config, target, &expect).await
        }
        Command::Run {
            script,
            requirements,
            max_attempts,
            json,
        } => run(&config, script, requirements, max_attempts, json).await,
        Command::Stats => stats(&config).await,
    }
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<LodestarConfig> {
    match path {
        Some(path) => {
            let mut config = ConfigLoader::load_from(path)
                .await
                .with_context(|| format!("loading {}", path.display()))?;
            ConfigLoader::apply_env_overrides(&mut config);
            Ok(config)
        }
        None => Ok(ConfigLoader::load_default().await?),
    }
}

async fn load_history(config: &LodestarConfig) -> HealingHistory {
    match config.history.effective_path() {
        Some(path) => HealingHistory::load(path.clone()).await,
        None => HealingHistory::new(),
    }
}

fn ai_backend(config: &LodestarConfig) -> Arc<dyn AiBackend> {
    let backend = HttpAiBackend::from_config(&config.ai);
    info!(
        "AI provider: {} (model {}, {})",
        config.ai.provider.as_str(),
        backend.model(),
        backend.base_url()
    );
    Arc::new(backend)
}

/// Page to open for `find` and `check`.
struct Target<'a> {
    url: &'a str,
    wait: WaitPolicy,
    visible: bool,
}

async fn open_page(target: Target<'_>) -> anyhow::Result<HeadlessDriver> {
    let mut driver = HeadlessDriver::new_with_visibility(target.visible);
    driver.launch().await.context("launching browser")?;
    if let Err(e) = driver
        .navigate(target.url, target.wait, NAVIGATION_TIMEOUT)
        .await
    {
        driver.close().await.ok();
        return Err(e).with_context(|| format!("navigating to {}", target.url));
    }
    Ok(driver)
}

async fn find(
    config: &LodestarConfig,
    target: Target<'_>,
    test_name: Option<String>,
    descriptions: &[String],
) -> anyhow::Result<()> {
    let driver = open_page(target).await?;
    let mut resolver =
        Resolver::from_config(driver, &config.resolver).with_history(load_history(config).await);
    resolver.set_test_name(test_name);
    if config.resolver.enable_ai && !matches!(config.ai.provider, AiProvider::Disabled) {
        resolver =
            resolver.with_adapter(SuggestionAdapter::from_config(ai_backend(config), &config.ai));
    }

    let mut unresolved = 0;
    for description in descriptions {
        match resolver.resolve(description).await {
            Ok(resolution) => {
                let matches = resolution.element.match_count;
                println!(
                    "{}\t{}\t{}{}",
                    description,
                    resolution.locator,
                    resolution.source,
                    if matches > 1 {
                        format!("\t({} matches)", matches)
                    } else {
                        String::new()
                    }
                );
            }
            Err(e) => {
                unresolved += 1;
                eprintln!("{}", e);
            }
        }
    }

    resolver.into_driver().close().await?;
    if unresolved > 0 {
        bail!("{} of {} descriptions could not be resolved", unresolved, descriptions.len());
    }
    Ok(())
}

async fn check(config: &LodestarConfig, target: Target<'_>, expected: &str) -> anyhow::Result<()> {
    let mut driver = open_page(target).await?;
    let adapter = SuggestionAdapter::from_config(ai_backend(config), &config.ai);
    let outcome = validate_page_state(&mut driver, &adapter, expected).await;
    driver.close().await?;

    let verdict = match &outcome {
        Ok(verdict) => Some(verdict),
        Err(e) => e.verdict(),
    };
    if let Some(verdict) = verdict {
        println!("{}", serde_json::to_string_pretty(verdict)?);
    }
    outcome?;
    Ok(())
}

async fn run(
    config: &LodestarConfig,
    script: PathBuf,
    requirements: Option<PathBuf>,
    max_attempts: Option<u32>,
    json: bool,
) -> anyhow::Result<()> {
    let mut job = ExecutionJob::new(script);
    if let Some(path) = requirements {
        let text = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading requirements {}", path.display()))?;
        job = job.with_requirements(text);
    }

    let healer = Healer::from_config(ai_backend(config), &config.ai);
    let heal_loop = HealingLoop::new(CommandRunner::from_config(&config.execution), healer)
        .with_max_attempts(max_attempts.unwrap_or(config.execution.max_attempts));

    let outcome = heal_loop.run(&job).await;
    let report = match &outcome {
        Ok(report) => Some(report),
        Err(e) => e.report(),
    };
    if let Some(report) = report {
        if json {
            println!("{}", serde_json::to_string_pretty(report)?);
        } else {
            for attempt in &report.attempts {
                println!(
                    "attempt {}: {}/{} passed{}",
                    attempt.number,
                    attempt.tally.passed,
                    attempt.tally.total,
                    if attempt.healed_before { " (healed)" } else { "" }
                );
            }
            for fix in &report.fixes_applied {
                println!("fix: {}", fix);
            }
        }
    }

    match outcome {
        Ok(report) => {
            info!("Tests passed after {} attempt(s)", report.attempt_count());
            Ok(())
        }
        Err(ExecutionError::Failed { categories, .. }) if !categories.is_empty() => {
            let names: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
            bail!("tests still failing ({})", names.join(", "))
        }
        Err(e) => Err(e.into()),
    }
}

async fn stats(config: &LodestarConfig) -> anyhow::Result<()> {
    let history = load_history(config).await;
    if history.path().is_none() {
        warn!("History persistence is disabled; nothing to report");
    }
    let stats = history.statistics();
    println!(
        "{} healing attempts, {} successful, {} failed ({} success rate)",
        stats.total,
        stats.successful,
        stats.failed,
        stats.success_rate_percent()
    );
    println!();
    println!("{}", history.render_report());
    Ok(())
}
