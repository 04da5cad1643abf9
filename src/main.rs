use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};

mod checksums;
mod engine;
mod env;
mod error;
mod locator;
mod networking;
mod releases;
mod report;
mod util;

use crate::engine::VerificationEngine;
use crate::env::VerifyConfig;
use crate::locator::{ArtifactLocator, Platform};
use crate::networking::NetworkClient;

#[derive(Parser, Debug)]
#[command(
    name = "release-verify",
    author,
    version,
    about = "Check the installed application binary against the checksums published with its release"
)]
struct Cli {
    /// Print the tool version and exit without checking anything.
    #[arg(long)]
    version_only: bool,

    /// Release index endpoint (GitHub releases API shape).
    #[arg(long)]
    releases_url: Option<String>,

    /// Version of the build being verified, e.g. `1.2.0` or `v1.2.0`.
    /// Defaults to RELEASE_VERIFY_VERSION, then to this tool's own version,
    /// which will not match a wallet release tag exactly.
    #[arg(long)]
    running_version: Option<String>,

    /// Application name substituted into the platform path table.
    #[arg(long)]
    app_name: Option<String>,

    /// Extra binary to verify; probed before the default locations.
    #[arg(long = "artifact", value_name = "PATH")]
    artifacts: Vec<PathBuf>,

    #[arg(long, value_enum)]
    platform: Option<Platform>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Print the result as JSON instead of a text report.
    #[arg(long)]
    json: bool,

    /// Open the selected release page in the default browser.
    #[arg(long)]
    open_release_page: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(&self, config: &mut VerifyConfig) {
        if let Some(url) = &self.releases_url {
            config.releases_url = url.clone();
        }
        if let Some(version) = &self.running_version {
            config.running_version = version.clone();
        }
        if let Some(app_name) = &self.app_name {
            config.app_name = app_name.clone();
        }
        if let Some(platform) = self.platform {
            config.platform = platform;
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = Duration::from_secs(secs.max(1));
        }
        config.extra_artifacts.extend(self.artifacts.iter().cloned());
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if cli.version_only {
        println!("release-verify {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let mut config = VerifyConfig::from_env();
    cli.apply(&mut config);
    if config.uses_default_version() {
        warn!(
            "running version defaults to this tool's own version {}; pass \
             --running-version or set RELEASE_VERIFY_VERSION to select a release by tag",
            config.running_version
        );
    }
    info!(
        "verifying {} {} on {:?} against {}",
        config.app_name, config.running_version, config.platform, config.releases_url
    );

    let locator = ArtifactLocator::from_config(&config);
    let mut engine = VerificationEngine::new(
        NetworkClient::new(&config),
        locator,
        config.running_version.clone(),
    );

    let spinner = (!cli.json).then(|| spinner("Verifying release artifacts..."));
    let result = engine.run_to_completion(interrupted()).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    if cli.json {
        match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(err) => {
                eprintln!("failed to encode result: {err}");
                return ExitCode::from(report::exit_code(engine::state::VerificationStatus::Error));
            }
        }
    } else {
        print!("{}", report::format_report(&result));
    }

    if cli.open_release_page {
        match result.release_page_url.as_deref() {
            Some(url) => {
                if let Err(err) = open::that(url) {
                    warn!("could not open release page {url}: {err}");
                }
            }
            None => warn!("no release page to open"),
        }
    }

    ExitCode::from(report::exit_code(result.status))
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("could not listen for Ctrl-C: {err}");
        std::future::pending::<()>().await;
    }
    warn!("interrupted; cancelling verification");
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {elapsed_precise} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_owned());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}
