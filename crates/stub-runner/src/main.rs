use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use stub_runner::{StubRunner, StubRunnerOptions};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "stub-runner", about = "Serve contract stubs on local mock servers")]
struct Args {
    /// YAML options file
    #[arg(short, long, env = "STUB_RUNNER_CONFIG")]
    config: Option<PathBuf>,
    /// Repository root: a path or a file:// URI
    #[arg(short, long, env = "STUB_RUNNER_REPOSITORY_ROOT")]
    repository_root: Option<String>,
    /// Stubs to run, as artifact, group:artifact or group:artifact:classifier
    #[arg(short, long, value_delimiter = ',')]
    stubs: Vec<String>,
    #[arg(long)]
    classifier: Option<String>,
    #[arg(long, env = "STUB_RUNNER_BIND_HOST")]
    bind_host: Option<String>,
    /// Extra directories searched for stubs
    #[arg(long = "search-path")]
    search_paths: Vec<PathBuf>,
    /// Print Prometheus metrics on shutdown
    #[arg(long)]
    print_metrics: bool,
}

impl Args {
    fn into_options(self) -> anyhow::Result<StubRunnerOptions> {
        let mut options = match &self.config {
            Some(path) => StubRunnerOptions::from_file(path)?,
            None => StubRunnerOptions::new(),
        };
        if let Some(root) = self.repository_root {
            options = options.with_repository_root(root);
        }
        if let Some(classifier) = self.classifier {
            options = options.with_classifier(classifier);
        }
        if let Some(host) = self.bind_host {
            options = options.with_bind_host(host);
        }
        for path in self.search_paths {
            options = options.with_search_path(path);
        }
        for stub in self.stubs {
            options = options.download_stub(stub);
        }
        options.validate()?;
        Ok(options)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let print_metrics = args.print_metrics;
    let options = args.into_options()?;

    let runner = StubRunner::with_defaults(options).context("invalid stub configuration")?;
    let running = runner.start().await.context("failed to start stubs")?;
    for entry in running.entries() {
        println!("{} -> {}", entry.coordinates, entry.base_url);
    }

    info!("Stub runner ready, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await.ok();

    for failure in runner.stop() {
        warn!("{} did not stop cleanly: {}", failure.coordinates, failure.reason);
    }
    if print_metrics {
        print!("{}", stub_runner::metrics::collect_metrics());
    }
    Ok(())
}
