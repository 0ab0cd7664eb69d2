//! Command-line entry point: load configuration, wire up the remote client,
//! history store and mirror directory, then run one sync.

use clap::Parser;
use derive_more::{Display, Error};
use exn::ResultExt;
use mirror_config::Overrides;
use mirror_files::Mirror;
use mirror_remote::transport::{HttpTransport, Options};
use mirror_remote::{Client, cookies};
use mirror_store::Store;
use mirror_sync::{Report, Synchronizer};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Debug, Parser)]
#[command(name = "mirror", version, about = "Incrementally mirror a course site into a versioned local archive")]
struct Cli {
    /// Root of the site to mirror, e.g. https://school.instructure.com
    site: Option<Url>,
    /// Configuration file (TOML)
    #[arg(long, env = "MIRROR_CONFIG")]
    config: Option<PathBuf>,
    /// Browser-exported cookies.txt used to authenticate
    #[arg(long, short)]
    cookies: Option<PathBuf>,
    /// Directory to write the mirror to
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// History database (defaults to .mirror.sqlite3 inside the output directory)
    #[arg(long)]
    database: Option<PathBuf>,
}

#[derive(Debug, Display, Error)]
enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not set up the remote client")]
    Remote,
    #[display("could not open the mirror directory")]
    Mirror,
    #[display("could not open the metadata store")]
    Store,
    #[display("sync aborted")]
    Sync,
}

type Result<T> = std::result::Result<T, exn::Exn<ErrorKind>>;

async fn run(cli: Cli) -> Result<Report> {
    let overrides = Overrides {
        site: cli.site,
        cookies: cli.cookies,
        output: cli.output,
        database: cli.database,
    };
    let config = mirror_config::load(cli.config.as_deref(), &overrides).or_raise(|| ErrorKind::Config)?;
    let site = config.site().or_raise(|| ErrorKind::Config)?;

    let jar = cookies::load(&config.cookies).await.or_raise(|| ErrorKind::Remote)?;
    let options = Options {
        timeout: config.timeout(),
        user_agent: config.user_agent.clone(),
    };
    let transport = HttpTransport::new(Arc::new(jar), options).or_raise(|| ErrorKind::Remote)?;
    let client = Client::new(site, Arc::new(transport)).or_raise(|| ErrorKind::Remote)?;

    // The mirror creates the output directory, which the default database lives in.
    let output = std::path::absolute(&config.output).or_raise(|| ErrorKind::Mirror)?;
    let mirror = Mirror::new(&output).or_raise(|| ErrorKind::Mirror)?;
    let store = Store::connect(config.database_path()).await.or_raise(|| ErrorKind::Store)?;
    tracing::info!(site = %site, output = %output.display(), "Starting sync");

    let sync = Synchronizer::new(client, store, mirror);
    let result = sync.run().await;
    sync.store().close().await;
    result.or_raise(|| ErrorKind::Sync)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run(Cli::parse()).await {
        Ok(report) => {
            println!("{report}");
            for failure in &report.failures {
                let retry = if failure.error.is_retryable() { ", retried next run" } else { "" };
                println!("  skipped {}: {}{retry}", failure.scope, *failure.error);
            }
            ExitCode::SUCCESS
        },
        Err(err) => {
            tracing::error!(error = ?err, "Sync failed");
            ExitCode::FAILURE
        },
    }
}
