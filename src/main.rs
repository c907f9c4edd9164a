use clap::{CommandFactory, Parser};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use rotunl::creds::{self, CredsError};
use rotunl::daemon::{DaemonClient, DaemonError};
use rotunl::profile::{self, Profile, ProfileError};
use rotunl::reconcile::{self, ReconcileError};
use rotunl::render::{self, OutputFormat};

#[derive(Parser)]
#[command(name = "rotunl")]
#[command(about = "Pritunl command line client")]
struct Cli {
    /// List connections
    #[arg(short = 'l')]
    list: bool,

    /// Connect to profile ID or Name
    #[arg(short = 'c', value_name = "PROFILE")]
    connect: Option<String>,

    /// Disconnect profile or "all"
    #[arg(short = 'd', value_name = "PROFILE")]
    disconnect: Option<String>,

    /// Output format for listings: table or tsv
    #[arg(short = 'o', value_name = "FORMAT", default_value = "table")]
    output: String,

    /// Show version
    #[arg(short = 'v')]
    version: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Profile(#[from] ProfileError),
    #[error(transparent)]
    Daemon(#[from] DaemonError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error(transparent)]
    Creds(#[from] CredsError),
    #[error(transparent)]
    Render(#[from] render::RenderError),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so table/TSV output on stdout stays scriptable
    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    if let Err(err) = run(&cli).await {
        error!("{err}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: &Cli) -> Result<(), CliError> {
    // Reject a bad output format before touching the daemon
    let format: OutputFormat = cli.output.parse()?;

    if cli.list {
        let client = DaemonClient::new()?;
        list_connections(&client, format).await
    } else if let Some(target) = &cli.connect {
        let client = DaemonClient::new()?;
        connect(&client, target).await
    } else if let Some(target) = &cli.disconnect {
        let client = DaemonClient::new()?;
        disconnect(&client, target).await
    } else if cli.version {
        println!("{}", env!("CARGO_PKG_VERSION"));
        Ok(())
    } else {
        let _ = Cli::command().print_help();
        std::process::exit(1);
    }
}

async fn list_connections(client: &DaemonClient, format: OutputFormat) -> Result<(), CliError> {
    let profiles = profile::load_default()?;
    if profiles.is_empty() {
        println!("No profiles found in Pritunl");
        std::process::exit(1);
    }

    let raw = client.connections().await?;
    let live = reconcile::parse_connections(&raw)?;
    let rows = reconcile::reconcile(&profiles, &live);
    print!("{}", render::render(&rows, unix_now(), format));
    Ok(())
}

async fn connect(client: &DaemonClient, target: &str) -> Result<(), CliError> {
    let profiles = profile::load_default()?;
    for profile in matching(&profiles, target) {
        let credentials = creds::resolve(profile, None, None)?;
        client.connect_profile(&profile.key, &credentials).await?;
        info!("connect requested for {}", profile.display_name());
    }
    Ok(())
}

async fn disconnect(client: &DaemonClient, target: &str) -> Result<(), CliError> {
    if target == "all" {
        client.stop_all().await?;
        info!("stop requested for all connections");
        return Ok(());
    }

    let profiles = profile::load_default()?;
    for profile in matching(&profiles, target) {
        client.disconnect_profile(&profile.key).await?;
        info!("disconnect requested for {}", profile.display_name());
    }
    Ok(())
}

fn matching<'a>(profiles: &'a BTreeMap<String, Profile>, target: &str) -> Vec<&'a Profile> {
    let matched: Vec<&Profile> = profiles
        .values()
        .filter(|profile| profile.matches(target))
        .collect();
    if matched.is_empty() {
        warn!("no profile matches '{target}'");
    }
    matched
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or_default()
}
