use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use simple_signer::{
    AppState, BatchOptions, EnvelopeEngine, RequestHandler, SignProps, SignerContext,
    batch::{DEFAULT_CAPACITY, DEFAULT_PROGRESS_EVERY},
    config::{PfxSpec, load_registry},
    handler::DEFAULT_DEADLINE,
    run, run_batch,
    server::DEFAULT_MAX_BODY_BYTES,
};

#[derive(Parser)]
#[clap(version, about = "Sign documents with PKCS#12 identities")]
struct Args {
    /// Identity archive to load, as NAME=PATH or PATH. May be repeated.
    #[clap(long = "pfx", env = "SIGNER_PFX", value_delimiter = ',', global = true)]
    pfx: Vec<PfxSpec>,
    /// Password shared by every identity archive.
    #[clap(long, env = "SIGNER_PFX_PASSWORD", default_value = "", hide_env_values = true, global = true)]
    pfx_password: String,
    /// Lock every batch document with this password before signing.
    #[clap(long, env = "SIGNER_DOC_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,
    /// Default signature properties.
    #[clap(long, env = "SIGNER_PROPS_FILE", default_value = "props.json", global = true)]
    props_file: PathBuf,
    /// More logging, repeat for trace output.
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors.
    #[clap(short, long, global = true)]
    quiet: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign the jobs listed on stdin, one `name|input|output` per line.
    Batch {
        #[clap(long, default_value_t = 2)]
        workers: usize,
        #[clap(long, default_value_t = DEFAULT_CAPACITY)]
        queue_size: usize,
        #[clap(long, default_value_t = DEFAULT_PROGRESS_EVERY)]
        progress_every: u64,
    },
    /// Serve signing requests over HTTP.
    Server {
        #[clap(long, env = "SIGNER_ADDRESS", default_value = "127.0.0.1:8000")]
        address: SocketAddr,
        /// Per-request deadline in seconds.
        #[clap(long, default_value_t = DEFAULT_DEADLINE.as_secs())]
        timeout: u64,
        #[clap(long, default_value_t = DEFAULT_MAX_BODY_BYTES)]
        max_body_bytes: usize,
    },
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn build_context(args: &Args) -> Result<SignerContext> {
    let props = SignProps::from_file(&args.props_file)
        .with_context(|| format!("failed to load {}", args.props_file.display()))?;
    let registry = load_registry(&args.pfx, &args.pfx_password)
        .context("failed to load identity archives")?;
    if registry.is_empty() {
        warn!("no identity archives configured, every signing request will fail");
    } else {
        info!("loaded {} certificates: {}", registry.len(), registry.names().join(", "));
    }

    Ok(SignerContext::new(registry, EnvelopeEngine, props))
}

async fn execute(args: Args) -> Result<()> {
    let context = Arc::new(build_context(&args)?);

    match args.command {
        Command::Batch {
            workers,
            queue_size,
            progress_every,
        } => {
            let options = BatchOptions {
                workers,
                queue_capacity: queue_size,
                progress_every,
                password: args.password.map(String::into_bytes),
            };
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            run_batch(context, stdin, options)
                .await
                .context("failed to read jobs from stdin")?;
        }
        Command::Server {
            address,
            timeout,
            max_body_bytes,
        } => {
            let handler = RequestHandler::new(context, Duration::from_secs(timeout));
            run(address, AppState { handler, max_body_bytes }).await?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose, args.quiet);

    match execute(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
