use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use managed_certs_controller::controller::{
    self, ControllerConfig, KubeEventRecorder, SslCertificateManager, Supervisor,
};
use managed_certs_controller::provider::{
    compute::DEFAULT_COMPUTE_ENDPOINT, ComputeClient, TokenSource, METADATA_TOKEN_URL,
};
use managed_certs_controller::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the controller
    Run(RunArgs),
    /// Show version information
    Version,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Parser, Debug)]
struct RunArgs {
    /// Only watch ManagedCertificates in this namespace (default: all namespaces)
    #[arg(long, env = "WATCH_NAMESPACE")]
    namespace: Option<String>,

    /// GCP project owning the SslCertificates
    #[arg(long, env = "GCE_PROJECT")]
    project: String,

    /// Compute Engine API endpoint
    #[arg(long, env = "COMPUTE_ENDPOINT", default_value = DEFAULT_COMPUTE_ENDPOINT)]
    compute_endpoint: String,

    /// Static bearer token; the metadata server is used when unset
    #[arg(long, env = "GCE_ACCESS_TOKEN", hide_env_values = true)]
    access_token: Option<String>,

    /// Metadata server token endpoint
    #[arg(long, env = "METADATA_TOKEN_URL", default_value = METADATA_TOKEN_URL)]
    metadata_token_url: String,

    /// Number of parallel reconcile workers
    #[arg(long, env = "WORKERS", default_value_t = 1)]
    workers: usize,

    /// Seconds between full resyncs
    #[arg(long, env = "RESYNC_INTERVAL_SECS", default_value_t = 60)]
    resync_interval_secs: u64,

    /// Seconds to wait for the initial ManagedCertificate listing
    #[arg(long, env = "CACHE_SYNC_TIMEOUT_SECS", default_value_t = 120)]
    cache_sync_timeout_secs: u64,

    /// Prefix of SslCertificate names created (and garbage-collected) by this controller
    #[arg(long, env = "CERTIFICATE_PREFIX", default_value = controller::DEFAULT_CERTIFICATE_PREFIX)]
    certificate_prefix: String,

    /// Address of the health and metrics server
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen_addr: SocketAddr,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl RunArgs {
    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            workers: self.workers,
            resync_interval: Duration::from_secs(self.resync_interval_secs),
            cache_sync_timeout: Duration::from_secs(self.cache_sync_timeout_secs),
            certificate_prefix: self.certificate_prefix.clone(),
        }
    }

    fn token_source(&self) -> TokenSource {
        match &self.access_token {
            Some(token) => TokenSource::Static(token.clone()),
            None => TokenSource::metadata(self.metadata_token_url.clone()),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    match args.command {
        Commands::Version => {
            println!("managed-certs-controller v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Commands::Run(run_args) => run_controller(run_args).await,
    }
}

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(Level::INFO.into())
        .from_env_lossy();
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
    }
}

/// Cancel `token` on SIGINT or SIGTERM
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    error!("Failed to listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT"),
            _ = terminate => info!("Received SIGTERM"),
        }
        token.cancel();
    });
}

#[cfg(feature = "rest-api")]
fn spawn_api_server(
    args: &RunArgs,
    supervisor: &Supervisor,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    use managed_certs_controller::rest_api::{run_server, ApiState};

    let state = Arc::new(ApiState {
        ready: supervisor.readiness(),
    });
    let addr = args.listen_addr;
    Some(tokio::spawn(async move {
        if let Err(e) = run_server(addr, state, shutdown).await {
            error!("REST API server error: {:?}", e);
        }
    }))
}

#[cfg(not(feature = "rest-api"))]
fn spawn_api_server(
    _args: &RunArgs,
    _supervisor: &Supervisor,
    _shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    None
}

async fn run_controller(args: RunArgs) -> Result<(), Error> {
    init_tracing(args.log_format);

    info!(
        "Starting managed-certs-controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = args.controller_config();
    config.validate()?;

    let client = kube::Client::try_default()
        .await
        .map_err(Error::KubeError)?;
    info!("Connected to Kubernetes cluster");

    let compute = ComputeClient::new(&args.compute_endpoint, &args.project, args.token_source())?;
    info!(
        "Managing SslCertificates in project {} via {}",
        args.project, args.compute_endpoint
    );

    let (cache, changes) = controller::watch(client.clone(), args.namespace.as_deref());
    let manager = SslCertificateManager::new(
        Arc::new(compute),
        Arc::new(KubeEventRecorder::new(client)),
    );
    let supervisor = Supervisor::new(config, Arc::new(cache), manager);

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());

    let server = spawn_api_server(&args, &supervisor, shutdown.clone());

    let result = supervisor.run(changes, shutdown.clone()).await;

    shutdown.cancel();
    if let Some(server) = server {
        if let Err(e) = server.await {
            warn!("REST API server task failed: {}", e);
        }
    }

    match &result {
        Ok(()) => info!("Controller shut down cleanly"),
        Err(e) => error!("Controller exited with error: {}", e),
    }
    result
}
