mod accept_stream;
mod chain;
mod config;
mod discovery;
mod error;
mod forward;
mod handlers;
mod registry;
mod select_stream_or_shutdown;
mod server_loop;
mod state;
mod types;

use crate::types::GenericBoxedStream;
use accept_stream::accept_stream;
use chain::{RandomSource, SeededRandom, ThreadRandom};
use clap::Parser;
use config::{local_hostname, CertPaths, DockerEndpoint, ForwardPolicy};
use discovery::SelfIdentity;
use error::ConfigError;
use forward::HttpPeerClient;
use handlers::handle_connection;
use registry::{DockerRegistry, Registry};
use server_loop::serve_stream;
use state::{new_state, SharedState};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::{
    net::{TcpListener, TcpStream},
    signal, task,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
struct Args {
    /// The address on which the http server will bind
    #[arg(long, default_value = "0.0.0.0:8090")]
    bind: String,

    #[arg(long, env = "DOCKER_HOST", help = "Container runtime endpoint, e.g. tcp://10.0.0.5:2376")]
    docker_host: Option<String>,

    #[arg(long, env = "DOCKER_CERT_PATH", help = "Directory holding cert.pem, key.pem and ca.pem")]
    docker_cert_path: Option<PathBuf>,

    /// Bound on a forwarding hop, in seconds; 0 waits forever
    #[arg(long, default_value = "10")]
    forward_timeout: u64,

    /// Longest chain this node will extend
    #[arg(long, default_value = "32")]
    max_hops: u32,

    /// Deepest peer tree accepted from a forwarded peer, at most 63
    #[arg(long, default_value = "63", value_parser = clap::value_parser!(u64).range(1..=63))]
    max_decode_depth: u64,

    /// Largest payload accepted from a forwarded peer
    #[arg(long, default_value = "4194304")]
    max_body_bytes: usize,

    /// Seed for reproducible forwarding decisions
    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn policy(&self) -> ForwardPolicy {
        ForwardPolicy {
            timeout: ForwardPolicy::timeout_from_secs(self.forward_timeout),
            max_hops: self.max_hops,
            max_decode_depth: self.max_decode_depth as usize,
            max_body_bytes: self.max_body_bytes,
        }
    }

    fn docker(&self) -> Result<(DockerEndpoint, CertPaths), ConfigError> {
        let host = self
            .docker_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::Missing("DOCKER_HOST"))?;
        let cert_dir = self
            .docker_cert_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::Missing("DOCKER_CERT_PATH"))?;
        Ok((DockerEndpoint::parse(host)?, CertPaths::from_dir(cert_dir)?))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let state = match build_state(&args).await {
        Ok(state) => state,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let shutdown_notify = Arc::new(tokio::sync::Notify::new());
    tokio::spawn({
        let interrupt_handle = shutdown_notify.clone();
        async move {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
            interrupt_handle.notify_one();
        }
    });

    run_web_server(&args.bind, state, shutdown_notify).await
}

async fn build_state(args: &Args) -> Result<SharedState, ConfigError> {
    let policy = args.policy();
    policy.validate()?;
    let (endpoint, certs) = args.docker()?;
    let hostname = local_hostname()?;
    let host = endpoint.host().to_string();

    let registry: Arc<dyn Registry> = Arc::new(DockerRegistry::new(endpoint, &certs)?);
    let identity = SelfIdentity::resolve(registry.as_ref(), &hostname).await;

    let rng: Arc<dyn RandomSource> = match args.seed {
        Some(seed) => Arc::new(SeededRandom::new(seed)),
        None => Arc::new(ThreadRandom),
    };

    info!(
        "{}, neuron-mesh {} ({}), self {:?}",
        hostname,
        env!("CARGO_PKG_VERSION"),
        option_env!("GIT_COMMIT_HASH").unwrap_or("unknown"),
        identity
    );

    Ok(new_state(
        registry,
        Arc::new(HttpPeerClient::new(policy.clone())),
        rng,
        identity,
        host,
        policy,
    ))
}

async fn run_web_server(
    bind: &str,
    state: SharedState,
    shutdown_notify: Arc<tokio::sync::Notify>,
) -> Result<(), Box<dyn std::error::Error>> {
    let tcp = TcpListener::bind(bind).await?;
    info!("Listening for incoming on http://{}", tcp.local_addr()?);
    serve_listener(tcp, state, shutdown_notify).await;
    Ok(())
}

async fn serve_listener(
    tcp: TcpListener,
    state: SharedState,
    shutdown_notify: Arc<tokio::sync::Notify>,
) {
    let stream: GenericBoxedStream<Result<TcpStream, std::io::Error>> =
        Box::pin(accept_stream(tcp));

    serve_stream(stream, shutdown_notify, move |stream_result| {
        let state = state.clone();
        task::spawn(async move {
            match stream_result {
                Ok(stream) => handle_connection(stream, state).await,
                Err(e) => error!("Stream error during connection: {}", e),
            }
        })
    })
    .await;
}
