//! Pod image spec webhook server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use podimagespec_webhook::cluster::LazyKubeClient;
use podimagespec_webhook::mutator::PodImageMutator;
use podimagespec_webhook::registration::{
    mutating_webhook_configuration, ServiceTarget, POD_IMAGE_SPEC_WEBHOOK,
};
use podimagespec_webhook::server::{start_server, ServerConfig};
use podimagespec_webhook::telemetry::{init_telemetry, LogFormat, TelemetryConfig};
use podimagespec_webhook::webhook::WebhookState;
use podimagespec_webhook::DEFAULT_LISTEN_ADDR;

/// Mutating admission webhook redirecting internal registry images
#[derive(Parser, Debug)]
#[command(name = "podimagespec-webhook", version, about, long_about = None)]
struct Cli {
    /// Log output format
    #[arg(
        long,
        env = "PODIMAGESPEC_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Json,
        global = true
    )]
    log_format: LogFormat,

    #[command(flatten)]
    serve: ServeArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the MutatingWebhookConfiguration manifest and exit
    Manifest(ManifestArgs),
}

/// Serve mode arguments
#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "PODIMAGESPEC_LISTEN_ADDR", default_value = DEFAULT_LISTEN_ADDR)]
    listen_addr: SocketAddr,

    /// Path to the PEM serving certificate
    #[arg(long, env = "PODIMAGESPEC_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    /// Path to the PEM serving key
    #[arg(long, env = "PODIMAGESPEC_TLS_KEY")]
    tls_key: Option<PathBuf>,
}

/// Manifest mode arguments
#[derive(Args, Debug)]
struct ManifestArgs {
    /// Name of the Service fronting the webhook
    #[arg(long, default_value = "podimagespec-webhook")]
    service_name: String,

    /// Namespace of the Service fronting the webhook
    #[arg(long, default_value = "openshift-validation-webhook")]
    service_namespace: String,

    /// Port of the Service fronting the webhook
    #[arg(long, default_value_t = 443)]
    service_port: i32,

    /// PEM CA bundle to embed; omit when it is injected by the service CA
    #[arg(long)]
    ca_bundle_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("CRITICAL: Failed to install crypto provider: {:?}", e);
        std::process::exit(1);
    }

    let cli = Cli::parse();

    init_telemetry(TelemetryConfig {
        format: cli.log_format,
        ..Default::default()
    })?;

    match cli.command {
        Some(Commands::Manifest(args)) => print_manifest(args),
        None => run_server(cli.serve).await,
    }
}

fn print_manifest(args: ManifestArgs) -> anyhow::Result<()> {
    let ca_bundle = args
        .ca_bundle_file
        .map(std::fs::read)
        .transpose()
        .map_err(|e| anyhow::anyhow!("Failed to read CA bundle: {}", e))?;

    let service = ServiceTarget {
        name: args.service_name,
        namespace: args.service_namespace,
        port: args.service_port,
    };
    let config = mutating_webhook_configuration(&POD_IMAGE_SPEC_WEBHOOK, &service, ca_bundle);
    let yaml = serde_yaml::to_string(&config)
        .map_err(|e| anyhow::anyhow!("Failed to serialize webhook configuration: {}", e))?;
    println!("{yaml}");
    Ok(())
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    let config = ServerConfig::new(args.listen_addr, args.tls_cert, args.tls_key)?;

    // Connects on the first admission request that needs the cluster
    let client = Arc::new(LazyKubeClient::new());
    let state = Arc::new(WebhookState::new(PodImageMutator::new(client)));

    start_server(config, state).await?;
    Ok(())
}
