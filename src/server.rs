//! Webhook HTTP(S) server

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum_server::tls_rustls::RustlsConfig;
use tracing::info;

use crate::webhook::{webhook_router, WebhookState};
use crate::{Error, Result};

/// Serving certificate and key on disk
#[derive(Clone, Debug)]
pub struct TlsFiles {
    /// PEM certificate chain
    pub cert: PathBuf,
    /// PEM private key
    pub key: PathBuf,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind the server
    pub addr: SocketAddr,
    /// TLS material; plain HTTP when absent
    pub tls: Option<TlsFiles>,
}

impl ServerConfig {
    /// Build a config from optional cert/key paths, which must be given together
    pub fn new(addr: SocketAddr, cert: Option<PathBuf>, key: Option<PathBuf>) -> Result<Self> {
        let tls = match (cert, key) {
            (Some(cert), Some(key)) => Some(TlsFiles { cert, key }),
            (None, None) => None,
            _ => {
                return Err(Error::config(
                    "--tls-cert and --tls-key must be provided together",
                ))
            }
        };
        Ok(Self { addr, tls })
    }
}

/// Serve the webhook until the listener fails
pub async fn start_server(config: ServerConfig, state: Arc<WebhookState>) -> Result<()> {
    let app = webhook_router(state);

    match config.tls {
        Some(tls) => {
            let tls_config = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(|e| Error::config(format!("TLS config error: {}", e)))?;

            info!(addr = %config.addr, "Starting webhook server (TLS)");
            axum_server::bind_rustls(config.addr, tls_config)
                .serve(app.into_make_service())
                .await
                .map_err(|e| Error::internal(format!("Server error: {}", e)))?;
        }
        None => {
            let listener = tokio::net::TcpListener::bind(config.addr)
                .await
                .map_err(|e| Error::config(format!("failed to bind {}: {}", config.addr, e)))?;

            info!(addr = %config.addr, "Starting webhook server (plain HTTP)");
            axum::serve(listener, app)
                .await
                .map_err(|e| Error::internal(format!("Server error: {}", e)))?;
        }
    }

    Ok(())
}
