//! Web server for Gatehouse.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;

use super::handlers::AppState;
use super::router::create_router;
use super::session::SessionStore;
use crate::config::ServerConfig;
use crate::error::{GatehouseError, Result};

/// Idle session sweep interval.
const SESSION_SWEEP_INTERVAL_SECS: u64 = 300;

/// Web server for the login endpoints and the protected API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    state: AppState,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &ServerConfig, state: AppState) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| {
                GatehouseError::Config(format!(
                    "invalid server address {}:{}: {e}",
                    config.host, config.port
                ))
            })?;

        Ok(Self { addr, state })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Periodically drop idle sessions.
    fn start_session_sweep_task(sessions: std::sync::Arc<SessionStore>) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(SESSION_SWEEP_INTERVAL_SECS));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;
                let purged = sessions.purge_idle();
                if purged > 0 {
                    tracing::info!(purged_count = purged, "Purged idle sessions");
                } else {
                    tracing::debug!("No idle sessions to purge");
                }
            }
        });
    }

    async fn bind(self) -> Result<(TcpListener, axum::Router, SocketAddr)> {
        let sessions = self.state.sessions.clone();
        let router = create_router(self.state);

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        Self::start_session_sweep_task(sessions);
        tracing::info!("Web server listening on http://{}", local_addr);

        Ok((listener, router, local_addr))
    }

    /// Run the web server.
    pub async fn run(self) -> Result<()> {
        let (listener, router, _) = self.bind().await?;
        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let (listener, router, local_addr) = self.bind().await?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
