//! Sink server: accept loop, sweeper and shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::handlers::{route_request, AppState};
use crate::store::{CaptureStore, Sweeper};
use crate::Result;

use super::SHUTDOWN_TIMEOUT_MS;

/// Handle used to stop a running [`SinkServer`]
#[derive(Clone)]
pub struct ShutdownHandle {
    shutdown_tx: broadcast::Sender<()>,
}

impl ShutdownHandle {
    /// Ask the server to stop accepting and drain
    pub fn shutdown(&self) {
        self.shutdown_tx.send(()).ok();
    }
}

/// HTTP server in front of one capture store
pub struct SinkServer {
    listener: TcpListener,
    state: Arc<AppState>,
    sweep_interval: Duration,
    shutdown_tx: broadcast::Sender<()>,
    // subscribed at bind so a shutdown sent before `run` is not lost
    shutdown_rx: broadcast::Receiver<()>,
}

impl SinkServer {
    /// Validate `config`, build the store and bind the listener
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the address cannot be bound
    pub async fn bind(config: &Config) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(CaptureStore::new(config.capacity, config.effective_ttl()));
        let state = Arc::new(AppState::from_config(config, store)?);
        let listener = TcpListener::bind(config.listen_addr()).await?;
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Ok(Self {
            listener,
            state,
            sweep_interval: config.sweep_interval,
            shutdown_tx,
            shutdown_rx,
        })
    }

    /// Address the listener is bound to
    ///
    /// # Errors
    ///
    /// Returns error if the socket address cannot be read
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Store backing this server
    #[must_use]
    pub fn store(&self) -> Arc<CaptureStore> {
        Arc::clone(&self.state.store)
    }

    /// Handle that stops [`run`](Self::run) from another task
    #[must_use]
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown_tx: self.shutdown_tx.clone(),
        }
    }

    /// Serve until Ctrl-C or a shutdown signal
    ///
    /// # Errors
    ///
    /// Returns error if the listener address cannot be read or the sweep
    /// interval is zero
    pub async fn run(mut self) -> Result<()> {
        let addr = self.local_addr()?;
        info!("listening on {}", addr);
        if let Some(mirror) = &self.state.mirror {
            info!("mirroring captured requests to {}", mirror.base_url());
        }

        let sweeper = Sweeper::new(self.store(), self.sweep_interval)?
            .spawn(self.shutdown_tx.subscribe());

        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let io = TokioIo::new(stream);
                            let state = Arc::clone(&self.state);
                            let mut conn_shutdown = self.shutdown_tx.subscribe();

                            connections.spawn(async move {
                                let service = service_fn(move |req| {
                                    let state = Arc::clone(&state);
                                    async move { route_request(req, state).await }
                                });

                                let conn = http1::Builder::new().serve_connection(io, service);
                                tokio::pin!(conn);

                                let result = tokio::select! {
                                    result = conn.as_mut() => result,
                                    _ = conn_shutdown.recv() => {
                                        // finish the in-flight request, close idle keep-alives
                                        conn.as_mut().graceful_shutdown();
                                        conn.await
                                    }
                                };

                                if let Err(e) = result {
                                    debug!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                Some(result) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = result {
                        warn!("Connection task failed: {}", e);
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received SIGINT, shutting down");
                    break;
                }
                _ = self.shutdown_rx.recv() => {
                    info!("Received shutdown signal");
                    break;
                }
            }
        }

        // Stop the sweeper and anyone else listening
        self.shutdown_tx.send(()).ok();

        let shutdown_timeout = Duration::from_millis(SHUTDOWN_TIMEOUT_MS);
        let drained = tokio::time::timeout(shutdown_timeout, async {
            while let Some(result) = connections.join_next().await {
                if let Err(e) = result {
                    warn!("Task cleanup error: {}", e);
                }
            }
        })
        .await;

        if drained.is_err() {
            warn!("Aborting {} open connection(s)", connections.len());
            connections.abort_all();
        }

        if let Some(sweeper) = sweeper {
            sweeper.await.ok();
        }

        info!("Shutdown complete");
        Ok(())
    }
}
