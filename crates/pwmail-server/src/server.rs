//! Mail server

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use chrono::{DateTime, Utc};
use pwmail_auth::{LedgerError, NonceLedger, RequestPipeline};
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api::{create_router, ApiState};
use crate::config::ServerConfig;
use crate::metrics::MailMetrics;
use crate::service::MailService;
use crate::store::SqliteStore;

/// Drop nonce records older than `retention` before `now`.
///
/// A record past `retention` can no longer be matched by any request that
/// passes the freshness check, so removing it never re-opens a replay.
pub async fn compact_nonces(
    ledger: &dyn NonceLedger,
    retention: Duration,
    now: DateTime<Utc>,
) -> Result<usize, LedgerError> {
    let cutoff = chrono::Duration::from_std(retention)
        .ok()
        .and_then(|retention| now.checked_sub_signed(retention));
    match cutoff {
        Some(cutoff) => ledger.prune_before(cutoff).await,
        None => Ok(0),
    }
}

/// Mail server
pub struct MailServer {
    config: ServerConfig,
    store: Arc<SqliteStore>,
    service: Arc<MailService>,
    metrics: Arc<MailMetrics>,
    shutdown_tx: watch::Sender<bool>,
}

impl MailServer {
    /// Open the database and wire up the service
    pub async fn new(config: ServerConfig) -> Result<Self> {
        config.validate()?;

        let store = Arc::new(SqliteStore::new(&config.database_path).await?);
        let pipeline = RequestPipeline::new(store.clone(), config.freshness_gate());
        let service = Arc::new(MailService::new(pipeline, store.clone(), config.max_page_size));
        let metrics = Arc::new(MailMetrics::new()?);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Self {
            config,
            store,
            service,
            metrics,
            shutdown_tx,
        })
    }

    /// HTTP router with request tracing
    pub fn router(&self) -> Router {
        let state = ApiState {
            service: self.service.clone(),
            metrics: self.metrics.clone(),
        };
        create_router(state).layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    /// Run until SIGINT, SIGTERM or [`MailServer::shutdown`]
    pub async fn run(&self) -> Result<()> {
        info!("Starting mail server on {}", self.config.listen_addr);

        match self.config.compaction_interval() {
            Some(interval) => {
                let ledger: Arc<dyn NonceLedger> = self.store.clone();
                tokio::spawn(Self::compaction_task(
                    ledger,
                    interval,
                    self.config.freshness_gate().retention(),
                    self.metrics.clone(),
                    self.shutdown_tx.subscribe(),
                ));
            }
            None => info!("Nonce compaction disabled"),
        }

        let listener = tokio::net::TcpListener::bind(self.config.listen_addr).await?;
        info!("HTTP server listening on {}", self.config.listen_addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(Self::shutdown_signal(self.shutdown_tx.subscribe()))
            .await?;

        // Stop the compactor along with the listener
        self.shutdown();

        info!("Mail server stopped");
        Ok(())
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn compaction_task(
        ledger: Arc<dyn NonceLedger>,
        every: Duration,
        retention: Duration,
        metrics: Arc<MailMetrics>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match compact_nonces(ledger.as_ref(), retention, Utc::now()).await {
                        Ok(0) => {}
                        Ok(removed) => {
                            metrics.nonces_pruned.inc_by(removed as f64);
                            info!("Pruned {} expired nonce records", removed);
                        }
                        Err(e) => error!("Nonce compaction failed: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender means the server is gone
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }

    async fn shutdown_signal(mut shutdown: watch::Receiver<bool>) {
        #[cfg(unix)]
        let mut sigterm = {
            use tokio::signal::unix::{signal, SignalKind};
            signal(SignalKind::terminate()).ok()
        };

        tokio::select! {
            _ = async {
                #[cfg(unix)]
                {
                    match sigterm.as_mut() {
                        Some(sigterm) => { sigterm.recv().await; }
                        None => std::future::pending::<()>().await,
                    }
                }
                #[cfg(not(unix))]
                {
                    std::future::pending::<()>().await;
                }
            } => {
                info!("Received SIGTERM, starting graceful shutdown");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received SIGINT, starting graceful shutdown");
            }
            _ = shutdown.changed() => {
                info!("Shutdown requested");
            }
        }
    }
}
