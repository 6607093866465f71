// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `courier serve` command implementation.
//!
//! Opens storage, binds a console adapter to every connected instance, and
//! runs the periodic workers (send queue dispatcher and stale-lock sweeper)
//! until Ctrl-C. The flow engine and campaign runner are driven by the
//! surrounding HTTP layer in a full deployment; under `serve` alone the
//! queue drains whatever is persisted.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use courier_config::CourierConfig;
use courier_core::{ChannelKind, CourierError};
use courier_dispatch::{
    AdapterRegistry, LockService, MemoryCounterStore, QueueDispatcher, RateLimiter,
};
use courier_flow::FlowEngine;
use courier_storage::queries::instances;
use courier_storage::Database;

use crate::console::ConsoleAdapter;

pub async fn run_serve(config: CourierConfig) -> Result<(), CourierError> {
    init_tracing(&config.log.level);
    info!("starting courier serve");

    if let Some(parent) = std::path::Path::new(&config.storage.database_path).parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| CourierError::Storage { source: Box::new(e) })?;
    }
    let db = Database::open(&config.storage.database_path).await?;
    info!(path = %config.storage.database_path, "storage ready");

    // Console adapters stand in for real providers so `serve` is runnable
    // end-to-end out of the box.
    let registry = Arc::new(AdapterRegistry::new());
    for instance in instances::list_connected(&db).await? {
        match ChannelKind::from_str(&instance.channel) {
            Ok(kind) => {
                registry.register(&instance.id, Arc::new(ConsoleAdapter::new(kind)));
                info!(instance_id = %instance.id, channel = %instance.channel, "console adapter bound");
            }
            Err(_) => {
                warn!(instance_id = %instance.id, channel = %instance.channel, "unknown channel kind, skipping");
            }
        }
    }

    let locks = Arc::new(LockService::new(db.clone(), config.lock.clone()));
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(MemoryCounterStore::new()),
        config.rates.clone(),
    ));
    let dispatcher = Arc::new(QueueDispatcher::new(
        db.clone(),
        locks,
        limiter.clone(),
        registry.clone(),
        config.dispatch.clone(),
    ));

    // The inbound entry point for whatever event source is wired on top.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.request_timeout_secs))
        .build()
        .map_err(|e| CourierError::Internal(format!("http client: {e}")))?;
    let _engine = FlowEngine::new(db.clone(), registry.clone(), http);

    let cancel = CancellationToken::new();
    let dispatch_task = {
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    };
    let sweep_task = {
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run_sweeper(cancel).await })
    };

    info!("workers running, press Ctrl-C to stop");
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
    }

    info!("shutting down");
    cancel.cancel();
    let _ = dispatch_task.await;
    let _ = sweep_task.await;
    db.close().await?;
    info!("courier stopped");
    Ok(())
}

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
