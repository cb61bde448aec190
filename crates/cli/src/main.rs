//! Provisioning worker entry point.
//!
//! Composition root of the system:
//!
//! 1. Parse [`config::Config`] from flags and environment.
//! 2. Install the tracing subscriber (JSON or pretty, optional OTLP export).
//! 3. Build the [`BackendRegistry`] with one GitLab client per instance and
//!    the optional Jenkins client. Any configuration error stops startup.
//! 4. Run the [`ConsumerPool`] until SIGINT or SIGTERM, then drain in-flight
//!    messages within the shutdown grace period.

mod config;
mod shutdown;
mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use gitlab::GitLabClient;
use jenkins::JenkinsClient;
use listener::{ConsumerPool, DeliveryHandler};
use provisioning::{BackendRegistry, Dispatcher, GitLabApi, JenkinsApi};
use tracing::{error, info, warn};

use crate::config::Config;

/// Time allowed on top of the grace period for closing the connection.
const CLOSE_MARGIN: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    let _telemetry = telemetry::init(
        config.log_format,
        &config.service_name,
        config.otlp_endpoint.as_deref(),
    )?;

    if let Err(err) = run(config).await {
        error!(error = ?err, "provisioner stopped with an error");
        return Err(err);
    }
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    let settings = config.registry_settings(|key| std::env::var(key).ok())?;
    let registry = BackendRegistry::build(
        &settings,
        |instance| {
            GitLabClient::new(instance)
                .map(|c| Arc::new(c) as Arc<dyn GitLabApi>)
                .map_err(|e| e.to_string())
        },
        |jenkins| {
            JenkinsClient::new(jenkins)
                .map(|c| Arc::new(c) as Arc<dyn JenkinsApi>)
                .map_err(|e| e.to_string())
        },
    )
    .context("invalid backend configuration")?;

    let instances: Vec<&str> = registry
        .instance_names()
        .into_iter()
        .map(|n| n.as_str())
        .collect();
    info!(
        gitlab_instances = ?instances,
        jenkins = registry.has_jenkins(),
        "backends configured"
    );
    if instances.is_empty() {
        warn!("no GitLab instances configured; every GitLab request will be rejected");
    }

    let handler: Arc<dyn DeliveryHandler> = Arc::new(Dispatcher::new(Arc::new(registry)));
    let pool = ConsumerPool::new(config.broker_config(), config.consumer_config(), handler)
        .context("invalid consumer configuration")?;

    let mut shutdown = shutdown::listen();
    let mut pool_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { pool.run(shutdown).await }
    });

    let result = tokio::select! {
        result = &mut pool_task => result,
        () = shutdown::requested(&mut shutdown) => {
            let deadline = config.shutdown_grace() + CLOSE_MARGIN;
            match tokio::time::timeout(deadline, &mut pool_task).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(?deadline, "consumer pool did not stop in time; exiting");
                    pool_task.abort();
                    return Ok(());
                }
            }
        }
    };

    result.context("consumer pool task failed")?.context("consumer pool stopped")?;
    info!("provisioner stopped");
    Ok(())
}
