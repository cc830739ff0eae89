//! mesos-solr
//!
//! Registers the framework with the configured masters and keeps running
//! until the stream ends or the process is interrupted. `SIGINT` leaves the
//! framework registered unless `MESOS_SOLR_TEARDOWN_ON_EXIT` is set.

use anyhow::Result;
use mesos_solr_scheduler::{Config, Scheduler};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.as_str().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!(
        masters = %config.masters.join(","),
        framework = %config.framework_name,
        user = %config.user,
        "Starting mesos-solr scheduler"
    );

    let teardown_on_exit = config.teardown_on_exit;
    let mut scheduler = Scheduler::new(config)?;
    let handle = scheduler.handle();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
            return;
        }
        info!("Received shutdown signal");
        if teardown_on_exit {
            handle.teardown();
        } else {
            handle.stop();
        }
    });

    match scheduler.run().await {
        Ok(()) => {
            info!(state = ?scheduler.state(), "Scheduler stopped");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Scheduler exited with an error");
            Err(e.into())
        }
    }
}
