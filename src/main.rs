use sendgrid_statsd::config;
use sendgrid_statsd::server;
use sendgrid_statsd::sink::StatsdSink;
use std::sync::Arc;
use tracing::{error, info};

type Error = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), Error> {
    sendgrid_statsd::set_up_logging();

    info!(
        "Initializing {} version {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let config = config::Config::load_from_env().map_err(|e| {
        error!("invalid configuration: {}", e);
        e
    })?;

    // without a working metrics path there is nothing useful to serve
    let sink = StatsdSink::new(&config.statsd_addr()).map_err(|e| {
        error!(error = %e, addr = %config.statsd_addr(), "failed to set up statsd sink");
        e
    })?;

    server::serve(&config, Arc::new(sink)).await?;
    Ok(())
}
