use cadence::prelude::*;
use cadence::{MetricError, StatsdClient, UdpMetricSink};
use rand::distr::StandardUniform;
use rand::Rng;
use std::net::UdpSocket;
use std::sync::Arc;
use tracing::info;

/// Destination for the counter increments produced from webhook events.
///
/// Implementations are shared across concurrently handled requests.
pub trait MetricSink: Send + Sync {
    fn increment(&self, metric: &str, tags: &[String], sample_rate: f64)
        -> Result<(), SinkError>;
}

pub type DynMetricSink = Arc<dyn MetricSink>;

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("failed to send metric to statsd: {0}")]
    Statsd(#[from] MetricError),
    #[error("{0}")]
    Other(String),
}

/// Sends DogStatsD counters over UDP, one datagram per sampled increment.
pub struct StatsdSink {
    client: StatsdClient,
}

impl StatsdSink {
    /// Builds a sink for the daemon at `addr` (`host:port`). The address is
    /// resolved once, here.
    pub fn new(addr: &str) -> Result<Self, SinkError> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(MetricError::from)?;
        socket.set_nonblocking(true).map_err(MetricError::from)?;
        let sink = UdpMetricSink::from(addr, socket)?;

        info!("reporting metrics to statsd at {}", addr);

        // metric names are fully formed by the caller, so the client adds no prefix
        Ok(StatsdSink {
            client: StatsdClient::from_sink("", sink),
        })
    }
}

/// Decides client-side whether an increment is sent. The daemon scales
/// counters tagged `@rate` by `1 / rate`, so unsampled sends would inflate them.
fn should_send(sample_rate: f64) -> bool {
    if sample_rate <= 0.0 {
        false
    } else if sample_rate >= 1.0 {
        true
    } else {
        let s: f64 = rand::rng().sample(StandardUniform);
        s <= sample_rate
    }
}

impl MetricSink for StatsdSink {
    fn increment(
        &self,
        metric: &str,
        tags: &[String],
        sample_rate: f64,
    ) -> Result<(), SinkError> {
        if !should_send(sample_rate) {
            return Ok(());
        }

        let mut builder = self.client.count_with_tags(metric, 1i64);
        for tag in tags {
            builder = builder.with_tag_value(tag);
        }
        if sample_rate < 1.0 {
            builder = builder.with_sampling_rate(sample_rate);
        }
        builder.try_send()?;
        Ok(())
    }
}
