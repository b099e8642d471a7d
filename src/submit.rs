use crate::events::Event;
use crate::sink::{MetricSink, SinkError};
use tracing::debug;

/// The first failed increment of a batch.
#[derive(thiserror::Error, Debug)]
#[error("failed to submit event #{index} (event={event}, sg_event_id={sg_event_id}): {source}")]
pub struct SubmissionError {
    pub index: usize,
    pub event: String,
    pub sg_event_id: String,
    pub source: SinkError,
}

/// Turns decoded events into counter increments on a [`MetricSink`].
pub struct Submitter<'a> {
    sink: &'a dyn MetricSink,
    prefix: &'a str,
    sample_rate: f64,
}

impl<'a> Submitter<'a> {
    pub fn new(sink: &'a dyn MetricSink, prefix: &'a str, sample_rate: f64) -> Self {
        Submitter {
            sink,
            prefix,
            sample_rate,
        }
    }

    /// The event type is appended to the prefix as-is.
    pub fn metric_name(&self, event: &Event) -> String {
        format!("{}{}", self.prefix, event.event)
    }

    /// Issues one increment per event, in order. Stops at the first sink
    /// failure; increments already sent are not undone.
    pub fn submit(&self, events: &[Event]) -> Result<(), SubmissionError> {
        for (index, event) in events.iter().enumerate() {
            let metric = self.metric_name(event);
            let tags = tags(event);

            self.sink
                .increment(&metric, &tags, self.sample_rate)
                .map_err(|source| SubmissionError {
                    index,
                    event: event.event.clone(),
                    sg_event_id: event.sg_event_id.clone(),
                    source,
                })?;

            debug!(metric = %metric, tags = ?tags, "metric incremented");
        }

        Ok(())
    }
}

/// Tags for one event: every category, then `reason`, then `response`.
///
/// `response` is reported under the `reason` key as well.
pub fn tags(event: &Event) -> Vec<String> {
    let mut tags: Vec<String> = event
        .category
        .iter()
        .map(|category| format!("category:{}", category))
        .collect();

    if !event.reason.is_empty() {
        tags.push(format!("reason:{}", event.reason));
    }
    if !event.response.is_empty() {
        tags.push(format!("reason:{}", event.response));
    }

    tags
}
