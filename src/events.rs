use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

/// A single notification from the SendGrid Event Webhook.
///
/// Only `event` is required. Every other field falls back to its empty value
/// when absent or `null`, and fields the schema doesn't declare are ignored.
/// See https://docs.sendgrid.com/for-developers/tracking-events/event
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timestamp: i64,
    #[serde(
        rename = "smtp-id",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub smtp_id: String,
    pub event: String,
    // Categories can be arrays or strings depending on the SendGrid account configuration
    #[serde(
        default,
        deserialize_with = "one_or_many",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub category: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sg_event_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sg_message_id: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub useragent: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub url: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "is_zero"
    )]
    pub asm_group_id: i64,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub reason: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub response: String,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub status: String,
}

/// The events delivered by one webhook call, in delivery order.
pub type EventBatch = Vec<Event>;

#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("invalid webhook payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid webhook payload: event #{index} has an empty event type")]
    EmptyEventType { index: usize },
}

/// Decodes a webhook request body into a batch of events.
///
/// The body must be a JSON array of event objects. A single bad record fails
/// the whole batch rather than being skipped.
pub fn decode(raw: &[u8]) -> Result<EventBatch, DecodeError> {
    let batch: EventBatch = serde_json::from_slice(raw)?;

    if let Some(index) = batch.iter().position(|e| e.event.is_empty()) {
        return Err(DecodeError::EmptyEventType { index });
    }

    debug!(events = batch.len(), "decoded webhook batch");
    Ok(batch)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
        None => Vec::new(),
    })
}

fn is_zero(value: &i64) -> bool {
    *value == 0
}
