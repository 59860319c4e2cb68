//! Inbound support requests as they travel on the inbound queue.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why an inbound message was rejected before processing.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("Message body is not a JSON object")]
    NotAnObject,

    #[error("Invalid field: {0}")]
    InvalidField(String),

    #[error("Missing required field 'userInput'")]
    MissingUserInput,

    #[error("Missing required field 'ticketId'")]
    MissingTicketId,
}

impl MessageError {
    /// True when the body could not be decoded at all, as opposed to
    /// decoding fine but lacking a required field.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::InvalidJson(_) | Self::NotAnObject | Self::InvalidField(_)
        )
    }
}

/// One customer support submission.
///
/// Wire format:
/// `{ "userInput": str, "customerName": str|null, "customerId": str|null, "ticketId": str }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundRequest {
    pub user_input: String,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub ticket_id: String,
}

/// Lenient shape used while decoding, so missing fields can be reported
/// as such instead of as a generic parse failure.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInbound {
    #[serde(default)]
    user_input: Option<String>,
    #[serde(default)]
    customer_name: Option<String>,
    #[serde(default)]
    customer_id: Option<String>,
    #[serde(default)]
    ticket_id: Option<String>,
}

impl InboundRequest {
    pub fn new(user_input: impl Into<String>, ticket_id: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            customer_name: None,
            customer_id: None,
            ticket_id: ticket_id.into(),
        }
    }

    pub fn with_customer_name(mut self, name: impl Into<String>) -> Self {
        self.customer_name = Some(name.into());
        self
    }

    pub fn with_customer_id(mut self, id: impl Into<String>) -> Self {
        self.customer_id = Some(id.into());
        self
    }

    /// Decode and validate a raw message body.
    ///
    /// A request without a non-empty `userInput` and `ticketId` is rejected;
    /// such a message must never reach the processor.
    pub fn decode(body: &[u8]) -> Result<Self, MessageError> {
        let value: Value =
            serde_json::from_slice(body).map_err(|e| MessageError::InvalidJson(e.to_string()))?;

        if !value.is_object() {
            return Err(MessageError::NotAnObject);
        }

        let raw: RawInbound =
            serde_json::from_value(value).map_err(|e| MessageError::InvalidField(e.to_string()))?;

        let user_input = raw
            .user_input
            .filter(|s| !s.is_empty())
            .ok_or(MessageError::MissingUserInput)?;
        let ticket_id = raw
            .ticket_id
            .filter(|s| !s.is_empty())
            .ok_or(MessageError::MissingTicketId)?;

        Ok(Self {
            user_input,
            customer_name: raw.customer_name,
            customer_id: raw.customer_id,
            ticket_id,
        })
    }

    /// Serialize to the wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
