//! Structured ticket documents returned by the generation service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field the worker injects with the requesting message's ticket id.
pub const TICKET_ID_FIELD: &str = "ticketId";

/// Presence of this field marks an error/rejection document.
pub const ERROR_FIELD: &str = "error";

/// Errors decoding a JSON object out of free-form text.
#[derive(Debug, Error)]
pub enum ResponseParseError {
    #[error("No JSON object found in response")]
    NoJsonObject,

    #[error("Malformed JSON: {0}")]
    Malformed(String),

    #[error("JSON value is not an object")]
    NotAnObject,
}

/// Decode the first JSON object embedded in `text`.
///
/// Decoding starts at the first `{`; any narration before it and any text
/// after the object is ignored.
pub fn extract_json_object(text: &str) -> Result<Map<String, Value>, ResponseParseError> {
    let start = text.find('{').ok_or(ResponseParseError::NoJsonObject)?;

    let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match values.next() {
        Some(Ok(Value::Object(map))) => Ok(map),
        Some(Ok(_)) => Err(ResponseParseError::NotAnObject),
        Some(Err(e)) => Err(ResponseParseError::Malformed(e.to_string())),
        None => Err(ResponseParseError::NoJsonObject),
    }
}

/// Which of the two outbound shapes a document has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// A structured support ticket.
    Ticket,
    /// An error or out-of-domain rejection.
    Rejection,
}

/// An outbound ticket document.
///
/// Kept as an untyped JSON object so fields the generation service adds
/// pass through to consumers untouched. [`StructuredTicket`] and
/// [`RejectionNotice`] give typed views of the two expected shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketDocument(Map<String, Value>);

impl TicketDocument {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Parse a generation response body.
    pub fn from_generation_text(text: &str) -> Result<Self, ResponseParseError> {
        extract_json_object(text).map(Self)
    }

    /// Parse a document previously written to the cache. The whole string must be one object.
    pub fn from_json_str(json: &str) -> Result<Self, ResponseParseError> {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err(ResponseParseError::NotAnObject),
            Err(e) => Err(ResponseParseError::Malformed(e.to_string())),
        }
    }

    /// Set `ticketId`, replacing whatever value was there.
    pub fn with_ticket_id(mut self, ticket_id: &str) -> Self {
        self.0.insert(
            TICKET_ID_FIELD.to_string(),
            Value::String(ticket_id.to_string()),
        );
        self
    }

    pub fn ticket_id(&self) -> Option<&str> {
        self.0.get(TICKET_ID_FIELD).and_then(Value::as_str)
    }

    pub fn is_error(&self) -> bool {
        self.0.contains_key(ERROR_FIELD)
    }

    pub fn kind(&self) -> DocumentKind {
        if self.is_error() {
            DocumentKind::Rejection
        } else {
            DocumentKind::Ticket
        }
    }

    /// Copy suitable for the cache: everything except the per-request `ticketId`.
    pub fn cacheable(&self) -> Self {
        let mut fields = self.0.clone();
        fields.remove(TICKET_ID_FIELD);
        Self(fields)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Typed view of a ticket-shaped document.
    pub fn as_ticket(&self) -> Option<StructuredTicket> {
        if self.is_error() {
            return None;
        }
        serde_json::from_value(Value::Object(self.0.clone())).ok()
    }

    /// Typed view of a rejection-shaped document.
    pub fn as_rejection(&self) -> Option<RejectionNotice> {
        if !self.is_error() {
            return None;
        }
        serde_json::from_value(Value::Object(self.0.clone())).ok()
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.0)
    }
}

/// The structured ticket shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StructuredTicket {
    pub title: String,
    pub description: String,
    /// Low | Medium | High | Critical
    pub severity: String,
    /// Complaint | Inquiry | Assistance
    pub type_of_ticket: String,
    pub impacted_department: String,
    pub impacted_service: String,
    pub customer_name: String,
    pub customer_id: String,
    pub resolution_suggestion: String,
    pub preferred_communication: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
}

/// Out-of-domain rejection shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionNotice {
    pub error: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub is_banking_related: bool,
    #[serde(default)]
    pub confidence_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
}
