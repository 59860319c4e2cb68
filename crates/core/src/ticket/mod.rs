//! Ticket data model: inbound support requests and the structured documents
//! produced for them.

mod document;
mod request;

pub use document::{
    extract_json_object, DocumentKind, RejectionNotice, ResponseParseError, StructuredTicket,
    TicketDocument, ERROR_FIELD, TICKET_ID_FIELD,
};
pub use request::{InboundRequest, MessageError};
