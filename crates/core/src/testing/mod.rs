//! Testing utilities and in-memory implementations of the external seams.
//!
//! These stand in for the cache, the generation service and the broker so
//! the processor and consumer loop can be exercised without infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ticketrelay_core::testing::{fixtures, MemoryCache, MockGenerationClient, MockSink};
//!
//! let generator = Arc::new(MockGenerationClient::new());
//! generator.push_response(&fixtures::ticket_response("Stolen card"));
//!
//! let sink = Arc::new(MockSink::new());
//! // ... build a TicketProcessor, process a request ...
//! assert_eq!(sink.sent_json()[0]["ticketId"], "T-1");
//! ```

mod memory_cache;
mod mock_broker;
mod mock_generation;

pub use memory_cache::{MemoryCache, RecordedWrite};
pub use mock_broker::{MockAcker, MockSink};
pub use mock_generation::MockGenerationClient;

/// Test fixtures and helper functions.
pub mod fixtures {
    use serde_json::json;

    use crate::ticket::InboundRequest;

    /// A request with no customer details.
    pub fn inbound(user_input: &str, ticket_id: &str) -> InboundRequest {
        InboundRequest::new(user_input, ticket_id)
    }

    /// Wire bytes for an inbound request.
    pub fn inbound_body(user_input: &str, ticket_id: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "userInput": user_input,
            "customerName": null,
            "customerId": null,
            "ticketId": ticket_id,
        }))
        .unwrap()
    }

    /// A complete structured ticket as the generation service would return it.
    pub fn ticket_response(title: &str) -> String {
        json!({
            "title": title,
            "description": format!("Customer reports: {}", title.to_lowercase()),
            "severity": "High",
            "typeOfTicket": "Assistance",
            "impactedDepartment": "Card Services",
            "impactedService": "Debit Cards",
            "customerName": "",
            "customerId": "",
            "resolutionSuggestion": "Verify identity and follow the card services runbook.",
            "preferredCommunication": ""
        })
        .to_string()
    }

    /// An out-of-domain rejection.
    pub fn rejection_response() -> String {
        json!({
            "error": "Non-banking query rejected",
            "message": "I can only help with banking related requests.",
            "isBankingRelated": false,
            "confidenceScore": 0.0
        })
        .to_string()
    }
}
