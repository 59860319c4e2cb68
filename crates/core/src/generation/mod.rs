//! Client for the external text-generation service.
//!
//! The service takes the customer's text and returns a body that should
//! contain one JSON ticket document. This module only moves bytes; turning
//! the body into a document is the processor's job.

mod client;

pub use client::{GenerationClient, GenerationError, GenerationRequest, HttpGenerationClient};
