//! Ingress HTTP producer: accepts support requests and enqueues them for the worker.

pub mod api;
pub mod metrics;
pub mod state;

pub use api::create_router;
pub use state::AppState;
