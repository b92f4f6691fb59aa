//! Retry-wrapped generation gateway.
//!
//! The gateway sits between the dispatcher and the generation backend: it
//! resolves the user's active session, reads history, calls the backend
//! under a timeout and persists the exchange, retrying whole attempts on
//! transient failure.

pub mod assistant;
pub mod retry;
pub mod service;

pub use assistant::{AskError, Assistant, Exchange};
pub use retry::RetryPolicy;
pub use service::ConversationGateway;
