//! HTTP request handlers, one module per resource.

pub mod chat;
pub mod messages;
pub mod sessions;
