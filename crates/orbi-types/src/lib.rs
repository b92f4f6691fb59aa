//! Shared domain types for Orbi.
//!
//! This crate contains the core domain types used across the relay:
//! message bodies, chat sessions, transport updates, generation turns,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod message;
pub mod transport;
