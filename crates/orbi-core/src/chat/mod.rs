//! Chat session and message persistence abstractions for Orbi.
//!
//! This module defines the `MessageStore` trait that the infrastructure
//! layer implements for message bodies, sessions and session messages.

pub mod repository;
