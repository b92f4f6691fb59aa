//! Business logic and port trait definitions for Orbi.
//!
//! This crate defines the "ports" (store, generation backend, chat transport)
//! that the infrastructure layer implements, plus the services built on them:
//! the retry-wrapped gateway, the update dispatcher and the retention sweeper.
//! It depends only on `orbi-types` -- never on `orbi-infra` or any
//! database/IO crate.

pub mod chat;
pub mod dispatch;
pub mod gateway;
pub mod llm;
pub mod retention;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;
