//! HTTP API layer for Orbi.
//!
//! Axum routes under `/api/` for the mini-app front-end, authenticated with
//! Telegram init data, plus `/health` and static SPA serving.

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod router;
