//! Infrastructure layer for Orbi.
//!
//! Contains implementations of the ports defined in `orbi-core`: the SQLite
//! message store, the Gemini and OpenAI-compatible generation backends, the
//! Telegram Bot API transport, plus config loading and the cryptographic
//! helpers (SHA-256 body addressing, mini-app init data verification).

pub mod config;
pub mod crypto;
pub mod llm;
pub mod sqlite;
pub mod telegram;
