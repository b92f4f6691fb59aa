//! Cryptographic operations for Orbi.
//!
//! - `hash`: SHA-256 content hashing for message body addresses
//! - `init_data`: HMAC verification of Telegram mini-app init data

pub mod hash;
pub mod init_data;
