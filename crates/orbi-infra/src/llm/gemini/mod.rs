//! Google Gemini generation backend.
//!
//! Provides [`GeminiBackend`], which calls the Generative Language
//! `generateContent` REST endpoint directly with reqwest.

pub mod client;
pub mod types;

pub use client::GeminiBackend;
