//! Generation backend abstractions for Orbi.
//!
//! - `GenerationBackend`: RPITIT trait for concrete backend implementations
//! - `BoxGenerationBackend`: Object-safe wrapper for runtime backend selection

pub mod backend;
pub mod box_backend;

pub use backend::GenerationBackend;
pub use box_backend::BoxGenerationBackend;
