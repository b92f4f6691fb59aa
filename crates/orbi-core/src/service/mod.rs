//! Shared services that do not belong to a single component.

pub mod hash;
