//! Background retention of message bodies.

pub mod sweeper;

pub use sweeper::{RetentionSweeper, SweeperState};
