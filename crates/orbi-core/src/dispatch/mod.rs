//! Update dispatch: transport port, per-update handling, reply formatting
//! and the typing keepalive.

pub mod dispatcher;
pub mod keepalive;
pub mod reply;
pub mod transport;

pub use dispatcher::{DispatchError, DispatchSettings, Poll, UpdateDispatcher};
pub use reply::ReplyFormatter;
pub use transport::ChatTransport;
