//! Client wire protocol
//!
//! JSON messages discriminated by a `type` field, exchanged over the
//! WebSocket transport.

pub mod messages;

pub use messages::{InboundCommand, OutboundMessage};
