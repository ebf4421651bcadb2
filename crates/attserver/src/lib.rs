//! attserver - Bluetooth LE Attribute Protocol server core
//!
//! This library turns ATT request PDUs into bounded operations against an
//! attribute database and produces the response the peer expects. It covers
//! request validation, multi-result searches, prepare/execute write queues,
//! deferred responses and signed writes.
//!
//! The transport and the attribute storage are supplied by the caller: feed
//! inbound PDUs to [`AttServer::handle_att_pdu`] with the connection's
//! [`AttSession`] and send back whatever comes out.

pub mod att;
pub mod uuid;

// Re-export common types for convenience
pub use att::{
    AttError, AttErrorCode, AttResult, AttServer, AttServerConfig, AttSession, AttributeDatabase,
    DbError, DispatchOutcome, MemoryDatabase, SessionEvents, SessionId,
};
pub use uuid::{Uuid, UuidFormat};
