//! Attribute Protocol (ATT) server
//!
//! This module validates inbound ATT requests, runs them against an
//! [`AttributeDatabase`] and builds the single response each request gets.
//! Long writes are staged per session in a [`PrepareWriteQueue`] until the
//! peer executes or cancels them.

pub mod config;
pub mod constants;
pub mod database;
pub mod enumerator;
pub mod error;
pub mod events;
pub mod length;
pub mod mapping;
pub mod memory;
pub mod queue;
pub mod server;
pub mod session;
pub mod types;


// Re-export the public API
pub use self::config::AttServerConfig;
pub use self::constants::*;
pub use self::database::{AccessFlags, AttributeDatabase, PeerContext, SearchStep, SecurityState};
pub use self::error::{AttError, AttErrorCode, AttResult, DbError, DbResult, QueueFull};
pub use self::events::{NoopEvents, SessionEvents, SignedWriteStatus};
pub use self::mapping::{map_db_error, AccessKind, Mapped};
pub use self::memory::{Attribute, MemoryDatabase};
pub use self::queue::{PrepareWriteQueue, QueuedWrite};
pub use self::server::{AttServer, DispatchOutcome};
pub use self::session::{AttSession, SessionId};
pub use self::types::*;
