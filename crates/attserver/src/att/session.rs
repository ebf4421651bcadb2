//! Per-connection ATT state
use super::config::AttServerConfig;
use super::constants::*;
use super::database::{PeerContext, SecurityState};
use super::queue::{PrepareWriteQueue, QueuedWrite};
use std::fmt;

/// Identifier of a connected peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u16);

impl SessionId {
    /// Identifier used for accesses made by the local application
    pub const LOCAL: SessionId = SessionId(u16::MAX);
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// What the server needs to finish a deferred request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingKind {
    /// Read or Read Blob; the completion value is the response value
    Value,
    /// Read Multiple interrupted at `handle`
    ReadMultiple {
        /// Values read before the deferred handle
        collected: Vec<u8>,
        /// Handles after the deferred one
        remaining: Vec<u16>,
    },
    /// Write Request; success is acknowledged
    Ack,
    /// Execute Write interrupted at `handle`
    Execute {
        /// Queued fragments after the deferred one, still to be applied
        remaining: Vec<QueuedWrite>,
    },
    /// Prepare Write whose validation was deferred
    Prepare {
        /// Fragment offset
        offset: u16,
        /// Fragment bytes, queued once validation succeeds
        value: Vec<u8>,
    },
    /// Search request, run again on success
    Retry {
        /// Original request payload
        payload: Vec<u8>,
    },
}

/// A request whose response the application will supply later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingResponse {
    /// Request opcode
    pub opcode: u8,
    /// Handle named if the request fails
    pub handle: u16,
    /// Completion state
    pub kind: PendingKind,
}

/// A signed write waiting on the Security Manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSignedWrite {
    /// Target handle
    pub handle: u16,
    /// Value to write once verified
    pub value: Vec<u8>,
    /// Whole PDU handed to the Security Manager
    pub pdu: Vec<u8>,
}

/// State owned by one connection.
///
/// Created by `AttServer::accept_client` and consumed by
/// `AttServer::disconnect_client`.
#[derive(Debug)]
pub struct AttSession {
    pub(crate) id: SessionId,
    pub(crate) mtu: u16,
    pub(crate) queue: PrepareWriteQueue,
    pub(crate) busy: bool,
    pub(crate) security: SecurityState,
    pub(crate) pending_response: Option<PendingResponse>,
    pub(crate) pending_signed_write: Option<PendingSignedWrite>,
    pub(crate) indication_pending: bool,
}

impl AttSession {
    /// Fresh session at the default MTU with an empty prepare queue
    pub(crate) fn new(id: SessionId, config: &AttServerConfig) -> Self {
        Self {
            id,
            mtu: ATT_DEFAULT_MTU,
            queue: PrepareWriteQueue::new(config.write_queue_slots, config.write_queue_arena),
            busy: false,
            security: SecurityState::default(),
            pending_response: None,
            pending_signed_write: None,
            indication_pending: false,
        }
    }

    /// Session identifier
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Effective MTU
    pub fn mtu(&self) -> u16 {
        self.mtu
    }

    /// Link security state
    pub fn security(&self) -> SecurityState {
        self.security
    }

    /// Prepare-write queue
    pub fn queue(&self) -> &PrepareWriteQueue {
        &self.queue
    }

    /// Whether a request is in flight
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Deferred request awaiting completion
    pub fn pending_response(&self) -> Option<&PendingResponse> {
        self.pending_response.as_ref()
    }

    /// Signed write awaiting verification
    pub fn pending_signed_write(&self) -> Option<&PendingSignedWrite> {
        self.pending_signed_write.as_ref()
    }

    /// Whether an indication awaits confirmation
    pub fn indication_pending(&self) -> bool {
        self.indication_pending
    }

    /// Peer context handed to the database
    pub fn peer(&self) -> PeerContext {
        PeerContext {
            session: self.id,
            security: self.security,
        }
    }

    /// Largest value that fits a response carrying only the opcode
    pub(crate) fn value_budget(&self) -> usize {
        self.mtu as usize - 1
    }
}
