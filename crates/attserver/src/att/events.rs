//! Notifications surfaced to the application
use super::error::DbError;
use super::session::SessionId;

/// Result of a signed write once the Security Manager has answered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedWriteStatus {
    /// Signature verified and value written
    Applied,
    /// Signature rejected, value discarded
    VerificationFailed,
    /// Signature verified but the database refused the write
    WriteFailed(DbError),
}

/// Session event sink.
///
/// Every method defaults to doing nothing.
pub trait SessionEvents: Send + Sync {
    /// A session was established
    fn transport_connected(&self, _session: SessionId) {}

    /// A session was torn down
    fn transport_disconnected(&self, _session: SessionId) {}

    /// An MTU exchange completed with the given effective MTU
    fn mtu_negotiated(&self, _session: SessionId, _mtu: u16) {}

    /// The peer confirmed the outstanding indication
    fn handle_value_confirmed(&self, _session: SessionId) {}

    /// A signed write needs its signature checked.
    ///
    /// `data` is the whole PDU, opcode included. The answer is delivered
    /// through `AttServer::signed_write_verification_complete`.
    fn signed_write_verification_requested(&self, _session: SessionId, _data: &[u8]) {}

    /// A signed write finished
    fn signed_write_verification_complete(
        &self,
        _session: SessionId,
        _handle: u16,
        _status: SignedWriteStatus,
    ) {
    }
}

/// Event sink that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEvents;

impl SessionEvents for NoopEvents {}
