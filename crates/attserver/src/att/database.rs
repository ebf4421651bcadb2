//! Attribute database adapter consumed by the ATT server
//!
//! The server never stores attributes itself. Every lookup and access goes
//! through [`AttributeDatabase`], which reports one record per call and moves
//! the caller's search cursor.
use super::error::DbResult;
use super::session::SessionId;
use super::types::{AttributeData, HandleRange, HandleUuidPair, HandleValue, SecurityLevel};
use crate::uuid::{Uuid, UuidFormat};
use bitflags::bitflags;

bitflags! {
    /// Kind and origin of an attribute access
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u8 {
        /// Read the value
        const READ = 0x01;
        /// Write the value
        const WRITE = 0x02;
        /// Validate a fragment for the prepare queue without writing it
        const PREPARE = 0x04;
        /// Access requested by the remote peer
        const PEER_INITIATED = 0x08;
        /// Access requested by the local application
        const LOCALLY_INITIATED = 0x10;
        /// Write that will not be acknowledged
        const WRITE_WITHOUT_RSP = 0x20;
    }
}

/// Security state of the link a request arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecurityState {
    /// Current security level
    pub level: SecurityLevel,
    /// Encryption key size in bytes (0 when unencrypted)
    pub key_size: u8,
    /// Whether the application has authorized the peer
    pub authorized: bool,
}

/// Identity and security of the peer an access is made for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerContext {
    /// Session the request belongs to
    pub session: SessionId,
    /// Link security at the time of the request
    pub security: SecurityState,
}

/// One step of a cursor-driven search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchStep<T> {
    /// A match; further matches may exist
    More(T),
    /// A match; nothing further exists in the range
    Last(T),
    /// No match in the remaining range
    Done,
}

impl<T> SearchStep<T> {
    /// Split into the match (if any) and whether the search may continue
    pub fn into_parts(self) -> (Option<T>, bool) {
        match self {
            SearchStep::More(item) => (Some(item), true),
            SearchStep::Last(item) => (Some(item), false),
            SearchStep::Done => (None, false),
        }
    }
}

/// Attribute storage as seen by the ATT server.
///
/// Search methods look at `range.start..=range.end`. On a match, or when a
/// record is skipped with [`DbError::InvalidTransportAccess`], the adapter
/// moves `range.start` past that record. On any other error `range.start`
/// is left on the offending record so the server can name it.
///
/// Returning [`DbError::Deferred`] from any call defers the whole request,
/// including a search that already produced matches. Those matches are
/// dropped and the search runs again from the start of its range once the
/// application completes it.
///
/// [`DbError::InvalidTransportAccess`]: super::error::DbError::InvalidTransportAccess
/// [`DbError::Deferred`]: super::error::DbError::Deferred
pub trait AttributeDatabase: Send + Sync {
    /// Next handle and type whose UUID has width `format`.
    ///
    /// A record whose type has the other width fails with
    /// `IncorrectUuidFormat`.
    fn get_handle_uuid_pair(
        &self,
        peer: &PeerContext,
        range: &mut HandleRange,
        format: UuidFormat,
    ) -> DbResult<SearchStep<HandleUuidPair>>;

    /// Next attribute of `attr_type` and its full value
    fn get_handle_value_pair(
        &self,
        peer: &PeerContext,
        range: &mut HandleRange,
        attr_type: &Uuid,
    ) -> DbResult<SearchStep<HandleValue>>;

    /// Next attribute of `attr_type` whose value equals `value`, with its
    /// group end handle
    fn get_range_by_type_val(
        &self,
        peer: &PeerContext,
        range: &mut HandleRange,
        attr_type: &Uuid,
        value: &[u8],
    ) -> DbResult<SearchStep<HandleRange>>;

    /// Next grouping attribute of `group_type`, its group end and value
    fn get_group_range_val_pair(
        &self,
        peer: &PeerContext,
        range: &mut HandleRange,
        group_type: &Uuid,
    ) -> DbResult<SearchStep<AttributeData>>;

    /// Read, write or validate a single attribute.
    ///
    /// Reads return the value from `offset`; writes return an empty vector.
    fn access_handle(
        &self,
        peer: &PeerContext,
        handle: u16,
        offset: u16,
        data: &[u8],
        flags: AccessFlags,
    ) -> DbResult<Vec<u8>>;

    /// Release per-peer state when a session ends
    fn peer_session_shutdown(&self, _peer: &PeerContext) {}
}
