//! Translation of adapter results into wire error codes
use super::error::{AttErrorCode, DbError};

/// Kind of access that produced an adapter result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    /// Single-handle read
    Read,
    /// Single-handle or queued write
    Write,
    /// Range or type search
    Search,
}

/// Outcome of mapping an adapter result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mapped {
    /// Send an Error Response with this code
    Respond(AttErrorCode),
    /// Send nothing now; the application completes the request later
    Suppress,
}

/// Map an adapter error to the wire error code sent to the peer.
pub fn map_db_error(err: DbError, kind: AccessKind) -> Mapped {
    let code = match err {
        DbError::InvalidOperation => match kind {
            AccessKind::Write => AttErrorCode::WriteNotPermitted,
            AccessKind::Read | AccessKind::Search => AttErrorCode::ReadNotPermitted,
        },
        DbError::InsufficientBufferLen => AttErrorCode::InvalidAttributeValueLength,
        DbError::InvalidAttrHandle | DbError::HandleNotFound | DbError::InvalidTransportAccess => {
            match kind {
                AccessKind::Search => AttErrorCode::AttributeNotFound,
                AccessKind::Read | AccessKind::Write => AttErrorCode::InvalidHandle,
            }
        }
        DbError::InvalidOffset => AttErrorCode::InvalidOffset,
        DbError::InsufficientSecurity => AttErrorCode::InsufficientAuthentication,
        DbError::InsufficientEncKeySize => AttErrorCode::InsufficientEncryptionKeySize,
        DbError::InsufficientEncryption => AttErrorCode::InsufficientEncryption,
        DbError::InsufficientAuthorization => AttErrorCode::InsufficientAuthorization,
        DbError::UnsupportedGroupType => AttErrorCode::UnsupportedGroupType,
        DbError::IncorrectUuidFormat => AttErrorCode::AttributeNotFound,
        DbError::Profile(code) => AttErrorCode::from((code & 0x00FF) as u8),
        DbError::Deferred => return Mapped::Suppress,
    };
    Mapped::Respond(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DbError::InvalidOperation, AccessKind::Read, AttErrorCode::ReadNotPermitted)]
    #[case(DbError::InvalidOperation, AccessKind::Write, AttErrorCode::WriteNotPermitted)]
    #[case(DbError::InsufficientBufferLen, AccessKind::Write, AttErrorCode::InvalidAttributeValueLength)]
    #[case(DbError::InvalidAttrHandle, AccessKind::Read, AttErrorCode::InvalidHandle)]
    #[case(DbError::HandleNotFound, AccessKind::Search, AttErrorCode::AttributeNotFound)]
    #[case(DbError::InvalidTransportAccess, AccessKind::Write, AttErrorCode::InvalidHandle)]
    #[case(DbError::InvalidOffset, AccessKind::Read, AttErrorCode::InvalidOffset)]
    #[case(DbError::InsufficientSecurity, AccessKind::Read, AttErrorCode::InsufficientAuthentication)]
    #[case(DbError::InsufficientEncKeySize, AccessKind::Write, AttErrorCode::InsufficientEncryptionKeySize)]
    #[case(DbError::InsufficientEncryption, AccessKind::Read, AttErrorCode::InsufficientEncryption)]
    #[case(DbError::InsufficientAuthorization, AccessKind::Write, AttErrorCode::InsufficientAuthorization)]
    #[case(DbError::UnsupportedGroupType, AccessKind::Search, AttErrorCode::UnsupportedGroupType)]
    #[case(DbError::IncorrectUuidFormat, AccessKind::Search, AttErrorCode::AttributeNotFound)]
    #[case(DbError::Profile(0x0180), AccessKind::Write, AttErrorCode::ApplicationError(0x80))]
    #[case(DbError::Profile(0x00FC), AccessKind::Write, AttErrorCode::CommonProfileError(0xFC))]
    fn maps_to_wire_code(#[case] err: DbError, #[case] kind: AccessKind, #[case] code: AttErrorCode) {
        assert_eq!(map_db_error(err, kind), Mapped::Respond(code));
    }

    #[test]
    fn deferred_is_suppressed() {
        assert_eq!(map_db_error(DbError::Deferred, AccessKind::Read), Mapped::Suppress);
        assert_eq!(map_db_error(DbError::Deferred, AccessKind::Search), Mapped::Suppress);
    }
}
