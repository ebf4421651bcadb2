//! Error handling for the ATT server
use super::constants::*;
use thiserror::Error;

/// ATT error codes carried in an Error Response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttErrorCode {
    /// Invalid handle
    InvalidHandle,
    /// Read not permitted
    ReadNotPermitted,
    /// Write not permitted
    WriteNotPermitted,
    /// Invalid PDU
    InvalidPdu,
    /// Insufficient authentication
    InsufficientAuthentication,
    /// Request not supported
    RequestNotSupported,
    /// Invalid offset
    InvalidOffset,
    /// Insufficient authorization
    InsufficientAuthorization,
    /// Prepare queue full
    PrepareQueueFull,
    /// Attribute not found
    AttributeNotFound,
    /// Attribute not long
    AttributeNotLong,
    /// Insufficient encryption key size
    InsufficientEncryptionKeySize,
    /// Invalid attribute value length
    InvalidAttributeValueLength,
    /// Unlikely error
    Unlikely,
    /// Insufficient encryption
    InsufficientEncryption,
    /// Unsupported group type
    UnsupportedGroupType,
    /// Insufficient resources
    InsufficientResources,
    /// Database out of sync
    DatabaseOutOfSync,
    /// Value not allowed
    ValueNotAllowed,
    /// Application error
    ApplicationError(u8),
    /// Common profile error
    CommonProfileError(u8),
    /// Unknown error code
    Unknown(u8),
}

impl From<u8> for AttErrorCode {
    fn from(code: u8) -> Self {
        match code {
            ATT_ERROR_INVALID_HANDLE => AttErrorCode::InvalidHandle,
            ATT_ERROR_READ_NOT_PERMITTED => AttErrorCode::ReadNotPermitted,
            ATT_ERROR_WRITE_NOT_PERMITTED => AttErrorCode::WriteNotPermitted,
            ATT_ERROR_INVALID_PDU => AttErrorCode::InvalidPdu,
            ATT_ERROR_INSUFFICIENT_AUTHENTICATION => AttErrorCode::InsufficientAuthentication,
            ATT_ERROR_REQUEST_NOT_SUPPORTED => AttErrorCode::RequestNotSupported,
            ATT_ERROR_INVALID_OFFSET => AttErrorCode::InvalidOffset,
            ATT_ERROR_INSUFFICIENT_AUTHORIZATION => AttErrorCode::InsufficientAuthorization,
            ATT_ERROR_PREPARE_QUEUE_FULL => AttErrorCode::PrepareQueueFull,
            ATT_ERROR_ATTRIBUTE_NOT_FOUND => AttErrorCode::AttributeNotFound,
            ATT_ERROR_ATTRIBUTE_NOT_LONG => AttErrorCode::AttributeNotLong,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE => {
                AttErrorCode::InsufficientEncryptionKeySize
            }
            ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH => AttErrorCode::InvalidAttributeValueLength,
            ATT_ERROR_UNLIKELY => AttErrorCode::Unlikely,
            ATT_ERROR_INSUFFICIENT_ENCRYPTION => AttErrorCode::InsufficientEncryption,
            ATT_ERROR_UNSUPPORTED_GROUP_TYPE => AttErrorCode::UnsupportedGroupType,
            ATT_ERROR_INSUFFICIENT_RESOURCES => AttErrorCode::InsufficientResources,
            ATT_ERROR_DATABASE_OUT_OF_SYNC => AttErrorCode::DatabaseOutOfSync,
            ATT_ERROR_VALUE_NOT_ALLOWED => AttErrorCode::ValueNotAllowed,
            ATT_ERROR_APPLICATION_ERROR_START..=ATT_ERROR_APPLICATION_ERROR_END => {
                AttErrorCode::ApplicationError(code)
            }
            ATT_ERROR_COMMON_PROFILE_ERROR_START..=ATT_ERROR_COMMON_PROFILE_ERROR_END => {
                AttErrorCode::CommonProfileError(code)
            }
            _ => AttErrorCode::Unknown(code),
        }
    }
}

impl From<AttErrorCode> for u8 {
    fn from(code: AttErrorCode) -> u8 {
        match code {
            AttErrorCode::InvalidHandle => ATT_ERROR_INVALID_HANDLE,
            AttErrorCode::ReadNotPermitted => ATT_ERROR_READ_NOT_PERMITTED,
            AttErrorCode::WriteNotPermitted => ATT_ERROR_WRITE_NOT_PERMITTED,
            AttErrorCode::InvalidPdu => ATT_ERROR_INVALID_PDU,
            AttErrorCode::InsufficientAuthentication => ATT_ERROR_INSUFFICIENT_AUTHENTICATION,
            AttErrorCode::RequestNotSupported => ATT_ERROR_REQUEST_NOT_SUPPORTED,
            AttErrorCode::InvalidOffset => ATT_ERROR_INVALID_OFFSET,
            AttErrorCode::InsufficientAuthorization => ATT_ERROR_INSUFFICIENT_AUTHORIZATION,
            AttErrorCode::PrepareQueueFull => ATT_ERROR_PREPARE_QUEUE_FULL,
            AttErrorCode::AttributeNotFound => ATT_ERROR_ATTRIBUTE_NOT_FOUND,
            AttErrorCode::AttributeNotLong => ATT_ERROR_ATTRIBUTE_NOT_LONG,
            AttErrorCode::InsufficientEncryptionKeySize => {
                ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE
            }
            AttErrorCode::InvalidAttributeValueLength => ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH,
            AttErrorCode::Unlikely => ATT_ERROR_UNLIKELY,
            AttErrorCode::InsufficientEncryption => ATT_ERROR_INSUFFICIENT_ENCRYPTION,
            AttErrorCode::UnsupportedGroupType => ATT_ERROR_UNSUPPORTED_GROUP_TYPE,
            AttErrorCode::InsufficientResources => ATT_ERROR_INSUFFICIENT_RESOURCES,
            AttErrorCode::DatabaseOutOfSync => ATT_ERROR_DATABASE_OUT_OF_SYNC,
            AttErrorCode::ValueNotAllowed => ATT_ERROR_VALUE_NOT_ALLOWED,
            AttErrorCode::ApplicationError(code) => code,
            AttErrorCode::CommonProfileError(code) => code,
            AttErrorCode::Unknown(code) => code,
        }
    }
}

/// Result kinds reported by an attribute database adapter.
///
/// These never cross the wire directly; [`crate::att::mapping::map_db_error`]
/// turns them into an [`AttErrorCode`] or suppresses the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DbError {
    #[error("operation not permitted on attribute")]
    InvalidOperation,

    #[error("value does not fit the attribute buffer")]
    InsufficientBufferLen,

    #[error("invalid attribute handle")]
    InvalidAttrHandle,

    #[error("attribute handle not found")]
    HandleNotFound,

    #[error("attribute not accessible over this transport")]
    InvalidTransportAccess,

    #[error("invalid value offset")]
    InvalidOffset,

    #[error("insufficient security")]
    InsufficientSecurity,

    #[error("insufficient encryption key size")]
    InsufficientEncKeySize,

    #[error("insufficient encryption")]
    InsufficientEncryption,

    #[error("insufficient authorization")]
    InsufficientAuthorization,

    #[error("unsupported group type")]
    UnsupportedGroupType,

    #[error("UUID format differs from the requested format")]
    IncorrectUuidFormat,

    #[error("response deferred by the application")]
    Deferred,

    #[error("profile specific result 0x{0:04X}")]
    Profile(u16),
}

/// Adapter result type
pub type DbResult<T> = Result<T, DbError>;

/// Prepare-write queue overflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("prepare write queue full")]
pub struct QueueFull;

/// ATT server error type
#[derive(Debug, Error)]
pub enum AttError {
    #[error("ATT error: {0:?} on handle {1}")]
    Protocol(AttErrorCode, u16),

    #[error("Invalid PDU")]
    InvalidPdu,

    #[error("Session is already processing a request")]
    Busy,

    #[error("An indication is already awaiting confirmation")]
    IndicationPending,

    #[error("No deferred response is pending")]
    NoPendingResponse,

    #[error("No signed write is awaiting verification")]
    NoPendingSignedWrite,

    #[error("Value of {0} bytes exceeds the session MTU")]
    ValueTooLong(usize),

    #[error("Prepare write queue full")]
    PrepareQueueFull(#[from] QueueFull),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid state for operation")]
    InvalidState,
}

impl AttError {
    /// Convert to ATT error code
    pub fn to_error_code(&self) -> AttErrorCode {
        match self {
            AttError::Protocol(code, _) => *code,
            AttError::InvalidPdu => AttErrorCode::InvalidPdu,
            AttError::PrepareQueueFull(_) => AttErrorCode::PrepareQueueFull,
            AttError::ValueTooLong(_) => AttErrorCode::InvalidAttributeValueLength,
            AttError::InvalidParameter(_) => AttErrorCode::InvalidPdu,
            AttError::Database(_) => AttErrorCode::Unlikely,
            AttError::Busy
            | AttError::IndicationPending
            | AttError::NoPendingResponse
            | AttError::NoPendingSignedWrite
            | AttError::InvalidState => AttErrorCode::RequestNotSupported,
        }
    }

    /// Get the handle associated with this error, if any
    pub fn handle(&self) -> Option<u16> {
        match self {
            AttError::Protocol(_, handle) => Some(*handle),
            _ => None,
        }
    }
}

/// ATT Result type
pub type AttResult<T> = Result<T, AttError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_byte_conversion() {
        for byte in 0x01..=0x13u8 {
            let code = AttErrorCode::from(byte);
            assert_eq!(u8::from(code), byte);
        }
        assert_eq!(AttErrorCode::from(0x85), AttErrorCode::ApplicationError(0x85));
        assert_eq!(AttErrorCode::from(0xFD), AttErrorCode::CommonProfileError(0xFD));
        assert_eq!(AttErrorCode::from(0x40), AttErrorCode::Unknown(0x40));
    }

    #[test]
    fn protocol_error_keeps_handle() {
        let err = AttError::Protocol(AttErrorCode::InvalidOffset, 0x0021);
        assert_eq!(err.handle(), Some(0x0021));
        assert_eq!(err.to_error_code(), AttErrorCode::InvalidOffset);
        assert_eq!(AttError::from(QueueFull).to_error_code(), AttErrorCode::PrepareQueueFull);
    }
}
