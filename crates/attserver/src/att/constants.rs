//! ATT Protocol constants

// ATT opcode values
pub const ATT_ERROR_RSP: u8 = 0x01;
pub const ATT_EXCHANGE_MTU_REQ: u8 = 0x02;
pub const ATT_EXCHANGE_MTU_RSP: u8 = 0x03;
pub const ATT_FIND_INFO_REQ: u8 = 0x04;
pub const ATT_FIND_INFO_RSP: u8 = 0x05;
pub const ATT_FIND_BY_TYPE_VALUE_REQ: u8 = 0x06;
pub const ATT_FIND_BY_TYPE_VALUE_RSP: u8 = 0x07;
pub const ATT_READ_BY_TYPE_REQ: u8 = 0x08;
pub const ATT_READ_BY_TYPE_RSP: u8 = 0x09;
pub const ATT_READ_REQ: u8 = 0x0A;
pub const ATT_READ_RSP: u8 = 0x0B;
pub const ATT_READ_BLOB_REQ: u8 = 0x0C;
pub const ATT_READ_BLOB_RSP: u8 = 0x0D;
pub const ATT_READ_MULTIPLE_REQ: u8 = 0x0E;
pub const ATT_READ_MULTIPLE_RSP: u8 = 0x0F;
pub const ATT_READ_BY_GROUP_TYPE_REQ: u8 = 0x10;
pub const ATT_READ_BY_GROUP_TYPE_RSP: u8 = 0x11;
pub const ATT_WRITE_REQ: u8 = 0x12;
pub const ATT_WRITE_RSP: u8 = 0x13;
pub const ATT_WRITE_CMD: u8 = 0x52;
pub const ATT_SIGNED_WRITE_CMD: u8 = 0xD2;
pub const ATT_PREPARE_WRITE_REQ: u8 = 0x16;
pub const ATT_PREPARE_WRITE_RSP: u8 = 0x17;
pub const ATT_EXECUTE_WRITE_REQ: u8 = 0x18;
pub const ATT_EXECUTE_WRITE_RSP: u8 = 0x19;
pub const ATT_HANDLE_VALUE_NTF: u8 = 0x1B;
pub const ATT_HANDLE_VALUE_IND: u8 = 0x1D;
pub const ATT_HANDLE_VALUE_CONF: u8 = 0x1E;

/// Opcode bit marking a command (no response expected)
pub const ATT_COMMAND_FLAG: u8 = 0x40;
/// Opcode bit marking an authentication signature trailer
pub const ATT_AUTH_SIGNATURE_FLAG: u8 = 0x80;

// ATT error codes
pub const ATT_ERROR_INVALID_HANDLE: u8 = 0x01;
pub const ATT_ERROR_READ_NOT_PERMITTED: u8 = 0x02;
pub const ATT_ERROR_WRITE_NOT_PERMITTED: u8 = 0x03;
pub const ATT_ERROR_INVALID_PDU: u8 = 0x04;
pub const ATT_ERROR_INSUFFICIENT_AUTHENTICATION: u8 = 0x05;
pub const ATT_ERROR_REQUEST_NOT_SUPPORTED: u8 = 0x06;
pub const ATT_ERROR_INVALID_OFFSET: u8 = 0x07;
pub const ATT_ERROR_INSUFFICIENT_AUTHORIZATION: u8 = 0x08;
pub const ATT_ERROR_PREPARE_QUEUE_FULL: u8 = 0x09;
pub const ATT_ERROR_ATTRIBUTE_NOT_FOUND: u8 = 0x0A;
pub const ATT_ERROR_ATTRIBUTE_NOT_LONG: u8 = 0x0B;
pub const ATT_ERROR_INSUFFICIENT_ENCRYPTION_KEY_SIZE: u8 = 0x0C;
pub const ATT_ERROR_INVALID_ATTRIBUTE_VALUE_LENGTH: u8 = 0x0D;
pub const ATT_ERROR_UNLIKELY: u8 = 0x0E;
pub const ATT_ERROR_INSUFFICIENT_ENCRYPTION: u8 = 0x0F;
pub const ATT_ERROR_UNSUPPORTED_GROUP_TYPE: u8 = 0x10;
pub const ATT_ERROR_INSUFFICIENT_RESOURCES: u8 = 0x11;
pub const ATT_ERROR_DATABASE_OUT_OF_SYNC: u8 = 0x12;
pub const ATT_ERROR_VALUE_NOT_ALLOWED: u8 = 0x13;
pub const ATT_ERROR_APPLICATION_ERROR_START: u8 = 0x80;
pub const ATT_ERROR_APPLICATION_ERROR_END: u8 = 0x9F;
pub const ATT_ERROR_COMMON_PROFILE_ERROR_START: u8 = 0xE0;
pub const ATT_ERROR_COMMON_PROFILE_ERROR_END: u8 = 0xFF;

// ATT attribute permission flags
pub const ATT_PERM_NONE: u16 = 0x0000;
pub const ATT_PERM_READ: u16 = 0x0001;
pub const ATT_PERM_WRITE: u16 = 0x0002;
pub const ATT_PERM_READ_ENCRYPTED: u16 = 0x0004;
pub const ATT_PERM_WRITE_ENCRYPTED: u16 = 0x0008;
pub const ATT_PERM_READ_AUTHENTICATED: u16 = 0x0010;
pub const ATT_PERM_WRITE_AUTHENTICATED: u16 = 0x0020;
pub const ATT_PERM_READ_AUTHORIZED: u16 = 0x0040;
pub const ATT_PERM_WRITE_AUTHORIZED: u16 = 0x0080;
pub const ATT_PERM_ENCRYPTION_KEY_128: u16 = 0x0100;
pub const ATT_PERM_LOCAL_ONLY: u16 = 0x0200;

// ATT handle values
pub const ATT_HANDLE_INVALID: u16 = 0x0000;
pub const ATT_HANDLE_MIN: u16 = 0x0001;
pub const ATT_HANDLE_MAX: u16 = 0xFFFF;

// ATT MTU limits
pub const ATT_DEFAULT_MTU: u16 = 23;
pub const ATT_MAX_MTU: u16 = 517;

/// Opcode (1) + handle (2)
pub const ATT_MTU_HEADER_SIZE: usize = 3;

/// Longest value a Read By Type Response entry can carry
pub const ATT_READ_BY_TYPE_MAX_VALUE: usize = 253;
/// Longest value a Read By Group Type Response entry can carry
pub const ATT_READ_BY_GROUP_MAX_VALUE: usize = 251;
/// Longest attribute value allowed by the protocol
pub const ATT_MAX_ATTRIBUTE_LEN: usize = 512;

// ATT Find Information Response Format
pub const ATT_FIND_INFO_RSP_FORMAT_16BIT: u8 = 0x01;
pub const ATT_FIND_INFO_RSP_FORMAT_128BIT: u8 = 0x02;

// ATT execute write flags
pub const ATT_EXEC_WRITE_CANCEL: u8 = 0x00;
pub const ATT_EXEC_WRITE_COMMIT: u8 = 0x01;

/// Sign counter (4) + MAC (8) trailing a Signed Write Command
pub const ATT_SIGNATURE_LEN: usize = 12;

// Request payload lengths checked before dispatch (opcode byte excluded)
pub const ATT_EXCHANGE_MTU_REQ_LEN: usize = 2;
pub const ATT_FIND_INFO_REQ_LEN: usize = 4;
pub const ATT_READ_BY_TYPE_REQ_LEN_16: usize = 6;
pub const ATT_READ_BY_TYPE_REQ_LEN_128: usize = 20;
pub const ATT_READ_REQ_LEN: usize = 2;
pub const ATT_READ_BLOB_REQ_LEN: usize = 4;
pub const ATT_READ_BY_GROUP_REQ_LEN_16: usize = 6;
pub const ATT_READ_BY_GROUP_REQ_LEN_128: usize = 20;
pub const ATT_EXECUTE_WRITE_REQ_LEN: usize = 1;

// Default server limits
pub const ATT_DEFAULT_MAX_FIND_INFO_ENTRIES: usize = 16;
pub const ATT_DEFAULT_MAX_HANDLE_VALUE_ENTRIES: usize = 16;
pub const ATT_DEFAULT_MAX_GROUP_ENTRIES: usize = 8;
pub const ATT_DEFAULT_MAX_READ_MULTIPLE: usize = 11;
pub const ATT_DEFAULT_WRITE_QUEUE_SLOTS: usize = 10;
pub const ATT_DEFAULT_WRITE_QUEUE_ARENA: usize = 256;

// GATT declaration types
pub const PRIMARY_SERVICE_UUID: u16 = 0x2800;
pub const SECONDARY_SERVICE_UUID: u16 = 0x2801;
pub const INCLUDE_UUID: u16 = 0x2802;
pub const CHARACTERISTIC_UUID: u16 = 0x2803;
pub const CLIENT_CHAR_CONFIG_UUID: u16 = 0x2902;
