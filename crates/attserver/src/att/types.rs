//! Type definitions for the ATT protocol
use super::constants::*;
use super::error::{AttError, AttErrorCode, AttResult};
use crate::uuid::{Uuid, UuidFormat};
use bitflags::bitflags;
use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

bitflags! {
    /// Attribute permission flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AttPermissions: u16 {
        const READ = ATT_PERM_READ;
        const WRITE = ATT_PERM_WRITE;
        const READ_ENCRYPTED = ATT_PERM_READ_ENCRYPTED;
        const WRITE_ENCRYPTED = ATT_PERM_WRITE_ENCRYPTED;
        const READ_AUTHENTICATED = ATT_PERM_READ_AUTHENTICATED;
        const WRITE_AUTHENTICATED = ATT_PERM_WRITE_AUTHENTICATED;
        const READ_AUTHORIZED = ATT_PERM_READ_AUTHORIZED;
        const WRITE_AUTHORIZED = ATT_PERM_WRITE_AUTHORIZED;
        /// Encrypted access additionally needs a 128-bit key
        const ENCRYPTION_KEY_128 = ATT_PERM_ENCRYPTION_KEY_128;
        /// Only the local application may access the attribute
        const LOCAL_ONLY = ATT_PERM_LOCAL_ONLY;
    }
}

impl AttPermissions {
    /// Create read-only permissions
    pub fn read_only() -> Self {
        Self::READ
    }

    /// Create read-write permissions
    pub fn read_write() -> Self {
        Self::READ | Self::WRITE
    }

    /// Create encrypted read-write permissions
    pub fn encrypted() -> Self {
        Self::read_write() | Self::READ_ENCRYPTED | Self::WRITE_ENCRYPTED
    }

    /// Create authenticated read-write permissions
    pub fn authenticated() -> Self {
        Self::encrypted() | Self::READ_AUTHENTICATED | Self::WRITE_AUTHENTICATED
    }
}

/// Link security level of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SecurityLevel {
    /// No security (unencrypted)
    #[default]
    None,
    /// Encryption without authentication
    EncryptionOnly,
    /// Encryption with authentication
    EncryptionWithAuthentication,
    /// Secure Connections with encryption and authentication
    SecureConnections,
}

/// Inclusive handle range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleRange {
    /// First handle
    pub start: u16,
    /// Last handle
    pub end: u16,
}

impl HandleRange {
    /// Create a new handle range
    pub const fn new(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Whether the range may be used in a request.
    ///
    /// Handle 0x0000 is reserved and `start` must not exceed `end`.
    pub fn is_valid(&self) -> bool {
        self.start != ATT_HANDLE_INVALID && self.start <= self.end
    }

    /// Whether no handles remain in the range
    pub fn is_exhausted(&self) -> bool {
        self.start > self.end
    }

    /// Move the start past `handle`.
    ///
    /// Returns `false` when `handle` is the last addressable handle, which
    /// leaves nothing further to search.
    pub fn advance_past(&mut self, handle: u16) -> bool {
        match handle.checked_add(1) {
            Some(next) => {
                self.start = next;
                true
            }
            None => {
                self.end = 0;
                self.start = ATT_HANDLE_MAX;
                false
            }
        }
    }
}

/// Execute Write Request flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteWriteFlags {
    /// Discard all prepared writes
    Cancel,
    /// Apply all prepared writes
    Execute,
}

impl TryFrom<u8> for ExecuteWriteFlags {
    type Error = AttError;

    fn try_from(value: u8) -> AttResult<Self> {
        match value {
            ATT_EXEC_WRITE_CANCEL => Ok(ExecuteWriteFlags::Cancel),
            ATT_EXEC_WRITE_COMMIT => Ok(ExecuteWriteFlags::Execute),
            _ => Err(AttError::InvalidPdu),
        }
    }
}

impl From<ExecuteWriteFlags> for u8 {
    fn from(flags: ExecuteWriteFlags) -> u8 {
        match flags {
            ExecuteWriteFlags::Cancel => ATT_EXEC_WRITE_CANCEL,
            ExecuteWriteFlags::Execute => ATT_EXEC_WRITE_COMMIT,
        }
    }
}

/// ATT packet formats
///
/// `parse` receives the bytes following the opcode; `serialize` produces the
/// complete PDU including the opcode.
pub trait AttPacket: Sized {
    /// Opcode for this packet
    fn opcode() -> u8;

    /// Parse packet from the payload bytes
    fn parse(payload: &[u8]) -> AttResult<Self>;

    /// Serialize packet to bytes
    fn serialize(&self) -> Vec<u8>;
}

fn read_u16(cursor: &mut Cursor<&[u8]>) -> AttResult<u16> {
    cursor.read_u16::<LittleEndian>().map_err(|_| AttError::InvalidPdu)
}

fn read_range(payload: &[u8]) -> AttResult<HandleRange> {
    let mut cursor = Cursor::new(payload);
    let start = read_u16(&mut cursor)?;
    let end = read_u16(&mut cursor)?;
    Ok(HandleRange::new(start, end))
}

fn rest(payload: &[u8], offset: usize) -> AttResult<&[u8]> {
    payload.get(offset..).ok_or(AttError::InvalidPdu)
}

/// Error response packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorResponse {
    /// Request opcode in error
    pub request_opcode: u8,
    /// Attribute handle in error
    pub handle: u16,
    /// Error code
    pub error_code: AttErrorCode,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(request_opcode: u8, handle: u16, error_code: AttErrorCode) -> Self {
        Self { request_opcode, handle, error_code }
    }
}

impl AttPacket for ErrorResponse {
    fn opcode() -> u8 {
        ATT_ERROR_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        if payload.len() != 4 {
            return Err(AttError::InvalidPdu);
        }
        Ok(Self {
            request_opcode: payload[0],
            handle: u16::from_le_bytes([payload[1], payload[2]]),
            error_code: payload[3].into(),
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(5);
        packet.push(Self::opcode());
        packet.push(self.request_opcode);
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.push(self.error_code.into());
        packet
    }
}

/// Exchange MTU Request packet
#[derive(Debug, Clone)]
pub struct ExchangeMtuRequest {
    /// Client Rx MTU size
    pub client_mtu: u16,
}

impl AttPacket for ExchangeMtuRequest {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(payload);
        let client_mtu = read_u16(&mut cursor)?;
        Ok(Self { client_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.client_mtu.to_le_bytes());
        packet
    }
}

/// Exchange MTU Response packet
#[derive(Debug, Clone)]
pub struct ExchangeMtuResponse {
    /// Server Rx MTU size
    pub server_mtu: u16,
}

impl AttPacket for ExchangeMtuResponse {
    fn opcode() -> u8 {
        ATT_EXCHANGE_MTU_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(payload);
        let server_mtu = read_u16(&mut cursor)?;
        Ok(Self { server_mtu })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.server_mtu.to_le_bytes());
        packet
    }
}

/// Find Information Request packet
#[derive(Debug, Clone)]
pub struct FindInformationRequest {
    /// Requested handle range
    pub range: HandleRange,
}

impl AttPacket for FindInformationRequest {
    fn opcode() -> u8 {
        ATT_FIND_INFO_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        Ok(Self { range: read_range(payload)? })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.range.start.to_le_bytes());
        packet.extend_from_slice(&self.range.end.to_le_bytes());
        packet
    }
}

/// Handle-UUID pair in Find Information Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleUuidPair {
    /// Attribute handle
    pub handle: u16,
    /// Attribute type
    pub uuid: Uuid,
}

/// Find Information Response packet
///
/// Every pair carries a UUID of `format` width.
#[derive(Debug, Clone)]
pub struct FindInformationResponse {
    /// Width of every UUID in the response
    pub format: UuidFormat,
    /// List of handle-UUID pairs
    pub information_data: Vec<HandleUuidPair>,
}

impl AttPacket for FindInformationResponse {
    fn opcode() -> u8 {
        ATT_FIND_INFO_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let (&code, data) = payload.split_first().ok_or(AttError::InvalidPdu)?;
        let format = UuidFormat::from_code(code).ok_or(AttError::InvalidPdu)?;
        let pair_size = 2 + format.size();
        if data.is_empty() || data.len() % pair_size != 0 {
            return Err(AttError::InvalidPdu);
        }

        let mut information_data = Vec::with_capacity(data.len() / pair_size);
        for chunk in data.chunks_exact(pair_size) {
            let handle = u16::from_le_bytes([chunk[0], chunk[1]]);
            let uuid = Uuid::from_bytes(&chunk[2..]).ok_or(AttError::InvalidPdu)?;
            information_data.push(HandleUuidPair { handle, uuid });
        }

        Ok(Self { format, information_data })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.format.code()];
        for pair in &self.information_data {
            packet.extend_from_slice(&pair.handle.to_le_bytes());
            pair.uuid.write_to(&mut packet);
        }
        packet
    }
}

/// Find By Type Value Request packet
#[derive(Debug, Clone)]
pub struct FindByTypeValueRequest {
    /// Requested handle range
    pub range: HandleRange,
    /// Attribute type (always a 16-bit UUID on the wire)
    pub attribute_type: u16,
    /// Attribute value to match
    pub attribute_value: Vec<u8>,
}

impl AttPacket for FindByTypeValueRequest {
    fn opcode() -> u8 {
        ATT_FIND_BY_TYPE_VALUE_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let range = read_range(payload)?;
        let mut cursor = Cursor::new(rest(payload, 4)?);
        let attribute_type = read_u16(&mut cursor)?;
        let attribute_value = rest(payload, 6)?.to_vec();
        Ok(Self { range, attribute_type, attribute_value })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.range.start.to_le_bytes());
        packet.extend_from_slice(&self.range.end.to_le_bytes());
        packet.extend_from_slice(&self.attribute_type.to_le_bytes());
        packet.extend_from_slice(&self.attribute_value);
        packet
    }
}

/// Find By Type Value Response packet
#[derive(Debug, Clone)]
pub struct FindByTypeValueResponse {
    /// Found handle and group end handle per match
    pub handles: Vec<HandleRange>,
}

impl AttPacket for FindByTypeValueResponse {
    fn opcode() -> u8 {
        ATT_FIND_BY_TYPE_VALUE_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        if payload.is_empty() || payload.len() % 4 != 0 {
            return Err(AttError::InvalidPdu);
        }
        let handles = payload.chunks_exact(4).map(read_range).collect::<AttResult<_>>()?;
        Ok(Self { handles })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.handles.len() * 4);
        packet.push(Self::opcode());
        for range in &self.handles {
            packet.extend_from_slice(&range.start.to_le_bytes());
            packet.extend_from_slice(&range.end.to_le_bytes());
        }
        packet
    }
}

/// Request carrying a range and a type UUID.
///
/// Shared by Read By Type and Read By Group Type, which differ only in opcode.
fn parse_typed_range(payload: &[u8]) -> AttResult<(HandleRange, Uuid)> {
    let range = read_range(payload)?;
    let uuid = Uuid::from_bytes(rest(payload, 4)?).ok_or(AttError::Protocol(
        AttErrorCode::InvalidAttributeValueLength,
        range.start,
    ))?;
    Ok((range, uuid))
}

fn serialize_typed_range(opcode: u8, range: &HandleRange, uuid: &Uuid) -> Vec<u8> {
    let mut packet = vec![opcode];
    packet.extend_from_slice(&range.start.to_le_bytes());
    packet.extend_from_slice(&range.end.to_le_bytes());
    uuid.write_to(&mut packet);
    packet
}

/// Read By Type Request packet
#[derive(Debug, Clone)]
pub struct ReadByTypeRequest {
    /// Requested handle range
    pub range: HandleRange,
    /// Attribute type UUID
    pub attribute_type: Uuid,
}

impl AttPacket for ReadByTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let (range, attribute_type) = parse_typed_range(payload)?;
        Ok(Self { range, attribute_type })
    }

    fn serialize(&self) -> Vec<u8> {
        serialize_typed_range(Self::opcode(), &self.range, &self.attribute_type)
    }
}

/// Handle and value in Read By Type Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandleValue {
    /// Attribute handle
    pub handle: u16,
    /// Attribute value
    pub value: Vec<u8>,
}

/// Parse `length`-sized records after a one-byte length prefix.
fn parse_length_prefixed(payload: &[u8], header: usize) -> AttResult<(u8, Vec<&[u8]>)> {
    let (&length, data) = payload.split_first().ok_or(AttError::InvalidPdu)?;
    let size = length as usize;
    if size < header || data.is_empty() || data.len() % size != 0 {
        return Err(AttError::InvalidPdu);
    }
    Ok((length, data.chunks_exact(size).collect()))
}

/// Read By Type Response packet
#[derive(Debug, Clone)]
pub struct ReadByTypeResponse {
    /// Length of each item
    pub length: u8,
    /// List of handle-value pairs
    pub data: Vec<HandleValue>,
}

impl AttPacket for ReadByTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_TYPE_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let (length, records) = parse_length_prefixed(payload, 2)?;
        let data = records
            .into_iter()
            .map(|record| HandleValue {
                handle: u16::from_le_bytes([record[0], record[1]]),
                value: record[2..].to_vec(),
            })
            .collect();
        Ok(Self { length, data })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.length];
        for item in &self.data {
            packet.extend_from_slice(&item.handle.to_le_bytes());
            packet.extend_from_slice(&item.value);
        }
        packet
    }
}

/// Read Request packet
#[derive(Debug, Clone)]
pub struct ReadRequest {
    /// Handle to read
    pub handle: u16,
}

impl AttPacket for ReadRequest {
    fn opcode() -> u8 {
        ATT_READ_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(payload);
        let handle = read_u16(&mut cursor)?;
        Ok(Self { handle })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet
    }
}

/// Read Response packet
#[derive(Debug, Clone)]
pub struct ReadResponse {
    /// Attribute value
    pub value: Vec<u8>,
}

impl AttPacket for ReadResponse {
    fn opcode() -> u8 {
        ATT_READ_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        Ok(Self { value: payload.to_vec() })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Read Blob Request packet
#[derive(Debug, Clone)]
pub struct ReadBlobRequest {
    /// Handle to read
    pub handle: u16,
    /// Value offset
    pub offset: u16,
}

impl AttPacket for ReadBlobRequest {
    fn opcode() -> u8 {
        ATT_READ_BLOB_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(payload);
        let handle = read_u16(&mut cursor)?;
        let offset = read_u16(&mut cursor)?;
        Ok(Self { handle, offset })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.offset.to_le_bytes());
        packet
    }
}

/// Read Blob Response packet
#[derive(Debug, Clone)]
pub struct ReadBlobResponse {
    /// Part of the attribute value
    pub value: Vec<u8>,
}

impl AttPacket for ReadBlobResponse {
    fn opcode() -> u8 {
        ATT_READ_BLOB_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        Ok(Self { value: payload.to_vec() })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.value.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Read Multiple Request packet
#[derive(Debug, Clone)]
pub struct ReadMultipleRequest {
    /// Handles to read, in order
    pub handles: Vec<u16>,
}

impl AttPacket for ReadMultipleRequest {
    fn opcode() -> u8 {
        ATT_READ_MULTIPLE_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        if payload.len() < 4 || payload.len() % 2 != 0 {
            return Err(AttError::InvalidPdu);
        }
        let handles = payload
            .chunks_exact(2)
            .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
            .collect();
        Ok(Self { handles })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.handles.len() * 2);
        packet.push(Self::opcode());
        for handle in &self.handles {
            packet.extend_from_slice(&handle.to_le_bytes());
        }
        packet
    }
}

/// Read Multiple Response packet
#[derive(Debug, Clone)]
pub struct ReadMultipleResponse {
    /// Concatenated values
    pub values: Vec<u8>,
}

impl AttPacket for ReadMultipleResponse {
    fn opcode() -> u8 {
        ATT_READ_MULTIPLE_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        Ok(Self { values: payload.to_vec() })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(1 + self.values.len());
        packet.push(Self::opcode());
        packet.extend_from_slice(&self.values);
        packet
    }
}

/// Read By Group Type Request packet
#[derive(Debug, Clone)]
pub struct ReadByGroupTypeRequest {
    /// Requested handle range
    pub range: HandleRange,
    /// Group type UUID
    pub group_type: Uuid,
}

impl AttPacket for ReadByGroupTypeRequest {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let (range, group_type) = parse_typed_range(payload)?;
        Ok(Self { range, group_type })
    }

    fn serialize(&self) -> Vec<u8> {
        serialize_typed_range(Self::opcode(), &self.range, &self.group_type)
    }
}

/// Attribute data in Read By Group Type Response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeData {
    /// Group declaration handle and group end handle
    pub range: HandleRange,
    /// Group declaration value
    pub value: Vec<u8>,
}

/// Read By Group Type Response packet
#[derive(Debug, Clone)]
pub struct ReadByGroupTypeResponse {
    /// Length of each item
    pub length: u8,
    /// List of attribute data
    pub data: Vec<AttributeData>,
}

impl AttPacket for ReadByGroupTypeResponse {
    fn opcode() -> u8 {
        ATT_READ_BY_GROUP_TYPE_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let (length, records) = parse_length_prefixed(payload, 4)?;
        let data = records
            .into_iter()
            .map(|record| {
                Ok(AttributeData {
                    range: read_range(record)?,
                    value: record[4..].to_vec(),
                })
            })
            .collect::<AttResult<_>>()?;
        Ok(Self { length, data })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode(), self.length];
        for item in &self.data {
            packet.extend_from_slice(&item.range.start.to_le_bytes());
            packet.extend_from_slice(&item.range.end.to_le_bytes());
            packet.extend_from_slice(&item.value);
        }
        packet
    }
}

/// Write Request packet
#[derive(Debug, Clone)]
pub struct WriteRequest {
    /// Handle to write
    pub handle: u16,
    /// Value to write
    pub value: Vec<u8>,
}

impl AttPacket for WriteRequest {
    fn opcode() -> u8 {
        ATT_WRITE_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(payload);
        let handle = read_u16(&mut cursor)?;
        Ok(Self { handle, value: rest(payload, 2)?.to_vec() })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Write Response packet
#[derive(Debug, Clone)]
pub struct WriteResponse;

impl AttPacket for WriteResponse {
    fn opcode() -> u8 {
        ATT_WRITE_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        if !payload.is_empty() {
            return Err(AttError::InvalidPdu);
        }
        Ok(Self)
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode()]
    }
}

/// Write Command packet
#[derive(Debug, Clone)]
pub struct WriteCommand {
    /// Handle to write
    pub handle: u16,
    /// Value to write
    pub value: Vec<u8>,
}

impl AttPacket for WriteCommand {
    fn opcode() -> u8 {
        ATT_WRITE_CMD
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(payload);
        let handle = read_u16(&mut cursor)?;
        Ok(Self { handle, value: rest(payload, 2)?.to_vec() })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Signed Write Command packet
#[derive(Debug, Clone)]
pub struct SignedWriteCommand {
    /// Handle to write
    pub handle: u16,
    /// Value to write
    pub value: Vec<u8>,
    /// Sign counter and MAC
    pub signature: [u8; ATT_SIGNATURE_LEN],
}

impl AttPacket for SignedWriteCommand {
    fn opcode() -> u8 {
        ATT_SIGNED_WRITE_CMD
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        if payload.len() < 2 + ATT_SIGNATURE_LEN {
            return Err(AttError::InvalidPdu);
        }
        let split = payload.len() - ATT_SIGNATURE_LEN;
        let mut signature = [0u8; ATT_SIGNATURE_LEN];
        signature.copy_from_slice(&payload[split..]);
        Ok(Self {
            handle: u16::from_le_bytes([payload[0], payload[1]]),
            value: payload[2..split].to_vec(),
            signature,
        })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet.extend_from_slice(&self.signature);
        packet
    }
}

/// Prepare Write Request packet
#[derive(Debug, Clone)]
pub struct PrepareWriteRequest {
    /// Handle to write
    pub handle: u16,
    /// Value offset
    pub offset: u16,
    /// Part of the value
    pub value: Vec<u8>,
}

impl AttPacket for PrepareWriteRequest {
    fn opcode() -> u8 {
        ATT_PREPARE_WRITE_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(payload);
        let handle = read_u16(&mut cursor)?;
        let offset = read_u16(&mut cursor)?;
        Ok(Self { handle, offset, value: rest(payload, 4)?.to_vec() })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.offset.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Prepare Write Response packet
#[derive(Debug, Clone)]
pub struct PrepareWriteResponse {
    /// Handle written
    pub handle: u16,
    /// Value offset
    pub offset: u16,
    /// Echo of the queued value
    pub value: Vec<u8>,
}

impl AttPacket for PrepareWriteResponse {
    fn opcode() -> u8 {
        ATT_PREPARE_WRITE_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let request = PrepareWriteRequest::parse(payload)?;
        Ok(Self { handle: request.handle, offset: request.offset, value: request.value })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.offset.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Execute Write Request packet
#[derive(Debug, Clone)]
pub struct ExecuteWriteRequest {
    /// Cancel or execute
    pub flags: ExecuteWriteFlags,
}

impl AttPacket for ExecuteWriteRequest {
    fn opcode() -> u8 {
        ATT_EXECUTE_WRITE_REQ
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let &flags = payload.first().ok_or(AttError::InvalidPdu)?;
        Ok(Self { flags: ExecuteWriteFlags::try_from(flags)? })
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode(), self.flags.into()]
    }
}

/// Execute Write Response packet
#[derive(Debug, Clone)]
pub struct ExecuteWriteResponse;

impl AttPacket for ExecuteWriteResponse {
    fn opcode() -> u8 {
        ATT_EXECUTE_WRITE_RSP
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        if !payload.is_empty() {
            return Err(AttError::InvalidPdu);
        }
        Ok(Self)
    }

    fn serialize(&self) -> Vec<u8> {
        vec![Self::opcode()]
    }
}

/// Handle Value Notification packet
#[derive(Debug, Clone)]
pub struct HandleValueNotification {
    /// Attribute handle
    pub handle: u16,
    /// Attribute value
    pub value: Vec<u8>,
}

impl AttPacket for HandleValueNotification {
    fn opcode() -> u8 {
        ATT_HANDLE_VALUE_NTF
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(payload);
        let handle = read_u16(&mut cursor)?;
        Ok(Self { handle, value: rest(payload, 2)?.to_vec() })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

/// Handle Value Indication packet
#[derive(Debug, Clone)]
pub struct HandleValueIndication {
    /// Attribute handle
    pub handle: u16,
    /// Attribute value
    pub value: Vec<u8>,
}

impl AttPacket for HandleValueIndication {
    fn opcode() -> u8 {
        ATT_HANDLE_VALUE_IND
    }

    fn parse(payload: &[u8]) -> AttResult<Self> {
        let mut cursor = Cursor::new(payload);
        let handle = read_u16(&mut cursor)?;
        Ok(Self { handle, value: rest(payload, 2)?.to_vec() })
    }

    fn serialize(&self) -> Vec<u8> {
        let mut packet = vec![Self::opcode()];
        packet.extend_from_slice(&self.handle.to_le_bytes());
        packet.extend_from_slice(&self.value);
        packet
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_response_layout() {
        let rsp = ErrorResponse::new(ATT_READ_REQ, 0x0102, AttErrorCode::InvalidHandle);
        assert_eq!(rsp.serialize(), vec![0x01, 0x0A, 0x02, 0x01, 0x01]);
        let parsed = ErrorResponse::parse(&rsp.serialize()[1..]).unwrap();
        assert_eq!(parsed, rsp);
    }

    #[test]
    fn read_by_type_request_rejects_odd_uuid_length() {
        let err = ReadByTypeRequest::parse(&[0x01, 0x00, 0xFF, 0xFF, 0x03, 0x28, 0x00]).unwrap_err();
        assert_eq!(err.to_error_code(), AttErrorCode::InvalidAttributeValueLength);
        assert_eq!(err.handle(), Some(0x0001));
    }

    #[test]
    fn read_by_type_request_128_bit_type() {
        let mut payload = vec![0x01, 0x00, 0xFF, 0xFF];
        payload.extend_from_slice(&[0xAA; 16]);
        let req = ReadByTypeRequest::parse(&payload).unwrap();
        assert_eq!(req.attribute_type, Uuid::Uuid128([0xAA; 16]));
        assert_eq!(&req.serialize()[1..], &payload[..]);
    }

    #[test]
    fn signed_write_splits_signature() {
        let mut payload = vec![0x10, 0x00, 0xDE, 0xAD];
        payload.extend_from_slice(&[0x55; ATT_SIGNATURE_LEN]);
        let cmd = SignedWriteCommand::parse(&payload).unwrap();
        assert_eq!(cmd.handle, 0x0010);
        assert_eq!(cmd.value, vec![0xDE, 0xAD]);
        assert_eq!(cmd.signature, [0x55; ATT_SIGNATURE_LEN]);
        assert!(SignedWriteCommand::parse(&payload[..13]).is_err());
    }

    #[test]
    fn read_multiple_needs_two_handles() {
        assert!(ReadMultipleRequest::parse(&[0x01, 0x00]).is_err());
        assert!(ReadMultipleRequest::parse(&[0x01, 0x00, 0x02]).is_err());
        let req = ReadMultipleRequest::parse(&[0x01, 0x00, 0x02, 0x00]).unwrap();
        assert_eq!(req.handles, vec![1, 2]);
    }

    #[test]
    fn execute_write_flags() {
        assert_eq!(ExecuteWriteRequest::parse(&[0x00]).unwrap().flags, ExecuteWriteFlags::Cancel);
        assert_eq!(ExecuteWriteRequest::parse(&[0x01]).unwrap().flags, ExecuteWriteFlags::Execute);
        assert!(ExecuteWriteRequest::parse(&[0x02]).is_err());
    }

    #[test]
    fn range_validity() {
        assert!(HandleRange::new(1, 1).is_valid());
        assert!(!HandleRange::new(0, 5).is_valid());
        assert!(!HandleRange::new(6, 5).is_valid());

        let mut range = HandleRange::new(1, ATT_HANDLE_MAX);
        assert!(!range.advance_past(ATT_HANDLE_MAX));
        assert!(range.is_exhausted());
    }
}
