//! In-memory attribute database
use super::constants::*;
use super::database::{AccessFlags, AttributeDatabase, PeerContext, SearchStep, SecurityState};
use super::error::{AttError, AttErrorCode, AttResult, DbError, DbResult};
use super::types::{
    AttPermissions, AttributeData, HandleRange, HandleUuidPair, HandleValue, SecurityLevel,
};
use crate::uuid::{Uuid, UuidFormat};
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// An attribute in the database
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Attribute handle
    pub handle: u16,
    /// Attribute type (UUID)
    pub type_: Uuid,
    /// Attribute value
    pub value: Vec<u8>,
    /// Attribute permissions
    pub permissions: AttPermissions,
    /// Largest value a write may leave behind
    pub max_len: usize,
}

impl Attribute {
    /// Create a new attribute
    pub fn new(handle: u16, type_: Uuid, value: Vec<u8>, permissions: AttPermissions) -> Self {
        Self {
            handle,
            type_,
            value,
            permissions,
            max_len: ATT_MAX_ATTRIBUTE_LEN,
        }
    }

    /// Limit the value length accepted by writes
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = max_len.min(ATT_MAX_ATTRIBUTE_LEN);
        self
    }

    /// Whether this attribute opens a service group
    pub fn is_service(&self) -> bool {
        is_service_type(&self.type_)
    }

    fn local_only(&self) -> bool {
        self.permissions.contains(AttPermissions::LOCAL_ONLY)
    }

    fn check_read(&self, security: &SecurityState) -> DbResult<()> {
        if !self.permissions.contains(AttPermissions::READ) {
            return Err(DbError::InvalidOperation);
        }
        check_security(
            self.permissions,
            security,
            AttPermissions::READ_ENCRYPTED,
            AttPermissions::READ_AUTHENTICATED,
            AttPermissions::READ_AUTHORIZED,
        )
    }

    fn check_write(&self, security: &SecurityState) -> DbResult<()> {
        if !self.permissions.contains(AttPermissions::WRITE) {
            return Err(DbError::InvalidOperation);
        }
        check_security(
            self.permissions,
            security,
            AttPermissions::WRITE_ENCRYPTED,
            AttPermissions::WRITE_AUTHENTICATED,
            AttPermissions::WRITE_AUTHORIZED,
        )
    }
}

fn check_security(
    permissions: AttPermissions,
    security: &SecurityState,
    encrypted: AttPermissions,
    authenticated: AttPermissions,
    authorized: AttPermissions,
) -> DbResult<()> {
    if permissions.contains(authenticated)
        && security.level < SecurityLevel::EncryptionWithAuthentication
    {
        return Err(DbError::InsufficientSecurity);
    }
    if permissions.contains(encrypted) && security.level < SecurityLevel::EncryptionOnly {
        return Err(DbError::InsufficientEncryption);
    }
    if permissions.intersects(encrypted | authenticated)
        && permissions.contains(AttPermissions::ENCRYPTION_KEY_128)
        && security.key_size < 16
    {
        return Err(DbError::InsufficientEncKeySize);
    }
    if permissions.contains(authorized) && !security.authorized {
        return Err(DbError::InsufficientAuthorization);
    }
    Ok(())
}

fn is_service_type(uuid: &Uuid) -> bool {
    uuid.matches(&Uuid::from_u16(PRIMARY_SERVICE_UUID))
        || uuid.matches(&Uuid::from_u16(SECONDARY_SERVICE_UUID))
}

/// Compare a stored value with a searched one.
///
/// Service declarations hold UUIDs, which match across widths.
fn value_matches(attr: &Attribute, value: &[u8]) -> bool {
    if attr.is_service() {
        if let (Some(stored), Some(wanted)) = (Uuid::from_bytes(&attr.value), Uuid::from_bytes(value)) {
            return stored.matches(&wanted);
        }
    }
    attr.value == value
}

/// Attribute read hook, supplying the full value in place of the stored one
pub type ReadHook = Arc<dyn Fn(&PeerContext, u16) -> DbResult<Vec<u8>> + Send + Sync>;

/// Attribute write hook, run before a peer or local write is stored
pub type WriteHook = Arc<dyn Fn(&PeerContext, u16, u16, &[u8]) -> DbResult<()> + Send + Sync>;

/// Attribute database backed by an ordered map
pub struct MemoryDatabase {
    /// Map of handles to attributes
    attributes: RwLock<BTreeMap<u16, Attribute>>,
    /// Map of handles to read hooks
    read_hooks: RwLock<BTreeMap<u16, ReadHook>>,
    /// Map of handles to write hooks
    write_hooks: RwLock<BTreeMap<u16, WriteHook>>,
    /// Next available handle
    next_handle: RwLock<u32>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    /// Create a new empty attribute database
    pub fn new() -> Self {
        Self {
            attributes: RwLock::new(BTreeMap::new()),
            read_hooks: RwLock::new(BTreeMap::new()),
            write_hooks: RwLock::new(BTreeMap::new()),
            next_handle: RwLock::new(ATT_HANDLE_MIN as u32),
        }
    }

    fn attributes(&self) -> RwLockReadGuard<'_, BTreeMap<u16, Attribute>> {
        self.attributes.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn attributes_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<u16, Attribute>> {
        self.attributes.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add an attribute to the database
    pub fn add_attribute(&self, attr: Attribute) -> AttResult<u16> {
        let handle = attr.handle;
        if handle == ATT_HANDLE_INVALID {
            return Err(AttError::InvalidParameter("Handle 0x0000 is reserved".into()));
        }

        let mut attributes = self.attributes_mut();
        if attributes.contains_key(&handle) {
            return Err(AttError::InvalidParameter(format!("Duplicate handle: {}", handle)));
        }

        let mut next_handle = self.next_handle.write().unwrap_or_else(PoisonError::into_inner);
        if handle as u32 >= *next_handle {
            *next_handle = handle as u32 + 1;
        }

        attributes.insert(handle, attr);
        Ok(handle)
    }

    /// Add an attribute with the next available handle
    pub fn add_attribute_with_next_handle(
        &self,
        type_: Uuid,
        value: Vec<u8>,
        permissions: AttPermissions,
    ) -> AttResult<u16> {
        let next = *self.next_handle.read().unwrap_or_else(PoisonError::into_inner);
        let handle = u16::try_from(next)
            .map_err(|_| AttError::InvalidParameter("Handle space exhausted".into()))?;
        self.add_attribute(Attribute::new(handle, type_, value, permissions))
    }

    /// Add a primary service declaration
    pub fn add_primary_service(&self, uuid: Uuid) -> AttResult<u16> {
        self.add_attribute_with_next_handle(
            Uuid::from_u16(PRIMARY_SERVICE_UUID),
            uuid.as_bytes(),
            AttPermissions::read_only(),
        )
    }

    /// Add a secondary service declaration
    pub fn add_secondary_service(&self, uuid: Uuid) -> AttResult<u16> {
        self.add_attribute_with_next_handle(
            Uuid::from_u16(SECONDARY_SERVICE_UUID),
            uuid.as_bytes(),
            AttPermissions::read_only(),
        )
    }

    /// Add a characteristic declaration followed by its value attribute.
    ///
    /// Returns the value handle.
    pub fn add_characteristic(
        &self,
        properties: u8,
        uuid: Uuid,
        value: Vec<u8>,
        permissions: AttPermissions,
    ) -> AttResult<u16> {
        let next = *self.next_handle.read().unwrap_or_else(PoisonError::into_inner);
        let value_handle = u16::try_from(next + 1)
            .map_err(|_| AttError::InvalidParameter("Handle space exhausted".into()))?;

        let mut declaration = vec![properties];
        declaration.extend_from_slice(&value_handle.to_le_bytes());
        uuid.write_to(&mut declaration);

        self.add_attribute_with_next_handle(
            Uuid::from_u16(CHARACTERISTIC_UUID),
            declaration,
            AttPermissions::read_only(),
        )?;
        self.add_attribute_with_next_handle(uuid, value, permissions)
    }

    /// Add a descriptor after the most recent attribute
    pub fn add_descriptor(
        &self,
        uuid: Uuid,
        value: Vec<u8>,
        permissions: AttPermissions,
    ) -> AttResult<u16> {
        self.add_attribute_with_next_handle(uuid, value, permissions)
    }

    /// Register a read hook for a handle
    pub fn register_read_hook(&self, handle: u16, hook: ReadHook) -> AttResult<()> {
        if !self.attributes().contains_key(&handle) {
            return Err(AttError::Protocol(AttErrorCode::InvalidHandle, handle));
        }
        self.read_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, hook);
        Ok(())
    }

    /// Register a write hook for a handle
    pub fn register_write_hook(&self, handle: u16, hook: WriteHook) -> AttResult<()> {
        if !self.attributes().contains_key(&handle) {
            return Err(AttError::Protocol(AttErrorCode::InvalidHandle, handle));
        }
        self.write_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, hook);
        Ok(())
    }

    /// Get an attribute by handle
    pub fn get_attribute(&self, handle: u16) -> Option<Attribute> {
        self.attributes().get(&handle).cloned()
    }

    /// Stored value of an attribute
    pub fn value(&self, handle: u16) -> Option<Vec<u8>> {
        self.attributes().get(&handle).map(|attr| attr.value.clone())
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.attributes().len()
    }

    /// Whether the database holds no attributes
    pub fn is_empty(&self) -> bool {
        self.attributes().is_empty()
    }

    /// First attribute in `range` satisfying `pred`
    fn first_in<F>(&self, range: &HandleRange, pred: F) -> Option<Attribute>
    where
        F: Fn(&Attribute) -> bool,
    {
        if range.is_exhausted() {
            return None;
        }
        self.attributes()
            .range(range.start..=range.end)
            .map(|(_, attr)| attr)
            .find(|attr| pred(*attr))
            .cloned()
    }

    /// Move the cursor past `handle` and report whether another candidate
    /// remains in the range.
    fn advance<F>(&self, range: &mut HandleRange, handle: u16, pred: F) -> bool
    where
        F: Fn(&Attribute) -> bool,
    {
        range.advance_past(handle) && self.first_in(range, pred).is_some()
    }

    /// Last handle belonging to the group opened at `attr`
    fn group_end(&self, attr: &Attribute) -> u16 {
        if !attr.is_service() {
            return attr.handle;
        }
        let attributes = self.attributes();
        let Some(after) = attr.handle.checked_add(1) else {
            return attr.handle;
        };
        attributes
            .range(after..)
            .find(|(_, next)| next.is_service())
            .map(|(&handle, _)| handle - 1)
            .or_else(|| attributes.keys().next_back().copied())
            .unwrap_or(attr.handle)
    }

    fn read_value(&self, peer: &PeerContext, attr: &Attribute) -> DbResult<Vec<u8>> {
        let hook = self
            .read_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&attr.handle)
            .cloned();
        match hook {
            Some(hook) => hook(peer, attr.handle),
            None => Ok(attr.value.clone()),
        }
    }

    /// Shared walk for value-carrying searches.
    ///
    /// Skips local-only records and leaves the cursor on a record that
    /// cannot be read.
    fn next_readable<F>(
        &self,
        peer: &PeerContext,
        range: &mut HandleRange,
        pred: F,
    ) -> DbResult<Option<(Attribute, Vec<u8>, bool)>>
    where
        F: Fn(&Attribute) -> bool,
    {
        let Some(attr) = self.first_in(range, &pred) else {
            return Ok(None);
        };
        if attr.local_only() {
            range.advance_past(attr.handle);
            return Err(DbError::InvalidTransportAccess);
        }

        range.start = attr.handle;
        attr.check_read(&peer.security)?;
        let value = self.read_value(peer, &attr)?;
        let more = self.advance(range, attr.handle, &pred);
        Ok(Some((attr, value, more)))
    }
}

fn step<T>(item: T, more: bool) -> SearchStep<T> {
    if more {
        SearchStep::More(item)
    } else {
        SearchStep::Last(item)
    }
}

impl AttributeDatabase for MemoryDatabase {
    fn get_handle_uuid_pair(
        &self,
        _peer: &PeerContext,
        range: &mut HandleRange,
        format: UuidFormat,
    ) -> DbResult<SearchStep<HandleUuidPair>> {
        let Some(attr) = self.first_in(range, |_| true) else {
            return Ok(SearchStep::Done);
        };
        if attr.local_only() {
            range.advance_past(attr.handle);
            return Err(DbError::InvalidTransportAccess);
        }
        if attr.type_.format() != format {
            range.start = attr.handle;
            return Err(DbError::IncorrectUuidFormat);
        }

        let more = self.advance(range, attr.handle, |_| true);
        let pair = HandleUuidPair {
            handle: attr.handle,
            uuid: attr.type_,
        };
        Ok(step(pair, more))
    }

    fn get_handle_value_pair(
        &self,
        peer: &PeerContext,
        range: &mut HandleRange,
        attr_type: &Uuid,
    ) -> DbResult<SearchStep<HandleValue>> {
        let found = self.next_readable(peer, range, |attr| attr.type_.matches(attr_type))?;
        Ok(match found {
            Some((attr, value, more)) => step(HandleValue { handle: attr.handle, value }, more),
            None => SearchStep::Done,
        })
    }

    fn get_range_by_type_val(
        &self,
        _peer: &PeerContext,
        range: &mut HandleRange,
        attr_type: &Uuid,
        value: &[u8],
    ) -> DbResult<SearchStep<HandleRange>> {
        let pred = |attr: &Attribute| attr.type_.matches(attr_type) && value_matches(attr, value);
        let Some(attr) = self.first_in(range, pred) else {
            return Ok(SearchStep::Done);
        };
        if attr.local_only() {
            range.advance_past(attr.handle);
            return Err(DbError::InvalidTransportAccess);
        }

        let found = HandleRange::new(attr.handle, self.group_end(&attr));
        let more = self.advance(range, attr.handle, pred);
        Ok(step(found, more))
    }

    fn get_group_range_val_pair(
        &self,
        peer: &PeerContext,
        range: &mut HandleRange,
        group_type: &Uuid,
    ) -> DbResult<SearchStep<AttributeData>> {
        if !is_service_type(group_type) {
            return Err(DbError::UnsupportedGroupType);
        }

        let found = self.next_readable(peer, range, |attr| attr.type_.matches(group_type))?;
        Ok(match found {
            Some((attr, value, more)) => {
                let data = AttributeData {
                    range: HandleRange::new(attr.handle, self.group_end(&attr)),
                    value,
                };
                step(data, more)
            }
            None => SearchStep::Done,
        })
    }

    fn access_handle(
        &self,
        peer: &PeerContext,
        handle: u16,
        offset: u16,
        data: &[u8],
        flags: AccessFlags,
    ) -> DbResult<Vec<u8>> {
        if handle == ATT_HANDLE_INVALID {
            return Err(DbError::InvalidAttrHandle);
        }
        let attr = self.get_attribute(handle).ok_or(DbError::HandleNotFound)?;

        let local = flags.contains(AccessFlags::LOCALLY_INITIATED);
        if !local && attr.local_only() {
            return Err(DbError::InvalidTransportAccess);
        }
        let offset = offset as usize;

        if flags.contains(AccessFlags::READ) {
            if !local {
                attr.check_read(&peer.security)?;
            }
            let value = self.read_value(peer, &attr)?;
            if offset > value.len() {
                return Err(DbError::InvalidOffset);
            }
            return Ok(value[offset..].to_vec());
        }

        if !flags.intersects(AccessFlags::WRITE | AccessFlags::PREPARE | AccessFlags::WRITE_WITHOUT_RSP) {
            return Err(DbError::InvalidOperation);
        }
        if !local {
            attr.check_write(&peer.security)?;
        }
        if offset > attr.max_len {
            return Err(DbError::InvalidOffset);
        }
        if offset + data.len() > attr.max_len {
            return Err(DbError::InsufficientBufferLen);
        }
        if flags.contains(AccessFlags::PREPARE) {
            return Ok(Vec::new());
        }
        if offset > attr.value.len() {
            return Err(DbError::InvalidOffset);
        }

        let hook = self
            .write_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .cloned();
        if let Some(hook) = hook {
            hook(peer, handle, offset as u16, data)?;
        }

        if let Some(attr) = self.attributes_mut().get_mut(&handle) {
            attr.value.truncate(offset);
            attr.value.extend_from_slice(data);
        }
        Ok(Vec::new())
    }

    fn peer_session_shutdown(&self, peer: &PeerContext) {
        debug!("Releasing database state for session {}", peer.session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::session::SessionId;

    fn peer() -> PeerContext {
        PeerContext {
            session: SessionId(1),
            security: SecurityState::default(),
        }
    }

    fn two_services() -> MemoryDatabase {
        let db = MemoryDatabase::new();
        db.add_primary_service(Uuid::from_u16(0x1800)).unwrap();
        db.add_characteristic(0x02, Uuid::from_u16(0x2A00), b"dev".to_vec(), AttPermissions::read_only())
            .unwrap();
        db.add_primary_service(Uuid::from_u16(0x180F)).unwrap();
        db.add_characteristic(0x12, Uuid::from_u16(0x2A19), vec![100], AttPermissions::read_only())
            .unwrap();
        db
    }

    #[test]
    fn service_group_ends_before_next_service() {
        let db = two_services();
        let mut range = HandleRange::new(1, 0xFFFF);
        let group = Uuid::from_u16(PRIMARY_SERVICE_UUID);

        let first = db.get_group_range_val_pair(&peer(), &mut range, &group).unwrap();
        assert_eq!(
            first,
            SearchStep::More(AttributeData {
                range: HandleRange::new(1, 3),
                value: vec![0x00, 0x18],
            })
        );
        assert_eq!(range.start, 2);

        let second = db.get_group_range_val_pair(&peer(), &mut range, &group).unwrap();
        assert_eq!(
            second,
            SearchStep::Last(AttributeData {
                range: HandleRange::new(4, 6),
                value: vec![0x0F, 0x18],
            })
        );
    }

    #[test]
    fn non_service_group_type_is_rejected() {
        let db = two_services();
        let mut range = HandleRange::new(1, 0xFFFF);
        let err = db
            .get_group_range_val_pair(&peer(), &mut range, &Uuid::from_u16(CHARACTERISTIC_UUID))
            .unwrap_err();
        assert_eq!(err, DbError::UnsupportedGroupType);
        assert_eq!(range.start, 1);
    }

    #[test]
    fn local_only_records_are_skipped() {
        let db = MemoryDatabase::new();
        db.add_attribute(Attribute::new(
            1,
            Uuid::from_u16(0x2A00),
            vec![1],
            AttPermissions::READ | AttPermissions::LOCAL_ONLY,
        ))
        .unwrap();
        db.add_attribute(Attribute::new(2, Uuid::from_u16(0x2A00), vec![2], AttPermissions::READ))
            .unwrap();

        let mut range = HandleRange::new(1, 0xFFFF);
        let ty = Uuid::from_u16(0x2A00);
        assert_eq!(
            db.get_handle_value_pair(&peer(), &mut range, &ty),
            Err(DbError::InvalidTransportAccess)
        );
        assert_eq!(range.start, 2);
        assert_eq!(
            db.get_handle_value_pair(&peer(), &mut range, &ty),
            Ok(SearchStep::Last(HandleValue { handle: 2, value: vec![2] }))
        );
    }

    #[test]
    fn unreadable_record_keeps_cursor() {
        let db = MemoryDatabase::new();
        db.add_attribute(Attribute::new(5, Uuid::from_u16(0x2A00), vec![1], AttPermissions::WRITE))
            .unwrap();
        let mut range = HandleRange::new(1, 0xFFFF);
        assert_eq!(
            db.get_handle_value_pair(&peer(), &mut range, &Uuid::from_u16(0x2A00)),
            Err(DbError::InvalidOperation)
        );
        assert_eq!(range.start, 5);
    }

    #[test]
    fn find_info_reports_format_mismatch() {
        let db = MemoryDatabase::new();
        db.add_attribute(Attribute::new(1, Uuid::from_u128(0x1234), vec![], AttPermissions::READ))
            .unwrap();
        let mut range = HandleRange::new(1, 0xFFFF);
        assert_eq!(
            db.get_handle_uuid_pair(&peer(), &mut range, UuidFormat::Bits16),
            Err(DbError::IncorrectUuidFormat)
        );
        assert_eq!(range.start, 1);
    }

    #[test]
    fn write_with_offset_and_limits() {
        let db = MemoryDatabase::new();
        db.add_attribute(
            Attribute::new(1, Uuid::from_u16(0x2A00), b"hello".to_vec(), AttPermissions::read_write())
                .with_max_len(8),
        )
        .unwrap();
        let write = AccessFlags::WRITE | AccessFlags::PEER_INITIATED;

        db.access_handle(&peer(), 1, 2, b"LP", write).unwrap();
        assert_eq!(db.value(1).unwrap(), b"heLP".to_vec());
        assert_eq!(db.access_handle(&peer(), 1, 5, b"x", write), Err(DbError::InvalidOffset));
        assert_eq!(
            db.access_handle(&peer(), 1, 4, b"toolong", write),
            Err(DbError::InsufficientBufferLen)
        );
        // prepare only validates
        db.access_handle(&peer(), 1, 6, b"ab", AccessFlags::PREPARE | AccessFlags::PEER_INITIATED)
            .unwrap();
        assert_eq!(db.value(1).unwrap(), b"heLP".to_vec());
    }

    #[test]
    fn security_requirements() {
        let db = MemoryDatabase::new();
        db.add_attribute(Attribute::new(
            1,
            Uuid::from_u16(0x2A00),
            vec![1],
            AttPermissions::authenticated() | AttPermissions::ENCRYPTION_KEY_128,
        ))
        .unwrap();
        let read = AccessFlags::READ | AccessFlags::PEER_INITIATED;

        assert_eq!(db.access_handle(&peer(), 1, 0, &[], read), Err(DbError::InsufficientSecurity));

        let mut secure = peer();
        secure.security.level = SecurityLevel::EncryptionWithAuthentication;
        secure.security.key_size = 7;
        assert_eq!(db.access_handle(&secure, 1, 0, &[], read), Err(DbError::InsufficientEncKeySize));

        secure.security.key_size = 16;
        assert_eq!(db.access_handle(&secure, 1, 0, &[], read), Ok(vec![1]));

        // the application bypasses peer permissions
        let local = AccessFlags::READ | AccessFlags::LOCALLY_INITIATED;
        assert_eq!(db.access_handle(&peer(), 1, 0, &[], local), Ok(vec![1]));
    }
}
