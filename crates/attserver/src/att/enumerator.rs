//! Bounded multi-result searches over the attribute database
//!
//! Each search calls the adapter one record at a time and stops at the
//! first of: configured entry cap, MTU budget, a record that would break
//! the response format, the end of the range, or an adapter error. Whatever
//! was gathered by then is a valid response; gathering nothing is an error
//! naming the offending handle.
use super::constants::*;
use super::database::{AttributeDatabase, PeerContext, SearchStep};
use super::error::{DbError, DbResult};
use super::types::{AttributeData, HandleRange, HandleUuidPair, HandleValue};
use crate::uuid::{Uuid, UuidFormat};
use log::{debug, trace, warn};
use smallvec::{Array, SmallVec};

/// Find Information results
pub type FindInfoList = SmallVec<[HandleUuidPair; ATT_DEFAULT_MAX_FIND_INFO_ENTRIES]>;
/// Find By Type Value results
pub type RangeList = SmallVec<[HandleRange; ATT_DEFAULT_MAX_HANDLE_VALUE_ENTRIES]>;
/// Read By Type results
pub type HandleValueList = SmallVec<[HandleValue; ATT_DEFAULT_MAX_HANDLE_VALUE_ENTRIES]>;
/// Read By Group Type results
pub type GroupList = SmallVec<[AttributeData; ATT_DEFAULT_MAX_GROUP_ENTRIES]>;

/// Why a search produced no entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchFailure {
    /// Nothing matched; carries the range start
    NotFound(u16),
    /// The adapter failed on the given record
    Adapter(DbError, u16),
}

impl SearchFailure {
    /// Handle to name in the Error Response
    pub fn handle(&self) -> u16 {
        match self {
            SearchFailure::NotFound(handle) | SearchFailure::Adapter(_, handle) => *handle,
        }
    }
}

/// Drive `next` across `range`, keeping entries accepted by `fits`.
///
/// A deferral fails the whole search even after entries were gathered, so
/// the request is answered once the application completes it.
fn collect<A, N, F>(
    range: HandleRange,
    max_entries: usize,
    mut next: N,
    mut fits: F,
) -> Result<SmallVec<A>, SearchFailure>
where
    A: Array,
    N: FnMut(&mut HandleRange) -> DbResult<SearchStep<A::Item>>,
    F: FnMut(&[A::Item], &A::Item) -> bool,
{
    let mut cursor = range;
    let mut items: SmallVec<A> = SmallVec::new();
    let mut failure = None;

    while items.len() < max_entries && !cursor.is_exhausted() {
        let before = cursor.start;
        match next(&mut cursor) {
            Ok(step) => {
                let (item, more) = step.into_parts();
                let Some(item) = item else {
                    break;
                };
                if !fits(&items, &item) {
                    trace!("Search stopped at a record that does not fit the response");
                    break;
                }
                items.push(item);
                if !more {
                    break;
                }
            }
            Err(DbError::InvalidTransportAccess) => {
                trace!("Skipping a record inaccessible over this transport");
            }
            Err(err) => {
                failure = Some(SearchFailure::Adapter(err, cursor.start));
                break;
            }
        }
        if cursor.start <= before && !cursor.is_exhausted() {
            warn!("Database did not advance past handle 0x{:04X}", before);
            break;
        }
    }

    match failure {
        Some(deferred @ SearchFailure::Adapter(DbError::Deferred, _)) => {
            debug!("Search deferred after {} entries, dropping them", items.len());
            Err(deferred)
        }
        _ if !items.is_empty() => Ok(items),
        failure => Err(failure.unwrap_or(SearchFailure::NotFound(range.start))),
    }
}

/// Acceptance rule for responses whose entries share one value length.
///
/// The first entry fixes the length. `header` is the per-entry overhead and
/// `cap_len` the protocol truncation limit.
fn uniform_length<T>(
    value_len: impl Fn(&T) -> usize,
    header: usize,
    cap_len: usize,
    budget: usize,
) -> impl FnMut(&[T], &T) -> bool {
    move |items: &[T], item: &T| match items.first() {
        None => true,
        Some(first) => {
            let len = value_len(first);
            value_len(item) == len && (items.len() + 1) * (header + len.min(cap_len)) <= budget
        }
    }
}

/// Find Information: handles and types, all of one UUID width.
///
/// The search starts in 16-bit format and switches to 128-bit only if the
/// first candidate needs it.
pub fn find_information<D: AttributeDatabase + ?Sized>(
    db: &D,
    peer: &PeerContext,
    range: HandleRange,
    mtu: usize,
    max_entries: usize,
) -> Result<(UuidFormat, FindInfoList), SearchFailure> {
    let mut format = UuidFormat::Bits16;
    loop {
        let capacity = max_entries.min((mtu - 2) / (2 + format.size()));
        let result: Result<FindInfoList, SearchFailure> = collect(
            range,
            capacity,
            move |cursor: &mut HandleRange| db.get_handle_uuid_pair(peer, cursor, format),
            |_: &[HandleUuidPair], _: &HandleUuidPair| true,
        );
        match result {
            Err(SearchFailure::Adapter(DbError::IncorrectUuidFormat, _))
                if format == UuidFormat::Bits16 =>
            {
                debug!("First attribute needs 128-bit format, retrying");
                format = UuidFormat::Bits128;
            }
            result => return result.map(|list| (format, list)),
        }
    }
}

/// Find By Type Value: group ranges of attributes with a given type and value
pub fn find_by_type_value<D: AttributeDatabase + ?Sized>(
    db: &D,
    peer: &PeerContext,
    range: HandleRange,
    attr_type: &Uuid,
    value: &[u8],
    mtu: usize,
    max_entries: usize,
) -> Result<RangeList, SearchFailure> {
    let capacity = max_entries.min((mtu - 1) / 4);
    collect(
        range,
        capacity,
        |cursor: &mut HandleRange| db.get_range_by_type_val(peer, cursor, attr_type, value),
        |_: &[HandleRange], _: &HandleRange| true,
    )
}

/// Read By Type: handle-value pairs sharing one value length.
///
/// Values come back truncated to `min(MTU-4, 253)`.
pub fn read_by_type<D: AttributeDatabase + ?Sized>(
    db: &D,
    peer: &PeerContext,
    range: HandleRange,
    attr_type: &Uuid,
    mtu: usize,
    max_entries: usize,
) -> Result<HandleValueList, SearchFailure> {
    let cap_len = (mtu - 4).min(ATT_READ_BY_TYPE_MAX_VALUE);
    let mut list: HandleValueList = collect(
        range,
        max_entries,
        |cursor: &mut HandleRange| db.get_handle_value_pair(peer, cursor, attr_type),
        uniform_length(|item: &HandleValue| item.value.len(), 2, cap_len, mtu - 2),
    )?;
    for item in list.iter_mut() {
        item.value.truncate(cap_len);
    }
    Ok(list)
}

/// Read By Group Type: group ranges and values sharing one value length.
///
/// Values come back truncated to `min(MTU-6, 251)`.
pub fn read_by_group_type<D: AttributeDatabase + ?Sized>(
    db: &D,
    peer: &PeerContext,
    range: HandleRange,
    group_type: &Uuid,
    mtu: usize,
    max_entries: usize,
) -> Result<GroupList, SearchFailure> {
    let cap_len = (mtu - 6).min(ATT_READ_BY_GROUP_MAX_VALUE);
    let mut list: GroupList = collect(
        range,
        max_entries,
        |cursor: &mut HandleRange| db.get_group_range_val_pair(peer, cursor, group_type),
        uniform_length(|item: &AttributeData| item.value.len(), 4, cap_len, mtu - 2),
    )?;
    for item in list.iter_mut() {
        item.value.truncate(cap_len);
    }
    Ok(list)
}
