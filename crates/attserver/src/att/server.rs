//! ATT server implementation
//!
//! [`AttServer`] turns one inbound PDU into at most one outbound PDU. It
//! keeps no per-connection state of its own: everything that outlives a
//! request lives in the [`AttSession`] the caller passes in.
use super::config::AttServerConfig;
use super::constants::*;
use super::database::{AccessFlags, AttributeDatabase, PeerContext, SecurityState};
use super::enumerator::{self, SearchFailure};
use super::error::{AttError, AttErrorCode, AttResult, DbError, DbResult};
use super::events::{NoopEvents, SessionEvents, SignedWriteStatus};
use super::length::validate_pdu_len;
use super::mapping::{map_db_error, AccessKind, Mapped};
use super::queue::QueuedWrite;
use super::session::{AttSession, PendingKind, PendingResponse, PendingSignedWrite, SessionId};
use super::types::*;
use crate::uuid::Uuid;
use log::{debug, info, trace, warn};
use std::sync::Arc;

/// What the transport should do after a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Send this PDU to the peer
    Response(Vec<u8>),
    /// Send nothing yet; `AttServer::complete_deferred` produces the response
    Deferred,
    /// Send nothing
    Silent,
}

/// Whether a PDU never gets an answer
fn is_unanswered(opcode: u8) -> bool {
    opcode & ATT_COMMAND_FLAG != 0 || opcode == ATT_HANDLE_VALUE_CONF
}

fn access_kind(opcode: u8) -> AccessKind {
    match opcode {
        ATT_READ_REQ | ATT_READ_BLOB_REQ | ATT_READ_MULTIPLE_REQ => AccessKind::Read,
        ATT_WRITE_REQ | ATT_WRITE_CMD | ATT_SIGNED_WRITE_CMD | ATT_PREPARE_WRITE_REQ
        | ATT_EXECUTE_WRITE_REQ => AccessKind::Write,
        _ => AccessKind::Search,
    }
}

fn check_range(range: HandleRange) -> AttResult<()> {
    if !range.is_valid() {
        return Err(AttError::Protocol(AttErrorCode::InvalidHandle, range.start));
    }
    Ok(())
}

/// Peer context used for accesses made by the local application
fn local_peer() -> PeerContext {
    PeerContext {
        session: SessionId::LOCAL,
        security: SecurityState {
            level: SecurityLevel::SecureConnections,
            key_size: 16,
            authorized: true,
        },
    }
}

/// ATT Server
pub struct AttServer<D: ?Sized> {
    /// Attribute database
    database: Arc<D>,
    /// Session event sink
    events: Arc<dyn SessionEvents>,
    /// Server configuration
    config: AttServerConfig,
}

impl<D: AttributeDatabase + ?Sized> AttServer<D> {
    /// Create a new ATT server
    pub fn new(database: Arc<D>, config: AttServerConfig) -> AttResult<Self> {
        config.validate()?;
        Ok(Self {
            database,
            events: Arc::new(NoopEvents),
            config,
        })
    }

    /// Replace the event sink
    pub fn with_events(mut self, events: Arc<dyn SessionEvents>) -> Self {
        self.events = events;
        self
    }

    /// Get server configuration
    pub fn config(&self) -> &AttServerConfig {
        &self.config
    }

    /// Attribute database
    pub fn database(&self) -> &Arc<D> {
        &self.database
    }

    /// Accept a client connection
    pub fn accept_client(&self, id: SessionId) -> AttSession {
        let session = AttSession::new(id, &self.config);
        info!("Session {} connected", id);
        self.events.transport_connected(id);
        session
    }

    /// Disconnect a client, dropping everything the session still holds
    pub fn disconnect_client(&self, mut session: AttSession) {
        if let Some(pending) = session.pending_response.take() {
            debug!(
                "Session {} abandoning deferred response to opcode 0x{:02X}",
                session.id, pending.opcode
            );
        }
        if session.pending_signed_write.take().is_some() {
            debug!("Session {} abandoning unverified signed write", session.id);
        }
        session.queue.reset();
        self.database.peer_session_shutdown(&session.peer());
        info!("Session {} disconnected", session.id);
        self.events.transport_disconnected(session.id);
    }

    /// Set client security state
    pub fn set_client_security(&self, session: &mut AttSession, security: SecurityState) {
        debug!(
            "Session {} security now {:?} (key size {})",
            session.id, security.level, security.key_size
        );
        session.security = security;
    }

    /// Handle a received ATT PDU
    pub fn handle_att_pdu(&self, session: &mut AttSession, data: &[u8]) -> AttResult<DispatchOutcome> {
        let (&opcode, payload) = data.split_first().ok_or(AttError::InvalidPdu)?;
        self.dispatch(session, opcode, payload, true)
    }

    /// Dispatch one PDU.
    ///
    /// Protocol failures come back as an Error Response in
    /// [`DispatchOutcome::Response`]; `Err` is reserved for API misuse such
    /// as a request arriving while another is still in flight.
    pub fn dispatch(
        &self,
        session: &mut AttSession,
        opcode: u8,
        payload: &[u8],
        transport_accepted: bool,
    ) -> AttResult<DispatchOutcome> {
        let unanswered = is_unanswered(opcode);
        if session.busy && !unanswered {
            warn!(
                "Session {} busy, refusing opcode 0x{:02X}",
                session.id, opcode
            );
            return Err(AttError::Busy);
        }

        let was_busy = session.busy;
        session.busy = true;
        trace!(
            "Session {} dispatching opcode 0x{:02X}: {}",
            session.id,
            opcode,
            hex::encode(payload)
        );

        let result = if transport_accepted {
            self.dispatch_pdu(session, opcode, payload)
        } else {
            Err(AttError::InvalidPdu)
        };
        let outcome = self.finish(session.id, opcode, unanswered, result);

        session.busy = was_busy || matches!(outcome, Ok(DispatchOutcome::Deferred));
        trace!("Session {} finished opcode 0x{:02X}", session.id, opcode);
        outcome
    }

    /// Turn a handler result into what the transport sends
    fn finish(
        &self,
        id: SessionId,
        opcode: u8,
        unanswered: bool,
        result: AttResult<DispatchOutcome>,
    ) -> AttResult<DispatchOutcome> {
        match result {
            Ok(outcome) => {
                match &outcome {
                    DispatchOutcome::Response(pdu) => {
                        debug!("Session {} response 0x{:02X} ({} bytes)", id, pdu[0], pdu.len())
                    }
                    DispatchOutcome::Deferred => debug!("Session {} response deferred", id),
                    DispatchOutcome::Silent => {}
                }
                Ok(outcome)
            }
            Err(err) if unanswered => {
                warn!("Session {} dropping opcode 0x{:02X}: {}", id, opcode, err);
                Ok(DispatchOutcome::Silent)
            }
            Err(err @ (AttError::Protocol(..) | AttError::InvalidPdu)) => {
                let handle = err.handle().unwrap_or(ATT_HANDLE_INVALID);
                let code = err.to_error_code();
                if code == AttErrorCode::InvalidPdu {
                    warn!("Session {} rejected malformed opcode 0x{:02X}", id, opcode);
                } else {
                    debug!(
                        "Session {} opcode 0x{:02X} failed on handle 0x{:04X}: {:?}",
                        id, opcode, handle, code
                    );
                }
                Ok(DispatchOutcome::Response(
                    ErrorResponse::new(opcode, handle, code).serialize(),
                ))
            }
            Err(err) => Err(err),
        }
    }

    fn dispatch_pdu(
        &self,
        session: &mut AttSession,
        opcode: u8,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        if payload.len() >= session.mtu as usize {
            return Err(AttError::InvalidPdu);
        }
        if self.config.validate_pdu_len {
            validate_pdu_len(opcode, payload.len())?;
        }

        match opcode {
            ATT_EXCHANGE_MTU_REQ => self.handle_exchange_mtu_request(session, payload),
            ATT_FIND_INFO_REQ => self.handle_find_information_request(session, payload),
            ATT_FIND_BY_TYPE_VALUE_REQ => self.handle_find_by_type_value_request(session, payload),
            ATT_READ_BY_TYPE_REQ => self.handle_read_by_type_request(session, payload),
            ATT_READ_REQ => self.handle_read_request(session, payload),
            ATT_READ_BLOB_REQ => self.handle_read_blob_request(session, payload),
            ATT_READ_MULTIPLE_REQ => self.handle_read_multiple_request(session, payload),
            ATT_READ_BY_GROUP_TYPE_REQ => self.handle_read_by_group_type_request(session, payload),
            ATT_WRITE_REQ => self.handle_write_request(session, payload),
            ATT_WRITE_CMD => self.handle_write_command(session, payload),
            ATT_SIGNED_WRITE_CMD => self.handle_signed_write_command(session, payload),
            ATT_PREPARE_WRITE_REQ => self.handle_prepare_write_request(session, payload),
            ATT_EXECUTE_WRITE_REQ => self.handle_execute_write_request(session, payload),
            ATT_HANDLE_VALUE_CONF => self.handle_value_confirmation(session, payload),
            ATT_HANDLE_VALUE_IND => {
                let handle = payload
                    .get(..2)
                    .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
                    .unwrap_or(ATT_HANDLE_INVALID);
                Err(AttError::Protocol(AttErrorCode::RequestNotSupported, handle))
            }
            _ if opcode & ATT_COMMAND_FLAG != 0 => {
                debug!("Session {} ignoring unknown command 0x{:02X}", session.id, opcode);
                Ok(DispatchOutcome::Silent)
            }
            _ if opcode % 2 == 0 => Err(AttError::Protocol(
                AttErrorCode::RequestNotSupported,
                ATT_HANDLE_INVALID,
            )),
            _ => Err(AttError::InvalidPdu),
        }
    }

    /// Report an adapter failure, or park the request if the adapter deferred
    fn db_failure<P>(
        &self,
        session: &mut AttSession,
        opcode: u8,
        handle: u16,
        err: DbError,
        kind: AccessKind,
        pending: P,
    ) -> AttResult<DispatchOutcome>
    where
        P: FnOnce() -> PendingKind,
    {
        match map_db_error(err, kind) {
            Mapped::Respond(code) => Err(AttError::Protocol(code, handle)),
            Mapped::Suppress => {
                session.pending_response = Some(PendingResponse {
                    opcode,
                    handle,
                    kind: pending(),
                });
                Ok(DispatchOutcome::Deferred)
            }
        }
    }

    fn search_failed(
        &self,
        session: &mut AttSession,
        opcode: u8,
        payload: &[u8],
        failure: SearchFailure,
    ) -> AttResult<DispatchOutcome> {
        match failure {
            SearchFailure::NotFound(handle) => {
                Err(AttError::Protocol(AttErrorCode::AttributeNotFound, handle))
            }
            SearchFailure::Adapter(err, handle) => {
                self.db_failure(session, opcode, handle, err, AccessKind::Search, || {
                    PendingKind::Retry {
                        payload: payload.to_vec(),
                    }
                })
            }
        }
    }

    /// Handle Exchange MTU Request
    fn handle_exchange_mtu_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let request = ExchangeMtuRequest::parse(payload)?;
        if request.client_mtu < ATT_DEFAULT_MTU {
            return Err(AttError::InvalidPdu);
        }

        let mtu = request.client_mtu.min(self.config.local_mtu);
        session.mtu = mtu;
        info!(
            "Session {} MTU {} (peer {}, local {})",
            session.id, mtu, request.client_mtu, self.config.local_mtu
        );
        self.events.mtu_negotiated(session.id, mtu);

        let response = ExchangeMtuResponse {
            server_mtu: self.config.local_mtu,
        };
        Ok(DispatchOutcome::Response(response.serialize()))
    }

    /// Handle Find Information Request
    fn handle_find_information_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let request = FindInformationRequest::parse(payload)?;
        check_range(request.range)?;

        let found = enumerator::find_information(
            &*self.database,
            &session.peer(),
            request.range,
            session.mtu as usize,
            self.config.max_find_info_entries,
        );
        match found {
            Ok((format, list)) => {
                let response = FindInformationResponse {
                    format,
                    information_data: list.into_vec(),
                };
                Ok(DispatchOutcome::Response(response.serialize()))
            }
            Err(failure) => self.search_failed(session, ATT_FIND_INFO_REQ, payload, failure),
        }
    }

    /// Handle Find By Type Value Request
    fn handle_find_by_type_value_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let request = FindByTypeValueRequest::parse(payload)?;
        check_range(request.range)?;

        let attr_type = Uuid::from_u16(request.attribute_type);
        let mut value = request.attribute_value;
        if matches!(
            request.attribute_type,
            PRIMARY_SERVICE_UUID | SECONDARY_SERVICE_UUID
        ) {
            let uuid = Uuid::from_bytes(&value).ok_or(AttError::Protocol(
                AttErrorCode::InvalidAttributeValueLength,
                request.range.start,
            ))?;
            value = uuid.shorten().unwrap_or(uuid).as_bytes();
        }

        let found = enumerator::find_by_type_value(
            &*self.database,
            &session.peer(),
            request.range,
            &attr_type,
            &value,
            session.mtu as usize,
            self.config.max_handle_value_entries,
        );
        match found {
            Ok(list) => {
                let response = FindByTypeValueResponse {
                    handles: list.into_vec(),
                };
                Ok(DispatchOutcome::Response(response.serialize()))
            }
            Err(failure) => {
                self.search_failed(session, ATT_FIND_BY_TYPE_VALUE_REQ, payload, failure)
            }
        }
    }

    /// Handle Read By Type Request
    fn handle_read_by_type_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let request = ReadByTypeRequest::parse(payload)?;
        check_range(request.range)?;
        let attr_type = request
            .attribute_type
            .shorten()
            .unwrap_or(request.attribute_type);

        let found = enumerator::read_by_type(
            &*self.database,
            &session.peer(),
            request.range,
            &attr_type,
            session.mtu as usize,
            self.config.max_handle_value_entries,
        );
        match found {
            Ok(list) => {
                let response = ReadByTypeResponse {
                    length: (2 + list[0].value.len()) as u8,
                    data: list.into_vec(),
                };
                Ok(DispatchOutcome::Response(response.serialize()))
            }
            Err(failure) => self.search_failed(session, ATT_READ_BY_TYPE_REQ, payload, failure),
        }
    }

    /// Handle Read By Group Type Request
    fn handle_read_by_group_type_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let request = ReadByGroupTypeRequest::parse(payload)?;
        check_range(request.range)?;
        let Some(group_type) = request.group_type.shorten() else {
            return Err(AttError::Protocol(
                AttErrorCode::AttributeNotFound,
                request.range.start,
            ));
        };

        let found = enumerator::read_by_group_type(
            &*self.database,
            &session.peer(),
            request.range,
            &group_type,
            session.mtu as usize,
            self.config.max_group_entries,
        );
        match found {
            Ok(list) => {
                let response = ReadByGroupTypeResponse {
                    length: (4 + list[0].value.len()) as u8,
                    data: list.into_vec(),
                };
                Ok(DispatchOutcome::Response(response.serialize()))
            }
            Err(failure) => {
                self.search_failed(session, ATT_READ_BY_GROUP_TYPE_REQ, payload, failure)
            }
        }
    }

    /// Handle Read Request
    fn handle_read_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let request = ReadRequest::parse(payload)?;
        let flags = AccessFlags::READ | AccessFlags::PEER_INITIATED;
        match self.database.access_handle(&session.peer(), request.handle, 0, &[], flags) {
            Ok(mut value) => {
                value.truncate(session.value_budget());
                Ok(DispatchOutcome::Response(ReadResponse { value }.serialize()))
            }
            Err(err) => self.db_failure(
                session,
                ATT_READ_REQ,
                request.handle,
                err,
                AccessKind::Read,
                || PendingKind::Value,
            ),
        }
    }

    /// Handle Read Blob Request
    fn handle_read_blob_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let request = ReadBlobRequest::parse(payload)?;
        let flags = AccessFlags::READ | AccessFlags::PEER_INITIATED;
        let peer = session.peer();
        match self.database.access_handle(&peer, request.handle, request.offset, &[], flags) {
            Ok(mut value) => {
                value.truncate(session.value_budget());
                Ok(DispatchOutcome::Response(ReadBlobResponse { value }.serialize()))
            }
            Err(err) => self.db_failure(
                session,
                ATT_READ_BLOB_REQ,
                request.handle,
                err,
                AccessKind::Read,
                || PendingKind::Value,
            ),
        }
    }

    /// Handle Read Multiple Request
    fn handle_read_multiple_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let request = ReadMultipleRequest::parse(payload)?;
        if let Some(&excess) = request.handles.get(self.config.max_read_multiple) {
            return Err(AttError::Protocol(AttErrorCode::InsufficientResources, excess));
        }
        self.read_multiple(session, Vec::new(), &request.handles)
    }

    /// Read `handles` in order, appending to `collected`.
    ///
    /// The first failing handle ends the request.
    fn read_multiple(
        &self,
        session: &mut AttSession,
        mut collected: Vec<u8>,
        handles: &[u16],
    ) -> AttResult<DispatchOutcome> {
        let peer = session.peer();
        let flags = AccessFlags::READ | AccessFlags::PEER_INITIATED;
        for (index, &handle) in handles.iter().enumerate() {
            match self.database.access_handle(&peer, handle, 0, &[], flags) {
                Ok(value) => collected.extend_from_slice(&value),
                Err(err) => {
                    let remaining = handles[index + 1..].to_vec();
                    return self.db_failure(
                        session,
                        ATT_READ_MULTIPLE_REQ,
                        handle,
                        err,
                        AccessKind::Read,
                        move || PendingKind::ReadMultiple {
                            collected,
                            remaining,
                        },
                    );
                }
            }
        }

        collected.truncate(session.value_budget());
        let response = ReadMultipleResponse { values: collected };
        Ok(DispatchOutcome::Response(response.serialize()))
    }

    /// Handle Write Request
    fn handle_write_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let request = WriteRequest::parse(payload)?;
        let flags = AccessFlags::WRITE | AccessFlags::PEER_INITIATED;
        let peer = session.peer();
        match self.database.access_handle(&peer, request.handle, 0, &request.value, flags) {
            Ok(_) => Ok(DispatchOutcome::Response(WriteResponse.serialize())),
            Err(err) => self.db_failure(
                session,
                ATT_WRITE_REQ,
                request.handle,
                err,
                AccessKind::Write,
                || PendingKind::Ack,
            ),
        }
    }

    /// Handle Write Command
    fn handle_write_command(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        let command = WriteCommand::parse(payload)?;
        let flags =
            AccessFlags::WRITE | AccessFlags::WRITE_WITHOUT_RSP | AccessFlags::PEER_INITIATED;
        let peer = session.peer();
        if let Err(err) = self.database.access_handle(&peer, command.handle, 0, &command.value, flags) {
            warn!(
                "Session {} write command to 0x{:04X} failed: {}",
                session.id, command.handle, err
            );
        }
        Ok(DispatchOutcome::Silent)
    }

    /// Handle Signed Write Command
    fn handle_signed_write_command(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        if !self.config.signed_writes {
            debug!("Session {} signed writes disabled", session.id);
            return Ok(DispatchOutcome::Silent);
        }
        let command = SignedWriteCommand::parse(payload)?;

        let mut pdu = Vec::with_capacity(1 + payload.len());
        pdu.push(ATT_SIGNED_WRITE_CMD);
        pdu.extend_from_slice(payload);

        if session.pending_signed_write.is_some() {
            warn!("Session {} replacing unverified signed write", session.id);
        }
        self.events.signed_write_verification_requested(session.id, &pdu);
        session.pending_signed_write = Some(PendingSignedWrite {
            handle: command.handle,
            value: command.value,
            pdu,
        });
        Ok(DispatchOutcome::Silent)
    }

    /// Handle Prepare Write Request
    fn handle_prepare_write_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        if !self.config.queued_writes {
            return Err(AttError::Protocol(
                AttErrorCode::RequestNotSupported,
                ATT_HANDLE_INVALID,
            ));
        }
        let request = PrepareWriteRequest::parse(payload)?;

        let flags = AccessFlags::PREPARE | AccessFlags::PEER_INITIATED;
        let peer = session.peer();
        match self.database.access_handle(&peer, request.handle, request.offset, &request.value, flags) {
            Ok(_) => self.enqueue_prepared(session, request.handle, request.offset, request.value),
            Err(err) => {
                let (offset, value) = (request.offset, request.value);
                self.db_failure(
                    session,
                    ATT_PREPARE_WRITE_REQ,
                    request.handle,
                    err,
                    AccessKind::Write,
                    move || PendingKind::Prepare { offset, value },
                )
            }
        }
    }

    fn enqueue_prepared(
        &self,
        session: &mut AttSession,
        handle: u16,
        offset: u16,
        value: Vec<u8>,
    ) -> AttResult<DispatchOutcome> {
        session
            .queue
            .enqueue(handle, offset, &value)
            .map_err(|_| AttError::Protocol(AttErrorCode::PrepareQueueFull, handle))?;
        let response = PrepareWriteResponse {
            handle,
            offset,
            value,
        };
        Ok(DispatchOutcome::Response(response.serialize()))
    }

    /// Handle Execute Write Request
    fn handle_execute_write_request(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        if !self.config.queued_writes {
            return Err(AttError::Protocol(
                AttErrorCode::RequestNotSupported,
                ATT_HANDLE_INVALID,
            ));
        }
        let request = ExecuteWriteRequest::parse(payload)?;

        match request.flags {
            ExecuteWriteFlags::Cancel => {
                debug!(
                    "Session {} cancelled {} prepared writes",
                    session.id,
                    session.queue.len()
                );
                session.queue.reset();
                Ok(DispatchOutcome::Response(ExecuteWriteResponse.serialize()))
            }
            ExecuteWriteFlags::Execute => self.execute_prepared(session),
        }
    }

    /// Apply queued fragments in order, stopping at the first failure.
    ///
    /// Fragments applied before a failure stay applied. The queue is emptied
    /// up front whatever the outcome.
    fn execute_prepared(&self, session: &mut AttSession) -> AttResult<DispatchOutcome> {
        let writes = session.queue.take_all();
        debug!("Session {} executing {} prepared writes", session.id, writes.len());
        self.apply_writes(session, writes)
    }

    /// Apply `writes` in order.
    ///
    /// A deferred fragment parks the ones after it so the request resumes
    /// from there once the application completes it.
    fn apply_writes(
        &self,
        session: &mut AttSession,
        writes: Vec<QueuedWrite>,
    ) -> AttResult<DispatchOutcome> {
        let peer = session.peer();
        let flags = AccessFlags::WRITE | AccessFlags::PEER_INITIATED;
        let mut writes = writes.into_iter();
        while let Some(write) = writes.next() {
            let applied =
                self.database
                    .access_handle(&peer, write.handle, write.offset, &write.value, flags);
            if let Err(err) = applied {
                return self.db_failure(
                    session,
                    ATT_EXECUTE_WRITE_REQ,
                    write.handle,
                    err,
                    AccessKind::Write,
                    move || PendingKind::Execute {
                        remaining: writes.collect(),
                    },
                );
            }
        }
        Ok(DispatchOutcome::Response(ExecuteWriteResponse.serialize()))
    }

    /// Handle Handle Value Confirmation
    fn handle_value_confirmation(
        &self,
        session: &mut AttSession,
        payload: &[u8],
    ) -> AttResult<DispatchOutcome> {
        if !payload.is_empty() {
            return Err(AttError::InvalidPdu);
        }
        if !session.indication_pending {
            warn!("Session {} confirmation without an indication", session.id);
            return Ok(DispatchOutcome::Silent);
        }
        session.indication_pending = false;
        self.events.handle_value_confirmed(session.id);
        Ok(DispatchOutcome::Silent)
    }

    /// Finish a request the database deferred.
    ///
    /// `result` is the database's late answer for the handle it deferred on.
    /// A second deferral keeps the request pending.
    pub fn complete_deferred(
        &self,
        session: &mut AttSession,
        result: DbResult<Vec<u8>>,
    ) -> AttResult<DispatchOutcome> {
        let pending = session
            .pending_response
            .take()
            .ok_or(AttError::NoPendingResponse)?;
        let (opcode, handle) = (pending.opcode, pending.handle);
        session.busy = false;

        let outcome = match result {
            Err(err) => match map_db_error(err, access_kind(opcode)) {
                Mapped::Respond(code) => Err(AttError::Protocol(code, handle)),
                Mapped::Suppress => {
                    session.pending_response = Some(pending);
                    Ok(DispatchOutcome::Deferred)
                }
            },
            Ok(value) => match pending.kind {
                PendingKind::Value => {
                    let mut value = value;
                    value.truncate(session.value_budget());
                    let pdu = if opcode == ATT_READ_BLOB_REQ {
                        ReadBlobResponse { value }.serialize()
                    } else {
                        ReadResponse { value }.serialize()
                    };
                    Ok(DispatchOutcome::Response(pdu))
                }
                PendingKind::ReadMultiple {
                    mut collected,
                    remaining,
                } => {
                    collected.extend_from_slice(&value);
                    self.read_multiple(session, collected, &remaining)
                }
                PendingKind::Ack => Ok(DispatchOutcome::Response(WriteResponse.serialize())),
                PendingKind::Execute { remaining } => self.apply_writes(session, remaining),
                PendingKind::Prepare { offset, value } => {
                    self.enqueue_prepared(session, handle, offset, value)
                }
                PendingKind::Retry { payload } => self.dispatch_pdu(session, opcode, &payload),
            },
        };

        let outcome = self.finish(session.id, opcode, false, outcome);
        session.busy = matches!(outcome, Ok(DispatchOutcome::Deferred));
        outcome
    }

    /// Deliver the Security Manager's verdict on the pending signed write.
    ///
    /// A verified write is applied without a response.
    pub fn signed_write_verification_complete(
        &self,
        session: &mut AttSession,
        verified: bool,
    ) -> AttResult<SignedWriteStatus> {
        let pending = session
            .pending_signed_write
            .take()
            .ok_or(AttError::NoPendingSignedWrite)?;

        let status = if verified {
            let flags =
                AccessFlags::WRITE | AccessFlags::WRITE_WITHOUT_RSP | AccessFlags::PEER_INITIATED;
            match self
                .database
                .access_handle(&session.peer(), pending.handle, 0, &pending.value, flags)
            {
                Ok(_) => SignedWriteStatus::Applied,
                Err(err) => {
                    warn!(
                        "Session {} signed write to 0x{:04X} failed: {}",
                        session.id, pending.handle, err
                    );
                    SignedWriteStatus::WriteFailed(err)
                }
            }
        } else {
            warn!(
                "Session {} signed write to 0x{:04X} failed verification",
                session.id, pending.handle
            );
            SignedWriteStatus::VerificationFailed
        };

        self.events
            .signed_write_verification_complete(session.id, pending.handle, status);
        Ok(status)
    }

    /// Build a Handle Value Notification for the session
    pub fn build_notification(
        &self,
        session: &AttSession,
        handle: u16,
        value: &[u8],
    ) -> AttResult<Vec<u8>> {
        if value.len() > session.mtu as usize - ATT_MTU_HEADER_SIZE {
            return Err(AttError::ValueTooLong(value.len()));
        }
        let notification = HandleValueNotification {
            handle,
            value: value.to_vec(),
        };
        Ok(notification.serialize())
    }

    /// Build a Handle Value Indication for the session.
    ///
    /// Only one indication may await confirmation at a time.
    pub fn build_indication(
        &self,
        session: &mut AttSession,
        handle: u16,
        value: &[u8],
    ) -> AttResult<Vec<u8>> {
        if session.indication_pending {
            return Err(AttError::IndicationPending);
        }
        if value.len() > session.mtu as usize - ATT_MTU_HEADER_SIZE {
            return Err(AttError::ValueTooLong(value.len()));
        }
        let indication = HandleValueIndication {
            handle,
            value: value.to_vec(),
        };
        session.indication_pending = true;
        Ok(indication.serialize())
    }

    /// Read an attribute on behalf of the local application
    pub fn read_local(&self, handle: u16, offset: u16) -> DbResult<Vec<u8>> {
        let flags = AccessFlags::READ | AccessFlags::LOCALLY_INITIATED;
        self.database.access_handle(&local_peer(), handle, offset, &[], flags)
    }

    /// Write an attribute on behalf of the local application
    pub fn write_local(&self, handle: u16, offset: u16, value: &[u8]) -> DbResult<()> {
        let flags = AccessFlags::WRITE | AccessFlags::LOCALLY_INITIATED;
        self.database
            .access_handle(&local_peer(), handle, offset, value, flags)
            .map(|_| ())
    }
}
