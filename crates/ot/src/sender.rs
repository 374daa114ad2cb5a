//! OT Sender (Server side)

use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, info, warn};

use oblivids_protocol::{
    BaseOtMsgPayload, ByteAnswerPayload, ByteQueryPayload, ErrorPayload, ExtendRequestPayload,
    ExtendResponsePayload, Header, Message, OtSuiteId, SessionId, SessionInitPayload,
    SessionParamsPayload, DIGEST_LEN,
};

use crate::crypto::{KAPPA, SSP};
use crate::error::{ErrorKind, OtError, Result};
use crate::facade::ServerOt;
use crate::ot256::SlotTable;
use crate::session::{OtSession, OtSessionConfig, OtSessionState};

/// What the server advertises about the package it answers for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageInfo {
    /// SHA-256 of the published package
    pub digest: [u8; DIGEST_LEN],
    /// Cells per row
    pub outmax: u16,
    /// Key slots per 1-of-256 entry
    pub cmax: u16,
}

/// OT Sender (Server) manages one session and answers byte queries
pub struct OtSender<T: SlotTable> {
    /// Slot table shared by every session
    table: Arc<T>,
    /// Current session
    session: OtSession,
    /// OT role, created once the session ID is known
    core: Option<ServerOt>,
    /// Package the table was built from
    package: PackageInfo,
    /// Session ID handed out by the transport, if any
    assigned_id: Option<SessionId>,
    /// Fixed seed for reproducible tests
    seed: Option<u64>,
}

impl<T: SlotTable> OtSender<T> {
    /// Create a new OT sender over `table`
    pub fn new(table: Arc<T>, config: OtSessionConfig, package: PackageInfo) -> Self {
        Self {
            table,
            session: OtSession::new(config),
            core: None,
            package,
            assigned_id: None,
            seed: None,
        }
    }

    /// Use a session ID allocated by the transport instead of a random one
    pub fn with_session_id(mut self, id: SessionId) -> Self {
        self.assigned_id = Some(id);
        self
    }

    /// Draw all randomness from a seeded generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Get session ID
    pub fn session_id(&self) -> &SessionId {
        &self.session.id
    }

    /// Get session config
    pub fn config(&self) -> &OtSessionConfig {
        &self.session.config
    }

    pub fn state(&self) -> OtSessionState {
        self.session.state
    }

    /// Check if session is ready
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn is_aborted(&self) -> bool {
        self.session.is_aborted()
    }

    fn core(&mut self) -> Result<&mut ServerOt> {
        self.core.as_mut().ok_or(OtError::SessionNotInitialized)
    }

    fn check_session(&self, header: &Header) -> Result<()> {
        if header.session_id != self.session.id {
            return Err(OtError::InvalidSessionId);
        }
        Ok(())
    }

    /// Handle SESSION_INIT and return SESSION_PARAMS
    pub fn handle_session_init(
        &mut self,
        init: &SessionInitPayload,
    ) -> Result<(Header, SessionParamsPayload)> {
        if init.ot_suite != OtSuiteId::RistrettoKos256.to_u16() {
            return Err(OtError::InvalidMessageFormat(format!(
                "unsupported OT suite 0x{:04X}",
                init.ot_suite
            )));
        }
        if init.package_digest != self.package.digest {
            return Err(OtError::PackageMismatch);
        }

        let session_id = match self.assigned_id {
            Some(id) => {
                self.session.initialize_with_id(id)?;
                id
            }
            None => self.session.initialize()?,
        };

        let rng = match self.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        self.core = Some(ServerOt::with_rng(session_id, rng));

        let config = &self.session.config;
        let params = SessionParamsPayload {
            selected_ot_suite: OtSuiteId::RistrettoKos256.to_u16(),
            kappa: KAPPA as u16,
            ssp: SSP as u16,
            outmax: self.package.outmax,
            cmax: self.package.cmax,
            entry_len: self.table.entry_len() as u16,
            session_ttl_sec: config.ttl.as_secs() as u32,
            max_rounds: config.max_rounds,
            ot_batch: config.ot_batch,
            package_digest: self.package.digest,
        };

        info!(session_id = %hex::encode(session_id), "session initialized");
        Ok((Header::new(session_id, 0), params))
    }

    /// Handle BASE_OT_MSG and return the blinded points
    pub fn handle_base_ot_msg(
        &mut self,
        header: &Header,
        msg: &BaseOtMsgPayload,
    ) -> Result<(Header, BaseOtMsgPayload)> {
        self.session.ensure_live()?;
        self.check_session(header)?;
        if self.session.state != OtSessionState::BaseOtInProgress || header.round != 0 {
            return Err(OtError::UnexpectedMessage("base OT outside handshake".into()));
        }

        let blob = self.core()?.respond_setup(&msg.blob)?;
        let phase = self.session.advance_base_ot_phase();
        self.session.mark_ready()?;

        debug!(session_id = %hex::encode(self.session.id), "base OT answered");
        Ok((
            Header::new(self.session.id, 0),
            BaseOtMsgPayload::new(phase, true, blob),
        ))
    }

    /// Handle EXTEND_REQUEST and acknowledge the batch
    pub fn handle_extend(
        &mut self,
        header: &Header,
        request: &ExtendRequestPayload,
    ) -> Result<(Header, ExtendResponsePayload)> {
        self.check_session(header)?;
        self.session.validate_round(header.round)?;

        let max = self.session.config.max_extend;
        if request.count > max {
            return Err(OtError::BatchSizeExceeded {
                size: request.count as usize,
                max: max as usize,
            });
        }

        let accepted =
            self.core()?
                .accept_extend(request.batch, request.count as usize, &request.blob)?;

        debug!(round = header.round, batch = request.batch, accepted, "extension accepted");
        Ok((
            header.echo(),
            ExtendResponsePayload {
                batch: request.batch,
                accepted: accepted as u32,
            },
        ))
    }

    /// Handle BYTE_QUERY and return the masked row entry
    pub fn handle_byte_query(
        &mut self,
        header: &Header,
        query: &ByteQueryPayload,
    ) -> Result<(Header, ByteAnswerPayload)> {
        self.check_session(header)?;
        self.session.validate_round(header.round)?;

        let table = Arc::clone(&self.table);
        let blob = self
            .core()?
            .aot(query.row_label, &query.blob, table.as_ref(), header.round)?;

        debug!(round = header.round, label = query.row_label, "byte query answered");
        Ok((
            header.echo(),
            ByteAnswerPayload {
                row_label: query.row_label,
                entry_len: table.entry_len() as u16,
                blob,
            },
        ))
    }

    /// Dispatch one message; every failure becomes an ERROR reply.
    ///
    /// Any failure after the handshake started aborts the session. Failed
    /// cryptographic checks are reported only as a generic abort.
    pub fn handle(&mut self, msg: Message) -> Message {
        let header = msg.header().clone();

        let result = match msg {
            Message::SessionInit { payload, .. } => self
                .handle_session_init(&payload)
                .map(|(header, payload)| Message::SessionParams { header, payload }),
            Message::BaseOtMsg { header, payload } => self
                .handle_base_ot_msg(&header, &payload)
                .map(|(header, payload)| Message::BaseOtMsg { header, payload }),
            Message::ExtendRequest { header, payload } => self
                .handle_extend(&header, &payload)
                .map(|(header, payload)| Message::ExtendResponse { header, payload }),
            Message::ByteQuery { header, payload } => self
                .handle_byte_query(&header, &payload)
                .map(|(header, payload)| Message::ByteAnswer { header, payload }),
            other => Err(OtError::UnexpectedMessage(format!(
                "server cannot handle {:?}",
                other.into_frame().msg_type
            ))),
        };

        match result {
            Ok(reply) => reply,
            Err(err) => self.error_reply(&header, err),
        }
    }

    fn error_reply(&mut self, header: &Header, err: OtError) -> Message {
        let payload = match &err {
            _ if err.kind() == ErrorKind::CryptographicValidation => {
                warn!(session_id = %hex::encode(self.session.id), "cryptographic check failed, aborting");
                ErrorPayload::aborted()
            }
            OtError::RoundMismatch { expected, got } => {
                warn!(session_id = %hex::encode(self.session.id), expected, got, "round mismatch");
                ErrorPayload::bad_round(*expected, *got)
            }
            _ => {
                warn!(session_id = %hex::encode(self.session.id), error = %err, "request rejected");
                ErrorPayload::new(err.error_code(), err.to_string())
            }
        };

        if self.session.state != OtSessionState::Uninitialized {
            self.session.abort();
        }

        Message::Error {
            header: Header::new(self.session.id, header.round),
            payload,
        }
    }
}
