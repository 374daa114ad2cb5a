//! OT Receiver (Client side)

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::{debug, warn};

use oblivids_protocol::{
    BaseOtMsgPayload, ByteAnswerPayload, ByteQueryPayload, ErrorPayload,
    ExtendRequestPayload, ExtendResponsePayload, Header, OtSuiteId, SessionInitPayload,
    SessionParamsPayload, DIGEST_LEN,
};

use crate::crypto::{KAPPA, SSP};
use crate::error::{OtError, Result};
use crate::facade::ClientOt;
use crate::ot256::CHOICE_BITS;
use crate::session::{OtSession, OtSessionConfig, OtSessionState};

/// OT Receiver (Client) manages its session and generates byte queries
pub struct OtReceiver {
    /// Current session
    session: OtSession,
    /// OT role, created once the server assigned the session ID
    core: Option<ClientOt>,
    /// Digest of the package this client evaluates
    package_digest: [u8; DIGEST_LEN],
    /// Parameters accepted from the server
    params: Option<SessionParamsPayload>,
    /// Round of the request awaiting a response
    awaiting: Option<u64>,
    /// Size of the outstanding extension batch
    extend_count: u32,
    /// Fixed seed for reproducible tests
    seed: Option<u64>,
}

impl OtReceiver {
    /// Create a new OT receiver for the package with the given digest
    pub fn new(package_digest: [u8; DIGEST_LEN]) -> Self {
        Self {
            session: OtSession::new(OtSessionConfig::default()),
            core: None,
            package_digest,
            params: None,
            awaiting: None,
            extend_count: 0,
            seed: None,
        }
    }

    /// Draw all randomness from a seeded generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Get session ID
    pub fn session_id(&self) -> &[u8; 16] {
        &self.session.id
    }

    /// Round the next request will carry
    pub fn next_round(&self) -> u64 {
        self.session.next_round()
    }

    /// Rounds spent after the handshake
    pub fn rounds_used(&self) -> u32 {
        self.session.rounds_used
    }

    pub fn state(&self) -> OtSessionState {
        self.session.state
    }

    /// Parameters the server announced
    pub fn params(&self) -> Option<&SessionParamsPayload> {
        self.params.as_ref()
    }

    /// Random OTs available for queries
    pub fn pool_len(&self) -> usize {
        self.core.as_ref().map_or(0, |c| c.pool_len())
    }

    /// Whether the pool is too small for another byte query
    pub fn needs_extend(&self) -> bool {
        self.pool_len() < CHOICE_BITS
    }

    fn core(&mut self) -> Result<&mut ClientOt> {
        self.core.as_mut().ok_or(OtError::SessionNotInitialized)
    }

    /// Generate SESSION_INIT message
    pub fn generate_session_init(&self) -> (Header, SessionInitPayload) {
        (
            Header::pre_session(),
            SessionInitPayload::new(self.package_digest),
        )
    }

    /// Handle SESSION_PARAMS response
    pub fn handle_session_params(
        &mut self,
        header: &Header,
        params: &SessionParamsPayload,
    ) -> Result<()> {
        if params.selected_ot_suite != OtSuiteId::RistrettoKos256.to_u16()
            || params.kappa as usize != KAPPA
            || params.ssp as usize != SSP
        {
            return Err(OtError::InvalidMessageFormat(
                "server selected unsupported OT parameters".into(),
            ));
        }
        if params.package_digest != self.package_digest {
            return Err(OtError::PackageMismatch);
        }

        self.session.config.ttl = std::time::Duration::from_secs(params.session_ttl_sec as u64);
        self.session.config.max_rounds = params.max_rounds;
        self.session.config.ot_batch = params.ot_batch;
        self.session.initialize_with_id(header.session_id)?;

        let rng = match self.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        };
        self.core = Some(ClientOt::with_rng(header.session_id, rng));
        self.params = Some(params.clone());
        Ok(())
    }

    /// Generate the base OT setup message (GOT)
    pub fn generate_base_ot_init(&mut self) -> Result<(Header, BaseOtMsgPayload)> {
        self.session.ensure_live()?;
        let blob = self.core()?.got();
        Ok((
            Header::new(self.session.id, 0),
            BaseOtMsgPayload::new(self.session.base_ot_phase, false, blob),
        ))
    }

    /// Handle the server's base OT reply; the session is ready afterwards
    pub fn handle_base_ot_response(
        &mut self,
        header: &Header,
        response: &BaseOtMsgPayload,
    ) -> Result<()> {
        self.check_echo(header, 0)?;
        if !response.is_final {
            return Err(OtError::UnexpectedMessage("base OT reply not final".into()));
        }

        if let Err(err) = self.core()?.finish_setup(&response.blob) {
            self.session.abort();
            return Err(err);
        }
        self.session.advance_base_ot_phase();
        self.session.mark_ready()?;
        debug!("client session ready");
        Ok(())
    }

    fn check_can_send(&mut self) -> Result<()> {
        self.session.ensure_live()?;
        if !self.session.is_ready() {
            return Err(OtError::SessionNotInitialized);
        }
        if self.awaiting.is_some() {
            return Err(OtError::UnexpectedMessage(
                "request issued before the previous response".into(),
            ));
        }
        Ok(())
    }

    fn begin_round(&mut self) -> Result<u64> {
        let round = self.session.next_round();
        self.session.validate_round(round)?;
        self.awaiting = Some(round);
        Ok(round)
    }

    fn finish_round(&mut self, header: &Header) -> Result<u64> {
        let expected = self
            .awaiting
            .take()
            .ok_or_else(|| OtError::UnexpectedMessage("response without a request".into()))?;
        self.check_echo(header, expected)?;
        Ok(expected)
    }

    fn check_echo(&mut self, header: &Header, expected: u64) -> Result<()> {
        if header.session_id != self.session.id {
            self.session.abort();
            return Err(OtError::InvalidSessionId);
        }
        if header.round != expected {
            self.session.abort();
            return Err(OtError::RoundMismatch {
                expected,
                got: header.round,
            });
        }
        Ok(())
    }

    /// Generate EXTEND_REQUEST for `count` random OTs
    pub fn generate_extend(&mut self, count: u32) -> Result<(Header, ExtendRequestPayload)> {
        self.check_can_send()?;
        let (batch, blob) = self.core()?.extend(count as usize)?;
        let round = self.begin_round()?;
        self.extend_count = count;
        Ok((
            Header::new(self.session.id, round),
            ExtendRequestPayload::new(batch, count, blob),
        ))
    }

    /// Handle EXTEND_RESPONSE
    pub fn handle_extend_response(
        &mut self,
        header: &Header,
        response: &ExtendResponsePayload,
    ) -> Result<()> {
        self.finish_round(header)?;
        let count = self.extend_count;
        if response.accepted != count {
            self.session.abort();
            return Err(OtError::UnexpectedMessage(format!(
                "server accepted {} of {} OTs",
                response.accepted, count
            )));
        }
        Ok(())
    }

    /// Generate BYTE_QUERY for byte `x` against row `row_label` (QOT)
    pub fn generate_byte_query(
        &mut self,
        row_label: u32,
        x: u8,
    ) -> Result<(Header, ByteQueryPayload)> {
        self.check_can_send()?;
        let round = self.session.next_round();
        let blob = self.core()?.qot(row_label, x, round)?;
        self.begin_round()?;
        Ok((
            Header::new(self.session.id, round),
            ByteQueryPayload { row_label, blob },
        ))
    }

    /// Handle BYTE_ANSWER and decode the chosen entry (DOT)
    pub fn handle_byte_answer(
        &mut self,
        header: &Header,
        answer: &ByteAnswerPayload,
    ) -> Result<Vec<u8>> {
        let round = self.finish_round(header)?;
        let expected_len = self.params.as_ref().map_or(0, |p| p.entry_len);
        if answer.entry_len != expected_len {
            self.session.abort();
            return Err(OtError::InvalidMessageFormat(format!(
                "entry length {} differs from announced {}",
                answer.entry_len, expected_len
            )));
        }

        let result = self.core()?.dot(
            answer.row_label,
            &answer.blob,
            answer.entry_len as usize,
            round,
        );
        if result.is_err() {
            self.session.abort();
        }
        result
    }

    /// Turn an ERROR reply into the matching error and abort
    pub fn handle_error(&mut self, payload: &ErrorPayload) -> OtError {
        self.session.abort();
        let code = payload.code;
        warn!(?code, "server reported an error");
        OtError::PeerError {
            code,
            message: payload.message.clone(),
        }
    }

    /// Check if session is ready
    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ot256::{SlotTable, SLOTS};
    use crate::sender::{OtSender, PackageInfo};
    use std::sync::Arc;

    struct Echo;

    impl SlotTable for Echo {
        fn entry_len(&self) -> usize {
            3
        }

        fn row_count(&self) -> u32 {
            5
        }

        fn fill_row(&self, label: u32, out: &mut [u8]) -> Result<()> {
            for (t, slot) in out.chunks_exact_mut(3).enumerate() {
                slot.copy_from_slice(&[label as u8, t as u8, 0xAA]);
            }
            Ok(())
        }
    }

    const DIGEST: [u8; DIGEST_LEN] = [0x5A; DIGEST_LEN];

    fn package() -> PackageInfo {
        PackageInfo {
            digest: DIGEST,
            outmax: 2,
            cmax: 1,
        }
    }

    fn ready_pair() -> (OtSender<Echo>, OtReceiver) {
        let mut sender =
            OtSender::new(Arc::new(Echo), OtSessionConfig::default(), package()).with_seed(1);
        let mut receiver = OtReceiver::new(DIGEST).with_seed(2);

        let (_, init) = receiver.generate_session_init();
        let (params_header, params) = sender.handle_session_init(&init).unwrap();
        receiver
            .handle_session_params(&params_header, &params)
            .unwrap();

        let (base_header, base_msg) = receiver.generate_base_ot_init().unwrap();
        let (reply_header, reply) = sender.handle_base_ot_msg(&base_header, &base_msg).unwrap();
        receiver
            .handle_base_ot_response(&reply_header, &reply)
            .unwrap();

        (sender, receiver)
    }

    #[test]
    fn test_full_ot_flow() {
        let (mut sender, mut receiver) = ready_pair();
        assert!(sender.is_ready());
        assert!(receiver.is_ready());
        assert!(receiver.needs_extend());

        let (h, req) = receiver.generate_extend(16).unwrap();
        assert_eq!(h.round, 1);
        let (rh, resp) = sender.handle_extend(&h, &req).unwrap();
        receiver.handle_extend_response(&rh, &resp).unwrap();
        assert_eq!(receiver.pool_len(), 16);

        for (label, x) in [(3u32, 200u8), (1, 7)] {
            let (qh, query) = receiver.generate_byte_query(label, x).unwrap();
            let (ah, answer) = sender.handle_byte_query(&qh, &query).unwrap();
            assert_eq!(answer.blob.len(), SLOTS * 3);

            let entry = receiver.handle_byte_answer(&ah, &answer).unwrap();
            assert_eq!(entry, vec![label as u8, x, 0xAA]);
        }
        assert_eq!(receiver.next_round(), 4);
    }

    #[test]
    fn test_package_mismatch_refused() {
        let mut sender =
            OtSender::new(Arc::new(Echo), OtSessionConfig::default(), package());
        let receiver = OtReceiver::new([0u8; DIGEST_LEN]);

        let (_, init) = receiver.generate_session_init();
        assert!(matches!(
            sender.handle_session_init(&init),
            Err(OtError::PackageMismatch)
        ));
    }

    #[test]
    fn test_echo_round_checked() {
        let (mut sender, mut receiver) = ready_pair();
        let (h, req) = receiver.generate_extend(8).unwrap();
        let (mut rh, resp) = sender.handle_extend(&h, &req).unwrap();
        rh.round += 1;

        let result = receiver.handle_extend_response(&rh, &resp);
        assert!(matches!(result, Err(OtError::RoundMismatch { .. })));
        assert_eq!(receiver.state(), OtSessionState::Aborted);
    }
}
