//! Client scan driver
//!
//! Runs the whole client side of one session as a message state machine:
//! handshake, base OT, then extension batches and one byte query per input
//! byte until the input is exhausted or an accepting state is reached.

use tracing::{debug, info};

use oblivids_ot::{OtError, OtReceiver, OtSender, CHOICE_BITS};
use oblivids_protocol::{Message, SessionParamsPayload};

use crate::error::{GdfaError, Result};
use crate::evaluator::{EvalResult, Evaluator, Verdict};
use crate::package::GdfaPackage;
use crate::table::ServerTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    AwaitParams,
    AwaitBaseOt,
    AwaitExtend,
    AwaitAnswer,
    Done,
}

pub struct ScanClient {
    receiver: OtReceiver,
    evaluator: Evaluator,
    input: Vec<u8>,
    pos: usize,
    phase: ScanPhase,
    result: Option<EvalResult>,
}

impl ScanClient {
    pub fn new(package: GdfaPackage, input: impl Into<Vec<u8>>) -> Self {
        Self {
            receiver: OtReceiver::new(package.digest()),
            evaluator: Evaluator::new(package),
            input: input.into(),
            pos: 0,
            phase: ScanPhase::Idle,
            result: None,
        }
    }

    /// Draw the client's OT randomness from a seeded generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.receiver = self.receiver.with_seed(seed);
        self
    }

    pub fn with_stop_on_first_attack(mut self, stop: bool) -> Self {
        self.evaluator = self.evaluator.with_stop_on_first_attack(stop);
        self
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    /// Rounds used after the handshake
    pub fn rounds_used(&self) -> u32 {
        self.receiver.rounds_used()
    }

    pub fn result(&self) -> Option<&EvalResult> {
        self.result.as_ref()
    }

    pub fn verdict(&self) -> Option<Verdict> {
        self.result.map(|r| r.verdict())
    }

    /// First message of the session
    pub fn start(&mut self) -> Message {
        let (header, payload) = self.receiver.generate_session_init();
        self.phase = ScanPhase::AwaitParams;
        Message::SessionInit { header, payload }
    }

    /// Consume a server message; returns the next request, or `None` once
    /// the scan has finished.
    pub fn on_message(&mut self, msg: Message) -> Result<Option<Message>> {
        let result = self.dispatch(msg);
        if result.is_err() {
            self.phase = ScanPhase::Done;
        }
        result
    }

    fn dispatch(&mut self, msg: Message) -> Result<Option<Message>> {
        match (self.phase, msg) {
            (_, Message::Error { payload, .. }) => Err(self.receiver.handle_error(&payload).into()),
            (ScanPhase::AwaitParams, Message::SessionParams { header, payload }) => {
                self.check_params(&payload)?;
                self.receiver.handle_session_params(&header, &payload)?;
                let (header, payload) = self.receiver.generate_base_ot_init()?;
                self.phase = ScanPhase::AwaitBaseOt;
                Ok(Some(Message::BaseOtMsg { header, payload }))
            }
            (ScanPhase::AwaitBaseOt, Message::BaseOtMsg { header, payload }) => {
                self.receiver.handle_base_ot_response(&header, &payload)?;
                info!(
                    session_id = %hex::encode(self.receiver.session_id()),
                    bytes = self.input.len(),
                    "scan started"
                );
                self.next_request()
            }
            (ScanPhase::AwaitExtend, Message::ExtendResponse { header, payload }) => {
                self.receiver.handle_extend_response(&header, &payload)?;
                self.next_request()
            }
            (ScanPhase::AwaitAnswer, Message::ByteAnswer { header, payload }) => {
                let token = self.receiver.handle_byte_answer(&header, &payload)?;
                self.evaluator.step(&token)?;
                self.pos += 1;
                self.next_request()
            }
            (phase, other) => Err(OtError::UnexpectedMessage(format!(
                "{:?} while {:?}",
                other.into_frame().msg_type,
                phase
            ))
            .into()),
        }
    }

    fn check_params(&self, params: &SessionParamsPayload) -> Result<()> {
        let header = self.evaluator.package().header();
        if params.outmax != header.outmax
            || params.cmax != header.cmax
            || params.entry_len as u32 != header.entry_len
        {
            return Err(GdfaError::ParameterMismatch(format!(
                "server offers outmax={} cmax={} entry_len={}",
                params.outmax, params.cmax, params.entry_len
            )));
        }
        Ok(())
    }

    fn next_request(&mut self) -> Result<Option<Message>> {
        if self.evaluator.is_finished() || self.pos == self.input.len() {
            let result = self.evaluator.finish();
            debug!(steps = result.steps, rounds = self.rounds_used(), "scan finished");
            self.result = Some(result);
            self.phase = ScanPhase::Done;
            return Ok(None);
        }

        if self.receiver.needs_extend() {
            let batch = self.receiver.params().map_or(0, |p| p.ot_batch as usize);
            let remaining = (self.input.len() - self.pos) * CHOICE_BITS;
            let count = batch.min(remaining).max(CHOICE_BITS);

            let (header, payload) = self.receiver.generate_extend(count as u32)?;
            self.phase = ScanPhase::AwaitExtend;
            return Ok(Some(Message::ExtendRequest { header, payload }));
        }

        let x = self.input[self.pos];
        let (header, payload) = self
            .receiver
            .generate_byte_query(self.evaluator.current_label(), x)?;
        self.phase = ScanPhase::AwaitAnswer;
        Ok(Some(Message::ByteQuery { header, payload }))
    }
}

/// Result of an in-process scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    pub result: EvalResult,
    /// Rounds used after the handshake
    pub rounds: u32,
    pub bytes_sent: usize,
    pub bytes_received: usize,
}

impl ScanReport {
    pub fn verdict(&self) -> Verdict {
        self.result.verdict()
    }
}

/// Run a full session against `server` in-process, passing every message
/// through the frame codec.
pub fn run_local(
    client: ScanClient,
    server: &mut OtSender<ServerTable>,
) -> Result<ScanReport> {
    let mut client = client;
    let mut bytes_sent = 0;
    let mut bytes_received = 0;
    let mut outgoing = Some(client.start());

    while let Some(request) = outgoing {
        let wire = request.encode();
        bytes_sent += wire.len();
        let reply = server.handle(Message::decode(&wire)?);

        let wire = reply.encode();
        bytes_received += wire.len();
        outgoing = client.on_message(Message::decode(&wire)?)?;
    }

    let result = client
        .result
        .ok_or_else(|| OtError::UnexpectedMessage("scan ended without a result".into()))?;
    Ok(ScanReport {
        result,
        rounds: client.rounds_used(),
        bytes_sent,
        bytes_received,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use oblivids_ot::OtSessionConfig;
    use oblivids_protocol::ErrorCode;

    use crate::builder::GdfaBuilder;
    use crate::dfa::tests::{substring_dfa, three_state_dfa};
    use crate::dfa::Dfa;
    use crate::params::Sparsity;

    fn setup(dfa: Dfa, outmax: u16, cmax: u16) -> (GdfaPackage, OtSender<ServerTable>) {
        let (package, table) =
            GdfaBuilder::with_seed(dfa, Sparsity::new(outmax, cmax).unwrap(), 77)
                .unwrap()
                .build()
                .into_package()
                .unwrap();
        let sender = OtSender::new(Arc::new(table), OtSessionConfig::default(), package.info())
            .with_seed(78);
        (package, sender)
    }

    #[test]
    fn test_three_state_over_ot() {
        for (input, verdict) in [(&b"A"[..], 7u32), (&b"B"[..], 0)] {
            let (package, mut server) = setup(three_state_dfa(), 2, 2);
            let client = ScanClient::new(package, input).with_seed(5);
            let report = run_local(client, &mut server).unwrap();
            assert_eq!(report.verdict().as_u32(), verdict);
        }
    }

    #[test]
    fn test_early_stop_saves_rounds() {
        let (package, mut server) = setup(substring_dfa(), 3, 1);
        let full = run_local(ScanClient::new(package.clone(), &b"zabczzzz"[..]), &mut server).unwrap();

        let (_, mut server) = setup(substring_dfa(), 3, 1);
        let prefix = run_local(ScanClient::new(package, &b"zabc"[..]), &mut server).unwrap();

        assert_eq!(full.verdict(), Verdict::Attack(42));
        assert_eq!(full.verdict(), prefix.verdict());
        assert_eq!(full.rounds, prefix.rounds);
        // one extension plus four queries
        assert_eq!(full.rounds, 5);
        assert_eq!(full.result.steps, 4);
    }

    #[test]
    fn test_empty_input_is_no_match() {
        let (package, mut server) = setup(three_state_dfa(), 2, 2);
        let report = run_local(ScanClient::new(package, Vec::<u8>::new()), &mut server).unwrap();
        assert_eq!(report.verdict(), Verdict::NoMatch);
        assert_eq!(report.rounds, 0);
    }

    #[test]
    fn test_small_batches_refill_pool() {
        let (package, table) =
            GdfaBuilder::with_seed(substring_dfa(), Sparsity::new(3, 1).unwrap(), 77)
                .unwrap()
                .build()
                .into_package()
                .unwrap();
        let config = OtSessionConfig {
            ot_batch: 16,
            ..Default::default()
        };
        let mut server = OtSender::new(Arc::new(table), config, package.info());
        let report = run_local(ScanClient::new(package, &b"qqqqqq"[..]), &mut server).unwrap();

        assert_eq!(report.verdict(), Verdict::NoMatch);
        // three extensions of two bytes each, six queries
        assert_eq!(report.rounds, 9);
    }

    #[test]
    fn test_package_from_other_build_refused() {
        let (_, mut server) = setup(three_state_dfa(), 2, 2);
        let (other, _) = GdfaBuilder::with_seed(three_state_dfa(), Sparsity::new(2, 2).unwrap(), 1)
            .unwrap()
            .build()
            .into_package()
            .unwrap();

        let err = run_local(ScanClient::new(other, &b"A"[..]), &mut server).unwrap_err();
        assert!(matches!(
            err,
            GdfaError::Ot(OtError::PeerError {
                code: ErrorCode::PackageMismatch,
                ..
            })
        ));
    }

    #[test]
    fn test_unexpected_message_rejected() {
        let (package, _) = setup(three_state_dfa(), 2, 2);
        let mut client = ScanClient::new(package, &b"A"[..]);
        let init = client.start();
        assert!(client.on_message(init).is_err());
        assert_eq!(client.phase(), ScanPhase::Done);
    }
}
