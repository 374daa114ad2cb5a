//! In-process OT roles without transport
//!
//! - GOT: one-time base-OT setup, the client publishes its point once
//! - QOT: client query for one byte against one row
//! - AOT: server answer, the masked 256-slot row entry
//! - DOT: client decode of the chosen slot
//!
//! Extension batches keep both random-OT pools topped up between queries.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tracing::debug;

use oblivids_protocol::SessionId;

use crate::base::{BaseOtReceiver, BaseOtSender};
use crate::crypto::{KAPPA, POINT_BYTES};
use crate::error::{OtError, Result};
use crate::kos::{KosReceiver, KosSender, ReceiverOt, SenderOt};
use crate::ot256::{self, SlotTable, CHOICE_BITS, SLOTS};
use crate::pool::OtPool;

/// Bytes of a QOT blob (the flip byte)
pub const QUERY_BLOB_LEN: usize = oblivids_protocol::QUERY_BLOB_LEN;

struct PendingQuery {
    x: u8,
    round: u64,
    row_label: u32,
    ots: Vec<ReceiverOt>,
}

/// Client (OT receiver) role
pub struct ClientOt {
    session_id: SessionId,
    rng: ChaCha20Rng,
    base: Option<BaseOtSender>,
    kos: Option<KosReceiver>,
    pool: OtPool<ReceiverOt>,
    pending: Option<PendingQuery>,
}

impl ClientOt {
    pub fn new(session_id: SessionId) -> Self {
        Self::with_rng(session_id, ChaCha20Rng::from_entropy())
    }

    /// Client with caller-supplied randomness
    pub fn with_rng(session_id: SessionId, rng: ChaCha20Rng) -> Self {
        Self {
            session_id,
            rng,
            base: None,
            kos: None,
            pool: OtPool::new(),
            pending: None,
        }
    }

    /// GOT: the base-OT public point, sent once per session
    pub fn got(&mut self) -> Vec<u8> {
        let base = BaseOtSender::setup(&mut self.rng);
        let pk = base.public_key().to_vec();
        self.base = Some(base);
        pk
    }

    /// Consume the server's blinded points and derive the extension seeds
    pub fn finish_setup(&mut self, reply: &[u8]) -> Result<()> {
        let base = self
            .base
            .take()
            .ok_or_else(|| OtError::UnexpectedMessage("base OT reply before setup".into()))?;
        if reply.len() != KAPPA * POINT_BYTES {
            return Err(OtError::InvalidMessageFormat(format!(
                "base OT reply of {} bytes",
                reply.len()
            )));
        }

        let seeds = base.derive_keys(reply)?;
        self.kos = Some(KosReceiver::new(self.session_id, seeds)?);
        debug!("client base OT complete");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.kos.is_some()
    }

    /// Random OTs waiting in the pool
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Extend `count` random OTs; returns the batch index and blob to send
    pub fn extend(&mut self, count: usize) -> Result<(u32, Vec<u8>)> {
        let kos = self.kos.as_mut().ok_or(OtError::SessionNotInitialized)?;
        let (batch, blob, outputs) = kos.extend(count, &mut self.rng)?;
        self.pool.refill(outputs);
        Ok((batch, blob))
    }

    /// QOT: query slot `x` of row `row_label` in round `round`
    pub fn qot(&mut self, row_label: u32, x: u8, round: u64) -> Result<Vec<u8>> {
        if self.pending.is_some() {
            return Err(OtError::UnexpectedMessage(
                "query issued while another is outstanding".into(),
            ));
        }
        let ots = self.pool.take(CHOICE_BITS)?;
        let flip = ot256::flip_byte(x, &ots)?;

        self.pending = Some(PendingQuery {
            x,
            round,
            row_label,
            ots,
        });
        Ok(vec![flip])
    }

    /// DOT: decode the answer to the outstanding query
    pub fn dot(
        &mut self,
        row_label: u32,
        answer: &[u8],
        entry_len: usize,
        round: u64,
    ) -> Result<Vec<u8>> {
        let pending = self
            .pending
            .take()
            .ok_or_else(|| OtError::UnexpectedMessage("answer without a query".into()))?;

        if round != pending.round {
            return Err(OtError::RoundMismatch {
                expected: pending.round,
                got: round,
            });
        }
        if row_label != pending.row_label {
            return Err(OtError::UnexpectedMessage(format!(
                "answer for row {} to a query on row {}",
                row_label, pending.row_label
            )));
        }

        ot256::decode(
            pending.x,
            &pending.ots,
            answer,
            entry_len,
            &self.session_id,
            round,
        )
    }
}

/// Server (OT sender) role
pub struct ServerOt {
    session_id: SessionId,
    rng: ChaCha20Rng,
    kos: Option<KosSender>,
    pool: OtPool<SenderOt>,
}

impl ServerOt {
    pub fn new(session_id: SessionId) -> Self {
        Self::with_rng(session_id, ChaCha20Rng::from_entropy())
    }

    /// Server with caller-supplied randomness
    pub fn with_rng(session_id: SessionId, rng: ChaCha20Rng) -> Self {
        Self {
            session_id,
            rng,
            kos: None,
            pool: OtPool::new(),
        }
    }

    /// Answer the client's GOT: draw Δ and blind one point per bit
    pub fn respond_setup(&mut self, setup: &[u8]) -> Result<Vec<u8>> {
        if self.kos.is_some() {
            return Err(OtError::UnexpectedMessage("base OT already complete".into()));
        }
        if setup.len() != POINT_BYTES {
            return Err(OtError::InvalidMessageFormat(format!(
                "base OT setup of {} bytes",
                setup.len()
            )));
        }

        let delta: Vec<bool> = (0..KAPPA).map(|_| self.rng.gen()).collect();
        let (receiver, blinded) = BaseOtReceiver::choose(setup, &delta, &mut self.rng)?;
        self.kos = Some(KosSender::new(
            self.session_id,
            &delta,
            receiver.into_keys(),
        )?);

        debug!("server base OT complete");
        Ok(blinded)
    }

    pub fn is_ready(&self) -> bool {
        self.kos.is_some()
    }

    /// Random OTs waiting in the pool
    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    /// Verify an extension batch and add its outputs to the pool
    pub fn accept_extend(&mut self, batch: u32, count: usize, blob: &[u8]) -> Result<usize> {
        let kos = self.kos.as_mut().ok_or(OtError::SessionNotInitialized)?;
        let outputs = kos.extend(batch, count, blob)?;
        let accepted = outputs.len();
        self.pool.refill(outputs);
        Ok(accepted)
    }

    /// AOT: answer a query on row `row_label` with every slot masked
    pub fn aot<T: SlotTable + ?Sized>(
        &mut self,
        row_label: u32,
        query: &[u8],
        table: &T,
        round: u64,
    ) -> Result<Vec<u8>> {
        if query.len() != QUERY_BLOB_LEN {
            return Err(OtError::InvalidMessageFormat(format!(
                "query blob of {} bytes",
                query.len()
            )));
        }
        let ots = self.pool.take(CHOICE_BITS)?;

        if row_label >= table.row_count() {
            return Err(OtError::InvalidIndex {
                index: row_label,
                max: table.row_count(),
            });
        }

        let entry_len = table.entry_len();
        let mut slots = vec![0u8; SLOTS * entry_len];
        table.fill_row(row_label, &mut slots)?;

        ot256::answer(query[0], &ots, &slots, entry_len, &self.session_id, round)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Squares;

    impl SlotTable for Squares {
        fn entry_len(&self) -> usize {
            2
        }

        fn row_count(&self) -> u32 {
            3
        }

        fn fill_row(&self, label: u32, out: &mut [u8]) -> Result<()> {
            for (t, slot) in out.chunks_exact_mut(2).enumerate() {
                let v = ((t * t) as u16).wrapping_add(label as u16);
                slot.copy_from_slice(&v.to_le_bytes());
            }
            Ok(())
        }
    }

    fn ready_pair() -> (ClientOt, ServerOt) {
        let sid = [4u8; 16];
        let mut client = ClientOt::with_rng(sid, ChaCha20Rng::seed_from_u64(1));
        let mut server = ServerOt::with_rng(sid, ChaCha20Rng::seed_from_u64(2));

        let pk = client.got();
        let reply = server.respond_setup(&pk).unwrap();
        client.finish_setup(&reply).unwrap();
        (client, server)
    }

    #[test]
    fn test_query_answer_decode() {
        let (mut client, mut server) = ready_pair();
        let (batch, blob) = client.extend(64).unwrap();
        assert_eq!(server.accept_extend(batch, 64, &blob).unwrap(), 64);

        for (round, x) in [(1u64, 0u8), (2, 17), (3, 255)] {
            let query = client.qot(2, x, round).unwrap();
            let answer = server.aot(2, &query, &Squares, round).unwrap();
            let slot = client.dot(2, &answer, 2, round).unwrap();

            let expected = ((x as usize * x as usize) as u16).wrapping_add(2);
            assert_eq!(slot, expected.to_le_bytes().to_vec());
        }
        assert_eq!(client.pool_len(), server.pool_len());
    }

    #[test]
    fn test_query_without_pool_fails() {
        let (mut client, _) = ready_pair();
        let result = client.qot(0, 1, 1);
        assert!(matches!(result, Err(OtError::PoolExhausted { .. })));
    }

    #[test]
    fn test_answer_round_checked() {
        let (mut client, mut server) = ready_pair();
        let (batch, blob) = client.extend(8).unwrap();
        server.accept_extend(batch, 8, &blob).unwrap();

        let query = client.qot(1, 9, 1).unwrap();
        let answer = server.aot(1, &query, &Squares, 1).unwrap();
        let result = client.dot(1, &answer, 2, 2);
        assert!(matches!(
            result,
            Err(OtError::RoundMismatch {
                expected: 1,
                got: 2
            })
        ));
    }

    #[test]
    fn test_row_out_of_range() {
        let (mut client, mut server) = ready_pair();
        let (batch, blob) = client.extend(8).unwrap();
        server.accept_extend(batch, 8, &blob).unwrap();

        let query = client.qot(7, 0, 1).unwrap();
        let result = server.aot(7, &query, &Squares, 1);
        assert!(matches!(
            result,
            Err(OtError::InvalidIndex { index: 7, max: 3 })
        ));
    }

    #[test]
    fn test_setup_twice_rejected() {
        let (mut client, mut server) = ready_pair();
        let pk = client.got();
        assert!(matches!(
            server.respond_setup(&pk),
            Err(OtError::UnexpectedMessage(_))
        ));
    }
}
