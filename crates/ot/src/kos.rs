//! KOS-checked IKNP OT extension
//!
//! Roles are reversed relative to the base OT: the server (extension sender)
//! received one seed per column according to its secret Δ, the client
//! (extension receiver) holds both seeds of every column.
//!
//! Per batch `b` the client sends the column matrix `u` followed by the
//! two check words `x` and `t`:
//!
//! ```text
//! u_j = G(k0_j, b) ⊕ G(k1_j, b) ⊕ r        (j < κ, m' bits each)
//! x   = Σ χ_i · r_i
//! t   = Σ χ_i ⊗ t^i
//! ```
//!
//! The server recomputes `q^i = t^i ⊕ r_i·Δ` and accepts only if
//! `Σ χ_i ⊗ q^i == t ⊕ x ⊗ Δ`, which catches a client that used
//! inconsistent choice vectors across columns.

use rand::{CryptoRng, RngCore};
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

use oblivids_protocol::SessionId;

use crate::crypto::{gf128_mul, prf, prg, tccr, xor_in_place, Block, KAPPA, KAPPA_BYTES, SSP};
use crate::error::{OtError, Result};

/// Rows sacrificed per batch for the consistency check
pub const CHECK_ROWS: usize = KAPPA + SSP;

/// Rows actually extended for `count` requested OTs
pub fn padded_rows(count: usize) -> usize {
    (count + CHECK_ROWS + 7) / 8 * 8
}

/// Size of the extension blob for `count` OTs
pub fn extend_blob_len(count: usize) -> usize {
    KAPPA * padded_rows(count) / 8 + 2 * KAPPA_BYTES
}

/// Session-global index of row `i` of batch `batch`
fn global_index(batch: u32, i: usize) -> u64 {
    ((batch as u64) << 32) | i as u64
}

/// One random OT held by the extension sender
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SenderOt {
    pub keys: [Block; 2],
}

/// One random OT held by the extension receiver
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ReceiverOt {
    pub choice: bool,
    pub key: Block,
}

/// Transpose κ columns of `rows` bits into `rows` κ-bit words
fn transpose(columns: &[Vec<u8>], rows: usize) -> Vec<u128> {
    let mut out = vec![0u128; rows];
    for (j, column) in columns.iter().enumerate() {
        for (i, word) in out.iter_mut().enumerate() {
            let bit = (column[i / 8] >> (i % 8)) & 1;
            *word |= (bit as u128) << j;
        }
    }
    out
}

/// Fiat-Shamir challenge words, bound to the session, batch and `u`
fn challenges(session_id: &SessionId, batch: u32, u: &[u8], rows: usize) -> Vec<u128> {
    let mut info = Vec::with_capacity(4 + u.len());
    info.extend_from_slice(&batch.to_le_bytes());
    info.extend_from_slice(u);

    let bytes = prf(session_id, b"kos-chi", &info, rows * KAPPA_BYTES);
    bytes
        .chunks_exact(KAPPA_BYTES)
        .map(|c| {
            let mut w = [0u8; KAPPA_BYTES];
            w.copy_from_slice(c);
            u128::from_le_bytes(w)
        })
        .collect()
}

/// Client side of the extension
pub struct KosReceiver {
    session_id: SessionId,
    seeds: Vec<(Block, Block)>,
    next_batch: u32,
}

impl KosReceiver {
    /// Wrap the κ seed pairs produced by the base OT
    pub fn new(session_id: SessionId, seeds: Vec<(Block, Block)>) -> Result<Self> {
        if seeds.len() != KAPPA {
            return Err(OtError::InvalidInput(format!(
                "expected {} seed pairs, got {}",
                KAPPA,
                seeds.len()
            )));
        }
        Ok(Self {
            session_id,
            seeds,
            next_batch: 0,
        })
    }

    /// Index the next batch will use
    pub fn next_batch(&self) -> u32 {
        self.next_batch
    }

    /// Extend `count` random OTs, returning the batch index, the blob to send
    /// and this side's outputs.
    pub fn extend<R: RngCore + CryptoRng>(
        &mut self,
        count: usize,
        rng: &mut R,
    ) -> Result<(u32, Vec<u8>, Vec<ReceiverOt>)> {
        if count == 0 {
            return Err(OtError::InvalidInput("empty extension batch".into()));
        }

        let batch = self.next_batch;
        let rows = padded_rows(count);
        let col_bytes = rows / 8;

        let mut r = vec![0u8; col_bytes];
        rng.fill_bytes(&mut r);

        let mut blob = Vec::with_capacity(extend_blob_len(count));
        let mut t_cols = Vec::with_capacity(KAPPA);

        for (k0, k1) in &self.seeds {
            let mut t = vec![0u8; col_bytes];
            prg(k0, batch as u64, &mut t);

            let mut u = vec![0u8; col_bytes];
            prg(k1, batch as u64, &mut u);
            xor_in_place(&mut u, &t);
            xor_in_place(&mut u, &r);

            blob.extend_from_slice(&u);
            t_cols.push(t);
        }

        let t_rows = transpose(&t_cols, rows);
        let chi = challenges(&self.session_id, batch, &blob, rows);

        let mut x = 0u128;
        let mut t_check = 0u128;
        for i in 0..rows {
            let r_i = ((r[i / 8] >> (i % 8)) & 1) as u128;
            x ^= chi[i] & r_i.wrapping_neg();
            t_check ^= gf128_mul(chi[i], t_rows[i]);
        }
        blob.extend_from_slice(&x.to_le_bytes());
        blob.extend_from_slice(&t_check.to_le_bytes());

        let outputs = (0..count)
            .map(|i| ReceiverOt {
                choice: (r[i / 8] >> (i % 8)) & 1 == 1,
                key: tccr(global_index(batch, i), &t_rows[i].to_le_bytes()),
            })
            .collect();

        r.zeroize();
        for col in &mut t_cols {
            col.zeroize();
        }

        self.next_batch += 1;
        debug!(batch, count, rows, "extension batch prepared");
        Ok((batch, blob, outputs))
    }
}

impl Drop for KosReceiver {
    fn drop(&mut self) {
        for (k0, k1) in &mut self.seeds {
            k0.zeroize();
            k1.zeroize();
        }
    }
}

/// Server side of the extension
pub struct KosSender {
    session_id: SessionId,
    delta: u128,
    seeds: Vec<Block>,
    next_batch: u32,
}

impl KosSender {
    /// Wrap the base-OT choice bits (Δ) and the κ keys received for them
    pub fn new(session_id: SessionId, delta_bits: &[bool], seeds: Vec<Block>) -> Result<Self> {
        if delta_bits.len() != KAPPA || seeds.len() != KAPPA {
            return Err(OtError::InvalidInput(format!(
                "expected {} base OTs, got {} choices and {} keys",
                KAPPA,
                delta_bits.len(),
                seeds.len()
            )));
        }
        let delta = delta_bits
            .iter()
            .enumerate()
            .fold(0u128, |acc, (j, &b)| acc | ((b as u128) << j));

        Ok(Self {
            session_id,
            delta,
            seeds,
            next_batch: 0,
        })
    }

    /// Index the next accepted batch must carry
    pub fn next_batch(&self) -> u32 {
        self.next_batch
    }

    /// Verify and absorb one extension batch
    pub fn extend(&mut self, batch: u32, count: usize, blob: &[u8]) -> Result<Vec<SenderOt>> {
        if batch != self.next_batch {
            return Err(OtError::BatchMismatch {
                expected: self.next_batch,
                got: batch,
            });
        }
        if count == 0 || blob.len() != extend_blob_len(count) {
            return Err(OtError::InvalidMessageFormat(format!(
                "extension blob of {} bytes for {} OTs",
                blob.len(),
                count
            )));
        }

        let rows = padded_rows(count);
        let col_bytes = rows / 8;
        let u_len = KAPPA * col_bytes;
        let (u, check) = blob.split_at(u_len);

        let mut q_cols = Vec::with_capacity(KAPPA);
        for (j, seed) in self.seeds.iter().enumerate() {
            let mut q = vec![0u8; col_bytes];
            prg(seed, batch as u64, &mut q);

            let mask = (((self.delta >> j) & 1) as u8).wrapping_neg();
            for (q_b, u_b) in q.iter_mut().zip(&u[j * col_bytes..(j + 1) * col_bytes]) {
                *q_b ^= u_b & mask;
            }
            q_cols.push(q);
        }

        let q_rows = transpose(&q_cols, rows);
        let chi = challenges(&self.session_id, batch, u, rows);

        let mut word = [0u8; KAPPA_BYTES];
        word.copy_from_slice(&check[..KAPPA_BYTES]);
        let x = u128::from_le_bytes(word);
        word.copy_from_slice(&check[KAPPA_BYTES..]);
        let t_check = u128::from_le_bytes(word);

        let q_check = chi
            .iter()
            .zip(&q_rows)
            .fold(0u128, |acc, (c, q)| acc ^ gf128_mul(*c, *q));

        if q_check != t_check ^ gf128_mul(x, self.delta) {
            return Err(OtError::ConsistencyCheckFailed);
        }

        let outputs = (0..count)
            .map(|i| {
                let g = global_index(batch, i);
                SenderOt {
                    keys: [
                        tccr(g, &q_rows[i].to_le_bytes()),
                        tccr(g, &(q_rows[i] ^ self.delta).to_le_bytes()),
                    ],
                }
            })
            .collect();

        for col in &mut q_cols {
            col.zeroize();
        }

        self.next_batch += 1;
        debug!(batch, count, "extension batch accepted");
        Ok(outputs)
    }
}

impl Drop for KosSender {
    fn drop(&mut self) {
        self.delta.zeroize();
        self.seeds.zeroize();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::base::{BaseOtReceiver, BaseOtSender};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    /// Run the base OTs and return both extension endpoints
    pub(crate) fn extension_pair(seed: u64) -> (KosSender, KosReceiver) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let session_id = [seed as u8; 16];

        let client = BaseOtSender::setup(&mut rng);
        let delta: Vec<bool> = (0..KAPPA).map(|_| rng.gen()).collect();
        let (server, blinded) =
            BaseOtReceiver::choose(&client.public_key(), &delta, &mut rng).unwrap();
        let pairs = client.derive_keys(&blinded).unwrap();

        let sender = KosSender::new(session_id, &delta, server.into_keys()).unwrap();
        let receiver = KosReceiver::new(session_id, pairs).unwrap();
        (sender, receiver)
    }

    #[test]
    fn test_padded_rows() {
        assert_eq!(padded_rows(1), 176);
        assert_eq!(padded_rows(8), 176);
        assert_eq!(padded_rows(9), 184);
    }

    #[test]
    fn test_extension_correlation() {
        let (mut sender, mut receiver) = extension_pair(1);
        let mut rng = ChaCha20Rng::seed_from_u64(100);

        for _ in 0..3 {
            let (batch, blob, received) = receiver.extend(64, &mut rng).unwrap();
            let sent = sender.extend(batch, 64, &blob).unwrap();

            assert_eq!(sent.len(), 64);
            for (s, r) in sent.iter().zip(&received) {
                let chosen = s.keys[r.choice as usize];
                let other = s.keys[!r.choice as usize];
                assert_eq!(chosen, r.key);
                assert_ne!(other, r.key);
            }
        }
    }

    #[test]
    fn test_outputs_differ_across_batches() {
        let (mut sender, mut receiver) = extension_pair(2);
        let mut rng = ChaCha20Rng::seed_from_u64(7);

        let (b0, blob0, _) = receiver.extend(8, &mut rng).unwrap();
        let first = sender.extend(b0, 8, &blob0).unwrap();
        let (b1, blob1, _) = receiver.extend(8, &mut rng).unwrap();
        let second = sender.extend(b1, 8, &blob1).unwrap();

        assert_ne!(first[0].keys, second[0].keys);
    }

    #[test]
    fn test_tampered_column_fails_check() {
        let (mut sender, mut receiver) = extension_pair(3);
        let mut rng = ChaCha20Rng::seed_from_u64(8);

        let (batch, mut blob, _) = receiver.extend(16, &mut rng).unwrap();
        blob[5] ^= 0x01;

        let result = sender.extend(batch, 16, &blob);
        assert!(matches!(result, Err(OtError::ConsistencyCheckFailed)));
    }

    #[test]
    fn test_tampered_check_word_fails() {
        let (mut sender, mut receiver) = extension_pair(4);
        let mut rng = ChaCha20Rng::seed_from_u64(9);

        let (batch, mut blob, _) = receiver.extend(16, &mut rng).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0x80;

        let result = sender.extend(batch, 16, &blob);
        assert!(matches!(result, Err(OtError::ConsistencyCheckFailed)));
    }

    #[test]
    fn test_out_of_order_batch_rejected() {
        let (mut sender, mut receiver) = extension_pair(5);
        let mut rng = ChaCha20Rng::seed_from_u64(10);

        let _ = receiver.extend(8, &mut rng).unwrap();
        let (batch, blob, _) = receiver.extend(8, &mut rng).unwrap();

        let result = sender.extend(batch, 8, &blob);
        assert!(matches!(
            result,
            Err(OtError::BatchMismatch {
                expected: 0,
                got: 1
            })
        ));
    }

    #[test]
    fn test_wrong_blob_length_rejected() {
        let (mut sender, _) = extension_pair(6);
        let result = sender.extend(0, 8, &[0u8; 10]);
        assert!(matches!(result, Err(OtError::InvalidMessageFormat(_))));
    }
}
