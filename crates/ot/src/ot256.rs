//! 1-of-256 OT derandomized from eight random OTs
//!
//! The client holds random OTs `(c_j, v_j)` and the server `(a0_j, a1_j)`.
//! To fetch slot `x` the client only reveals the flip byte
//! `d = x ⊕ (c_7 … c_0)`. Every slot `t` is masked with
//! `⊕_j PRF(a_{t_j ⊕ d_j, j})`, so for `t = x` each seed is `a_{c_j, j} = v_j`
//! and for every other `t` at least one seed is unknown to the client.

use tracing::trace;
use zeroize::Zeroize;

use oblivids_protocol::SessionId;

use crate::crypto::{prf_into, xor_in_place};
use crate::error::{OtError, Result};
use crate::kos::{ReceiverOt, SenderOt};

/// Random OTs consumed per 1-of-256 transfer
pub const CHOICE_BITS: usize = 8;

/// Slots per answer
pub const SLOTS: usize = 1 << CHOICE_BITS;

const PAD_LABEL: &[u8] = b"ot256";

/// Source of the 256 slots the server answers with
pub trait SlotTable: Send + Sync {
    /// Bytes per slot
    fn entry_len(&self) -> usize;

    /// Number of rows (valid labels are `0..row_count`)
    fn row_count(&self) -> u32;

    /// Write the 256 slots of row `label` into `out` (`256 · entry_len` bytes).
    ///
    /// Fails with [`OtError::InvalidIndex`] for a label outside `0..row_count`.
    fn fill_row(&self, label: u32, out: &mut [u8]) -> Result<()>;
}

fn level_info(session_id: &SessionId, round: u64, level: usize) -> [u8; 25] {
    let mut info = [0u8; 25];
    info[..16].copy_from_slice(session_id);
    info[16..24].copy_from_slice(&round.to_le_bytes());
    info[24] = level as u8;
    info
}

fn check_ots(len: usize) -> Result<()> {
    if len != CHOICE_BITS {
        return Err(OtError::InvalidInput(format!(
            "1-of-256 transfer needs {} random OTs, got {}",
            CHOICE_BITS, len
        )));
    }
    Ok(())
}

/// Client query: the flip byte for choice `x`
pub fn flip_byte(x: u8, ots: &[ReceiverOt]) -> Result<u8> {
    check_ots(ots.len())?;
    let mask = ots
        .iter()
        .enumerate()
        .fold(0u8, |acc, (j, ot)| acc | ((ot.choice as u8) << j));
    Ok(x ^ mask)
}

/// Server answer: every slot of `slots` masked under its pad
pub fn answer(
    flip: u8,
    ots: &[SenderOt],
    slots: &[u8],
    entry_len: usize,
    session_id: &SessionId,
    round: u64,
) -> Result<Vec<u8>> {
    check_ots(ots.len())?;
    if entry_len == 0 || slots.len() != SLOTS * entry_len {
        return Err(OtError::InvalidInput(format!(
            "slot table row of {} bytes for entry length {}",
            slots.len(),
            entry_len
        )));
    }

    let mut pads = vec![0u8; SLOTS * entry_len];
    let mut level_pads = [vec![0u8; entry_len], vec![0u8; entry_len]];

    for (j, ot) in ots.iter().enumerate() {
        let d_j = ((flip >> j) & 1) as usize;
        let info = level_info(session_id, round, j);
        for (beta, pad) in level_pads.iter_mut().enumerate() {
            prf_into(&ot.keys[beta ^ d_j], PAD_LABEL, &info, pad);
        }

        // Double the table: lower half gets P[j][0], upper half P[j][1]
        let half = (1usize << j) * entry_len;
        pads.copy_within(0..half, half);
        for entry in pads[..half].chunks_exact_mut(entry_len) {
            xor_in_place(entry, &level_pads[0]);
        }
        for entry in pads[half..2 * half].chunks_exact_mut(entry_len) {
            xor_in_place(entry, &level_pads[1]);
        }
    }

    xor_in_place(&mut pads, slots);
    level_pads[0].zeroize();
    level_pads[1].zeroize();

    trace!(round, entry_len, "1-of-256 answer built");
    Ok(pads)
}

/// Client decode: recover slot `x` from the answer
pub fn decode(
    x: u8,
    ots: &[ReceiverOt],
    answer: &[u8],
    entry_len: usize,
    session_id: &SessionId,
    round: u64,
) -> Result<Vec<u8>> {
    check_ots(ots.len())?;
    if entry_len == 0 || answer.len() != SLOTS * entry_len {
        return Err(OtError::InvalidMessageFormat(format!(
            "answer of {} bytes for entry length {}",
            answer.len(),
            entry_len
        )));
    }

    let start = x as usize * entry_len;
    let mut out = answer[start..start + entry_len].to_vec();
    let mut pad = vec![0u8; entry_len];

    for (j, ot) in ots.iter().enumerate() {
        prf_into(&ot.key, PAD_LABEL, &level_info(session_id, round, j), &mut pad);
        xor_in_place(&mut out, &pad);
    }
    pad.zeroize();

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kos::tests::extension_pair;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    struct CountingTable {
        entry_len: usize,
    }

    impl SlotTable for CountingTable {
        fn entry_len(&self) -> usize {
            self.entry_len
        }

        fn row_count(&self) -> u32 {
            4
        }

        fn fill_row(&self, label: u32, out: &mut [u8]) -> Result<()> {
            for (t, slot) in out.chunks_exact_mut(self.entry_len).enumerate() {
                slot.fill(t as u8);
                slot[0] = label as u8;
            }
            Ok(())
        }
    }

    fn random_ots(count: usize) -> (Vec<SenderOt>, Vec<ReceiverOt>) {
        let (mut sender, mut receiver) = extension_pair(21);
        let mut rng = ChaCha20Rng::seed_from_u64(22);
        let (batch, blob, received) = receiver.extend(count, &mut rng).unwrap();
        let sent = sender.extend(batch, count, &blob).unwrap();
        (sent, received)
    }

    #[test]
    fn test_every_choice_decodes() {
        let (sent, received) = random_ots(CHOICE_BITS * SLOTS);
        let table = CountingTable { entry_len: 6 };
        let sid = [9u8; 16];

        let mut row = vec![0u8; SLOTS * table.entry_len()];
        table.fill_row(2, &mut row).unwrap();

        for x in 0..=255u8 {
            let range = x as usize * CHOICE_BITS..(x as usize + 1) * CHOICE_BITS;
            let round = x as u64 + 1;

            let flip = flip_byte(x, &received[range.clone()]).unwrap();
            let ct = answer(flip, &sent[range.clone()], &row, 6, &sid, round).unwrap();
            let slot = decode(x, &received[range], &ct, 6, &sid, round).unwrap();

            assert_eq!(slot, vec![2, x, x, x, x, x]);
        }
    }

    #[test]
    fn test_other_slots_stay_masked() {
        let (sent, received) = random_ots(CHOICE_BITS);
        let table = CountingTable { entry_len: 4 };
        let sid = [1u8; 16];

        let mut row = vec![0u8; SLOTS * 4];
        table.fill_row(0, &mut row).unwrap();

        let flip = flip_byte(7, &received).unwrap();
        let ct = answer(flip, &sent, &row, 4, &sid, 1).unwrap();

        let wrong = decode(8, &received, &ct, 4, &sid, 1).unwrap();
        assert_ne!(wrong, vec![0, 8, 8, 8]);
    }

    #[test]
    fn test_round_binds_pads() {
        let (sent, received) = random_ots(CHOICE_BITS);
        let row = vec![0u8; SLOTS * 4];
        let sid = [1u8; 16];

        let flip = flip_byte(3, &received).unwrap();
        let ct = answer(flip, &sent, &row, 4, &sid, 5).unwrap();

        assert_eq!(decode(3, &received, &ct, 4, &sid, 5).unwrap(), vec![0; 4]);
        assert_ne!(decode(3, &received, &ct, 4, &sid, 6).unwrap(), vec![0; 4]);
    }

    #[test]
    fn test_wrong_ot_count_rejected() {
        let (_, received) = random_ots(CHOICE_BITS);
        let result = flip_byte(0, &received[..7]);
        assert!(matches!(result, Err(OtError::InvalidInput(_))));
    }
}
