//! Symmetric building blocks shared by every OT layer and by the GDFA key schedule.
//!
//! All derivations take an explicit label so that no two uses of the same key
//! material ever produce related output.

use aes::cipher::{BlockEncrypt, KeyInit};
use aes::Aes128;
use curve25519_dalek::ristretto::RistrettoPoint;
use sha2::{Digest, Sha256};

/// Security parameter κ (number of base OTs, block length in bits)
pub const KAPPA: usize = 128;

/// Bytes for κ bits
pub const KAPPA_BYTES: usize = KAPPA / 8;

/// Statistical security parameter s
pub const SSP: usize = 40;

/// Compressed Ristretto point size
pub const POINT_BYTES: usize = 32;

/// A κ-bit block
pub type Block = [u8; KAPPA_BYTES];

/// Expand `seed` into `out` with AES-128 in counter mode.
///
/// The counter starts at `tweak << 64`, so different tweaks under one seed
/// yield disjoint keystreams.
pub fn prg(seed: &Block, tweak: u64, out: &mut [u8]) {
    let cipher = Aes128::new(seed.into());
    let mut ctr = (tweak as u128) << 64;

    for chunk in out.chunks_mut(KAPPA_BYTES) {
        let mut block = ctr.to_le_bytes();
        cipher.encrypt_block((&mut block).into());
        chunk.copy_from_slice(&block[..chunk.len()]);
        ctr = ctr.wrapping_add(1);
    }
}

/// Labeled PRF: `len` bytes derived from `key` and `info`
pub fn prf(key: &[u8], label: &[u8], info: &[u8], len: usize) -> Vec<u8> {
    let mut out = vec![0u8; len];
    prf_into(key, label, info, &mut out);
    out
}

/// Labeled PRF writing into a caller buffer
pub fn prf_into(key: &[u8], label: &[u8], info: &[u8], out: &mut [u8]) {
    let mut hasher = Sha256::new();
    hasher.update(b"oblivids/prf/v1");
    hasher.update((label.len() as u32).to_le_bytes());
    hasher.update(label);
    hasher.update((key.len() as u32).to_le_bytes());
    hasher.update(key);
    hasher.update(info);
    let digest = hasher.finalize();

    let mut seed = [0u8; KAPPA_BYTES];
    seed.copy_from_slice(&digest[..KAPPA_BYTES]);
    prg(&seed, 0, out);
}

/// Derive a base-OT key from a Diffie-Hellman point
pub fn hash_point(point: &RistrettoPoint, index: usize, variant: u8) -> Block {
    let mut hasher = Sha256::new();
    hasher.update(b"oblivids/base-ot/v1");
    hasher.update(point.compress().as_bytes());
    hasher.update((index as u32).to_le_bytes());
    hasher.update([variant]);
    let hash = hasher.finalize();

    let mut key = [0u8; KAPPA_BYTES];
    key.copy_from_slice(&hash[..KAPPA_BYTES]);
    key
}

/// Output hash of one extended OT, separated by its session-global index
pub fn tccr(index: u64, block: &Block) -> Block {
    let mut hasher = Sha256::new();
    hasher.update(b"oblivids/kos-out/v1");
    hasher.update(index.to_le_bytes());
    hasher.update(block);
    let hash = hasher.finalize();

    let mut out = [0u8; KAPPA_BYTES];
    out.copy_from_slice(&hash[..KAPPA_BYTES]);
    out
}

/// XOR `src` into `dst` (lengths must match)
pub fn xor_in_place(dst: &mut [u8], src: &[u8]) {
    debug_assert_eq!(dst.len(), src.len());
    for (d, s) in dst.iter_mut().zip(src.iter()) {
        *d ^= s;
    }
}

/// Multiply in GF(2^128) modulo x^128 + x^7 + x^2 + x + 1.
///
/// Fixed iteration count, no branches on operand bits.
pub fn gf128_mul(a: u128, b: u128) -> u128 {
    let mut acc = 0u128;
    let mut a = a;
    let mut b = b;

    for _ in 0..128 {
        let take = (b & 1).wrapping_neg();
        acc ^= a & take;
        b >>= 1;
        let carry = (a >> 127).wrapping_neg();
        a = (a << 1) ^ (carry & 0x87);
    }
    acc
}
